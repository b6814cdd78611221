//! Human task commands.

use serde_json::{Map, Value as JsonValue};

use tenantgate_core::{EngineError, EngineResult, EntityId, EntityKind, TenantId};
use tenantgate_tenancy::{CollectionFilter, Operation, SingleEntityGuard, TenantSelection};

use crate::command::Command;
use crate::commands::{leave_activity, load, merge_variables};
use crate::context::CommandContext;
use crate::model::{ProcessInstance, Task};
use crate::store::EntityStore;

/// Create a standalone task, optionally owned by `tenant_id`.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub id: EntityId,
    pub name: String,
    pub tenant_id: Option<TenantId>,
}

impl Command for CreateTask {
    type Output = Task;
    const NAME: &'static str = "create-task";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Task> {
        ctx.tenant_guard()
            .check_tenant(Operation::CreateTask, &self.id, self.tenant_id.as_ref())?;

        if ctx.repositories().tasks.get(&self.id)?.is_some() {
            return Err(EngineError::conflict(format!("task '{}' already exists", self.id)));
        }

        let task = Task {
            id: self.id.clone(),
            name: self.name.clone(),
            activity_id: None,
            process_instance_id: None,
            tenant_id: self.tenant_id.clone(),
            assignee: None,
            created_at: ctx.now(),
        };
        ctx.stage(task.clone());
        Ok(task)
    }
}

#[derive(Debug, Clone)]
pub struct GetTask {
    pub task_id: EntityId,
}

impl Command for GetTask {
    type Output = Task;
    const NAME: &'static str = "get-task";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Task> {
        let task: Task = load(ctx.repositories().tasks.as_ref(), &self.task_id)?;
        ctx.tenant_guard().check(Operation::ReadTask, &task)?;
        Ok(task)
    }
}

#[derive(Debug, Clone)]
pub struct SetAssignee {
    pub task_id: EntityId,
    pub assignee: Option<String>,
}

impl Command for SetAssignee {
    type Output = ();
    const NAME: &'static str = "set-assignee";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let mut task: Task = load(ctx.repositories().tasks.as_ref(), &self.task_id)?;
        ctx.tenant_guard().check(Operation::AssignTask, &task)?;

        task.assignee = self.assignee.clone();
        ctx.stage(task);
        Ok(())
    }
}

/// Assign the task to `user_id` unless someone else already holds it.
#[derive(Debug, Clone)]
pub struct ClaimTask {
    pub task_id: EntityId,
    pub user_id: String,
}

impl Command for ClaimTask {
    type Output = ();
    const NAME: &'static str = "claim-task";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let mut task: Task = load(ctx.repositories().tasks.as_ref(), &self.task_id)?;
        ctx.tenant_guard().check(Operation::AssignTask, &task)?;

        if let Some(current) = &task.assignee {
            if current != &self.user_id {
                return Err(EngineError::conflict(format!(
                    "task '{}' is already claimed by '{current}'",
                    task.id
                )));
            }
        }
        task.assignee = Some(self.user_id.clone());
        ctx.stage(task);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CompleteTask {
    pub task_id: EntityId,
    pub variables: Map<String, JsonValue>,
}

impl Command for CompleteTask {
    type Output = ();
    const NAME: &'static str = "complete-task";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let repos = ctx.repositories();
        let task: Task = load(repos.tasks.as_ref(), &self.task_id)?;
        ctx.tenant_guard().check(Operation::WorkOnTask, &task)?;

        ctx.stage_remove(EntityKind::Task, task.id.clone());

        let (Some(instance_id), Some(activity_id)) = (&task.process_instance_id, &task.activity_id) else {
            return Ok(());
        };
        let mut instance: ProcessInstance = load(repos.process_instances.as_ref(), instance_id)?;
        merge_variables(&mut instance, &self.variables);
        leave_activity(ctx, instance, activity_id)
    }
}

/// Delete a standalone task. Tasks of a process are removed with their instance.
#[derive(Debug, Clone)]
pub struct DeleteTask {
    pub task_id: EntityId,
}

impl Command for DeleteTask {
    type Output = ();
    const NAME: &'static str = "delete-task";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let task: Task = load(ctx.repositories().tasks.as_ref(), &self.task_id)?;
        ctx.tenant_guard().check(Operation::DeleteTask, &task)?;

        if task.process_instance_id.is_some() {
            return Err(EngineError::validation(format!(
                "task '{}' is part of a running process instance and cannot be deleted",
                task.id
            )));
        }
        ctx.stage_remove(EntityKind::Task, task.id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub selection: TenantSelection,
    pub assignee: Option<String>,
    pub process_instance_id: Option<EntityId>,
    pub unassigned: bool,
}

impl Command for TaskQuery {
    type Output = Vec<Task>;
    const NAME: &'static str = "task-query";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<Task>> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        Ok(ctx
            .repositories()
            .tasks
            .list(&predicate)?
            .into_iter()
            .filter(|t| self.assignee.is_none() || t.assignee == self.assignee)
            .filter(|t| !self.unassigned || t.assignee.is_none())
            .filter(|t| {
                self.process_instance_id.is_none() || t.process_instance_id == self.process_instance_id
            })
            .collect())
    }
}
