//! External task commands.
//!
//! Single-task operations are checked against the owning process instance
//! with the "update" verb. Fetch-and-lock is a selection: it hands out only
//! tasks the worker's tenants may see and never fails for tenant reasons.

use chrono::Duration;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use tenantgate_core::{EngineError, EngineResult, EntityId, EntityKind};
use tenantgate_tenancy::{CollectionFilter, Operation, SingleEntityGuard, TenantSelection};

use crate::command::Command;
use crate::commands::{leave_activity, load, merge_variables};
use crate::context::CommandContext;
use crate::model::{ExternalTask, LockedExternalTask, ProcessInstance};
use crate::store::EntityStore;

/// Load the external task and the process instance it belongs to, checking
/// `UpdateProcessInstance` on the latter.
fn load_checked(ctx: &CommandContext<'_>, id: &EntityId) -> EngineResult<(ExternalTask, ProcessInstance)> {
    let repos = ctx.repositories();
    let task: ExternalTask = load(repos.external_tasks.as_ref(), id)?;
    let instance: ProcessInstance = load(repos.process_instances.as_ref(), &task.process_instance_id)?;
    ctx.tenant_guard()
        .check(Operation::UpdateProcessInstance, &instance)?;
    Ok((task, instance))
}

fn ensure_locked_by(task: &ExternalTask, worker_id: &str) -> EngineResult<()> {
    match task.worker_id.as_deref() {
        Some(owner) if owner == worker_id => Ok(()),
        owner => Err(EngineError::conflict(format!(
            "external task '{}' is locked by {:?}, not by worker '{worker_id}'",
            task.id, owner
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct FetchAndLock {
    pub worker_id: String,
    pub max_tasks: usize,
    pub topic: String,
    pub lock_duration_ms: i64,
    pub selection: TenantSelection,
}

impl Command for FetchAndLock {
    type Output = Vec<LockedExternalTask>;
    const NAME: &'static str = "fetch-and-lock";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<LockedExternalTask>> {
        if self.worker_id.trim().is_empty() {
            return Err(EngineError::validation("workerId must not be empty"));
        }
        if self.lock_duration_ms <= 0 {
            return Err(EngineError::validation("lockDuration must be greater than 0"));
        }

        let repos = ctx.repositories();
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        let now = ctx.now();

        let mut candidates: Vec<ExternalTask> = repos
            .external_tasks
            .list(&predicate)?
            .into_iter()
            .filter(|t| t.topic == self.topic)
            .filter(|t| !t.is_locked_at(now))
            .filter(|t| t.retries != Some(0))
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        candidates.truncate(self.max_tasks);

        let lock_expiration = now + Duration::milliseconds(self.lock_duration_ms);
        let mut locked = Vec::with_capacity(candidates.len());
        for mut task in candidates {
            let variables = repos
                .process_instances
                .get(&task.process_instance_id)?
                .map(|i| i.variables)
                .unwrap_or_default();

            task.worker_id = Some(self.worker_id.clone());
            task.lock_expiration = Some(lock_expiration);
            locked.push(LockedExternalTask {
                id: task.id.clone(),
                topic: task.topic.clone(),
                worker_id: self.worker_id.clone(),
                lock_expiration,
                process_instance_id: task.process_instance_id.clone(),
                tenant_id: task.tenant_id.clone(),
                variables,
            });
            ctx.stage(task);
        }

        debug!(worker_id = %self.worker_id, topic = %self.topic, locked = locked.len(), "fetched external tasks");
        Ok(locked)
    }
}

#[derive(Debug, Clone)]
pub struct CompleteExternalTask {
    pub external_task_id: EntityId,
    pub worker_id: String,
    pub variables: Map<String, JsonValue>,
}

impl Command for CompleteExternalTask {
    type Output = ();
    const NAME: &'static str = "complete-external-task";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let (task, mut instance) = load_checked(ctx, &self.external_task_id)?;
        ensure_locked_by(&task, &self.worker_id)?;

        ctx.stage_remove(EntityKind::ExternalTask, task.id.clone());
        merge_variables(&mut instance, &self.variables);
        leave_activity(ctx, instance, &task.activity_id)
    }
}

#[derive(Debug, Clone)]
pub struct UnlockExternalTask {
    pub external_task_id: EntityId,
}

impl Command for UnlockExternalTask {
    type Output = ();
    const NAME: &'static str = "unlock-external-task";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let (mut task, _) = load_checked(ctx, &self.external_task_id)?;
        task.worker_id = None;
        task.lock_expiration = None;
        ctx.stage(task);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SetExternalTaskRetries {
    pub external_task_id: EntityId,
    pub retries: u32,
}

impl Command for SetExternalTaskRetries {
    type Output = ();
    const NAME: &'static str = "set-external-task-retries";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let (mut task, _) = load_checked(ctx, &self.external_task_id)?;
        task.retries = Some(self.retries);
        ctx.stage(task);
        Ok(())
    }
}

/// Report a failed attempt; the task is unlocked for a later retry after
/// `retry_timeout_ms`.
#[derive(Debug, Clone)]
pub struct HandleExternalTaskFailure {
    pub external_task_id: EntityId,
    pub worker_id: String,
    pub error_message: String,
    pub retries: u32,
    pub retry_timeout_ms: i64,
}

impl Command for HandleExternalTaskFailure {
    type Output = ();
    const NAME: &'static str = "handle-external-task-failure";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let (mut task, _) = load_checked(ctx, &self.external_task_id)?;
        ensure_locked_by(&task, &self.worker_id)?;

        task.error_message = Some(self.error_message.clone());
        task.retries = Some(self.retries);
        task.lock_expiration = Some(ctx.now() + Duration::milliseconds(self.retry_timeout_ms.max(0)));
        ctx.stage(task);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExternalTaskQuery {
    pub selection: TenantSelection,
    pub topic: Option<String>,
    pub worker_id: Option<String>,
}

impl Command for ExternalTaskQuery {
    type Output = Vec<ExternalTask>;
    const NAME: &'static str = "external-task-query";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<ExternalTask>> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        Ok(ctx
            .repositories()
            .external_tasks
            .list(&predicate)?
            .into_iter()
            .filter(|t| self.topic.as_ref().is_none_or(|topic| &t.topic == topic))
            .filter(|t| self.worker_id.is_none() || t.worker_id == self.worker_id)
            .collect())
    }
}
