//! Process-instance commands.

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use tenantgate_core::{
    EngineError, EngineResult, EntityId, EntityKind, TenantId,
};
use tenantgate_tenancy::{
    CollectionFilter, Operation, SingleEntityGuard, TenantIdProviderContext, TenantSelection,
};

use crate::command::Command;
use crate::commands::{end_process_instance, leave_activity, load, log_operation, merge_variables};
use crate::context::CommandContext;
use crate::model::{
    ActivityInstance, ActivitySpec, ExternalTask, HistoricProcessInstance, Job, ProcessDefinition,
    ProcessInstance, Task,
};
use crate::store::EntityStore;

const DEFAULT_JOB_RETRIES: u32 = 3;

/// Create an instance of `definition`, staging its wait states.
fn instantiate(
    ctx: &CommandContext<'_>,
    definition: &ProcessDefinition,
    business_key: Option<String>,
    variables: Map<String, JsonValue>,
) -> EngineResult<ProcessInstance> {
    ctx.tenant_guard()
        .check(Operation::CreateProcessInstance, definition)?;

    if definition.suspended {
        return Err(EngineError::validation(format!(
            "process definition '{}' is suspended",
            definition.id
        )));
    }

    let tenant_id = match &definition.tenant_id {
        Some(tenant) => Some(tenant.clone()),
        None => ctx.tenant_id_provider().and_then(|provider| {
            provider.provide_tenant_id(&TenantIdProviderContext {
                definition_id: &definition.id,
                definition_key: &definition.key,
                authentication: ctx.authentication(),
            })
        }),
    };

    let mut instance = ProcessInstance {
        id: EntityId::generate(),
        definition_id: definition.id.clone(),
        definition_key: definition.key.clone(),
        business_key,
        tenant_id: tenant_id.clone(),
        suspended: false,
        active_activity_ids: Vec::new(),
        message_subscriptions: Vec::new(),
        variables,
    };

    for activity in &definition.model.activities {
        instance.active_activity_ids.push(activity.id().to_string());
        match activity {
            ActivitySpec::UserTask { id, name } => ctx.stage(Task {
                id: EntityId::generate(),
                name: name.clone(),
                activity_id: Some(id.clone()),
                process_instance_id: Some(instance.id.clone()),
                tenant_id: tenant_id.clone(),
                assignee: None,
                created_at: ctx.now(),
            }),
            ActivitySpec::Timer { id } => ctx.stage(Job {
                id: EntityId::generate(),
                job_definition_id: EntityId::new(format!("{}#{}", definition.id, id)),
                process_definition_id: definition.id.clone(),
                process_instance_id: instance.id.clone(),
                activity_id: id.clone(),
                tenant_id: tenant_id.clone(),
                retries: DEFAULT_JOB_RETRIES,
                priority: 0,
                due_date: None,
                exception_message: None,
            }),
            ActivitySpec::ExternalTask { id, topic } => ctx.stage(ExternalTask {
                id: EntityId::generate(),
                topic: topic.clone(),
                activity_id: id.clone(),
                process_instance_id: instance.id.clone(),
                tenant_id: tenant_id.clone(),
                priority: 0,
                retries: None,
                worker_id: None,
                lock_expiration: None,
                error_message: None,
            }),
            ActivitySpec::MessageCatch { id, message } => {
                instance
                    .message_subscriptions
                    .push((id.clone(), message.clone()));
            }
        }
    }

    let ended = instance.active_activity_ids.is_empty();
    ctx.stage(HistoricProcessInstance {
        id: instance.id.clone(),
        definition_id: definition.id.clone(),
        definition_key: definition.key.clone(),
        tenant_id: tenant_id.clone(),
        start_time: ctx.now(),
        end_time: ended.then(|| ctx.now()),
    });
    if !ended {
        ctx.stage(instance.clone());
    }

    debug!(instance_id = %instance.id, tenant_id = ?tenant_id, "process instance started");
    Ok(instance)
}

#[derive(Debug, Clone)]
pub struct StartProcessInstance {
    pub definition_id: EntityId,
    pub business_key: Option<String>,
    pub variables: Map<String, JsonValue>,
}

impl Command for StartProcessInstance {
    type Output = ProcessInstance;
    const NAME: &'static str = "start-process-instance";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<ProcessInstance> {
        let definition: ProcessDefinition =
            load(ctx.repositories().process_definitions.as_ref(), &self.definition_id)?;
        instantiate(ctx, &definition, self.business_key.clone(), self.variables.clone())
    }
}

/// Start the latest version of the definition with `key`.
///
/// The candidate definitions are selected, not named, so they are narrowed by
/// the tenant filter. A key deployed for several visible tenants is ambiguous
/// unless `selection` picks one.
#[derive(Debug, Clone)]
pub struct StartProcessInstanceByKey {
    pub key: String,
    pub selection: TenantSelection,
    pub business_key: Option<String>,
    pub variables: Map<String, JsonValue>,
}

impl Command for StartProcessInstanceByKey {
    type Output = ProcessInstance;
    const NAME: &'static str = "start-process-instance-by-key";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<ProcessInstance> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        let candidates: Vec<ProcessDefinition> = ctx
            .repositories()
            .process_definitions
            .list(&predicate)?
            .into_iter()
            .filter(|d| d.key == self.key)
            .collect();

        let Some(first) = candidates.first() else {
            return Err(EngineError::not_found(EntityKind::ProcessDefinition, self.key.as_str()));
        };
        if candidates.iter().any(|d| d.tenant_id != first.tenant_id) {
            return Err(EngineError::validation(format!(
                "Cannot resolve a unique process definition for key '{}' because it exists for multiple tenants.",
                self.key
            )));
        }

        let latest = candidates
            .iter()
            .max_by_key(|d| d.version)
            .map(|d| d.id.clone())
            .unwrap_or_else(|| first.id.clone());

        ctx.execute(StartProcessInstance {
            definition_id: latest,
            business_key: self.business_key.clone(),
            variables: self.variables.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GetActivityInstance {
    pub process_instance_id: EntityId,
}

impl Command for GetActivityInstance {
    type Output = ActivityInstance;
    const NAME: &'static str = "get-activity-instance";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<ActivityInstance> {
        let instance: ProcessInstance =
            load(ctx.repositories().process_instances.as_ref(), &self.process_instance_id)?;
        ctx.tenant_guard()
            .check(Operation::ReadProcessInstance, &instance)?;

        let children = instance
            .active_activity_ids
            .iter()
            .map(|activity_id| ActivityInstance {
                id: format!("{activity_id}:{}", instance.id),
                activity_id: activity_id.clone(),
                child_activity_instances: Vec::new(),
            })
            .collect();

        Ok(ActivityInstance {
            id: instance.id.to_string(),
            activity_id: instance.definition_key.clone(),
            child_activity_instances: children,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GetActiveActivityIds {
    pub execution_id: EntityId,
}

impl Command for GetActiveActivityIds {
    type Output = Vec<String>;
    const NAME: &'static str = "get-active-activity-ids";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<String>> {
        let instance: ProcessInstance =
            load(ctx.repositories().process_instances.as_ref(), &self.execution_id)?;
        ctx.tenant_guard()
            .check(Operation::ReadProcessInstance, &instance)?;
        Ok(instance.active_activity_ids)
    }
}

#[derive(Debug, Clone)]
pub struct GetVariables {
    pub process_instance_id: EntityId,
}

impl Command for GetVariables {
    type Output = Map<String, JsonValue>;
    const NAME: &'static str = "get-variables";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Map<String, JsonValue>> {
        let instance: ProcessInstance =
            load(ctx.repositories().process_instances.as_ref(), &self.process_instance_id)?;
        ctx.tenant_guard()
            .check(Operation::ReadProcessInstance, &instance)?;
        Ok(instance.variables)
    }
}

#[derive(Debug, Clone)]
pub struct SetVariable {
    pub process_instance_id: EntityId,
    pub name: String,
    pub value: JsonValue,
}

impl Command for SetVariable {
    type Output = ();
    const NAME: &'static str = "set-variable";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let mut instance: ProcessInstance =
            load(ctx.repositories().process_instances.as_ref(), &self.process_instance_id)?;
        ctx.tenant_guard()
            .check(Operation::UpdateProcessInstance, &instance)?;

        instance.variables.insert(self.name.clone(), self.value.clone());
        ctx.stage(instance);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SuspendProcessInstance {
    pub process_instance_id: EntityId,
    pub suspended: bool,
}

impl Command for SuspendProcessInstance {
    type Output = ();
    const NAME: &'static str = "suspend-process-instance";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let mut instance: ProcessInstance =
            load(ctx.repositories().process_instances.as_ref(), &self.process_instance_id)?;
        ctx.tenant_guard()
            .check(Operation::UpdateProcessInstance, &instance)?;

        instance.suspended = self.suspended;
        let operation = if self.suspended { "Suspend" } else { "Activate" };
        log_operation(ctx, operation, &instance);
        ctx.stage(instance);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeleteProcessInstance {
    pub process_instance_id: EntityId,
    pub reason: Option<String>,
}

impl Command for DeleteProcessInstance {
    type Output = ();
    const NAME: &'static str = "delete-process-instance";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let instance: ProcessInstance =
            load(ctx.repositories().process_instances.as_ref(), &self.process_instance_id)?;
        ctx.tenant_guard()
            .check(Operation::DeleteProcessInstance, &instance)?;

        debug!(instance_id = %instance.id, reason = ?self.reason, "deleting process instance");
        log_operation(ctx, "Delete", &instance);
        end_process_instance(ctx, &instance)
    }
}

/// Which instances a message is delivered to.
#[derive(Debug, Clone)]
pub enum CorrelationTarget {
    /// The named instance; denial is a hard failure.
    ProcessInstance(EntityId),
    /// Exactly one waiting instance among those visible.
    Single(TenantSelection),
    /// Every waiting instance among those visible (broadcast).
    All(TenantSelection),
}

#[derive(Debug, Clone)]
pub struct CorrelateMessage {
    pub message_name: String,
    pub target: CorrelationTarget,
    pub variables: Map<String, JsonValue>,
}

impl CorrelateMessage {
    fn deliver(&self, ctx: &CommandContext<'_>, mut instance: ProcessInstance) -> EngineResult<EntityId> {
        let activity_id = instance
            .awaits_message(&self.message_name)
            .map(str::to_string)
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "Cannot correlate message '{}': process instance '{}' does not wait for it",
                    self.message_name, instance.id
                ))
            })?;
        let id = instance.id.clone();
        merge_variables(&mut instance, &self.variables);
        leave_activity(ctx, instance, &activity_id)?;
        Ok(id)
    }

    fn waiting(&self, ctx: &CommandContext<'_>, selection: &TenantSelection) -> EngineResult<Vec<ProcessInstance>> {
        let predicate = ctx.tenant_filter().predicate(selection);
        Ok(ctx
            .repositories()
            .process_instances
            .list(&predicate)?
            .into_iter()
            .filter(|i| !i.suspended && i.awaits_message(&self.message_name).is_some())
            .collect())
    }
}

impl Command for CorrelateMessage {
    type Output = Vec<EntityId>;
    const NAME: &'static str = "correlate-message";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<EntityId>> {
        match &self.target {
            CorrelationTarget::ProcessInstance(id) => {
                let instance: ProcessInstance = load(ctx.repositories().process_instances.as_ref(), id)?;
                ctx.tenant_guard()
                    .check(Operation::CorrelateMessage, &instance)?;
                Ok(vec![self.deliver(ctx, instance)?])
            }
            CorrelationTarget::Single(selection) => {
                let mut waiting = self.waiting(ctx, selection)?;
                match waiting.len() {
                    0 => Err(EngineError::validation(format!(
                        "Cannot correlate message '{}': no process instance waits for it",
                        self.message_name
                    ))),
                    1 => {
                        let instance = waiting.remove(0);
                        Ok(vec![self.deliver(ctx, instance)?])
                    }
                    n => Err(EngineError::conflict(format!(
                        "Cannot correlate message '{}': {n} process instances wait for it",
                        self.message_name
                    ))),
                }
            }
            CorrelationTarget::All(selection) => self
                .waiting(ctx, selection)?
                .into_iter()
                .map(|instance| self.deliver(ctx, instance))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigrateProcessInstance {
    pub process_instance_id: EntityId,
    pub target_definition_id: EntityId,
}

impl Command for MigrateProcessInstance {
    type Output = ();
    const NAME: &'static str = "migrate-process-instance";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let repos = ctx.repositories();
        let mut instance: ProcessInstance =
            load(repos.process_instances.as_ref(), &self.process_instance_id)?;
        let source: ProcessDefinition = load(repos.process_definitions.as_ref(), &instance.definition_id)?;
        let target: ProcessDefinition = load(repos.process_definitions.as_ref(), &self.target_definition_id)?;

        let guard = ctx.tenant_guard();
        guard.check(Operation::ReadProcessDefinition, &source)?;
        guard.check(Operation::ReadProcessDefinition, &target)?;
        ensure_same_tenant(source.tenant_id.as_ref(), target.tenant_id.as_ref())?;
        ensure_instance_fits_target(&instance, &target)?;
        guard.check(Operation::MigrateProcessInstance, &instance)?;

        for activity_id in &instance.active_activity_ids {
            if !target.model.activities.iter().any(|a| a.id() == activity_id) {
                return Err(EngineError::validation(format!(
                    "activity '{activity_id}' has no counterpart in process definition '{}'",
                    target.id
                )));
            }
        }

        instance.definition_id = target.id.clone();
        instance.definition_key = target.key.clone();
        if let Some(mut historic) = repos.historic_process_instances.get(&instance.id)? {
            historic.definition_id = target.id.clone();
            historic.definition_key = target.key.clone();
            ctx.stage(historic);
        }
        log_operation(ctx, "Migrate", &instance);
        ctx.stage(instance);
        Ok(())
    }
}

/// Instances never move between two different tenants, checked or not.
fn ensure_same_tenant(source: Option<&TenantId>, target: Option<&TenantId>) -> EngineResult<()> {
    match (source, target) {
        (Some(s), Some(t)) if s != t => Err(EngineError::conflict(format!(
            "cannot migrate process instances between tenants '{s}' and '{t}'"
        ))),
        _ => Ok(()),
    }
}

/// An instance may only move to a tenant's definition if it already belongs
/// to that tenant. Shared targets accept any instance.
fn ensure_instance_fits_target(instance: &ProcessInstance, target: &ProcessDefinition) -> EngineResult<()> {
    let Some(target_tenant) = &target.tenant_id else {
        return Ok(());
    };
    match &instance.tenant_id {
        Some(tenant) if tenant == target_tenant => Ok(()),
        tenant => Err(EngineError::conflict(format!(
            "cannot migrate process instance '{}' of tenant {:?} to process definition '{}' of tenant '{target_tenant}'",
            instance.id,
            tenant.as_ref().map(TenantId::as_str),
            target.id
        ))),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessInstanceQuery {
    pub selection: TenantSelection,
    pub definition_key: Option<String>,
    pub business_key: Option<String>,
    pub suspended: Option<bool>,
}

impl Command for ProcessInstanceQuery {
    type Output = Vec<ProcessInstance>;
    const NAME: &'static str = "process-instance-query";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<ProcessInstance>> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        Ok(ctx
            .repositories()
            .process_instances
            .list(&predicate)?
            .into_iter()
            .filter(|i| self.definition_key.as_ref().is_none_or(|k| &i.definition_key == k))
            .filter(|i| self.business_key.is_none() || i.business_key == self.business_key)
            .filter(|i| self.suspended.is_none_or(|s| i.suspended == s))
            .collect())
    }
}
