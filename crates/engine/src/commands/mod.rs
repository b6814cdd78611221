//! Engine commands, grouped by service.
//!
//! Commands that name one entity by id resolve it and pass it through the
//! context's tenant guard before touching it. Commands that select *some*
//! entities build a tenant predicate from the context's tenant filter and never
//! fail for authorization reasons.

pub mod external_task;
pub mod history;
pub mod management;
pub mod repository;
pub mod runtime;
pub mod task;

use serde_json::{Map, Value as JsonValue};

use tenantgate_core::{
    EngineError, EngineResult, EntityId, EntityKind, TenantOwned,
};
use tenantgate_tenancy::TenantPredicate;

use crate::context::CommandContext;
use crate::model::{OperationLogEntry, ProcessInstance};
use crate::store::EntityStore;

/// Load `id` or fail with `NotFound`.
pub(crate) fn load<E, S>(store: &S, id: &EntityId) -> EngineResult<E>
where
    E: TenantOwned,
    S: EntityStore<E> + ?Sized,
{
    store
        .get(id)?
        .ok_or_else(|| EngineError::not_found(E::KIND, id.clone()))
}

/// Record a user operation against `entity`, owned by the same tenant.
pub(crate) fn log_operation<E: TenantOwned>(ctx: &CommandContext<'_>, operation_type: &str, entity: &E) {
    ctx.stage(OperationLogEntry {
        id: EntityId::generate(),
        operation_type: operation_type.to_string(),
        entity_kind: E::KIND,
        entity_id: entity.entity_id().clone(),
        user_id: ctx.user_id().map(str::to_string),
        tenant_id: entity.tenant_id().cloned(),
        annotation: None,
        timestamp: ctx.now(),
    });
}

pub(crate) fn merge_variables(instance: &mut ProcessInstance, variables: &Map<String, JsonValue>) {
    for (name, value) in variables {
        instance.variables.insert(name.clone(), value.clone());
    }
}

/// Move `instance` past `activity_id`; ends the instance when nothing is left.
pub(crate) fn leave_activity(
    ctx: &CommandContext<'_>,
    mut instance: ProcessInstance,
    activity_id: &str,
) -> EngineResult<()> {
    instance.active_activity_ids.retain(|a| a != activity_id);
    instance.message_subscriptions.retain(|(a, _)| a != activity_id);

    if instance.active_activity_ids.is_empty() {
        end_process_instance(ctx, &instance)
    } else {
        ctx.stage(instance);
        Ok(())
    }
}

/// Remove the runtime state of `instance` and close its history.
pub(crate) fn end_process_instance(ctx: &CommandContext<'_>, instance: &ProcessInstance) -> EngineResult<()> {
    let repos = ctx.repositories();
    let all = TenantPredicate::unrestricted();

    for task in repos.tasks.list(&all)? {
        if task.process_instance_id.as_ref() == Some(&instance.id) {
            ctx.stage_remove(EntityKind::Task, task.id);
        }
    }
    for job in repos.jobs.list(&all)? {
        if job.process_instance_id == instance.id {
            ctx.stage_remove(EntityKind::Job, job.id);
        }
    }
    for external in repos.external_tasks.list(&all)? {
        if external.process_instance_id == instance.id {
            ctx.stage_remove(EntityKind::ExternalTask, external.id);
        }
    }
    ctx.stage_remove(EntityKind::ProcessInstance, instance.id.clone());

    if let Some(mut historic) = repos.historic_process_instances.get(&instance.id)? {
        historic.end_time = Some(ctx.now());
        ctx.stage(historic);
    }
    Ok(())
}
