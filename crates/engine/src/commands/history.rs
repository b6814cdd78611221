//! History commands and reports.
//!
//! Reports aggregate over *selected* rows and are filtered like any list query:
//! a caller sees the figures of the tenants it may see, and nothing fails.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use tenantgate_core::{EngineError, EngineResult, EntityId, EntityKind, TenantId};
use tenantgate_tenancy::{CollectionFilter, Operation, SingleEntityGuard, TenantSelection};

use crate::command::Command;
use crate::commands::load;
use crate::context::CommandContext;
use crate::model::{HistoricProcessInstance, OperationLogEntry, ProcessDefinition, ProcessInstance};
use crate::store::EntityStore;

#[derive(Debug, Clone, Default)]
pub struct HistoricProcessInstanceQuery {
    pub selection: TenantSelection,
    pub definition_key: Option<String>,
    pub finished: Option<bool>,
}

impl Command for HistoricProcessInstanceQuery {
    type Output = Vec<HistoricProcessInstance>;
    const NAME: &'static str = "historic-process-instance-query";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<HistoricProcessInstance>> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        Ok(ctx
            .repositories()
            .historic_process_instances
            .list(&predicate)?
            .into_iter()
            .filter(|h| self.definition_key.as_ref().is_none_or(|k| &h.definition_key == k))
            .filter(|h| self.finished.is_none_or(|f| h.end_time.is_some() == f))
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct DeleteHistoricProcessInstance {
    pub process_instance_id: EntityId,
}

impl Command for DeleteHistoricProcessInstance {
    type Output = ();
    const NAME: &'static str = "delete-historic-process-instance";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let repos = ctx.repositories();
        let historic: HistoricProcessInstance =
            load(repos.historic_process_instances.as_ref(), &self.process_instance_id)?;
        ctx.tenant_guard()
            .check(Operation::DeleteHistoricProcessInstance, &historic)?;

        let running: Option<ProcessInstance> = repos.process_instances.get(&historic.id)?;
        if historic.end_time.is_none() || running.is_some() {
            return Err(EngineError::validation(format!(
                "process instance '{}' is still running",
                historic.id
            )));
        }
        ctx.stage_remove(EntityKind::HistoricProcessInstance, historic.id);
        Ok(())
    }
}

/// One row of the cleanup-candidate report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanableProcessInstanceReportResult {
    pub process_definition_id: EntityId,
    pub process_definition_key: String,
    pub tenant_id: Option<TenantId>,
    pub history_time_to_live_days: Option<u32>,
    pub finished_count: usize,
    /// Finished instances whose time to live has elapsed.
    pub cleanable_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CleanableProcessInstanceReport {
    pub selection: TenantSelection,
    /// Omit definitions without finished instances.
    pub compact: bool,
}

impl Command for CleanableProcessInstanceReport {
    type Output = Vec<CleanableProcessInstanceReportResult>;
    const NAME: &'static str = "cleanable-process-instance-report";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<CleanableProcessInstanceReportResult>> {
        let repos = ctx.repositories();
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        let definitions: Vec<ProcessDefinition> = repos.process_definitions.list(&predicate)?;
        let historic = repos.historic_process_instances.list(&predicate)?;
        let now = ctx.now();

        let mut report = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let ttl = definition.model.history_time_to_live_days;
            let finished: Vec<&HistoricProcessInstance> = historic
                .iter()
                .filter(|h| h.definition_id == definition.id && h.end_time.is_some())
                .collect();
            let cleanable_count = match ttl {
                Some(days) => finished
                    .iter()
                    .filter_map(|h| h.end_time)
                    .filter(|end| *end + Duration::days(i64::from(days)) <= now)
                    .count(),
                None => 0,
            };

            if self.compact && finished.is_empty() {
                continue;
            }
            report.push(CleanableProcessInstanceReportResult {
                process_definition_id: definition.id,
                process_definition_key: definition.key,
                tenant_id: definition.tenant_id,
                history_time_to_live_days: ttl,
                finished_count: finished.len(),
                cleanable_count,
            });
        }
        Ok(report)
    }
}

/// Duration figures of finished instances of one definition, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationReportResult {
    pub process_definition_id: EntityId,
    pub process_definition_key: String,
    pub count: usize,
    pub minimum: i64,
    pub maximum: i64,
    pub average: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DurationReport {
    pub selection: TenantSelection,
}

impl Command for DurationReport {
    type Output = Vec<DurationReportResult>;
    const NAME: &'static str = "duration-report";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<DurationReportResult>> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        let mut groups: BTreeMap<EntityId, (String, Vec<i64>)> = BTreeMap::new();
        for historic in ctx.repositories().historic_process_instances.list(&predicate)? {
            if let Some(duration) = historic.duration_millis() {
                groups
                    .entry(historic.definition_id)
                    .or_insert_with(|| (historic.definition_key, Vec::new()))
                    .1
                    .push(duration);
            }
        }

        Ok(groups
            .into_iter()
            .filter_map(|(definition_id, (key, durations))| {
                let count = durations.len();
                let minimum = *durations.iter().min()?;
                let maximum = *durations.iter().max()?;
                let average = durations.iter().sum::<i64>() / i64::try_from(count).ok()?;
                Some(DurationReportResult {
                    process_definition_id: definition_id,
                    process_definition_key: key,
                    count,
                    minimum,
                    maximum,
                    average,
                })
            })
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperationLogQuery {
    pub selection: TenantSelection,
    pub entity_id: Option<EntityId>,
    pub operation_type: Option<String>,
}

impl Command for OperationLogQuery {
    type Output = Vec<OperationLogEntry>;
    const NAME: &'static str = "operation-log-query";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<OperationLogEntry>> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        Ok(ctx
            .repositories()
            .operation_log
            .list(&predicate)?
            .into_iter()
            .filter(|e| self.entity_id.as_ref().is_none_or(|id| &e.entity_id == id))
            .filter(|e| self.operation_type.as_ref().is_none_or(|t| &e.operation_type == t))
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct SetAnnotationForOperationLogEntry {
    pub entry_id: EntityId,
    pub annotation: Option<String>,
}

impl Command for SetAnnotationForOperationLogEntry {
    type Output = ();
    const NAME: &'static str = "set-annotation-for-operation-log-entry";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let mut entry: OperationLogEntry = load(ctx.repositories().operation_log.as_ref(), &self.entry_id)?;
        ctx.tenant_guard()
            .check(Operation::UpdateOperationLogEntry, &entry)?;
        entry.annotation = self.annotation.clone();
        ctx.stage(entry);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeleteOperationLogEntry {
    pub entry_id: EntityId,
}

impl Command for DeleteOperationLogEntry {
    type Output = ();
    const NAME: &'static str = "delete-operation-log-entry";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let entry: OperationLogEntry = load(ctx.repositories().operation_log.as_ref(), &self.entry_id)?;
        ctx.tenant_guard()
            .check(Operation::DeleteOperationLogEntry, &entry)?;
        ctx.stage_remove(EntityKind::OperationLogEntry, entry.id);
        Ok(())
    }
}
