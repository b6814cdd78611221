//! Process engine and its service facades.
//!
//! Each facade method wraps one command and runs it as a top-level unit of
//! work under the authentication installed in the engine's identity service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};

use tenantgate_auth::IdentityService;
use tenantgate_core::{EngineResult, EntityId, TenantId};
use tenantgate_tenancy::{TenantIdProvider, TenantSelection};

use crate::command::Command;
use crate::commands::external_task::{
    CompleteExternalTask, ExternalTaskQuery, FetchAndLock, HandleExternalTaskFailure,
    SetExternalTaskRetries, UnlockExternalTask,
};
use crate::commands::history::{
    CleanableProcessInstanceReport, CleanableProcessInstanceReportResult,
    DeleteHistoricProcessInstance, DeleteOperationLogEntry, DurationReport, DurationReportResult,
    HistoricProcessInstanceQuery, OperationLogQuery, SetAnnotationForOperationLogEntry,
};
use crate::commands::management::{
    GetJob, JobQuery, SetJobDueDate, SetJobPriority, SetJobRetries, SetJobRetriesByJobDefinition,
};
use crate::commands::repository::{
    Deploy, DeleteDeployment, DeleteProcessDefinition, DeploymentWithDefinitions, GetDeployment,
    GetProcessDefinition, ProcessDefinitionQuery, SuspendProcessDefinition,
};
use crate::commands::runtime::{
    CorrelateMessage, CorrelationTarget, DeleteProcessInstance, GetActiveActivityIds,
    GetActivityInstance, GetVariables, MigrateProcessInstance, ProcessInstanceQuery,
    SetVariable, StartProcessInstance, StartProcessInstanceByKey, SuspendProcessInstance,
};
use crate::commands::task::{
    ClaimTask, CompleteTask, CreateTask, DeleteTask, GetTask, SetAssignee, TaskQuery,
};
use crate::config::EngineConfig;
use crate::executor::CommandExecutor;
use crate::model::{
    ActivityInstance, Deployment, ExternalTask, HistoricProcessInstance, Job, LockedExternalTask,
    OperationLogEntry, ProcessDefinition, ProcessInstance, ProcessModel, Task,
};
use crate::store::Repositories;

/// In-process engine: repositories, identity, and the command executor.
#[derive(Debug)]
pub struct ProcessEngine {
    executor: CommandExecutor,
    identity: IdentityService,
}

impl ProcessEngine {
    /// Engine over in-memory repositories.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_repositories(config, Repositories::in_memory())
    }

    pub fn with_repositories(config: &EngineConfig, repositories: Repositories) -> Self {
        let identity = IdentityService::new();
        Self {
            executor: CommandExecutor::from_config(config, repositories, identity.clone()),
            identity,
        }
    }

    pub fn with_tenant_id_provider(mut self, provider: Arc<dyn TenantIdProvider>) -> Self {
        self.executor = self.executor.with_tenant_id_provider(provider);
        self
    }

    pub fn identity_service(&self) -> &IdentityService {
        &self.identity
    }

    pub fn repositories(&self) -> &Repositories {
        self.executor.repositories()
    }

    /// Flip the engine-wide tenant check. Affects commands started afterwards.
    pub fn set_tenant_check_enabled(&self, enabled: bool) {
        self.executor.enforcement_switch().set_enabled(enabled);
    }

    pub fn is_tenant_check_enabled(&self) -> bool {
        self.executor.enforcement_switch().is_enabled()
    }

    /// Run any command as a top-level unit of work.
    pub fn execute<C: Command>(&self, command: C) -> EngineResult<C::Output> {
        self.executor.execute(command)
    }

    pub fn runtime_service(&self) -> RuntimeService<'_> {
        RuntimeService { engine: self }
    }

    pub fn task_service(&self) -> TaskService<'_> {
        TaskService { engine: self }
    }

    pub fn management_service(&self) -> ManagementService<'_> {
        ManagementService { engine: self }
    }

    pub fn external_task_service(&self) -> ExternalTaskService<'_> {
        ExternalTaskService { engine: self }
    }

    pub fn history_service(&self) -> HistoryService<'_> {
        HistoryService { engine: self }
    }

    pub fn repository_service(&self) -> RepositoryService<'_> {
        RepositoryService { engine: self }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RuntimeService<'e> {
    engine: &'e ProcessEngine,
}

impl RuntimeService<'_> {
    pub fn start_process_instance_by_id(
        &self,
        definition_id: &EntityId,
        business_key: Option<&str>,
        variables: Map<String, JsonValue>,
    ) -> EngineResult<ProcessInstance> {
        self.engine.execute(StartProcessInstance {
            definition_id: definition_id.clone(),
            business_key: business_key.map(str::to_string),
            variables,
        })
    }

    pub fn start_process_instance_by_key(
        &self,
        key: &str,
        selection: TenantSelection,
        variables: Map<String, JsonValue>,
    ) -> EngineResult<ProcessInstance> {
        self.engine.execute(StartProcessInstanceByKey {
            key: key.to_string(),
            selection,
            business_key: None,
            variables,
        })
    }

    pub fn get_activity_instance(&self, process_instance_id: &EntityId) -> EngineResult<ActivityInstance> {
        self.engine.execute(GetActivityInstance {
            process_instance_id: process_instance_id.clone(),
        })
    }

    pub fn get_active_activity_ids(&self, execution_id: &EntityId) -> EngineResult<Vec<String>> {
        self.engine.execute(GetActiveActivityIds {
            execution_id: execution_id.clone(),
        })
    }

    pub fn get_variables(&self, process_instance_id: &EntityId) -> EngineResult<Map<String, JsonValue>> {
        self.engine.execute(GetVariables {
            process_instance_id: process_instance_id.clone(),
        })
    }

    pub fn set_variable(&self, process_instance_id: &EntityId, name: &str, value: JsonValue) -> EngineResult<()> {
        self.engine.execute(SetVariable {
            process_instance_id: process_instance_id.clone(),
            name: name.to_string(),
            value,
        })
    }

    pub fn suspend_process_instance(&self, process_instance_id: &EntityId) -> EngineResult<()> {
        self.engine.execute(SuspendProcessInstance {
            process_instance_id: process_instance_id.clone(),
            suspended: true,
        })
    }

    pub fn activate_process_instance(&self, process_instance_id: &EntityId) -> EngineResult<()> {
        self.engine.execute(SuspendProcessInstance {
            process_instance_id: process_instance_id.clone(),
            suspended: false,
        })
    }

    pub fn delete_process_instance(&self, process_instance_id: &EntityId, reason: Option<&str>) -> EngineResult<()> {
        self.engine.execute(DeleteProcessInstance {
            process_instance_id: process_instance_id.clone(),
            reason: reason.map(str::to_string),
        })
    }

    pub fn correlate_message(
        &self,
        message_name: &str,
        target: CorrelationTarget,
        variables: Map<String, JsonValue>,
    ) -> EngineResult<Vec<EntityId>> {
        self.engine.execute(CorrelateMessage {
            message_name: message_name.to_string(),
            target,
            variables,
        })
    }

    pub fn migrate(&self, process_instance_id: &EntityId, target_definition_id: &EntityId) -> EngineResult<()> {
        self.engine.execute(MigrateProcessInstance {
            process_instance_id: process_instance_id.clone(),
            target_definition_id: target_definition_id.clone(),
        })
    }

    pub fn process_instance_query(&self, query: ProcessInstanceQuery) -> EngineResult<Vec<ProcessInstance>> {
        self.engine.execute(query)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct TaskService<'e> {
    engine: &'e ProcessEngine,
}

impl TaskService<'_> {
    pub fn create_task(&self, id: &EntityId, name: &str, tenant_id: Option<TenantId>) -> EngineResult<Task> {
        self.engine.execute(CreateTask {
            id: id.clone(),
            name: name.to_string(),
            tenant_id,
        })
    }

    pub fn get_task(&self, task_id: &EntityId) -> EngineResult<Task> {
        self.engine.execute(GetTask {
            task_id: task_id.clone(),
        })
    }

    pub fn set_assignee(&self, task_id: &EntityId, assignee: Option<&str>) -> EngineResult<()> {
        self.engine.execute(SetAssignee {
            task_id: task_id.clone(),
            assignee: assignee.map(str::to_string),
        })
    }

    pub fn claim(&self, task_id: &EntityId, user_id: &str) -> EngineResult<()> {
        self.engine.execute(ClaimTask {
            task_id: task_id.clone(),
            user_id: user_id.to_string(),
        })
    }

    pub fn complete(&self, task_id: &EntityId, variables: Map<String, JsonValue>) -> EngineResult<()> {
        self.engine.execute(CompleteTask {
            task_id: task_id.clone(),
            variables,
        })
    }

    pub fn delete_task(&self, task_id: &EntityId) -> EngineResult<()> {
        self.engine.execute(DeleteTask {
            task_id: task_id.clone(),
        })
    }

    pub fn task_query(&self, query: TaskQuery) -> EngineResult<Vec<Task>> {
        self.engine.execute(query)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Jobs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ManagementService<'e> {
    engine: &'e ProcessEngine,
}

impl ManagementService<'_> {
    pub fn get_job(&self, job_id: &EntityId) -> EngineResult<Job> {
        self.engine.execute(GetJob { job_id: job_id.clone() })
    }

    pub fn set_job_retries(&self, job_id: &EntityId, retries: u32) -> EngineResult<()> {
        self.engine.execute(SetJobRetries {
            job_id: job_id.clone(),
            retries,
        })
    }

    pub fn set_job_priority(&self, job_id: &EntityId, priority: i64) -> EngineResult<()> {
        self.engine.execute(SetJobPriority {
            job_id: job_id.clone(),
            priority,
        })
    }

    pub fn set_job_due_date(&self, job_id: &EntityId, due_date: Option<DateTime<Utc>>) -> EngineResult<()> {
        self.engine.execute(SetJobDueDate {
            job_id: job_id.clone(),
            due_date,
        })
    }

    /// Returns the number of failed jobs reset.
    pub fn set_job_retries_by_job_definition(&self, job_definition_id: &EntityId, retries: u32) -> EngineResult<usize> {
        self.engine.execute(SetJobRetriesByJobDefinition {
            job_definition_id: job_definition_id.clone(),
            retries,
        })
    }

    pub fn job_query(&self, query: JobQuery) -> EngineResult<Vec<Job>> {
        self.engine.execute(query)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// External tasks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ExternalTaskService<'e> {
    engine: &'e ProcessEngine,
}

impl ExternalTaskService<'_> {
    pub fn fetch_and_lock(
        &self,
        max_tasks: usize,
        worker_id: &str,
        topic: &str,
        lock_duration_ms: i64,
        selection: TenantSelection,
    ) -> EngineResult<Vec<LockedExternalTask>> {
        self.engine.execute(FetchAndLock {
            worker_id: worker_id.to_string(),
            max_tasks,
            topic: topic.to_string(),
            lock_duration_ms,
            selection,
        })
    }

    pub fn complete(
        &self,
        external_task_id: &EntityId,
        worker_id: &str,
        variables: Map<String, JsonValue>,
    ) -> EngineResult<()> {
        self.engine.execute(CompleteExternalTask {
            external_task_id: external_task_id.clone(),
            worker_id: worker_id.to_string(),
            variables,
        })
    }

    pub fn handle_failure(
        &self,
        external_task_id: &EntityId,
        worker_id: &str,
        error_message: &str,
        retries: u32,
        retry_timeout_ms: i64,
    ) -> EngineResult<()> {
        self.engine.execute(HandleExternalTaskFailure {
            external_task_id: external_task_id.clone(),
            worker_id: worker_id.to_string(),
            error_message: error_message.to_string(),
            retries,
            retry_timeout_ms,
        })
    }

    pub fn unlock(&self, external_task_id: &EntityId) -> EngineResult<()> {
        self.engine.execute(UnlockExternalTask {
            external_task_id: external_task_id.clone(),
        })
    }

    pub fn set_retries(&self, external_task_id: &EntityId, retries: u32) -> EngineResult<()> {
        self.engine.execute(SetExternalTaskRetries {
            external_task_id: external_task_id.clone(),
            retries,
        })
    }

    pub fn external_task_query(&self, query: ExternalTaskQuery) -> EngineResult<Vec<ExternalTask>> {
        self.engine.execute(query)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct HistoryService<'e> {
    engine: &'e ProcessEngine,
}

impl HistoryService<'_> {
    pub fn historic_process_instance_query(
        &self,
        query: HistoricProcessInstanceQuery,
    ) -> EngineResult<Vec<HistoricProcessInstance>> {
        self.engine.execute(query)
    }

    pub fn cleanable_process_instance_report(
        &self,
        selection: TenantSelection,
        compact: bool,
    ) -> EngineResult<Vec<CleanableProcessInstanceReportResult>> {
        self.engine
            .execute(CleanableProcessInstanceReport { selection, compact })
    }

    pub fn duration_report(&self, selection: TenantSelection) -> EngineResult<Vec<DurationReportResult>> {
        self.engine.execute(DurationReport { selection })
    }

    pub fn delete_historic_process_instance(&self, process_instance_id: &EntityId) -> EngineResult<()> {
        self.engine.execute(DeleteHistoricProcessInstance {
            process_instance_id: process_instance_id.clone(),
        })
    }

    pub fn operation_log_query(&self, query: OperationLogQuery) -> EngineResult<Vec<OperationLogEntry>> {
        self.engine.execute(query)
    }

    pub fn set_annotation_for_operation_log_entry(
        &self,
        entry_id: &EntityId,
        annotation: Option<&str>,
    ) -> EngineResult<()> {
        self.engine.execute(SetAnnotationForOperationLogEntry {
            entry_id: entry_id.clone(),
            annotation: annotation.map(str::to_string),
        })
    }

    pub fn delete_operation_log_entry(&self, entry_id: &EntityId) -> EngineResult<()> {
        self.engine.execute(DeleteOperationLogEntry {
            entry_id: entry_id.clone(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RepositoryService<'e> {
    engine: &'e ProcessEngine,
}

impl RepositoryService<'_> {
    pub fn deploy(
        &self,
        name: &str,
        tenant_id: Option<TenantId>,
        models: Vec<ProcessModel>,
    ) -> EngineResult<DeploymentWithDefinitions> {
        self.engine.execute(Deploy {
            name: name.to_string(),
            tenant_id,
            models,
        })
    }

    pub fn get_deployment(&self, deployment_id: &EntityId) -> EngineResult<Deployment> {
        self.engine.execute(GetDeployment {
            deployment_id: deployment_id.clone(),
        })
    }

    pub fn get_process_definition(&self, definition_id: &EntityId) -> EngineResult<ProcessDefinition> {
        self.engine.execute(GetProcessDefinition {
            definition_id: definition_id.clone(),
        })
    }

    pub fn suspend_process_definition(&self, definition_id: &EntityId, suspended: bool) -> EngineResult<()> {
        self.engine.execute(SuspendProcessDefinition {
            definition_id: definition_id.clone(),
            suspended,
        })
    }

    pub fn delete_process_definition(&self, definition_id: &EntityId) -> EngineResult<()> {
        self.engine.execute(DeleteProcessDefinition {
            definition_id: definition_id.clone(),
        })
    }

    pub fn delete_deployment(&self, deployment_id: &EntityId, cascade: bool) -> EngineResult<()> {
        self.engine.execute(DeleteDeployment {
            deployment_id: deployment_id.clone(),
            cascade,
        })
    }

    pub fn process_definition_query(&self, query: ProcessDefinitionQuery) -> EngineResult<Vec<ProcessDefinition>> {
        self.engine.execute(query)
    }
}
