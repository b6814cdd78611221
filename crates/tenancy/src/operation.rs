//! Static table of single-entity operations and the failures they raise.

use serde::{Deserialize, Serialize};

use tenantgate_core::{EntityId, EntityKind, TenantAuthorizationError, Verb};

/// A single-entity operation subject to the tenant check.
///
/// Each operation maps to exactly one `(verb, entity kind)` pair, so the same
/// operation reports the same message from every call site.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ReadProcessDefinition,
    UpdateProcessDefinition,
    DeleteProcessDefinition,
    CreateProcessInstance,

    ReadProcessInstance,
    UpdateProcessInstance,
    DeleteProcessInstance,
    MigrateProcessInstance,
    CorrelateMessage,

    CreateTask,
    ReadTask,
    UpdateTask,
    DeleteTask,
    AssignTask,
    WorkOnTask,

    ReadJob,
    UpdateJob,

    CreateDeployment,
    ReadDeployment,
    DeleteDeployment,

    ReadHistoricProcessInstance,
    DeleteHistoricProcessInstance,

    UpdateOperationLogEntry,
    DeleteOperationLogEntry,
}

impl Operation {
    pub const ALL: &'static [Operation] = &[
        Operation::ReadProcessDefinition,
        Operation::UpdateProcessDefinition,
        Operation::DeleteProcessDefinition,
        Operation::CreateProcessInstance,
        Operation::ReadProcessInstance,
        Operation::UpdateProcessInstance,
        Operation::DeleteProcessInstance,
        Operation::MigrateProcessInstance,
        Operation::CorrelateMessage,
        Operation::CreateTask,
        Operation::ReadTask,
        Operation::UpdateTask,
        Operation::DeleteTask,
        Operation::AssignTask,
        Operation::WorkOnTask,
        Operation::ReadJob,
        Operation::UpdateJob,
        Operation::CreateDeployment,
        Operation::ReadDeployment,
        Operation::DeleteDeployment,
        Operation::ReadHistoricProcessInstance,
        Operation::DeleteHistoricProcessInstance,
        Operation::UpdateOperationLogEntry,
        Operation::DeleteOperationLogEntry,
    ];

    pub const fn verb(self) -> Verb {
        use Operation::*;
        match self {
            ReadProcessDefinition | ReadProcessInstance | ReadTask | ReadJob | ReadDeployment
            | ReadHistoricProcessInstance => Verb::Read,
            UpdateProcessDefinition | UpdateProcessInstance | UpdateTask | UpdateJob
            | UpdateOperationLogEntry => Verb::Update,
            DeleteProcessDefinition | DeleteProcessInstance | DeleteTask | DeleteDeployment
            | DeleteHistoricProcessInstance | DeleteOperationLogEntry => Verb::Delete,
            CreateProcessInstance | CreateTask | CreateDeployment => Verb::Create,
            AssignTask => Verb::Assign,
            WorkOnTask => Verb::WorkOn,
            MigrateProcessInstance => Verb::Migrate,
            CorrelateMessage => Verb::Correlate,
        }
    }

    /// Kind of the entity whose tenant is checked.
    ///
    /// Creating an instance checks the definition it is created from.
    pub const fn entity_kind(self) -> EntityKind {
        use Operation::*;
        match self {
            ReadProcessDefinition | UpdateProcessDefinition | DeleteProcessDefinition
            | CreateProcessInstance => EntityKind::ProcessDefinition,
            ReadProcessInstance | UpdateProcessInstance | DeleteProcessInstance
            | MigrateProcessInstance | CorrelateMessage => EntityKind::ProcessInstance,
            CreateTask | ReadTask | UpdateTask | DeleteTask | AssignTask | WorkOnTask => {
                EntityKind::Task
            }
            ReadJob | UpdateJob => EntityKind::Job,
            CreateDeployment | ReadDeployment | DeleteDeployment => EntityKind::Deployment,
            ReadHistoricProcessInstance | DeleteHistoricProcessInstance => {
                EntityKind::HistoricProcessInstance
            }
            UpdateOperationLogEntry | DeleteOperationLogEntry => EntityKind::OperationLogEntry,
        }
    }
}

/// Maps a denied operation to its user-facing failure.
#[derive(Debug, Copy, Clone, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn unauthorized(operation: Operation, entity_id: &EntityId) -> TenantAuthorizationError {
        TenantAuthorizationError {
            verb: operation.verb(),
            kind: operation.entity_kind(),
            entity_id: entity_id.clone(),
        }
    }
}
