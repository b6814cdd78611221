//! Tenant-ownership contract of persisted entities.

use serde::{Deserialize, Serialize};

use crate::id::{EntityId, TenantId};

/// Kind of a tenant-ownable entity, as named in user-facing messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ProcessDefinition,
    ProcessInstance,
    Task,
    Job,
    ExternalTask,
    Deployment,
    HistoricProcessInstance,
    OperationLogEntry,
}

impl EntityKind {
    /// Human-readable name used in error messages.
    pub const fn display_name(self) -> &'static str {
        match self {
            EntityKind::ProcessDefinition => "process definition",
            EntityKind::ProcessInstance => "process instance",
            EntityKind::Task => "task",
            EntityKind::Job => "job",
            EntityKind::ExternalTask => "external task",
            EntityKind::Deployment => "deployment",
            EntityKind::HistoricProcessInstance => "historic process instance",
            EntityKind::OperationLogEntry => "user operation log entry",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An entity that may belong to a tenant.
///
/// `tenant_id() == None` means the entity is *shared*: visible and mutable
/// regardless of enforcement state. The owning tenant is fixed at creation.
pub trait TenantOwned {
    const KIND: EntityKind;

    fn entity_id(&self) -> &EntityId;

    fn tenant_id(&self) -> Option<&TenantId>;
}
