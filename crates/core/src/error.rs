//! Engine error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityKind;
use crate::id::EntityId;

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Verb describing what a denied operation attempted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Read,
    Update,
    Delete,
    Create,
    Assign,
    WorkOn,
    Migrate,
    Correlate,
}

impl Verb {
    pub const fn as_str(self) -> &'static str {
        match self {
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::Create => "create",
            Verb::Assign => "assign",
            Verb::WorkOn => "work on",
            Verb::Migrate => "migrate",
            Verb::Correlate => "correlate",
        }
    }
}

impl core::fmt::Display for Verb {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-entity operation named an entity owned by a tenant the caller is
/// not authenticated for.
///
/// Raised synchronously, before anything is committed. Retrying with the same
/// authentication fails identically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Cannot {verb} the {kind} '{entity_id}' because it belongs to no authenticated tenant.")]
pub struct TenantAuthorizationError {
    pub verb: Verb,
    pub kind: EntityKind,
    pub entity_id: EntityId,
}

/// Engine-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Tenant isolation denied access to a named entity.
    #[error(transparent)]
    TenantAuthorization(#[from] TenantAuthorizationError),

    /// The named entity does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: EntityId },

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request conflicts with the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed (e.g. poisoned lock).
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn not_found(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether this is a tenant-isolation denial.
    pub fn is_tenant_denial(&self) -> bool {
        matches!(self, EngineError::TenantAuthorization(_))
    }
}
