//! `tenantgate-core` — shared vocabulary of the tenant-isolation layer.
//!
//! This crate contains **pure** primitives (no IO, no global state): identifiers,
//! the tenant-ownership contract of persisted entities, and the error model.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{EntityKind, TenantOwned};
pub use error::{EngineError, EngineResult, TenantAuthorizationError, Verb};
pub use id::{EntityId, TenantId};
