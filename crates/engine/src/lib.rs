//! `tenantgate-engine` — command execution with tenant isolation.
//!
//! Every engine operation is a [`Command`] executed by the [`CommandExecutor`]
//! inside its own [`CommandContext`] (unit of work). Commands consult the
//! context's tenant manager through either the single-entity guard (hard
//! failure) or the collection filter (silent narrowing).

pub mod command;
pub mod commands;
pub mod config;
pub mod context;
pub mod executor;
pub mod model;
pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use command::Command;
pub use config::{ConfigError, EngineConfig};
pub use context::CommandContext;
pub use executor::CommandExecutor;
pub use services::ProcessEngine;
pub use store::{EntityStore, InMemoryEntityStore, PendingWrite, Repositories};
