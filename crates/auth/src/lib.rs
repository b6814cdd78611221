//! `tenantgate-auth` — caller identity consumed by tenant checks.
//!
//! This crate is intentionally decoupled from transport and storage: an
//! external identity subsystem installs an [`Authentication`] before issuing
//! commands and clears it afterwards.

pub mod admin;
pub mod authentication;
pub mod identity;

pub use admin::{AdminPolicy, OPERATON_ADMIN};
pub use authentication::Authentication;
pub use identity::{IdentityError, IdentityService};
