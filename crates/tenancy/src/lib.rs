//! `tenantgate-tenancy` — tenant isolation policy.
//!
//! Two enforcement paths share one predicate ([`TenantManager`]):
//!
//! - **Single-entity** operations go through a [`SingleEntityGuard`] and fail
//!   loudly with a [`TenantAuthorizationError`](tenantgate_core::TenantAuthorizationError).
//! - **Collection** operations go through a [`CollectionFilter`] and silently
//!   narrow their results; they never fail for authorization reasons.
//!
//! No IO, no global state: the engine-wide [`EnforcementSwitch`] and the
//! per-command [`TenantCheckToggle`] are injected handles.

pub mod filter;
pub mod guard;
pub mod manager;
pub mod operation;
pub mod provider;
pub mod switch;

pub use filter::{CollectionFilter, TenantPredicate, TenantQueryFilter, TenantSelection};
pub use guard::{SingleEntityGuard, TenantCommandChecker};
pub use manager::{AuthorizedTenants, TenantManager};
pub use operation::{ErrorReporter, Operation};
pub use provider::{TenantIdProvider, TenantIdProviderContext};
pub use switch::{EnforcementSwitch, TenantCheckToggle};
