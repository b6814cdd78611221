//! Entity Access Guard for operations that name exactly one entity.

use tenantgate_core::{EntityId, TenantAuthorizationError, TenantId, TenantOwned};
use tracing::warn;

use crate::manager::TenantManager;
use crate::operation::{ErrorReporter, Operation};

/// Capability to validate ownership of one named entity.
///
/// Denial is a hard failure: the caller explicitly named an id it is not
/// entitled to touch.
pub trait SingleEntityGuard {
    /// Whether checks are currently enforced.
    ///
    /// Callers may skip loading an entity purely for a check when this is false.
    fn is_checking(&self) -> bool;

    /// Check an entity owned by `tenant_id` (or a creation target tenant).
    fn check_tenant(
        &self,
        operation: Operation,
        entity_id: &EntityId,
        tenant_id: Option<&TenantId>,
    ) -> Result<(), TenantAuthorizationError>;

    fn check<E>(&self, operation: Operation, entity: &E) -> Result<(), TenantAuthorizationError>
    where
        E: TenantOwned,
        Self: Sized,
    {
        debug_assert_eq!(operation.entity_kind(), E::KIND, "{operation:?} checked against wrong kind");
        self.check_tenant(operation, entity.entity_id(), entity.tenant_id())
    }
}

/// [`SingleEntityGuard`] backed by the command's [`TenantManager`].
#[derive(Debug, Clone, Copy)]
pub struct TenantCommandChecker<'a> {
    manager: TenantManager<'a>,
}

impl<'a> TenantCommandChecker<'a> {
    pub fn new(manager: TenantManager<'a>) -> Self {
        Self { manager }
    }
}

impl SingleEntityGuard for TenantCommandChecker<'_> {
    fn is_checking(&self) -> bool {
        self.manager.is_check_enabled()
    }

    fn check_tenant(
        &self,
        operation: Operation,
        entity_id: &EntityId,
        tenant_id: Option<&TenantId>,
    ) -> Result<(), TenantAuthorizationError> {
        if self.manager.is_authorized_tenant(tenant_id) {
            return Ok(());
        }
        warn!(
            ?operation,
            entity_id = %entity_id,
            tenant_id = tenant_id.map(TenantId::as_str),
            user_id = self.manager.authentication().map(|a| a.user_id()),
            "tenant check denied"
        );
        Err(ErrorReporter::unauthorized(operation, entity_id))
    }
}
