//! Installed caller identity.

use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::Authentication;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity lock poisoned")]
    Poisoned,
}

/// Holder of the current caller's [`Authentication`].
///
/// One instance per caller; cloning shares the slot. Nothing expires on its
/// own: the caller installs an authentication and tears it down explicitly.
#[derive(Debug, Clone, Default)]
pub struct IdentityService {
    current: Arc<RwLock<Option<Arc<Authentication>>>>,
}

impl IdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `authentication`, replacing any previous one.
    pub fn set_authentication(&self, authentication: Authentication) -> Result<(), IdentityError> {
        debug!(
            user_id = authentication.user_id(),
            tenants = authentication.tenant_ids().len(),
            "authentication installed"
        );
        let mut slot = self.current.write().map_err(|_| IdentityError::Poisoned)?;
        *slot = Some(Arc::new(authentication));
        Ok(())
    }

    pub fn clear_authentication(&self) -> Result<(), IdentityError> {
        let mut slot = self.current.write().map_err(|_| IdentityError::Poisoned)?;
        *slot = None;
        Ok(())
    }

    /// The installed authentication, if any.
    pub fn current_authentication(&self) -> Result<Option<Arc<Authentication>>, IdentityError> {
        let slot = self.current.read().map_err(|_| IdentityError::Poisoned)?;
        Ok(slot.clone())
    }
}
