//! Top-level command execution.
//!
//! Every call to [`CommandExecutor::execute`] opens a fresh [`CommandContext`]
//! (local tenant check enabled, nothing staged), runs the command, and then
//! either applies the staged writes (`Ok`) or drops them (`Err`). A tenant
//! failure anywhere in the command therefore commits nothing.

use std::sync::Arc;

use tracing::{debug, info_span, warn};

use tenantgate_auth::{AdminPolicy, IdentityService};
use tenantgate_core::{EngineError, EngineResult};
use tenantgate_tenancy::{EnforcementSwitch, TenantIdProvider};

use crate::command::Command;
use crate::config::EngineConfig;
use crate::context::CommandContext;
use crate::store::Repositories;

pub struct CommandExecutor {
    repositories: Repositories,
    switch: EnforcementSwitch,
    admins: AdminPolicy,
    identity: IdentityService,
    tenant_id_provider: Option<Arc<dyn TenantIdProvider>>,
}

impl core::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("switch", &self.switch)
            .field("admins", &self.admins)
            .field("tenant_id_provider", &self.tenant_id_provider.is_some())
            .finish_non_exhaustive()
    }
}

impl CommandExecutor {
    pub fn new(
        repositories: Repositories,
        switch: EnforcementSwitch,
        admins: AdminPolicy,
        identity: IdentityService,
    ) -> Self {
        Self {
            repositories,
            switch,
            admins,
            identity,
            tenant_id_provider: None,
        }
    }

    pub fn from_config(config: &EngineConfig, repositories: Repositories, identity: IdentityService) -> Self {
        Self::new(
            repositories,
            config.enforcement_switch(),
            config.admin_policy(),
            identity,
        )
    }

    pub fn with_tenant_id_provider(mut self, provider: Arc<dyn TenantIdProvider>) -> Self {
        self.tenant_id_provider = Some(provider);
        self
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    pub fn enforcement_switch(&self) -> &EnforcementSwitch {
        &self.switch
    }

    /// Execute `command` as a new top-level unit of work.
    pub fn execute<C: Command>(&self, command: C) -> EngineResult<C::Output> {
        let authentication = self
            .identity
            .current_authentication()
            .map_err(|e| EngineError::storage(e.to_string()))?;

        let span = info_span!(
            "command",
            command = C::NAME,
            nested = false,
            user_id = authentication.as_deref().map(|a| a.user_id()),
        );
        let _enter = span.enter();

        let ctx = CommandContext::new(
            &self.repositories,
            &self.switch,
            &self.admins,
            self.tenant_id_provider.as_deref(),
            authentication,
        );

        match command.execute(&ctx) {
            Ok(output) => {
                let writes = ctx.into_pending();
                debug!(writes = writes.len(), "committing unit of work");
                self.repositories.apply_all(writes)?;
                Ok(output)
            }
            Err(err) => {
                warn!(error = %err, "command failed; staged writes discarded");
                Err(err)
            }
        }
    }
}
