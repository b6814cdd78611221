//! Per-command unit of work.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info_span;

use tenantgate_auth::{AdminPolicy, Authentication};
use tenantgate_core::{EngineResult, EntityId, EntityKind};
use tenantgate_tenancy::{
    EnforcementSwitch, TenantCheckToggle, TenantCommandChecker, TenantIdProvider, TenantManager,
    TenantQueryFilter,
};

use crate::command::Command;
use crate::store::{PendingWrite, Repositories};

/// Context shared by a top-level command and every command nested in it.
///
/// Created by the [`CommandExecutor`](crate::CommandExecutor) for each
/// top-level invocation and dropped when it completes, so the tenant-check
/// toggle never leaks into a later, independently issued command.
pub struct CommandContext<'e> {
    repositories: &'e Repositories,
    switch: &'e EnforcementSwitch,
    admins: &'e AdminPolicy,
    tenant_id_provider: Option<&'e dyn TenantIdProvider>,
    authentication: Option<Arc<Authentication>>,
    toggle: TenantCheckToggle,
    now: DateTime<Utc>,
    pending: RefCell<Vec<PendingWrite>>,
    depth: Cell<usize>,
}

impl core::fmt::Debug for CommandContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandContext")
            .field("authentication", &self.authentication)
            .field("tenant_check_enabled", &self.toggle.is_enabled())
            .field("pending", &self.pending.borrow().len())
            .field("depth", &self.depth.get())
            .finish_non_exhaustive()
    }
}

impl<'e> CommandContext<'e> {
    pub fn new(
        repositories: &'e Repositories,
        switch: &'e EnforcementSwitch,
        admins: &'e AdminPolicy,
        tenant_id_provider: Option<&'e dyn TenantIdProvider>,
        authentication: Option<Arc<Authentication>>,
    ) -> Self {
        Self {
            repositories,
            switch,
            admins,
            tenant_id_provider,
            authentication,
            toggle: TenantCheckToggle::new(),
            now: Utc::now(),
            pending: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        }
    }

    pub fn repositories(&self) -> &'e Repositories {
        self.repositories
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.authentication().map(Authentication::user_id)
    }

    pub fn tenant_id_provider(&self) -> Option<&'e dyn TenantIdProvider> {
        self.tenant_id_provider
    }

    /// Timestamp of this unit of work.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn tenant_manager(&self) -> TenantManager<'_> {
        TenantManager::new(self.switch, &self.toggle, self.authentication(), self.admins)
    }

    /// Guard for operations naming a single entity.
    pub fn tenant_guard(&self) -> TenantCommandChecker<'_> {
        self.tenant_manager().command_checker()
    }

    /// Filter for list, report and selection operations.
    pub fn tenant_filter(&self) -> TenantQueryFilter<'_> {
        self.tenant_manager().query_filter()
    }

    /// Re-enable tenant checks for the rest of this unit of work.
    ///
    /// Has no effect while the engine-wide switch is off.
    pub fn enable_tenant_check(&self) {
        self.toggle.enable();
    }

    /// Disable tenant checks for the rest of this unit of work, including
    /// commands nested after this call.
    pub fn disable_tenant_check(&self) {
        self.toggle.disable();
    }

    /// The local toggle only, ignoring the engine-wide switch and admin bypass.
    pub fn is_tenant_check_enabled(&self) -> bool {
        self.toggle.is_enabled()
    }

    pub fn is_nested(&self) -> bool {
        self.depth.get() > 0
    }

    /// Execute `command` as a nested command sharing this context.
    pub fn execute<C: Command>(&self, command: C) -> EngineResult<C::Output> {
        let span = info_span!("command", command = C::NAME, nested = true);
        let _enter = span.enter();

        self.depth.set(self.depth.get() + 1);
        let result = command.execute(self);
        self.depth.set(self.depth.get() - 1);
        result
    }

    /// Stage an upsert, applied when the unit of work commits.
    pub fn stage(&self, write: impl Into<PendingWrite>) {
        self.pending.borrow_mut().push(write.into());
    }

    /// Stage a removal, applied when the unit of work commits.
    pub fn stage_remove(&self, kind: EntityKind, id: EntityId) {
        self.pending.borrow_mut().push(PendingWrite::Remove(kind, id));
    }

    pub(crate) fn into_pending(self) -> Vec<PendingWrite> {
        self.pending.into_inner()
    }
}
