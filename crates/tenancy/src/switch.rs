//! Enforcement flags: the engine-wide switch and the per-command toggle.

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Engine-wide tenant-check switch.
///
/// Cloning shares the flag. Toggled rarely by configuration and read on every
/// evaluation; reads may observe a slightly stale value.
#[derive(Debug, Clone)]
pub struct EnforcementSwitch {
    enabled: Arc<AtomicBool>,
}

impl EnforcementSwitch {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            info!(enabled, "engine-wide tenant check switched");
        }
    }
}

impl Default for EnforcementSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Local tenant-check flag of one unit of work.
///
/// Starts enabled. Every command nested in the same unit of work observes and
/// may mutate the same flag; nothing is restored when a nested command returns.
#[derive(Debug)]
pub struct TenantCheckToggle {
    enabled: Cell<bool>,
}

impl TenantCheckToggle {
    pub fn new() -> Self {
        Self {
            enabled: Cell::new(true),
        }
    }

    pub fn enable(&self) {
        self.enabled.set(true);
    }

    pub fn disable(&self) {
        self.enabled.set(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

impl Default for TenantCheckToggle {
    fn default() -> Self {
        Self::new()
    }
}
