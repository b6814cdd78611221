//! Engine configuration.

use serde::Deserialize;
use thiserror::Error;

use tenantgate_auth::{AdminPolicy, OPERATON_ADMIN};
use tenantgate_tenancy::EnforcementSwitch;

pub const ENV_TENANT_CHECK_ENABLED: &str = "TENANTGATE_TENANT_CHECK_ENABLED";
pub const ENV_ADMIN_GROUPS: &str = "TENANTGATE_ADMIN_GROUPS";
pub const ENV_ADMIN_USERS: &str = "TENANTGATE_ADMIN_USERS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid boolean for {key}: '{value}'")]
    InvalidBool { key: &'static str, value: String },

    #[error("invalid engine configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine-wide tenant check switch.
    pub tenant_check_enabled: bool,
    /// Members of these groups bypass tenant checks.
    pub admin_groups: Vec<String>,
    /// These users bypass tenant checks.
    pub admin_users: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tenant_check_enabled: true,
            admin_groups: vec![OPERATON_ADMIN.to_string()],
            admin_users: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from `TENANTGATE_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_TENANT_CHECK_ENABLED) {
            config.tenant_check_enabled = parse_bool(ENV_TENANT_CHECK_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ADMIN_GROUPS) {
            config.admin_groups = split_list(&raw);
        }
        if let Some(raw) = lookup(ENV_ADMIN_USERS) {
            config.admin_users = split_list(&raw);
        }

        Ok(config)
    }

    pub fn enforcement_switch(&self) -> EnforcementSwitch {
        EnforcementSwitch::new(self.tenant_check_enabled)
    }

    pub fn admin_policy(&self) -> AdminPolicy {
        AdminPolicy::new(self.admin_groups.iter().cloned(), self.admin_users.iter().cloned())
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
