//! Tenant-ownable engine entities.
//!
//! Only the attributes this layer and its demo commands need are modeled; the
//! execution semantics behind them belong to the surrounding engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use tenantgate_core::{EntityId, EntityKind, TenantId, TenantOwned};

/// Wait state created when an instance starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivitySpec {
    UserTask { id: String, name: String },
    Timer { id: String },
    ExternalTask { id: String, topic: String },
    MessageCatch { id: String, message: String },
}

impl ActivitySpec {
    pub fn id(&self) -> &str {
        match self {
            ActivitySpec::UserTask { id, .. }
            | ActivitySpec::Timer { id }
            | ActivitySpec::ExternalTask { id, .. }
            | ActivitySpec::MessageCatch { id, .. } => id,
        }
    }
}

/// Deployable process model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessModel {
    pub key: String,
    pub activities: Vec<ActivitySpec>,
    pub history_time_to_live_days: Option<u32>,
}

impl ProcessModel {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            activities: Vec::new(),
            history_time_to_live_days: None,
        }
    }

    pub fn user_task(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.activities.push(ActivitySpec::UserTask {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    pub fn timer(mut self, id: impl Into<String>) -> Self {
        self.activities.push(ActivitySpec::Timer { id: id.into() });
        self
    }

    pub fn external_task(mut self, id: impl Into<String>, topic: impl Into<String>) -> Self {
        self.activities.push(ActivitySpec::ExternalTask {
            id: id.into(),
            topic: topic.into(),
        });
        self
    }

    pub fn message_catch(mut self, id: impl Into<String>, message: impl Into<String>) -> Self {
        self.activities.push(ActivitySpec::MessageCatch {
            id: id.into(),
            message: message.into(),
        });
        self
    }

    pub fn history_time_to_live(mut self, days: u32) -> Self {
        self.history_time_to_live_days = Some(days);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: EntityId,
    pub name: String,
    pub tenant_id: Option<TenantId>,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: EntityId,
    pub key: String,
    pub version: u32,
    pub deployment_id: EntityId,
    pub tenant_id: Option<TenantId>,
    pub suspended: bool,
    pub model: ProcessModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: EntityId,
    pub definition_id: EntityId,
    pub definition_key: String,
    pub business_key: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub suspended: bool,
    pub active_activity_ids: Vec<String>,
    /// Message names the instance currently waits for, keyed by activity id.
    pub message_subscriptions: Vec<(String, String)>,
    pub variables: Map<String, JsonValue>,
}

impl ProcessInstance {
    pub fn awaits_message(&self, message: &str) -> Option<&str> {
        self.message_subscriptions
            .iter()
            .find(|(_, name)| name == message)
            .map(|(activity, _)| activity.as_str())
    }
}

/// Runtime activity-instance tree of a process instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInstance {
    pub id: String,
    pub activity_id: String,
    pub child_activity_instances: Vec<ActivityInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub name: String,
    pub activity_id: Option<String>,
    pub process_instance_id: Option<EntityId>,
    pub tenant_id: Option<TenantId>,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: EntityId,
    pub job_definition_id: EntityId,
    pub process_definition_id: EntityId,
    pub process_instance_id: EntityId,
    pub activity_id: String,
    pub tenant_id: Option<TenantId>,
    pub retries: u32,
    pub priority: i64,
    pub due_date: Option<DateTime<Utc>>,
    pub exception_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTask {
    pub id: EntityId,
    pub topic: String,
    pub activity_id: String,
    pub process_instance_id: EntityId,
    pub tenant_id: Option<TenantId>,
    pub priority: i64,
    pub retries: Option<u32>,
    pub worker_id: Option<String>,
    pub lock_expiration: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ExternalTask {
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_expiration.is_some_and(|exp| exp > now)
    }
}

/// External task handed out by fetch-and-lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedExternalTask {
    pub id: EntityId,
    pub topic: String,
    pub worker_id: String,
    pub lock_expiration: DateTime<Utc>,
    pub process_instance_id: EntityId,
    pub tenant_id: Option<TenantId>,
    pub variables: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricProcessInstance {
    pub id: EntityId,
    pub definition_id: EntityId,
    pub definition_key: String,
    pub tenant_id: Option<TenantId>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl HistoricProcessInstance {
    pub fn duration_millis(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub id: EntityId,
    pub operation_type: String,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub user_id: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub annotation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

macro_rules! impl_tenant_owned {
    ($t:ty, $kind:expr) => {
        impl TenantOwned for $t {
            const KIND: EntityKind = $kind;

            fn entity_id(&self) -> &EntityId {
                &self.id
            }

            fn tenant_id(&self) -> Option<&TenantId> {
                self.tenant_id.as_ref()
            }
        }
    };
}

impl_tenant_owned!(Deployment, EntityKind::Deployment);
impl_tenant_owned!(ProcessDefinition, EntityKind::ProcessDefinition);
impl_tenant_owned!(ProcessInstance, EntityKind::ProcessInstance);
impl_tenant_owned!(Task, EntityKind::Task);
impl_tenant_owned!(Job, EntityKind::Job);
impl_tenant_owned!(ExternalTask, EntityKind::ExternalTask);
impl_tenant_owned!(HistoricProcessInstance, EntityKind::HistoricProcessInstance);
impl_tenant_owned!(OperationLogEntry, EntityKind::OperationLogEntry);
