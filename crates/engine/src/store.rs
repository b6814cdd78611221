//! Entity storage behind the engine commands.
//!
//! Stores only know how to apply a [`TenantPredicate`] handed to them; deciding
//! *which* predicate applies is the tenancy layer's job.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tenantgate_core::{EngineError, EngineResult, EntityId, EntityKind, TenantOwned};
use tenantgate_tenancy::TenantPredicate;

use crate::model::{
    Deployment, ExternalTask, HistoricProcessInstance, Job, OperationLogEntry, ProcessDefinition,
    ProcessInstance, Task,
};

/// Tenant-aware entity store abstraction.
pub trait EntityStore<E>: Send + Sync {
    fn get(&self, id: &EntityId) -> EngineResult<Option<E>>;

    /// All entities whose tenant matches `predicate`, ordered by id.
    fn list(&self, predicate: &TenantPredicate) -> EngineResult<Vec<E>>;

    fn upsert(&self, entity: E) -> EngineResult<()>;

    fn remove(&self, id: &EntityId) -> EngineResult<()>;
}

impl<E, S> EntityStore<E> for Arc<S>
where
    S: EntityStore<E> + ?Sized,
{
    fn get(&self, id: &EntityId) -> EngineResult<Option<E>> {
        (**self).get(id)
    }

    fn list(&self, predicate: &TenantPredicate) -> EngineResult<Vec<E>> {
        (**self).list(predicate)
    }

    fn upsert(&self, entity: E) -> EngineResult<()> {
        (**self).upsert(entity)
    }

    fn remove(&self, id: &EntityId) -> EngineResult<()> {
        (**self).remove(id)
    }
}

/// In-memory store for tests/dev.
#[derive(Debug)]
pub struct InMemoryEntityStore<E> {
    inner: RwLock<BTreeMap<EntityId, E>>,
}

impl<E> InMemoryEntityStore<E> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<E> Default for InMemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned(kind: EntityKind) -> EngineError {
    EngineError::storage(format!("{kind} store lock poisoned"))
}

impl<E> EntityStore<E> for InMemoryEntityStore<E>
where
    E: TenantOwned + Clone + Send + Sync + 'static,
{
    fn get(&self, id: &EntityId) -> EngineResult<Option<E>> {
        let map = self.inner.read().map_err(|_| poisoned(E::KIND))?;
        Ok(map.get(id).cloned())
    }

    fn list(&self, predicate: &TenantPredicate) -> EngineResult<Vec<E>> {
        let map = self.inner.read().map_err(|_| poisoned(E::KIND))?;
        Ok(map
            .values()
            .filter(|e| predicate.matches(e.tenant_id()))
            .cloned()
            .collect())
    }

    fn upsert(&self, entity: E) -> EngineResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned(E::KIND))?;
        map.insert(entity.entity_id().clone(), entity);
        Ok(())
    }

    fn remove(&self, id: &EntityId) -> EngineResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned(E::KIND))?;
        map.remove(id);
        Ok(())
    }
}

/// Write staged by a command, applied when its unit of work commits.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    Deployment(Deployment),
    ProcessDefinition(ProcessDefinition),
    ProcessInstance(ProcessInstance),
    Task(Task),
    Job(Job),
    ExternalTask(ExternalTask),
    HistoricProcessInstance(HistoricProcessInstance),
    OperationLogEntry(OperationLogEntry),
    Remove(EntityKind, EntityId),
}

macro_rules! impl_pending_from {
    ($($t:ident),* $(,)?) => {
        $(
            impl From<$t> for PendingWrite {
                fn from(value: $t) -> Self {
                    PendingWrite::$t(value)
                }
            }
        )*
    };
}

impl_pending_from!(
    Deployment,
    ProcessDefinition,
    ProcessInstance,
    Task,
    Job,
    ExternalTask,
    HistoricProcessInstance,
    OperationLogEntry,
);

/// One store per entity kind.
#[derive(Clone)]
pub struct Repositories {
    pub deployments: Arc<dyn EntityStore<Deployment>>,
    pub process_definitions: Arc<dyn EntityStore<ProcessDefinition>>,
    pub process_instances: Arc<dyn EntityStore<ProcessInstance>>,
    pub tasks: Arc<dyn EntityStore<Task>>,
    pub jobs: Arc<dyn EntityStore<Job>>,
    pub external_tasks: Arc<dyn EntityStore<ExternalTask>>,
    pub historic_process_instances: Arc<dyn EntityStore<HistoricProcessInstance>>,
    pub operation_log: Arc<dyn EntityStore<OperationLogEntry>>,
}

impl core::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            deployments: Arc::new(InMemoryEntityStore::new()),
            process_definitions: Arc::new(InMemoryEntityStore::new()),
            process_instances: Arc::new(InMemoryEntityStore::new()),
            tasks: Arc::new(InMemoryEntityStore::new()),
            jobs: Arc::new(InMemoryEntityStore::new()),
            external_tasks: Arc::new(InMemoryEntityStore::new()),
            historic_process_instances: Arc::new(InMemoryEntityStore::new()),
            operation_log: Arc::new(InMemoryEntityStore::new()),
        }
    }

    pub fn apply(&self, write: PendingWrite) -> EngineResult<()> {
        match write {
            PendingWrite::Deployment(e) => self.deployments.upsert(e),
            PendingWrite::ProcessDefinition(e) => self.process_definitions.upsert(e),
            PendingWrite::ProcessInstance(e) => self.process_instances.upsert(e),
            PendingWrite::Task(e) => self.tasks.upsert(e),
            PendingWrite::Job(e) => self.jobs.upsert(e),
            PendingWrite::ExternalTask(e) => self.external_tasks.upsert(e),
            PendingWrite::HistoricProcessInstance(e) => self.historic_process_instances.upsert(e),
            PendingWrite::OperationLogEntry(e) => self.operation_log.upsert(e),
            PendingWrite::Remove(kind, id) => self.remove(kind, &id),
        }
    }

    pub fn apply_all(&self, writes: Vec<PendingWrite>) -> EngineResult<()> {
        for write in writes {
            self.apply(write)?;
        }
        Ok(())
    }

    fn remove(&self, kind: EntityKind, id: &EntityId) -> EngineResult<()> {
        match kind {
            EntityKind::Deployment => self.deployments.remove(id),
            EntityKind::ProcessDefinition => self.process_definitions.remove(id),
            EntityKind::ProcessInstance => self.process_instances.remove(id),
            EntityKind::Task => self.tasks.remove(id),
            EntityKind::Job => self.jobs.remove(id),
            EntityKind::ExternalTask => self.external_tasks.remove(id),
            EntityKind::HistoricProcessInstance => self.historic_process_instances.remove(id),
            EntityKind::OperationLogEntry => self.operation_log.remove(id),
        }
    }
}

impl Default for Repositories {
    fn default() -> Self {
        Self::in_memory()
    }
}
