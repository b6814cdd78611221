//! Deployment and process definition commands.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tenantgate_core::{EngineError, EngineResult, EntityId, EntityKind, TenantId};
use tenantgate_tenancy::{
    CollectionFilter, Operation, SingleEntityGuard, TenantPredicate, TenantSelection,
};

use crate::command::Command;
use crate::commands::load;
use crate::commands::runtime::DeleteProcessInstance;
use crate::context::CommandContext;
use crate::model::{Deployment, ProcessDefinition, ProcessInstance, ProcessModel};
use crate::store::EntityStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentWithDefinitions {
    pub deployment: Deployment,
    pub definitions: Vec<ProcessDefinition>,
}

/// Deploy `models`, owned by `tenant_id` or shared.
///
/// Versions are counted per key and tenant, so two tenants deploying the same
/// key each start at version 1.
#[derive(Debug, Clone)]
pub struct Deploy {
    pub name: String,
    pub tenant_id: Option<TenantId>,
    pub models: Vec<ProcessModel>,
}

impl Command for Deploy {
    type Output = DeploymentWithDefinitions;
    const NAME: &'static str = "deploy";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<DeploymentWithDefinitions> {
        let deployment = Deployment {
            id: EntityId::generate(),
            name: self.name.clone(),
            tenant_id: self.tenant_id.clone(),
            deployed_at: ctx.now(),
        };
        ctx.tenant_guard()
            .check_tenant(Operation::CreateDeployment, &deployment.id, deployment.tenant_id.as_ref())?;

        let mut keys = BTreeSet::new();
        if let Some(duplicate) = self.models.iter().find(|m| !keys.insert(m.key.as_str())) {
            return Err(EngineError::validation(format!(
                "deployment '{}' contains process key '{}' more than once",
                self.name, duplicate.key
            )));
        }

        let existing = ctx
            .repositories()
            .process_definitions
            .list(&TenantPredicate::unrestricted())?;

        let mut definitions = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let version = existing
                .iter()
                .filter(|d| d.key == model.key && d.tenant_id == self.tenant_id)
                .map(|d| d.version)
                .max()
                .unwrap_or(0)
                + 1;
            let definition = ProcessDefinition {
                id: EntityId::new(format!("{}:{version}:{}", model.key, EntityId::generate())),
                key: model.key.clone(),
                version,
                deployment_id: deployment.id.clone(),
                tenant_id: self.tenant_id.clone(),
                suspended: false,
                model: model.clone(),
            };
            ctx.stage(definition.clone());
            definitions.push(definition);
        }
        ctx.stage(deployment.clone());

        debug!(deployment_id = %deployment.id, definitions = definitions.len(), "deployed");
        Ok(DeploymentWithDefinitions {
            deployment,
            definitions,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GetDeployment {
    pub deployment_id: EntityId,
}

impl Command for GetDeployment {
    type Output = Deployment;
    const NAME: &'static str = "get-deployment";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Deployment> {
        let deployment: Deployment = load(ctx.repositories().deployments.as_ref(), &self.deployment_id)?;
        ctx.tenant_guard()
            .check(Operation::ReadDeployment, &deployment)?;
        Ok(deployment)
    }
}

#[derive(Debug, Clone)]
pub struct GetProcessDefinition {
    pub definition_id: EntityId,
}

impl Command for GetProcessDefinition {
    type Output = ProcessDefinition;
    const NAME: &'static str = "get-process-definition";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<ProcessDefinition> {
        let definition: ProcessDefinition =
            load(ctx.repositories().process_definitions.as_ref(), &self.definition_id)?;
        ctx.tenant_guard()
            .check(Operation::ReadProcessDefinition, &definition)?;
        Ok(definition)
    }
}

#[derive(Debug, Clone)]
pub struct SuspendProcessDefinition {
    pub definition_id: EntityId,
    pub suspended: bool,
}

impl Command for SuspendProcessDefinition {
    type Output = ();
    const NAME: &'static str = "suspend-process-definition";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let mut definition: ProcessDefinition =
            load(ctx.repositories().process_definitions.as_ref(), &self.definition_id)?;
        ctx.tenant_guard()
            .check(Operation::UpdateProcessDefinition, &definition)?;
        definition.suspended = self.suspended;
        ctx.stage(definition);
        Ok(())
    }
}

fn instances_of(ctx: &CommandContext<'_>, definition_ids: &BTreeSet<EntityId>) -> EngineResult<Vec<ProcessInstance>> {
    Ok(ctx
        .repositories()
        .process_instances
        .list(&TenantPredicate::unrestricted())?
        .into_iter()
        .filter(|i| definition_ids.contains(&i.definition_id))
        .collect())
}

#[derive(Debug, Clone)]
pub struct DeleteProcessDefinition {
    pub definition_id: EntityId,
}

impl Command for DeleteProcessDefinition {
    type Output = ();
    const NAME: &'static str = "delete-process-definition";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let definition: ProcessDefinition =
            load(ctx.repositories().process_definitions.as_ref(), &self.definition_id)?;
        ctx.tenant_guard()
            .check(Operation::DeleteProcessDefinition, &definition)?;

        let ids = BTreeSet::from([definition.id.clone()]);
        if !instances_of(ctx, &ids)?.is_empty() {
            return Err(EngineError::conflict(format!(
                "process definition '{}' still has running instances",
                definition.id
            )));
        }
        ctx.stage_remove(EntityKind::ProcessDefinition, definition.id);
        Ok(())
    }
}

/// Delete a deployment with its definitions.
///
/// With `cascade`, running instances are deleted too. Those instances were
/// authorized through the deployment, so they are removed with tenant checks
/// disabled for the rest of this command.
#[derive(Debug, Clone)]
pub struct DeleteDeployment {
    pub deployment_id: EntityId,
    pub cascade: bool,
}

impl Command for DeleteDeployment {
    type Output = ();
    const NAME: &'static str = "delete-deployment";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let repos = ctx.repositories();
        let deployment: Deployment = load(repos.deployments.as_ref(), &self.deployment_id)?;
        ctx.tenant_guard()
            .check(Operation::DeleteDeployment, &deployment)?;

        let definition_ids: BTreeSet<EntityId> = repos
            .process_definitions
            .list(&TenantPredicate::unrestricted())?
            .into_iter()
            .filter(|d| d.deployment_id == deployment.id)
            .map(|d| d.id)
            .collect();

        let instances = instances_of(ctx, &definition_ids)?;
        if !instances.is_empty() {
            if !self.cascade {
                return Err(EngineError::conflict(format!(
                    "deployment '{}' still has {} running process instances",
                    deployment.id,
                    instances.len()
                )));
            }
            ctx.disable_tenant_check();
            for instance in instances {
                ctx.execute(DeleteProcessInstance {
                    process_instance_id: instance.id,
                    reason: Some("deployment deleted".to_string()),
                })?;
            }
        }

        for id in definition_ids {
            ctx.stage_remove(EntityKind::ProcessDefinition, id);
        }
        ctx.stage_remove(EntityKind::Deployment, deployment.id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessDefinitionQuery {
    pub selection: TenantSelection,
    pub key: Option<String>,
    /// Only the highest version per key and tenant.
    pub latest_version: bool,
}

impl Command for ProcessDefinitionQuery {
    type Output = Vec<ProcessDefinition>;
    const NAME: &'static str = "process-definition-query";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<ProcessDefinition>> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        let definitions: Vec<ProcessDefinition> = ctx
            .repositories()
            .process_definitions
            .list(&predicate)?
            .into_iter()
            .filter(|d| self.key.as_ref().is_none_or(|k| &d.key == k))
            .collect();

        if !self.latest_version {
            return Ok(definitions);
        }
        Ok(definitions
            .iter()
            .filter(|d| {
                !definitions
                    .iter()
                    .any(|o| o.key == d.key && o.tenant_id == d.tenant_id && o.version > d.version)
            })
            .cloned()
            .collect())
    }
}
