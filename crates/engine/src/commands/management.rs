//! Job management commands.

use chrono::{DateTime, Utc};

use tenantgate_core::{EngineError, EngineResult, EntityId};
use tenantgate_tenancy::{
    CollectionFilter, Operation, SingleEntityGuard, TenantPredicate, TenantSelection,
};

use crate::command::Command;
use crate::commands::{load, log_operation};
use crate::context::CommandContext;
use crate::model::{Job, ProcessDefinition};
use crate::store::EntityStore;

#[derive(Debug, Clone)]
pub struct GetJob {
    pub job_id: EntityId,
}

impl Command for GetJob {
    type Output = Job;
    const NAME: &'static str = "get-job";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Job> {
        let job: Job = load(ctx.repositories().jobs.as_ref(), &self.job_id)?;
        ctx.tenant_guard().check(Operation::ReadJob, &job)?;
        Ok(job)
    }
}

/// Load `job_id`, check `UpdateJob`, apply `change` and stage the result.
fn update_job(
    ctx: &CommandContext<'_>,
    job_id: &EntityId,
    change: impl FnOnce(&mut Job),
) -> EngineResult<Job> {
    let mut job: Job = load(ctx.repositories().jobs.as_ref(), job_id)?;
    ctx.tenant_guard().check(Operation::UpdateJob, &job)?;
    change(&mut job);
    ctx.stage(job.clone());
    Ok(job)
}

#[derive(Debug, Clone)]
pub struct SetJobRetries {
    pub job_id: EntityId,
    pub retries: u32,
}

impl Command for SetJobRetries {
    type Output = ();
    const NAME: &'static str = "set-job-retries";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        let job = update_job(ctx, &self.job_id, |job| {
            job.retries = self.retries;
            if self.retries > 0 {
                job.exception_message = None;
            }
        })?;
        log_operation(ctx, "SetJobRetries", &job);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SetJobPriority {
    pub job_id: EntityId,
    pub priority: i64,
}

impl Command for SetJobPriority {
    type Output = ();
    const NAME: &'static str = "set-job-priority";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        update_job(ctx, &self.job_id, |job| job.priority = self.priority)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SetJobDueDate {
    pub job_id: EntityId,
    pub due_date: Option<DateTime<Utc>>,
}

impl Command for SetJobDueDate {
    type Output = ();
    const NAME: &'static str = "set-job-due-date";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<()> {
        update_job(ctx, &self.job_id, |job| job.due_date = self.due_date)?;
        Ok(())
    }
}

/// Reset the retries of every failed job of a job definition.
///
/// A job definition belongs to a process definition; the ownership check runs
/// against that definition. It is only loaded while checks are enforced.
#[derive(Debug, Clone)]
pub struct SetJobRetriesByJobDefinition {
    pub job_definition_id: EntityId,
    pub retries: u32,
}

impl Command for SetJobRetriesByJobDefinition {
    type Output = usize;
    const NAME: &'static str = "set-job-retries-by-job-definition";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<usize> {
        let repos = ctx.repositories();
        let jobs: Vec<Job> = repos
            .jobs
            .list(&TenantPredicate::unrestricted())?
            .into_iter()
            .filter(|j| j.job_definition_id == self.job_definition_id)
            .collect();

        let Some(first) = jobs.first() else {
            return Err(EngineError::validation(format!(
                "job definition '{}' has no jobs",
                self.job_definition_id
            )));
        };

        let guard = ctx.tenant_guard();
        if guard.is_checking() {
            let definition: ProcessDefinition =
                load(repos.process_definitions.as_ref(), &first.process_definition_id)?;
            guard.check(Operation::UpdateProcessDefinition, &definition)?;
        }

        let mut updated = 0;
        for mut job in jobs.into_iter().filter(|j| j.retries == 0) {
            job.retries = self.retries;
            job.exception_message = None;
            ctx.stage(job);
            updated += 1;
        }
        Ok(updated)
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub selection: TenantSelection,
    pub process_instance_id: Option<EntityId>,
    /// Only jobs without retries left.
    pub no_retries_left: bool,
}

impl Command for JobQuery {
    type Output = Vec<Job>;
    const NAME: &'static str = "job-query";

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<Job>> {
        let predicate = ctx.tenant_filter().predicate(&self.selection);
        Ok(ctx
            .repositories()
            .jobs
            .list(&predicate)?
            .into_iter()
            .filter(|j| {
                self.process_instance_id
                    .as_ref()
                    .is_none_or(|id| &j.process_instance_id == id)
            })
            .filter(|j| !self.no_retries_left || j.retries == 0)
            .collect())
    }
}
