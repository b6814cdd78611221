//! End-to-end tenant isolation through the engine services.
//!
//! Tests: Authentication → CommandExecutor → Command → TenantManager → stores
//!
//! Verifies:
//! - Shared entities are visible to everyone
//! - Single-entity operations fail loudly for foreign tenants
//! - List, report and fetch operations narrow silently
//! - The engine-wide switch, the per-command toggle and admin bypass
//! - A denial anywhere in a command commits nothing

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Map, Value as JsonValue, json};

    use tenantgate_auth::{Authentication, OPERATON_ADMIN};
    use tenantgate_core::{EngineError, EngineResult, EntityId, TenantId};
    use tenantgate_tenancy::{TenantIdProvider, TenantIdProviderContext, TenantSelection};

    use crate::command::Command;
    use crate::commands::history::OperationLogQuery;
    use crate::commands::management::JobQuery;
    use crate::commands::runtime::{
        CorrelationTarget, GetActiveActivityIds, GetVariables, ProcessInstanceQuery, SetVariable,
    };
    use crate::commands::task::TaskQuery;
    use crate::config::EngineConfig;
    use crate::context::CommandContext;
    use crate::model::{ProcessDefinition, ProcessInstance, ProcessModel};
    use crate::services::ProcessEngine;
    use crate::store::EntityStore;

    const DENIED: &str = "because it belongs to no authenticated tenant";

    fn engine() -> ProcessEngine {
        tenantgate_observability::init_for_tests();
        ProcessEngine::new(&EngineConfig::default())
    }

    fn one_task() -> ProcessModel {
        ProcessModel::new("oneTask").user_task("userTask", "Review")
    }

    /// Deploys while no authentication is installed, i.e. unrestricted.
    fn deploy(engine: &ProcessEngine, tenant: Option<&str>, model: ProcessModel) -> ProcessDefinition {
        let mut deployed = engine
            .repository_service()
            .deploy("test", tenant.map(TenantId::new), vec![model])
            .unwrap();
        deployed.definitions.remove(0)
    }

    fn start(engine: &ProcessEngine, definition: &ProcessDefinition) -> ProcessInstance {
        engine
            .runtime_service()
            .start_process_instance_by_id(&definition.id, None, Map::new())
            .unwrap()
    }

    fn login(engine: &ProcessEngine, user: &str, tenants: &[&str]) {
        engine
            .identity_service()
            .set_authentication(Authentication::new(user, Vec::<String>::new(), tenants.iter().copied()))
            .unwrap();
    }

    fn logout(engine: &ProcessEngine) {
        engine.identity_service().clear_authentication().unwrap();
    }

    fn assert_denied<T: std::fmt::Debug>(result: EngineResult<T>, expected: &str) {
        let err = result.unwrap_err();
        assert!(err.is_tenant_denial(), "expected tenant denial, got {err:?}");
        assert!(err.to_string().contains(DENIED));
        assert_eq!(err.to_string(), expected);
    }

    fn instances(engine: &ProcessEngine, selection: TenantSelection) -> Vec<ProcessInstance> {
        engine
            .runtime_service()
            .process_instance_query(ProcessInstanceQuery {
                selection,
                ..Default::default()
            })
            .unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Single-entity guard
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn shared_entities_are_accessible_without_tenant_membership() {
        let engine = engine();
        let definition = deploy(&engine, None, one_task());
        let instance = start(&engine, &definition);

        login(&engine, "gonzo", &[]);
        let tree = engine
            .runtime_service()
            .get_activity_instance(&instance.id)
            .unwrap();

        assert_eq!(tree.child_activity_instances.len(), 1);
        assert_eq!(tree.child_activity_instances[0].activity_id, "userTask");
    }

    #[test]
    fn tenant_member_is_allowed_and_non_member_is_denied() {
        let engine = engine();
        let definition = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &definition);
        assert_eq!(instance.tenant_id, Some(TenantId::new("tenant1")));

        login(&engine, "kermit", &["tenant1"]);
        assert_eq!(
            engine.runtime_service().get_active_activity_ids(&instance.id).unwrap(),
            vec!["userTask".to_string()]
        );

        login(&engine, "gonzo", &[]);
        assert_denied(
            engine.runtime_service().get_active_activity_ids(&instance.id),
            &format!(
                "Cannot read the process instance '{}' because it belongs to no authenticated tenant.",
                instance.id
            ),
        );
    }

    #[test]
    fn unauthenticated_caller_is_unrestricted() {
        let engine = engine();
        let definition = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &definition);

        logout(&engine);
        assert!(engine.runtime_service().get_variables(&instance.id).is_ok());
        assert_eq!(instances(&engine, TenantSelection::any()).len(), 1);
    }

    #[test]
    fn missing_entity_is_not_found_rather_than_denied() {
        let engine = engine();
        login(&engine, "gonzo", &[]);

        let err = engine
            .task_service()
            .get_task(&EntityId::new("missing"))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert!(!err.is_tenant_denial());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Switch, toggle and admin bypass
    // ─────────────────────────────────────────────────────────────────────────

    /// Re-enables the local check, then reads through a nested command.
    #[derive(Debug)]
    struct EnableThenRead {
        instance_id: EntityId,
    }

    impl Command for EnableThenRead {
        type Output = Vec<String>;
        const NAME: &'static str = "enable-then-read";

        fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<String>> {
            ctx.enable_tenant_check();
            ctx.execute(GetActiveActivityIds {
                execution_id: self.instance_id.clone(),
            })
        }
    }

    /// Disables the local check, then reads through a nested command.
    #[derive(Debug)]
    struct ReadWithoutCheck {
        instance_id: EntityId,
    }

    impl Command for ReadWithoutCheck {
        type Output = Vec<String>;
        const NAME: &'static str = "read-without-check";

        fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Vec<String>> {
            ctx.disable_tenant_check();
            ctx.execute(GetActiveActivityIds {
                execution_id: self.instance_id.clone(),
            })
        }
    }

    #[test]
    fn engine_wide_switch_off_allows_everything_and_beats_local_enable() {
        let engine = engine();
        let definition = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &definition);

        engine.set_tenant_check_enabled(false);
        assert!(!engine.is_tenant_check_enabled());
        login(&engine, "gonzo", &[]);

        assert!(engine.runtime_service().get_activity_instance(&instance.id).is_ok());
        assert_eq!(
            engine
                .execute(EnableThenRead {
                    instance_id: instance.id.clone(),
                })
                .unwrap(),
            vec!["userTask".to_string()]
        );
        assert_eq!(instances(&engine, TenantSelection::any()).len(), 1);

        engine.set_tenant_check_enabled(true);
        assert!(
            engine
                .execute(EnableThenRead {
                    instance_id: instance.id.clone(),
                })
                .unwrap_err()
                .is_tenant_denial()
        );
    }

    #[test]
    fn disabling_checks_in_one_command_does_not_affect_the_next() {
        let engine = engine();
        let definition = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &definition);
        login(&engine, "gonzo", &[]);

        let ids = engine
            .execute(ReadWithoutCheck {
                instance_id: instance.id.clone(),
            })
            .unwrap();
        assert_eq!(ids, vec!["userTask".to_string()]);

        assert!(
            engine
                .runtime_service()
                .get_active_activity_ids(&instance.id)
                .unwrap_err()
                .is_tenant_denial()
        );
    }

    #[test]
    fn admin_group_and_admin_users_bypass_tenant_checks() {
        let config = EngineConfig {
            admin_users: vec!["piggy".to_string()],
            ..EngineConfig::default()
        };
        tenantgate_observability::init_for_tests();
        let engine = ProcessEngine::new(&config);
        let definition = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &definition);

        engine
            .identity_service()
            .set_authentication(Authentication::new("animal", [OPERATON_ADMIN], Vec::<String>::new()))
            .unwrap();
        assert!(engine.runtime_service().get_activity_instance(&instance.id).is_ok());
        assert_eq!(instances(&engine, TenantSelection::any()).len(), 1);

        login(&engine, "piggy", &[]);
        assert!(engine.runtime_service().get_activity_instance(&instance.id).is_ok());

        login(&engine, "gonzo", &[]);
        assert!(
            engine
                .runtime_service()
                .get_activity_instance(&instance.id)
                .unwrap_err()
                .is_tenant_denial()
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Collection filter
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn explicit_tenant_filter_never_widens_access() {
        let engine = engine();
        let shared = deploy(&engine, None, one_task());
        let tenant1 = deploy(&engine, Some("tenant1"), one_task());
        let tenant2 = deploy(&engine, Some("tenant2"), one_task());
        start(&engine, &shared);
        start(&engine, &tenant1);
        let visible = start(&engine, &tenant2);

        login(&engine, "kermit", &["tenant2"]);

        let foreign = TenantSelection::any().tenant_id_in(["tenant1"]).unwrap();
        assert!(instances(&engine, foreign).is_empty());

        let both = TenantSelection::any().tenant_id_in(["tenant1", "tenant2"]).unwrap();
        let found = instances(&engine, both);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, visible.id);

        assert_eq!(instances(&engine, TenantSelection::any()).len(), 2);
        assert_eq!(instances(&engine, TenantSelection::any().without_tenant_id()).len(), 1);

        let widened = TenantSelection::any()
            .tenant_id_in(["tenant2"])
            .unwrap()
            .include_without_tenant_id();
        assert_eq!(instances(&engine, widened).len(), 2);

        let tasks = engine
            .task_service()
            .task_query(TaskQuery {
                selection: TenantSelection::any().tenant_id_in(["tenant1"]).unwrap(),
                ..Default::default()
            })
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn single_reads_fail_while_fetch_and_lock_returns_nothing() {
        let engine = engine();
        let model = ProcessModel::new("externalTask").external_task("serviceTask", "topic");
        let definition = deploy(&engine, Some("tenant1"), model);
        let instance = start(&engine, &definition);

        login(&engine, "gonzo", &[]);
        let runtime = engine.runtime_service();
        assert!(runtime.get_activity_instance(&instance.id).unwrap_err().is_tenant_denial());
        assert!(runtime.get_active_activity_ids(&instance.id).unwrap_err().is_tenant_denial());

        let locked = engine
            .external_task_service()
            .fetch_and_lock(10, "worker", "topic", 10_000, TenantSelection::any())
            .unwrap();
        assert!(locked.is_empty());

        login(&engine, "kermit", &["tenant1"]);
        let locked = engine
            .external_task_service()
            .fetch_and_lock(10, "worker", "topic", 10_000, TenantSelection::any())
            .unwrap();
        assert_eq!(locked.len(), 1);
        assert_eq!(locked[0].tenant_id, Some(TenantId::new("tenant1")));

        let again = engine
            .external_task_service()
            .fetch_and_lock(10, "worker", "topic", 10_000, TenantSelection::any())
            .unwrap();
        assert!(again.is_empty(), "locked tasks are not handed out twice");
    }

    #[test]
    fn fetch_and_lock_rejects_invalid_requests() {
        let engine = engine();
        let external = engine.external_task_service();

        let err = external
            .fetch_and_lock(1, " ", "topic", 1_000, TenantSelection::any())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = external
            .fetch_and_lock(1, "worker", "topic", 0, TenantSelection::any())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn reports_list_both_tenants_unchecked_and_neither_when_checked() {
        let engine = engine();
        let model = ProcessModel::new("instant").history_time_to_live(0);
        let tenant1 = deploy(&engine, Some("tenant1"), model.clone());
        let tenant2 = deploy(&engine, Some("tenant2"), model);
        start(&engine, &tenant1);
        start(&engine, &tenant2);

        login(&engine, "gonzo", &[]);
        engine.set_tenant_check_enabled(false);

        let history = engine.history_service();
        let report = history
            .cleanable_process_instance_report(TenantSelection::any(), false)
            .unwrap();
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|r| r.finished_count == 1 && r.cleanable_count == 1));
        assert_eq!(history.duration_report(TenantSelection::any()).unwrap().len(), 2);

        engine.set_tenant_check_enabled(true);

        assert!(
            history
                .cleanable_process_instance_report(TenantSelection::any(), false)
                .unwrap()
                .is_empty()
        );
        assert!(history.duration_report(TenantSelection::any()).unwrap().is_empty());
        for definition in [&tenant1, &tenant2] {
            assert_denied(
                engine.repository_service().get_process_definition(&definition.id),
                &format!(
                    "Cannot read the process definition '{}' because it belongs to no authenticated tenant.",
                    definition.id
                ),
            );
        }
    }

    #[test]
    fn compact_cleanable_report_skips_definitions_without_finished_instances() {
        let engine = engine();
        deploy(&engine, None, one_task().history_time_to_live(5));
        let instant = deploy(&engine, None, ProcessModel::new("instant"));
        start(&engine, &instant);

        let history = engine.history_service();
        assert_eq!(
            history
                .cleanable_process_instance_report(TenantSelection::any(), false)
                .unwrap()
                .len(),
            2
        );

        let compact = history
            .cleanable_process_instance_report(TenantSelection::any(), true)
            .unwrap();
        assert_eq!(compact.len(), 1);
        assert_eq!(compact[0].process_definition_key, "instant");
        assert_eq!(compact[0].cleanable_count, 0, "no time to live, nothing cleanable");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Migration, correlation and nesting
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn migration_between_tenants_is_a_conflict_even_when_unchecked() {
        let engine = engine();
        let source = deploy(&engine, Some("tenant1"), one_task());
        let foreign = deploy(&engine, Some("tenant2"), one_task());
        let shared = deploy(&engine, None, one_task());
        let instance = start(&engine, &source);

        login(&engine, "kermit", &["tenant1"]);
        let err = engine
            .runtime_service()
            .migrate(&instance.id, &foreign.id)
            .unwrap_err();
        assert!(err.is_tenant_denial());
        assert!(err.to_string().contains("Cannot read the process definition"));

        engine.set_tenant_check_enabled(false);
        let err = engine
            .runtime_service()
            .migrate(&instance.id, &foreign.id)
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        engine.set_tenant_check_enabled(true);
        engine.runtime_service().migrate(&instance.id, &shared.id).unwrap();

        let migrated = instances(&engine, TenantSelection::any());
        assert_eq!(migrated.len(), 1);
        assert_eq!(migrated[0].definition_id, shared.id);
    }

    #[test]
    fn shared_instance_cannot_migrate_into_a_tenant_definition() {
        let engine = engine();
        let shared = deploy(&engine, None, one_task());
        let owned = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &shared);
        assert_eq!(instance.tenant_id, None);

        let err = engine
            .runtime_service()
            .migrate(&instance.id, &owned.id)
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)), "{err:?}");

        let unchanged = instances(&engine, TenantSelection::any());
        assert_eq!(unchanged[0].definition_id, shared.id);
    }

    #[test]
    fn provided_tenant_is_kept_across_migration() {
        tenantgate_observability::init_for_tests();
        let engine = ProcessEngine::new(&EngineConfig::default())
            .with_tenant_id_provider(Arc::new(FixedTenant(TenantId::new("tenant1"))));
        let shared = deploy(&engine, None, one_task());
        let own = deploy(&engine, Some("tenant1"), one_task());
        let foreign = deploy(&engine, Some("tenant2"), one_task());
        let instance = start(&engine, &shared);
        assert_eq!(instance.tenant_id, Some(TenantId::new("tenant1")));

        engine.set_tenant_check_enabled(false);
        let err = engine
            .runtime_service()
            .migrate(&instance.id, &foreign.id)
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)), "{err:?}");

        engine.set_tenant_check_enabled(true);
        engine.runtime_service().migrate(&instance.id, &own.id).unwrap();

        let migrated = instances(&engine, TenantSelection::any());
        assert_eq!(migrated.len(), 1);
        assert_eq!(migrated[0].definition_id, own.id);
        assert_eq!(migrated[0].tenant_id, Some(TenantId::new("tenant1")));
    }

    #[test]
    fn correlation_by_id_is_checked_and_broadcast_is_filtered() {
        let engine = engine();
        let model = ProcessModel::new("waiting").message_catch("wait", "go");
        let tenant1 = deploy(&engine, Some("tenant1"), model.clone());
        let tenant2 = deploy(&engine, Some("tenant2"), model);
        let own = start(&engine, &tenant1);
        let foreign = start(&engine, &tenant2);

        login(&engine, "kermit", &["tenant1"]);
        let runtime = engine.runtime_service();

        assert_denied(
            runtime.correlate_message("go", CorrelationTarget::ProcessInstance(foreign.id.clone()), Map::new()),
            &format!(
                "Cannot correlate the process instance '{}' because it belongs to no authenticated tenant.",
                foreign.id
            ),
        );

        let delivered = runtime
            .correlate_message("go", CorrelationTarget::All(TenantSelection::any()), Map::new())
            .unwrap();
        assert_eq!(delivered, vec![own.id.clone()]);

        let err = runtime
            .correlate_message("go", CorrelationTarget::Single(TenantSelection::any()), Map::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        logout(&engine);
        let delivered = runtime
            .correlate_message("go", CorrelationTarget::Single(TenantSelection::any()), Map::new())
            .unwrap();
        assert_eq!(delivered, vec![foreign.id]);
    }

    /// Writes through one nested command, then reads through another.
    #[derive(Debug)]
    struct TouchThenRead {
        touched: EntityId,
        read: EntityId,
    }

    impl Command for TouchThenRead {
        type Output = Map<String, JsonValue>;
        const NAME: &'static str = "touch-then-read";

        fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Map<String, JsonValue>> {
            ctx.execute(SetVariable {
                process_instance_id: self.touched.clone(),
                name: "touched".to_string(),
                value: json!(true),
            })?;
            ctx.execute(GetVariables {
                process_instance_id: self.read.clone(),
            })
        }
    }

    #[test]
    fn nested_denial_commits_nothing() {
        let engine = engine();
        let shared = start(&engine, &deploy(&engine, None, one_task()));
        let foreign = start(&engine, &deploy(&engine, Some("tenant1"), one_task()));

        login(&engine, "gonzo", &[]);
        let err = engine
            .execute(TouchThenRead {
                touched: shared.id.clone(),
                read: foreign.id.clone(),
            })
            .unwrap_err();
        assert!(err.is_tenant_denial());

        let variables = engine.runtime_service().get_variables(&shared.id).unwrap();
        assert!(!variables.contains_key("touched"));

        engine
            .execute(TouchThenRead {
                touched: shared.id.clone(),
                read: shared.id.clone(),
            })
            .unwrap();
        assert_eq!(
            engine.runtime_service().get_variables(&shared.id).unwrap().get("touched"),
            Some(&json!(true))
        );
    }

    #[test]
    fn cascading_deployment_delete_removes_running_instances() {
        let engine = engine();
        login(&engine, "kermit", &["tenant1"]);
        let definition = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &definition);
        let repository = engine.repository_service();

        let err = repository
            .delete_deployment(&definition.deployment_id, false)
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        login(&engine, "gonzo", &[]);
        assert!(
            repository
                .delete_deployment(&definition.deployment_id, true)
                .unwrap_err()
                .is_tenant_denial()
        );

        login(&engine, "kermit", &["tenant1"]);
        repository.delete_deployment(&definition.deployment_id, true).unwrap();

        assert!(instances(&engine, TenantSelection::any()).is_empty());
        assert!(matches!(
            repository.get_process_definition(&definition.id).unwrap_err(),
            EngineError::NotFound { .. }
        ));
        let historic = engine
            .repositories()
            .historic_process_instances
            .get(&instance.id)
            .unwrap()
            .unwrap();
        assert!(historic.end_time.is_some());
    }

    #[test]
    fn deploying_for_a_foreign_tenant_is_denied() {
        let engine = engine();
        login(&engine, "kermit", &["tenant1"]);

        let err = engine
            .repository_service()
            .deploy("test", Some(TenantId::new("tenant2")), vec![one_task()])
            .unwrap_err();
        assert!(err.is_tenant_denial());
        assert!(err.to_string().starts_with("Cannot create the deployment"));
    }

    #[test]
    fn versions_are_counted_per_key_and_tenant() {
        let engine = engine();
        let first = deploy(&engine, Some("tenant1"), one_task());
        let second = deploy(&engine, Some("tenant1"), one_task());
        let other = deploy(&engine, Some("tenant2"), one_task());

        assert_eq!((first.version, second.version, other.version), (1, 2, 1));

        login(&engine, "kermit", &["tenant1", "tenant2"]);
        let err = engine
            .runtime_service()
            .start_process_instance_by_key("oneTask", TenantSelection::any(), Map::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let started = engine
            .runtime_service()
            .start_process_instance_by_key(
                "oneTask",
                TenantSelection::any().tenant_id_in(["tenant1"]).unwrap(),
                Map::new(),
            )
            .unwrap();
        assert_eq!(started.definition_id, second.id);

        login(&engine, "gonzo", &[]);
        let err = engine
            .runtime_service()
            .start_process_instance_by_key("oneTask", TenantSelection::any(), Map::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tenant id provider
    // ─────────────────────────────────────────────────────────────────────────

    struct FixedTenant(TenantId);

    impl TenantIdProvider for FixedTenant {
        fn provide_tenant_id(&self, _ctx: &TenantIdProviderContext<'_>) -> Option<TenantId> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn provider_assigns_tenant_to_instances_of_shared_definitions_only() {
        tenantgate_observability::init_for_tests();
        let engine = ProcessEngine::new(&EngineConfig::default())
            .with_tenant_id_provider(Arc::new(FixedTenant(TenantId::new("provided"))));

        let shared = deploy(&engine, None, one_task());
        let owned = deploy(&engine, Some("tenant1"), one_task());

        let instance = start(&engine, &shared);
        assert_eq!(instance.tenant_id, Some(TenantId::new("provided")));
        let inherited = start(&engine, &owned);
        assert_eq!(inherited.tenant_id, Some(TenantId::new("tenant1")));

        let tasks = engine
            .task_service()
            .task_query(TaskQuery {
                process_instance_id: Some(instance.id.clone()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].tenant_id, Some(TenantId::new("provided")));

        login(&engine, "gonzo", &[]);
        assert!(
            engine
                .runtime_service()
                .get_variables(&instance.id)
                .unwrap_err()
                .is_tenant_denial()
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tasks, jobs, external tasks and the operation log
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn task_operations_use_their_own_verbs() {
        let engine = engine();
        let tasks = engine.task_service();
        let id = EntityId::new("t1");

        login(&engine, "kermit", &["tenant1"]);
        assert_denied(
            tasks.create_task(&id, "Review", Some(TenantId::new("tenant2"))),
            "Cannot create the task 't1' because it belongs to no authenticated tenant.",
        );
        tasks.create_task(&id, "Review", Some(TenantId::new("tenant1"))).unwrap();
        assert!(matches!(
            tasks.create_task(&id, "Review", None).unwrap_err(),
            EngineError::Conflict(_)
        ));

        tasks.claim(&id, "kermit").unwrap();
        assert!(matches!(tasks.claim(&id, "fozzie").unwrap_err(), EngineError::Conflict(_)));

        login(&engine, "gonzo", &[]);
        assert_denied(
            tasks.set_assignee(&id, Some("gonzo")),
            "Cannot assign the task 't1' because it belongs to no authenticated tenant.",
        );
        assert_denied(
            tasks.complete(&id, Map::new()),
            "Cannot work on the task 't1' because it belongs to no authenticated tenant.",
        );
        assert_denied(
            tasks.delete_task(&id),
            "Cannot delete the task 't1' because it belongs to no authenticated tenant.",
        );

        login(&engine, "kermit", &["tenant1"]);
        tasks.complete(&id, Map::new()).unwrap();
        assert!(matches!(tasks.get_task(&id).unwrap_err(), EngineError::NotFound { .. }));
    }

    #[test]
    fn completing_the_last_task_ends_the_instance() {
        let engine = engine();
        let definition = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &definition);

        login(&engine, "kermit", &["tenant1"]);
        let task = engine
            .task_service()
            .task_query(TaskQuery {
                process_instance_id: Some(instance.id.clone()),
                ..Default::default()
            })
            .unwrap()
            .remove(0);

        let mut variables = Map::new();
        variables.insert("approved".to_string(), json!(true));
        engine.task_service().complete(&task.id, variables).unwrap();

        assert!(instances(&engine, TenantSelection::any()).is_empty());
        let historic = engine
            .history_service()
            .historic_process_instance_query(Default::default())
            .unwrap();
        assert_eq!(historic.len(), 1);
        assert!(historic[0].end_time.is_some());
    }

    #[test]
    fn external_task_completion_checks_the_owning_instance() {
        let engine = engine();
        let model = ProcessModel::new("externalTask").external_task("serviceTask", "topic");
        let definition = deploy(&engine, Some("tenant1"), model);
        let instance = start(&engine, &definition);

        login(&engine, "kermit", &["tenant1"]);
        let external = engine.external_task_service();
        let locked = external
            .fetch_and_lock(1, "worker", "topic", 60_000, TenantSelection::any())
            .unwrap()
            .remove(0);

        login(&engine, "gonzo", &[]);
        assert_denied(
            external.complete(&locked.id, "worker", Map::new()),
            &format!(
                "Cannot update the process instance '{}' because it belongs to no authenticated tenant.",
                instance.id
            ),
        );
        assert!(external.unlock(&locked.id).unwrap_err().is_tenant_denial());
        assert!(external.set_retries(&locked.id, 1).unwrap_err().is_tenant_denial());

        login(&engine, "kermit", &["tenant1"]);
        assert!(matches!(
            external.complete(&locked.id, "other", Map::new()).unwrap_err(),
            EngineError::Conflict(_)
        ));
        external.complete(&locked.id, "worker", Map::new()).unwrap();

        assert!(instances(&engine, TenantSelection::any()).is_empty());
    }

    #[test]
    fn job_updates_check_the_job_or_its_process_definition() {
        let engine = engine();
        let definition = deploy(&engine, Some("tenant1"), ProcessModel::new("timer").timer("timer"));
        start(&engine, &definition);

        let job = engine
            .management_service()
            .job_query(JobQuery::default())
            .unwrap()
            .remove(0);
        engine.management_service().set_job_retries(&job.id, 0).unwrap();
        let job_definition_id = EntityId::new(format!("{}#timer", definition.id));

        login(&engine, "gonzo", &[]);
        let management = engine.management_service();
        assert_denied(
            management.get_job(&job.id),
            &format!("Cannot read the job '{}' because it belongs to no authenticated tenant.", job.id),
        );
        assert_denied(
            management.set_job_priority(&job.id, 10),
            &format!("Cannot update the job '{}' because it belongs to no authenticated tenant.", job.id),
        );
        assert_denied(
            management.set_job_retries_by_job_definition(&job_definition_id, 3),
            &format!(
                "Cannot update the process definition '{}' because it belongs to no authenticated tenant.",
                definition.id
            ),
        );

        engine.set_tenant_check_enabled(false);
        assert_eq!(management.set_job_retries_by_job_definition(&job_definition_id, 3).unwrap(), 1);
        assert_eq!(management.get_job(&job.id).unwrap().retries, 3);
    }

    #[test]
    fn operation_log_entries_belong_to_the_tenant_of_their_entity() {
        let engine = engine();
        let definition = deploy(&engine, Some("tenant1"), one_task());
        let instance = start(&engine, &definition);

        login(&engine, "kermit", &["tenant1"]);
        engine.runtime_service().suspend_process_instance(&instance.id).unwrap();

        let history = engine.history_service();
        let entries = history.operation_log_query(OperationLogQuery::default()).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.operation_type, "Suspend");
        assert_eq!(entry.user_id.as_deref(), Some("kermit"));
        assert_eq!(entry.tenant_id, Some(TenantId::new("tenant1")));

        login(&engine, "gonzo", &[]);
        assert!(history.operation_log_query(OperationLogQuery::default()).unwrap().is_empty());
        assert_denied(
            history.set_annotation_for_operation_log_entry(&entry.id, Some("why")),
            &format!(
                "Cannot update the user operation log entry '{}' because it belongs to no authenticated tenant.",
                entry.id
            ),
        );

        login(&engine, "kermit", &["tenant1"]);
        history
            .set_annotation_for_operation_log_entry(&entry.id, Some("why"))
            .unwrap();
        history.delete_operation_log_entry(&entry.id).unwrap();
        assert!(history.operation_log_query(OperationLogQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn running_instances_have_no_deletable_history() {
        let engine = engine();
        let instance = start(&engine, &deploy(&engine, None, one_task()));
        let history = engine.history_service();

        assert!(matches!(
            history.delete_historic_process_instance(&instance.id).unwrap_err(),
            EngineError::Validation(_)
        ));

        engine
            .runtime_service()
            .delete_process_instance(&instance.id, Some("done"))
            .unwrap();
        history.delete_historic_process_instance(&instance.id).unwrap();
        assert!(
            history
                .historic_process_instance_query(Default::default())
                .unwrap()
                .is_empty()
        );
    }
}
