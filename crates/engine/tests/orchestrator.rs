//! End-to-end executions against a scripted backend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use keyshift_automation::{
    Account, Asset, Automation, AutomationKind, AutomationRegistry, ChangeSecretConfig,
    MemoryInventory, Scope, SshKeyChangeStrategy,
};
use keyshift_core::{AssetId, ExecutionId, OrgContext, OrgId, SecretString};
use keyshift_engine::{
    BackendError, EngineError, ExecutionBackend, ExecutionOutcome, MergePolicy, NotificationSink,
    NotifyError, OrchestratorConfig, RotationEvent, RotationOrchestrator, TriggerEvent,
};
use keyshift_execution::{
    ExecutionLedger, ExecutionStatus, MemoryLedger, RecordStatus, TriggerKind,
};
use keyshift_secret::{PasswordRules, SecretCodec, SecretType};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::{Notify, mpsc};

/// Backend whose behavior per username is set up front.
#[derive(Default)]
struct ScriptedBackend {
    current: Mutex<HashMap<String, SecretString>>,
    capture_failures: HashMap<String, BackendError>,
    push_failures: HashMap<String, BackendError>,
    push_delay: Option<Duration>,
    /// `(entered, release)`: each push signals `entered` and waits for `release`.
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
    pushes: Mutex<Vec<(String, MergePolicy)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    fn seeded(usernames: &[&str]) -> Self {
        let current = usernames
            .iter()
            .map(|u| ((*u).to_owned(), SecretString::new(format!("old-{u}"))))
            .collect();
        Self {
            current: Mutex::new(current),
            ..Self::default()
        }
    }

    fn fail_capture(mut self, username: &str, err: BackendError) -> Self {
        self.capture_failures.insert(username.to_owned(), err);
        self
    }

    fn fail_push(mut self, username: &str, err: BackendError) -> Self {
        self.push_failures.insert(username.to_owned(), err);
        self
    }

    fn slow_push(mut self, delay: Duration) -> Self {
        self.push_delay = Some(delay);
        self
    }

    fn gated(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some((entered, release));
        self
    }

    fn secret_of(&self, username: &str) -> Option<SecretString> {
        self.current.lock().get(username).cloned()
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn capture_secret(&self, account: &Account) -> Result<SecretString, BackendError> {
        if let Some(err) = self.capture_failures.get(&account.username) {
            return Err(err.clone());
        }
        self.secret_of(&account.username)
            .ok_or_else(|| BackendError::Unreachable(format!("unknown account {}", account.username)))
    }

    async fn push_secret(
        &self,
        account: &Account,
        secret: &SecretString,
        policy: MergePolicy,
    ) -> Result<(), BackendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        if let Some(delay) = self.push_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.pushes.lock().push((account.username.clone(), policy));
        if let Some(err) = self.push_failures.get(&account.username) {
            return Err(err.clone());
        }
        self.current
            .lock()
            .insert(account.username.clone(), secret.clone());
        Ok(())
    }
}

struct Fixture {
    ctx: OrgContext,
    registry: Arc<AutomationRegistry>,
    inventory: Arc<MemoryInventory>,
    ledger: Arc<MemoryLedger>,
    asset: AssetId,
}

impl Fixture {
    fn new(usernames: &[&str]) -> Self {
        let inventory = Arc::new(MemoryInventory::new());
        let asset = inventory.add_asset(Asset::new("db01", "10.0.0.5"));
        for username in usernames {
            inventory.add_account(Account::new(asset, *username));
        }
        Self {
            ctx: OrgContext::new(OrgId::v4(), "alice"),
            registry: Arc::new(AutomationRegistry::new()),
            inventory,
            ledger: Arc::new(MemoryLedger::new(Arc::new(SecretCodec::ephemeral()))),
            asset,
        }
    }

    fn automation(&self, config: ChangeSecretConfig) -> Automation {
        let automation = Automation::change_secret(self.ctx.org_id(), "rotate db01", config)
            .with_scope(Scope::all_accounts().with_assets([self.asset]))
            .created_by("alice");
        self.registry.insert(automation.clone()).unwrap();
        automation
    }

    fn orchestrator(&self, backend: Arc<ScriptedBackend>) -> RotationOrchestrator {
        self.orchestrator_with(backend, OrchestratorConfig::default(), Vec::new())
    }

    fn orchestrator_with(
        &self,
        backend: Arc<ScriptedBackend>,
        config: OrchestratorConfig,
        sinks: Vec<Arc<dyn NotificationSink>>,
    ) -> RotationOrchestrator {
        let mut builder = RotationOrchestrator::builder(
            Arc::clone(&self.registry),
            self.inventory.clone(),
            self.ledger.clone(),
            backend,
        )
        .config(config);
        for sink in sinks {
            builder = builder.sink(sink);
        }
        builder.build().unwrap()
    }

    fn statuses(&self, execution_id: ExecutionId) -> Vec<(String, RecordStatus)> {
        let mut out: Vec<_> = self
            .ledger
            .records(&self.ctx, execution_id)
            .unwrap()
            .into_iter()
            .map(|r| (r.username, r.status))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

fn random_all() -> ChangeSecretConfig {
    ChangeSecretConfig::random_all(PasswordRules::default())
}

#[tokio::test]
async fn every_record_succeeds() {
    let users = ["admin", "backup", "root"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(ScriptedBackend::seeded(&users));
    let automation = fx.automation(random_all());
    let orchestrator = fx.orchestrator(backend.clone());

    let id = orchestrator
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    let execution = fx.ledger.execution(&fx.ctx, id).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    assert_eq!(execution.trigger, TriggerKind::Manual);
    assert!(execution.date_start.is_some());
    assert!(execution.date_finished.is_some());

    let mut new_secrets = HashSet::new();
    for record in fx.ledger.records(&fx.ctx, id).unwrap() {
        assert_eq!(record.status, RecordStatus::Succeeded);
        assert_eq!(record.error, None);
        let revealed = fx.ledger.reveal(&fx.ctx, record.id).unwrap();
        assert_eq!(
            revealed.old_secret,
            Some(SecretString::new(format!("old-{}", record.username)))
        );
        let new_secret = revealed.new_secret.unwrap();
        assert_eq!(backend.secret_of(&record.username), Some(new_secret.clone()));
        new_secrets.insert(new_secret.expose_secret(str::to_owned));
    }
    assert_eq!(new_secrets.len(), 3);

    let again = orchestrator.finalize(&fx.ctx, id).await.unwrap();
    assert!(!again.changed);
    assert_eq!(again.status, ExecutionStatus::Succeeded);
    assert!(orchestrator.running_executions(None).is_empty());
}

#[tokio::test]
async fn one_push_failure_is_partial() {
    let users = ["admin", "root"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(
        ScriptedBackend::seeded(&users).fail_push("admin", BackendError::Rejected("denied".into())),
    );
    let automation = fx.automation(random_all());

    let id = fx
        .orchestrator(backend)
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    assert_eq!(fx.ledger.execution(&fx.ctx, id).unwrap().status, ExecutionStatus::Partial);
    assert_eq!(
        fx.statuses(id),
        vec![
            ("admin".to_owned(), RecordStatus::Failed),
            ("root".to_owned(), RecordStatus::Succeeded),
        ]
    );

    let failed = fx
        .ledger
        .records(&fx.ctx, id)
        .unwrap()
        .into_iter()
        .find(|r| r.username == "admin")
        .unwrap();
    assert_eq!(failed.error.as_deref(), Some("rejected: denied"));
    // Captured before the push was rejected.
    let revealed = fx.ledger.reveal(&fx.ctx, failed.id).unwrap();
    assert_eq!(revealed.old_secret, Some(SecretString::new("old-admin")));
    assert!(revealed.new_secret.is_some());
}

#[tokio::test]
async fn capture_failures_everywhere_fail_the_execution() {
    let users = ["admin", "root"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(
        ScriptedBackend::seeded(&users)
            .fail_capture("admin", BackendError::Unreachable("no route".into()))
            .fail_capture("root", BackendError::Unreachable("no route".into())),
    );
    let automation = fx.automation(random_all());

    let id = fx
        .orchestrator(backend.clone())
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    assert_eq!(fx.ledger.execution(&fx.ctx, id).unwrap().status, ExecutionStatus::Failed);
    for record in fx.ledger.records(&fx.ctx, id).unwrap() {
        assert_eq!(record.error.as_deref(), Some("unreachable: no route"));
        let revealed = fx.ledger.reveal(&fx.ctx, record.id).unwrap();
        assert!(revealed.old_secret.is_none());
        assert!(revealed.new_secret.is_none());
    }
    assert!(backend.pushes.lock().is_empty());
}

#[tokio::test]
async fn empty_scope_creates_nothing() {
    let fx = Fixture::new(&["root"]);
    let automation = Automation::change_secret(fx.ctx.org_id(), "nobody", random_all())
        .with_scope(Scope::default().with_accounts(["ghost"]).with_assets([fx.asset]));
    fx.registry.insert(automation.clone()).unwrap();

    let err = fx
        .orchestrator(Arc::new(ScriptedBackend::default()))
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap_err();

    assert!(err.is_empty_scope(), "{err}");
    assert!(fx.ledger.executions_for(&fx.ctx, automation.id).is_empty());
}

#[tokio::test]
async fn random_one_shares_a_secret_and_specific_uses_the_given_one() {
    let users = ["admin", "backup", "root"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(ScriptedBackend::seeded(&users));
    let orchestrator = fx.orchestrator(backend);

    let shared = fx.automation(ChangeSecretConfig::random_one(PasswordRules::default()));
    let id = orchestrator
        .on_trigger(&fx.ctx, TriggerEvent::manual(shared.id))
        .await
        .unwrap();
    let secrets: HashSet<String> = fx
        .ledger
        .records(&fx.ctx, id)
        .unwrap()
        .iter()
        .map(|r| {
            fx.ledger
                .reveal(&fx.ctx, r.id)
                .unwrap()
                .new_secret
                .unwrap()
                .expose_secret(str::to_owned)
        })
        .collect();
    assert_eq!(secrets.len(), 1);

    let specific = Automation::change_secret(
        fx.ctx.org_id(),
        "fixed",
        ChangeSecretConfig::specific("Correct-Horse-9"),
    )
    .with_scope(Scope::all_accounts().with_assets([fx.asset]));
    fx.registry.insert(specific.clone()).unwrap();
    let id = orchestrator
        .on_trigger(&fx.ctx, TriggerEvent::manual(specific.id))
        .await
        .unwrap();
    for record in fx.ledger.records(&fx.ctx, id).unwrap() {
        let revealed = fx.ledger.reveal(&fx.ctx, record.id).unwrap();
        assert_eq!(revealed.new_secret, Some(SecretString::new("Correct-Horse-9")));
    }
}

#[tokio::test(start_paused = true)]
async fn slow_push_times_out_on_the_record() {
    let users = ["root"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(ScriptedBackend::seeded(&users).slow_push(Duration::from_secs(5)));
    let automation = fx.automation(random_all());
    let config = OrchestratorConfig {
        record_timeout: Duration::from_millis(50),
        ..OrchestratorConfig::default()
    };

    let id = fx
        .orchestrator_with(backend, config, Vec::new())
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    let record = fx.ledger.records(&fx.ctx, id).unwrap().remove(0);
    assert_eq!(record.status, RecordStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("timed out after 50ms"));
    assert_eq!(fx.ledger.execution(&fx.ctx, id).unwrap().status, ExecutionStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_bounded() {
    let users = ["a1", "a2", "a3", "a4", "a5", "a6"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(ScriptedBackend::seeded(&users).slow_push(Duration::from_millis(10)));
    let automation = fx.automation(random_all());
    let config = OrchestratorConfig {
        max_concurrency: 2,
        ..OrchestratorConfig::default()
    };

    let id = fx
        .orchestrator_with(backend.clone(), config, Vec::new())
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    assert_eq!(fx.ledger.execution(&fx.ctx, id).unwrap().status, ExecutionStatus::Succeeded);
    assert_eq!(backend.pushes.lock().len(), 6);
    assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn cancel_stops_pending_records() {
    let users = ["admin", "backup", "root"];
    let fx = Fixture::new(&users);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let backend = Arc::new(ScriptedBackend::seeded(&users).gated(entered.clone(), release.clone()));
    let automation = fx.automation(random_all());
    let config = OrchestratorConfig {
        max_concurrency: 1,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Arc::new(fx.orchestrator_with(backend, config, Vec::new()));

    let run = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        let ctx = fx.ctx.clone();
        let event = TriggerEvent::manual(automation.id);
        async move { orchestrator.on_trigger(&ctx, event).await }
    });

    entered.notified().await;
    let running = orchestrator.running_executions(Some(automation.id));
    assert_eq!(running.len(), 1);
    assert!(orchestrator.cancel(running[0]));
    release.notify_one();

    let id = run.await.unwrap().unwrap();
    assert_eq!(id, running[0]);
    assert_eq!(fx.ledger.execution(&fx.ctx, id).unwrap().status, ExecutionStatus::Partial);

    let records = fx.ledger.records(&fx.ctx, id).unwrap();
    let cancelled: Vec<_> = records
        .iter()
        .filter(|r| r.status == RecordStatus::Failed)
        .collect();
    assert_eq!(cancelled.len(), 2);
    for record in cancelled {
        assert_eq!(
            record.error.as_deref(),
            Some("cancelled: execution cancelled before dispatch")
        );
    }
    assert!(!orchestrator.cancel(id));
}

#[tokio::test]
async fn deactivate_cancels_running_executions() {
    let users = ["admin", "root"];
    let fx = Fixture::new(&users);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let backend = Arc::new(ScriptedBackend::seeded(&users).gated(entered.clone(), release.clone()));
    let automation = fx.automation(random_all());
    let config = OrchestratorConfig {
        max_concurrency: 1,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Arc::new(fx.orchestrator_with(backend, config, Vec::new()));

    let run = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        let ctx = fx.ctx.clone();
        let event = TriggerEvent::manual(automation.id);
        async move { orchestrator.on_trigger(&ctx, event).await }
    });

    entered.notified().await;
    assert_eq!(orchestrator.deactivate(&fx.ctx, automation.id).unwrap(), 1);
    release.notify_one();
    let id = run.await.unwrap().unwrap();
    assert_eq!(fx.ledger.execution(&fx.ctx, id).unwrap().status, ExecutionStatus::Partial);

    let err = orchestrator
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AutomationInactive(a) if a == automation.id));
    assert_eq!(fx.ledger.executions_for(&fx.ctx, automation.id).len(), 1);
}

struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn notify(&self, _outcome: &ExecutionOutcome) -> Result<(), NotifyError> {
        Err(NotifyError("smtp down".into()))
    }
}

struct ChannelSink(mpsc::UnboundedSender<ExecutionOutcome>);

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn notify(&self, outcome: &ExecutionOutcome) -> Result<(), NotifyError> {
        self.0
            .send(outcome.clone())
            .map_err(|e| NotifyError(e.to_string()))
    }
}

#[tokio::test]
async fn failing_sink_does_not_change_the_outcome() {
    let users = ["root"];
    let fx = Fixture::new(&users);
    let automation = fx.automation(random_all().with_recipients(["secops"]));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(FailingSink), Arc::new(ChannelSink(tx))];
    let orchestrator = fx.orchestrator_with(
        Arc::new(ScriptedBackend::seeded(&users)),
        OrchestratorConfig::default(),
        sinks,
    );

    let id = orchestrator
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();
    assert_eq!(fx.ledger.execution(&fx.ctx, id).unwrap().status, ExecutionStatus::Succeeded);

    let outcome = rx.recv().await.unwrap();
    assert_eq!(outcome.execution_id, id);
    assert_eq!(outcome.status, ExecutionStatus::Succeeded);
    assert_eq!(outcome.recipients, vec!["secops".to_owned()]);
    assert_eq!(outcome.automation_name, "rotate db01");

    // Finalizing again does not notify twice.
    orchestrator.finalize(&fx.ctx, id).await.unwrap();
    tokio::task::yield_now().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn other_kinds_and_other_orgs_are_rejected() {
    let fx = Fixture::new(&["root"]);
    let orchestrator = fx.orchestrator(Arc::new(ScriptedBackend::seeded(&["root"])));

    let gather = Automation::new(fx.ctx.org_id(), "facts", AutomationKind::GatherFacts);
    fx.registry.insert(gather.clone()).unwrap();
    let err = orchestrator
        .on_trigger(&fx.ctx, TriggerEvent::manual(gather.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedKind { .. }), "{err}");

    let automation = fx.automation(random_all());
    let stranger = OrgContext::new(OrgId::v4(), "mallory");
    let err = orchestrator
        .on_trigger(&stranger, TriggerEvent::manual(automation.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Automation(_)), "{err}");
    assert!(fx.ledger.executions_for(&fx.ctx, automation.id).is_empty());
}

#[tokio::test]
async fn ssh_rotations_pass_the_key_strategy_to_the_backend() {
    let fx = Fixture::new(&[]);
    fx.inventory
        .add_account(Account::new(fx.asset, "deploy").with_secret_type(SecretType::SshKey));
    fx.inventory.add_account(Account::new(fx.asset, "root"));
    let backend = Arc::new(ScriptedBackend::seeded(&["deploy", "root"]));
    let automation = fx.automation(
        random_all()
            .with_secret_type(SecretType::SshKey)
            .with_ssh_key_strategy(SshKeyChangeStrategy::SetJms),
    );

    let id = fx
        .orchestrator(backend.clone())
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    assert_eq!(fx.statuses(id), vec![("deploy".to_owned(), RecordStatus::Succeeded)]);
    assert_eq!(
        *backend.pushes.lock(),
        vec![(
            "deploy".to_owned(),
            MergePolicy::AuthorizedKeys(SshKeyChangeStrategy::SetJms)
        )]
    );
}

#[tokio::test]
async fn snapshot_survives_later_edits() {
    let users = ["root"];
    let fx = Fixture::new(&users);
    let automation = fx.automation(random_all());
    let id = fx
        .orchestrator(Arc::new(ScriptedBackend::seeded(&users)))
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    fx.registry
        .update(&fx.ctx, automation.id, |a| {
            a.name = "renamed".into();
            if let AutomationKind::ChangeSecret(config) = &mut a.kind {
                config.password_rules = PasswordRules::default().with_length(40);
            }
        })
        .unwrap();

    let execution = fx.ledger.execution(&fx.ctx, id).unwrap();
    assert_eq!(execution.snapshot.name(), Some("rotate db01"));
    let pinned = execution.snapshot.to_automation().unwrap();
    assert_eq!(pinned.as_change_secret().unwrap().password_rules.length, 16);
    assert_eq!(fx.registry.get(&fx.ctx, automation.id).unwrap().name, "renamed");
}

#[tokio::test]
async fn lifecycle_events_are_broadcast() {
    let users = ["admin", "root"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(
        ScriptedBackend::seeded(&users).fail_push("admin", BackendError::Rejected("denied".into())),
    );
    let automation = fx.automation(random_all());
    let orchestrator = fx.orchestrator(backend);
    let mut events = orchestrator.events().subscribe();

    let id = orchestrator
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Some(event) = events.try_recv() {
        assert_eq!(event.execution_id(), id);
        seen.push(event);
    }
    assert_eq!(seen.len(), 4);
    assert_eq!(
        seen.first(),
        Some(&RotationEvent::ExecutionStarted {
            execution_id: id,
            automation_id: automation.id,
            records: 2
        })
    );
    assert_eq!(
        seen.last(),
        Some(&RotationEvent::ExecutionFinalized {
            execution_id: id,
            status: ExecutionStatus::Partial
        })
    );
}

#[tokio::test]
async fn dropped_trigger_settles_its_execution() {
    let users = ["admin", "root"];
    let fx = Fixture::new(&users);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let backend = Arc::new(ScriptedBackend::seeded(&users).gated(entered.clone(), release));
    let automation = fx.automation(random_all());
    let orchestrator = Arc::new(fx.orchestrator(backend));

    let run = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        let ctx = fx.ctx.clone();
        let event = TriggerEvent::manual(automation.id);
        async move { orchestrator.on_trigger(&ctx, event).await }
    });
    entered.notified().await;
    run.abort();
    assert!(run.await.unwrap_err().is_cancelled());

    assert!(orchestrator.running_executions(None).is_empty());
    assert!(!orchestrator.is_running(automation.id));

    let execution = fx.ledger.executions_for(&fx.ctx, automation.id).remove(0);
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.date_finished.is_some());
    for record in fx.ledger.records(&fx.ctx, execution.id).unwrap() {
        assert_eq!(record.status, RecordStatus::Failed);
        assert!(record.error.unwrap().starts_with("aborted:"));
    }
}

#[tokio::test]
async fn second_of_three_failing_is_partial() {
    let users = ["a1", "a2", "a3"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(
        ScriptedBackend::seeded(&users).fail_push("a2", BackendError::Rejected("denied".into())),
    );
    let automation = fx.automation(random_all());

    let id = fx
        .orchestrator(backend)
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    assert_eq!(fx.ledger.execution(&fx.ctx, id).unwrap().status, ExecutionStatus::Partial);
    assert_eq!(
        fx.statuses(id),
        vec![
            ("a1".to_owned(), RecordStatus::Succeeded),
            ("a2".to_owned(), RecordStatus::Failed),
            ("a3".to_owned(), RecordStatus::Succeeded),
        ]
    );
}

#[rstest::rstest]
#[case::random_one(ChangeSecretConfig::random_one(PasswordRules::default()), 1)]
#[case::random_all(random_all(), 5)]
#[tokio::test]
async fn strategies_over_five_targets(#[case] config: ChangeSecretConfig, #[case] distinct: usize) {
    let users = ["u1", "u2", "u3", "u4", "u5"];
    let fx = Fixture::new(&users);
    let backend = Arc::new(ScriptedBackend::seeded(&users));
    let automation = fx.automation(config);

    let id = fx
        .orchestrator(backend.clone())
        .on_trigger(&fx.ctx, TriggerEvent::manual(automation.id))
        .await
        .unwrap();

    let records = fx.ledger.records(&fx.ctx, id).unwrap();
    assert_eq!(records.len(), 5);
    let secrets: HashSet<String> = records
        .iter()
        .map(|r| {
            let new_secret = fx.ledger.reveal(&fx.ctx, r.id).unwrap().new_secret.unwrap();
            assert_eq!(backend.secret_of(&r.username), Some(new_secret.clone()));
            new_secret.expose_secret(str::to_owned)
        })
        .collect();
    assert_eq!(secrets.len(), distinct);
}
