//! End-to-end incident scenarios over the in-memory log and channel.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use warden_incident::{
    ContainerState, IncidentEngine, IncidentPolicy, MessageRenderer, NetworkState, Observation,
    ResourceState, Transition, UpsState, render_thread,
};
use warden_log::{EventLogStore, FileEventLogStore, LogAction, MemoryEventLogStore};
use warden_notify::{EditFailure, MemoryChannel};
use warden_proto::{CorrelationId, MetricValue, Metrics, ResourceKey, ResourceKind};

struct Harness<S: ResourceState> {
    engine: IncidentEngine<S>,
    store: Arc<MemoryEventLogStore>,
    channel: Arc<MemoryChannel>,
    policy: IncidentPolicy,
}

impl<S: ResourceState> Harness<S> {
    fn new(policy: IncidentPolicy) -> Self {
        let store = Arc::new(MemoryEventLogStore::new());
        let channel = Arc::new(MemoryChannel::new());
        let engine = Self::engine(&policy, &store, &channel);
        Self {
            engine,
            store,
            channel,
            policy,
        }
    }

    fn engine(
        policy: &IncidentPolicy,
        store: &Arc<MemoryEventLogStore>,
        channel: &Arc<MemoryChannel>,
    ) -> IncidentEngine<S> {
        IncidentEngine::new(
            policy.clone(),
            store.clone(),
            channel.clone(),
            MessageRenderer::new("homelab"),
        )
    }

    /// Simulates a process restart: a fresh engine over the same log and channel.
    fn restart(&mut self) {
        self.engine = Self::engine(&self.policy, &self.store, &self.channel);
    }

    fn live_id(&self, key: &ResourceKey) -> Option<CorrelationId> {
        self.engine
            .incident(key)
            .and_then(|incident| incident.correlation_id.clone())
    }
}

fn web() -> ResourceKey {
    ResourceKey::new(ResourceKind::Container, "web")
}

fn container(name: &str, state: ContainerState, at: DateTime<Utc>) -> Observation<ContainerState> {
    Observation::new(ResourceKey::new(ResourceKind::Container, name), state)
        .with_label(name)
        .at(at)
}

fn ups(state: UpsState, charge: f64, at: DateTime<Utc>) -> Observation<UpsState> {
    Observation::new(ResourceKey::new(ResourceKind::Ups, "eaton"), state)
        .with_label("eaton")
        .with_metrics(Metrics::new().with("charge", MetricValue::Value(charge)))
        .at(at)
}

/// Scenarios A, B and C: open, escalate, resolve, reopen.
#[tokio::test]
async fn incident_lifecycle_sends_once_then_edits() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();

    // A: nominal, nominal, problem
    for (i, state) in [ContainerState::Running, ContainerState::Running, ContainerState::Stopped]
        .into_iter()
        .enumerate()
    {
        h.engine
            .observe(container("web", state, t0 + Duration::seconds(i as i64)))
            .await;
    }
    let entries = h.store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].state, "stopped");
    assert_eq!(h.channel.sends().len(), 1);
    assert!(h.channel.edits().is_empty());
    let first = h.live_id(&web()).expect("incident is live");

    // B: problem changes kind
    let t = h
        .engine
        .observe(container("web", ContainerState::Removed, t0 + Duration::seconds(10)))
        .await;
    assert_eq!(t, Transition::Escalate);
    assert_eq!(h.store.len(), 2);
    assert_eq!(h.channel.sends().len(), 1);
    let edits = h.channel.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0, first);

    // C: back to nominal, then a fresh problem
    let t = h
        .engine
        .observe(container("web", ContainerState::Running, t0 + Duration::seconds(70)))
        .await;
    assert_eq!(t, Transition::Resolve);
    let resolved = h.store.latest(&web()).expect("read").expect("entry");
    assert_eq!(resolved.action, LogAction::Resolved);
    assert_eq!(resolved.payload.duration_secs, Some(68));
    assert_eq!(h.channel.edits().len(), 2);
    assert!(h.live_id(&web()).is_none());
    let text = h.channel.message(&first).expect("message");
    assert!(text.contains("🟢 web: running after 1m 8s"));

    h.engine
        .observe(container("web", ContainerState::Stopped, t0 + Duration::seconds(90)))
        .await;
    assert_eq!(h.channel.sends().len(), 2);
    assert_eq!(h.channel.edits().len(), 2);
    let second = h.live_id(&web()).expect("new incident is live");
    assert_ne!(first, second);
}

/// Scenario D: an open incident survives a restart without re-notifying.
#[tokio::test]
async fn restart_resumes_open_incident() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.engine.observe(container("web", ContainerState::Stopped, t0)).await;
    h.engine
        .observe(container("web", ContainerState::Removed, t0 + Duration::seconds(5)))
        .await;
    let id = h.live_id(&web()).expect("live");

    h.restart();
    h.channel.clear_calls();
    let entries_before = h.store.len();

    let t = h
        .engine
        .observe(container("web", ContainerState::Removed, t0 + Duration::seconds(10)))
        .await;
    assert_eq!(t, Transition::Unchanged);
    assert!(h.channel.calls().is_empty());
    assert_eq!(h.store.len(), entries_before);

    let t = h
        .engine
        .observe(container("web", ContainerState::Running, t0 + Duration::seconds(40)))
        .await;
    assert_eq!(t, Transition::Resolve);
    assert!(h.channel.sends().is_empty());
    let edits = h.channel.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0, id);

    // Duration is measured from the original open, not from the restart.
    let resolved = h.store.latest(&web()).expect("read").expect("entry");
    assert_eq!(resolved.payload.duration_secs, Some(40));
}

/// Scenario E: a dead message is abandoned, not retried.
#[tokio::test]
async fn failed_edit_falls_back_to_send() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.engine.observe(container("web", ContainerState::Stopped, t0)).await;
    let dead = h.live_id(&web()).expect("live");
    h.channel.delete(&dead);

    h.engine
        .observe(container("web", ContainerState::Removed, t0 + Duration::seconds(5)))
        .await;
    assert!(h.live_id(&web()).is_none());
    assert_eq!(h.engine.incident(&web()).map(|i| i.last_state), Some(ContainerState::Removed));

    h.engine
        .observe(container("web", ContainerState::Running, t0 + Duration::seconds(9)))
        .await;
    let edits_to_dead = h.channel.edits().into_iter().filter(|(id, _)| *id == dead).count();
    assert_eq!(edits_to_dead, 1);
    let sends = h.channel.sends();
    assert_eq!(sends.len(), 2);
    assert!(sends[1].contains("web: running"));
}

#[tokio::test]
async fn transient_edit_failure_also_abandons_message() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.engine.observe(container("web", ContainerState::Stopped, t0)).await;
    h.channel.fail_next_edit(EditFailure::Transient);

    h.engine
        .observe(container("web", ContainerState::Paused, t0 + Duration::seconds(1)))
        .await;
    assert!(h.live_id(&web()).is_none());

    h.engine
        .observe(container("web", ContainerState::Removed, t0 + Duration::seconds(2)))
        .await;
    assert_eq!(h.channel.sends().len(), 2);
    assert!(h.live_id(&web()).is_some());
}

#[tokio::test]
async fn failed_send_keeps_tracking_and_logs() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.channel.fail_sends(1);

    h.engine.observe(container("web", ContainerState::Stopped, t0)).await;
    assert_eq!(h.engine.incident(&web()).map(|i| i.last_state), Some(ContainerState::Stopped));
    assert!(h.live_id(&web()).is_none());
    let entry = h.store.latest(&web()).expect("read").expect("entry");
    assert!(entry.correlation_id.is_none());

    h.engine
        .observe(container("web", ContainerState::Removed, t0 + Duration::seconds(3)))
        .await;
    assert_eq!(h.channel.sends().len(), 2);
    assert!(h.live_id(&web()).is_some());
}

#[tokio::test]
async fn failed_send_is_retried_on_the_next_sample() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.channel.fail_sends(2);

    let first = h.engine.observe(container("web", ContainerState::Stopped, t0)).await;
    assert_eq!(first, Transition::Open);
    let second = h
        .engine
        .observe(container("web", ContainerState::Stopped, t0 + Duration::seconds(5)))
        .await;
    assert_eq!(second, Transition::Retry);
    assert!(h.live_id(&web()).is_none());

    let third = h
        .engine
        .observe(container("web", ContainerState::Stopped, t0 + Duration::seconds(10)))
        .await;
    assert_eq!(third, Transition::Retry);
    let id = h.live_id(&web()).expect("delivered");
    assert_eq!(h.channel.sends().len(), 3);
    assert_eq!(h.store.latest(&web()).expect("read").expect("entry").correlation_id, Some(id));

    for i in 0..4 {
        let t = h
            .engine
            .observe(container("web", ContainerState::Stopped, t0 + Duration::seconds(15 + i)))
            .await;
        assert_eq!(t, Transition::Unchanged);
    }
    assert_eq!(h.channel.calls().len(), 3);
    assert_eq!(h.store.len(), 3);
}

#[tokio::test]
async fn transient_edit_failure_is_resent_on_the_next_sample() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.engine.observe(container("web", ContainerState::Stopped, t0)).await;
    h.channel.fail_next_edit(EditFailure::Transient);
    h.engine
        .observe(container("web", ContainerState::Paused, t0 + Duration::seconds(1)))
        .await;
    assert!(h.live_id(&web()).is_none());

    let t = h
        .engine
        .observe(container("web", ContainerState::Paused, t0 + Duration::seconds(2)))
        .await;
    assert_eq!(t, Transition::Retry);
    assert_eq!(h.channel.sends().len(), 2);
    assert!(h.channel.sends()[1].contains("web"));
    assert!(h.live_id(&web()).is_some());
}

#[tokio::test]
async fn failed_send_is_retried_after_restart() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.channel.fail_sends(1);
    h.engine.observe(container("web", ContainerState::Stopped, t0)).await;

    h.restart();
    let t = h
        .engine
        .observe(container("web", ContainerState::Stopped, t0 + Duration::seconds(5)))
        .await;
    assert_eq!(t, Transition::Retry);
    assert_eq!(h.channel.sends().len(), 2);
    assert!(h.live_id(&web()).is_some());
}

#[tokio::test]
async fn store_outage_does_not_block_detection() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    h.store.stop();

    let t = h.engine.observe(container("web", ContainerState::Stopped, Utc::now())).await;
    assert_eq!(t, Transition::Open);
    assert!(h.store.is_empty());
    assert_eq!(h.channel.sends().len(), 1);
    assert_eq!(h.engine.incident(&web()).map(|i| i.last_state), Some(ContainerState::Stopped));
}

#[tokio::test]
async fn rendered_thread_matches_live_message() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.engine.observe(container("web", ContainerState::Stopped, t0)).await;
    let id = h.live_id(&web()).expect("live");
    assert_eq!(
        render_thread(h.store.as_ref(), &MessageRenderer::new("homelab"), &id).expect("render"),
        h.channel.message(&id)
    );

    h.engine
        .observe(container("web", ContainerState::Restarting, t0 + Duration::seconds(2)))
        .await;
    h.engine
        .observe(container("web", ContainerState::Running, t0 + Duration::seconds(4)))
        .await;

    let rebuilt = render_thread(h.store.as_ref(), &MessageRenderer::new("homelab"), &id)
        .expect("render")
        .expect("thread");
    assert_eq!(Some(rebuilt.clone()), h.channel.message(&id));

    let stopped = rebuilt.find("web: stopped").expect("opened line");
    let restarting = rebuilt.find("web: restarting").expect("escalated line");
    let running = rebuilt.find("web: running").expect("resolved line");
    assert!(stopped < restarting && restarting < running);
}

#[tokio::test]
async fn same_tick_changes_are_grouped() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    let batch = vec![
        container("api", ContainerState::Stopped, t0).with_group("shop"),
        container("worker", ContainerState::Stopped, t0).with_group("shop"),
        container("redis", ContainerState::Stopped, t0),
    ];
    let outcomes = h.engine.observe_batch(batch).await;
    assert!(outcomes.iter().all(|(_, t)| *t == Transition::Open));

    let sends = h.channel.sends();
    assert_eq!(sends.len(), 2);
    assert!(sends[0].contains("📦 shop") && sends[0].contains("api") && sends[0].contains("worker"));
    assert!(sends[1].contains("redis"));

    let api = ResourceKey::new(ResourceKind::Container, "api");
    let worker = ResourceKey::new(ResourceKind::Container, "worker");
    let shared = h.live_id(&api).expect("api live");
    assert_eq!(h.live_id(&worker), Some(shared.clone()));

    h.engine
        .observe(container("api", ContainerState::Running, t0 + Duration::seconds(30)).with_group("shop"))
        .await;
    let text = h.channel.message(&shared).expect("message");
    assert!(text.contains("🟢 api: running"));
    assert!(text.contains("🔴 worker: stopped"));
    assert_eq!(h.live_id(&worker), Some(shared));
    assert!(h.live_id(&api).is_none());
}

#[tokio::test]
async fn reconciliation_reports_missing_containers_once() {
    let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
    let t0 = Utc::now();
    h.engine
        .observe_batch(vec![
            container("api", ContainerState::Running, t0),
            container("db", ContainerState::Running, t0),
        ])
        .await;
    assert!(h.channel.calls().is_empty());

    let listing = vec![container("api", ContainerState::Running, t0 + Duration::seconds(10))];
    let outcomes = h.engine.reconcile(listing.clone(), ContainerState::Removed).await;
    let db = ResourceKey::new(ResourceKind::Container, "db");
    assert!(outcomes.contains(&(db.clone(), Transition::Open)));
    assert_eq!(h.channel.sends().len(), 1);
    assert!(h.channel.sends()[0].contains("⚫ db: removed"));

    h.engine.reconcile(listing, ContainerState::Removed).await;
    assert_eq!(h.channel.sends().len(), 1);
    assert!(h.channel.edits().is_empty());
}

#[tokio::test]
async fn network_outage_is_reported_on_restore_only() {
    let mut h = Harness::<NetworkState>::new(IncidentPolicy::network());
    let key = ResourceKey::singleton(ResourceKind::Network);
    let t0 = Utc::now();

    let t = h.engine.observe(Observation::new(key.clone(), NetworkState::Down).at(t0)).await;
    assert_eq!(t, Transition::Open);
    assert!(h.channel.calls().is_empty());
    assert_eq!(h.store.len(), 1);

    let t = h
        .engine
        .observe(Observation::new(key.clone(), NetworkState::Up).at(t0 + Duration::seconds(185)))
        .await;
    assert_eq!(t, Transition::Resolve);
    let sends = h.channel.sends();
    assert_eq!(sends.len(), 1);
    assert!(sends[0].starts_with("🌐 homelab network"));
    assert!(sends[0].contains("connection restored after 3m 5s"));
    assert!(sends[0].contains(" → "));
    assert!(h.live_id(&key).is_none());
}

#[tokio::test]
async fn ups_thread_lingers_until_fully_charged() {
    let mut h = Harness::<UpsState>::new(IncidentPolicy::ups(Duration::seconds(60)));
    let key = ResourceKey::new(ResourceKind::Ups, "eaton");
    let t0 = Utc::now();
    let at = |secs: i64| t0 + Duration::seconds(secs);

    assert_eq!(h.engine.observe(ups(UpsState::Online, 100.0, at(0))).await, Transition::Unchanged);
    assert_eq!(h.engine.observe(ups(UpsState::OnBattery, 90.0, at(5))).await, Transition::Open);
    let id = h.live_id(&key).expect("live");

    assert_eq!(h.engine.observe(ups(UpsState::OnBattery, 85.0, at(35))).await, Transition::Unchanged);
    assert_eq!(h.engine.observe(ups(UpsState::OnBattery, 80.0, at(65))).await, Transition::Refresh);
    assert_eq!(h.engine.observe(ups(UpsState::OnBattery, 75.0, at(130))).await, Transition::Refresh);
    let text = h.channel.message(&id).expect("message");
    assert_eq!(text.matches("charge").count(), 2, "samples collapse: {text}");
    assert!(text.contains("charge 75% for 2m 5s"));

    assert_eq!(h.engine.observe(ups(UpsState::Online, 76.0, at(140))).await, Transition::Resolve);
    assert_eq!(h.live_id(&key), Some(id.clone()));

    // Power drops again before the battery refilled: same message.
    assert_eq!(h.engine.observe(ups(UpsState::OnBattery, 77.0, at(150))).await, Transition::Reopen);
    assert_eq!(h.channel.sends().len(), 1);
    assert_eq!(h.engine.observe(ups(UpsState::Online, 78.0, at(160))).await, Transition::Resolve);

    assert_eq!(h.engine.observe(ups(UpsState::Online, 99.0, at(900))).await, Transition::Unchanged);
    assert_eq!(h.engine.observe(ups(UpsState::Online, 100.0, at(960))).await, Transition::Saturate);
    assert!(h.live_id(&key).is_none());
    assert!(h.channel.message(&id).expect("message").contains("battery fully charged"));

    assert_eq!(h.engine.observe(ups(UpsState::OnBattery, 100.0, at(1000))).await, Transition::Open);
    assert_eq!(h.channel.sends().len(), 2);
    assert_ne!(h.live_id(&key), Some(id));
}

#[tokio::test]
async fn ups_lingering_thread_survives_restart() {
    let mut h = Harness::<UpsState>::new(IncidentPolicy::ups(Duration::seconds(60)));
    let key = ResourceKey::new(ResourceKind::Ups, "eaton");
    let t0 = Utc::now();
    h.engine.observe(ups(UpsState::OnBattery, 60.0, t0)).await;
    h.engine.observe(ups(UpsState::Online, 61.0, t0 + Duration::seconds(30))).await;
    let id = h.live_id(&key).expect("live");

    h.restart();
    assert_eq!(h.engine.recover_all().expect("recover"), 1);
    assert_eq!(h.live_id(&key), Some(id.clone()));

    h.engine.observe(ups(UpsState::OnBattery, 62.0, t0 + Duration::seconds(40))).await;
    assert_eq!(h.channel.sends().len(), 1);
    assert_eq!(h.channel.edits().last().map(|(e, _)| e.clone()), Some(id));
}

#[tokio::test]
async fn stale_incident_gets_a_fresh_message() {
    let policy = IncidentPolicy::container().with_stale_after(Some(Duration::hours(1)));
    let mut h = Harness::<ContainerState>::new(policy);
    let t0 = Utc::now() - Duration::hours(5);
    h.engine.observe(container("web", ContainerState::Stopped, t0)).await;

    h.restart();
    h.engine
        .observe(container("web", ContainerState::Removed, Utc::now()))
        .await;
    assert_eq!(h.channel.sends().len(), 2);
    assert!(h.channel.edits().is_empty());
}

#[tokio::test]
async fn recovery_from_file_log_across_restarts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let channel = Arc::new(MemoryChannel::new());
    let t0 = Utc::now();
    let open = || -> IncidentEngine<ContainerState> {
        let store = Arc::new(FileEventLogStore::with_base_dir(dir.path()).expect("open log"));
        IncidentEngine::new(
            IncidentPolicy::container(),
            store,
            channel.clone(),
            MessageRenderer::new("homelab"),
        )
    };

    let mut engine = open();
    engine.observe(container("web", ContainerState::Stopped, t0)).await;
    let id = engine
        .incident(&web())
        .and_then(|i| i.correlation_id.clone())
        .expect("live");
    drop(engine);

    let mut engine = open();
    assert_eq!(engine.recover_all().expect("recover"), 1);
    let t = engine
        .observe(container("web", ContainerState::Stopped, t0 + Duration::seconds(5)))
        .await;
    assert_eq!(t, Transition::Unchanged);
    let t = engine
        .observe(container("web", ContainerState::Running, t0 + Duration::seconds(20)))
        .await;
    assert_eq!(t, Transition::Resolve);

    assert_eq!(channel.sends().len(), 1);
    assert_eq!(channel.edits().len(), 1);
    let text = channel.message(&id).expect("message");
    assert!(text.contains("web: running after 20s"));
}

fn any_container_state() -> impl Strategy<Value = ContainerState> {
    proptest::sample::select(ContainerState::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn samples_drive_log_and_channel_consistently(
        states in proptest::collection::vec(any_container_state(), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        rt.block_on(async {
            let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
            let t0 = Utc::now();
            let mut last = ContainerState::NOMINAL;
            let mut opens = 0;

            for (i, state) in states.iter().copied().enumerate() {
                let writes = h.store.len();
                let calls = h.channel.calls().len();
                h.engine
                    .observe(container("web", state, t0 + Duration::seconds(i as i64)))
                    .await;

                if state == last {
                    prop_assert_eq!(h.store.len(), writes);
                    prop_assert_eq!(h.channel.calls().len(), calls);
                }
                if last.is_nominal() && !state.is_nominal() {
                    opens += 1;
                }
                let incident = h.engine.incident(&web()).expect("tracked");
                prop_assert_eq!(incident.correlation_id.is_some(), !state.is_nominal());
                last = state;
            }

            prop_assert_eq!(h.channel.sends().len(), opens);
            Ok(())
        })?;
    }

    #[test]
    fn recovery_never_resends_an_open_incident(
        states in proptest::collection::vec(any_container_state(), 1..20)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        rt.block_on(async {
            let mut h = Harness::<ContainerState>::new(IncidentPolicy::container());
            let t0 = Utc::now();
            for (i, state) in states.iter().copied().enumerate() {
                h.engine
                    .observe(container("web", state, t0 + Duration::seconds(i as i64)))
                    .await;
            }
            let before = h.engine.incident(&web()).cloned();

            h.restart();
            let first = h.engine.recover(&web()).clone();
            h.restart();
            let second = h.engine.recover(&web()).clone();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(before.map(|i| i.correlation_id), Some(first.correlation_id.clone()));

            let sends = h.channel.sends().len();
            let last = states.last().copied().unwrap_or(ContainerState::NOMINAL);
            h.engine
                .observe(container("web", last, t0 + Duration::seconds(100)))
                .await;
            prop_assert_eq!(h.channel.sends().len(), sends);
            Ok(())
        })?;
    }
}
