use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, Notify};
use tokio::time::{sleep, timeout, Instant};

use crate::config::MonitorConfig;
use crate::equipment::{EquipmentGroup, EquipmentService};
use crate::feed::{FeedEvent, FeedPublisher};
use crate::probe::{ProbeError, ProbeOutcome, Prober};
use crate::registry::ServiceRegistry;
use crate::sink::PropagationSink;
use crate::snapshot::ServiceSnapshot;
use crate::status::HealthStatus;
use crate::store::{EquipmentStore, MemoryEquipmentStore, StoreError};

/// Plays back a fixed list of results, then repeats `fallback`.
struct ScriptedProber {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicUsize,
}

impl ScriptedProber {
    fn new(script: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    fn always_up() -> Self {
        Self::new(Vec::new(), true)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _hostname: &str) -> Result<ProbeOutcome, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(self.fallback);
        Ok(if next {
            ProbeOutcome::reachable(4.0)
        } else {
            ProbeOutcome::unreachable()
        })
    }
}

/// Signals when a probe starts and never finishes on its own.
struct StuckProber {
    started: Arc<Notify>,
}

#[async_trait]
impl Prober for StuckProber {
    async fn probe(&self, _hostname: &str) -> Result<ProbeOutcome, ProbeError> {
        self.started.notify_one();
        std::future::pending::<()>().await;
        Ok(ProbeOutcome::reachable(1.0))
    }
}

/// Answers correctly, but only after `delay` on every lookup.
struct SlowStore {
    inner: MemoryEquipmentStore,
    delay: Duration,
}

#[async_trait]
impl EquipmentStore for SlowStore {
    async fn find_group_by_service(
        &self,
        service_id: &str,
    ) -> Result<Option<EquipmentGroup>, StoreError> {
        sleep(self.delay).await;
        self.inner.find_group_by_service(service_id).await
    }

    async fn update_group(&self, group: &EquipmentGroup) -> Result<(), StoreError> {
        self.inner.update_group(group).await
    }

    async fn list_groups(&self) -> Result<Vec<EquipmentGroup>, StoreError> {
        self.inner.list_groups().await
    }
}

fn alpha_group() -> EquipmentGroup {
    let mut group = EquipmentGroup::new("grp-1", "Alpha");
    group
        .services
        .push(EquipmentService::new("svc-1", "NIPR", "Email"));
    group
}

struct Harness {
    registry: ServiceRegistry,
    store: Arc<MemoryEquipmentStore>,
    rx: broadcast::Receiver<FeedEvent>,
}

fn harness(prober: Arc<dyn Prober>) -> Harness {
    let store = Arc::new(MemoryEquipmentStore::new(vec![alpha_group()]));
    let feed = FeedPublisher::new(4096);
    let rx = feed.subscribe();
    let sink = PropagationSink::new(Arc::new(feed), store.clone());
    Harness {
        registry: ServiceRegistry::new(prober, sink),
        store,
        rx,
    }
}

fn fast_config(service_id: &str, hostname: &str) -> MonitorConfig {
    MonitorConfig {
        service_id: service_id.to_string(),
        hostname: hostname.to_string(),
        initial_interval: Duration::from_millis(2),
        target_interval: Duration::from_millis(25),
        window_size: 10,
        error_tolerance: 5,
    }
}

fn drain(rx: &mut broadcast::Receiver<FeedEvent>) -> Vec<FeedEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

fn pongs(events: &[FeedEvent]) -> Vec<&ServiceSnapshot> {
    events
        .iter()
        .filter_map(|e| match e {
            FeedEvent::Pong(snapshot) => Some(snapshot),
            _ => None,
        })
        .collect()
}

async fn wait_until(
    registry: &ServiceRegistry,
    id: &str,
    what: &str,
    accept: impl Fn(&ServiceSnapshot) -> bool,
) -> ServiceSnapshot {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(snapshot) = registry.get_status(id) {
            if accept(&snapshot) {
                return snapshot;
            }
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(2)).await;
    }
}

async fn wait_for_status(registry: &ServiceRegistry, id: &str, status: HealthStatus) -> ServiceSnapshot {
    wait_until(registry, id, status.label(), |s| s.status == status).await
}

async fn wait_for_first_poll(registry: &ServiceRegistry, id: &str) -> ServiceSnapshot {
    wait_until(registry, id, "first poll", |s| !s.ping_results.is_empty()).await
}

#[tokio::test]
async fn registration_is_visible_before_first_probe() {
    // Arrange
    let started = Arc::new(Notify::new());
    let h = harness(Arc::new(StuckProber {
        started: started.clone(),
    }));

    // Act
    h.registry.add_service(fast_config("svc-1", "mail.local")).await;

    // Assert
    let snapshot = h.registry.ping("svc-1").expect("registered");
    assert_eq!(snapshot.status, HealthStatus::NotStarted);
    assert_eq!(h.registry.service_ids(), vec!["svc-1".to_string()]);
    assert!(h.registry.get_status("svc-unknown").is_none());

    h.registry.shutdown().await;
}

#[tokio::test]
async fn steady_successes_reach_online_and_persist_transition() {
    // Arrange
    let h = harness(Arc::new(ScriptedProber::always_up()));

    // Act
    h.registry.add_service(fast_config("svc-1", "mail.local")).await;
    let online = wait_for_status(&h.registry, "svc-1", HealthStatus::Online).await;

    // Assert
    assert_eq!(online.ping_results, vec![true; 10]);
    assert_eq!(online.current_interval, 25);
    assert!((online.average_response_time - 4.0).abs() < 1e-9);

    // The change is committed before the equipment write completes.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let groups = h.store.list_groups().await.expect("list");
        if groups[0].services[0].status == "Online" {
            let history = &groups[0].services[0].history;
            assert_eq!(history.last().map(|e| e.status.as_str()), Some("Intermittent"));
            break;
        }
        assert!(Instant::now() < deadline, "equipment record never went Online");
        sleep(Duration::from_millis(2)).await;
    }

    h.registry.shutdown().await;
}

#[tokio::test]
async fn hard_failure_resets_window_through_the_loop() {
    // Arrange
    let script = std::iter::repeat(true).take(10).chain(std::iter::repeat(false).take(5));
    let h = harness(Arc::new(ScriptedProber::new(script, false)));

    // Act
    h.registry.add_service(fast_config("svc-1", "mail.local")).await;
    let down = wait_for_status(&h.registry, "svc-1", HealthStatus::Unreachable).await;

    // Assert
    assert!(down.ping_results.is_empty());
    assert_eq!(down.average_response_time, -1.0);
    assert_eq!(down.current_interval, 2);

    h.registry.shutdown().await;
}

#[tokio::test]
async fn remove_stops_all_further_publication() {
    // Arrange
    let prober = Arc::new(ScriptedProber::always_up());
    let mut h = harness(prober.clone());
    h.registry.add_service(fast_config("svc-1", "mail.local")).await;
    wait_for_first_poll(&h.registry, "svc-1").await;

    // Act
    h.registry.remove_service("svc-1").await;
    drain(&mut h.rx);
    let calls_after_remove = prober.calls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(40)).await;

    // Assert
    assert!(drain(&mut h.rx).is_empty());
    assert_eq!(prober.calls.load(Ordering::SeqCst), calls_after_remove);
    assert!(h.registry.get_status("svc-1").is_none());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn in_flight_probe_is_discarded_on_remove() {
    // Arrange
    let started = Arc::new(Notify::new());
    let mut h = harness(Arc::new(StuckProber {
        started: started.clone(),
    }));
    h.registry.add_service(fast_config("svc-1", "mail.local")).await;
    timeout(Duration::from_secs(5), started.notified())
        .await
        .expect("probe started");

    // Act
    timeout(Duration::from_secs(5), h.registry.remove_service("svc-1"))
        .await
        .expect("remove completes while probe is stuck");
    sleep(Duration::from_millis(20)).await;

    // Assert: only the registration pong ever went out
    let events = drain(&mut h.rx);
    let published = pongs(&events);
    assert!(published.iter().all(|s| s.status == HealthStatus::NotStarted));
    assert!(h.registry.get_status("svc-1").is_none());
}

#[tokio::test]
async fn re_adding_replaces_previous_monitor() {
    // Arrange
    let mut h = harness(Arc::new(ScriptedProber::always_up()));
    h.registry.add_service(fast_config("svc-1", "old.local")).await;
    wait_for_first_poll(&h.registry, "svc-1").await;

    // Act
    h.registry.add_service(fast_config("svc-1", "new.local")).await;
    drain(&mut h.rx);
    sleep(Duration::from_millis(40)).await;

    // Assert
    let events = drain(&mut h.rx);
    let published = pongs(&events);
    assert!(!published.is_empty(), "new monitor keeps publishing");
    assert!(published.iter().all(|s| s.hostname == "new.local"));
    assert_eq!(h.registry.len(), 1);
    assert_eq!(
        h.registry.get_status("svc-1").map(|s| s.hostname),
        Some("new.local".to_string())
    );

    h.registry.shutdown().await;
}

#[tokio::test]
async fn removing_unknown_service_is_a_no_op() {
    // Arrange
    let h = harness(Arc::new(ScriptedProber::always_up()));

    // Act
    h.registry.remove_service("never-added").await;

    // Assert
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn monitors_are_independent() {
    // Arrange
    let h = harness(Arc::new(ScriptedProber::always_up()));
    h.registry.add_service(fast_config("svc-1", "a.local")).await;
    h.registry.add_service(fast_config("svc-2", "b.local")).await;

    // Act
    h.registry.remove_service("svc-1").await;

    // Assert
    assert_eq!(h.registry.service_ids(), vec!["svc-2".to_string()]);
    wait_for_first_poll(&h.registry, "svc-2").await;

    h.registry.shutdown().await;
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn slow_equipment_store_does_not_hold_back_polling() {
    // Arrange
    let flapping = (0..1000).map(|i| i % 2 == 0);
    let prober = Arc::new(ScriptedProber::new(flapping, true));
    let store = Arc::new(SlowStore {
        inner: MemoryEquipmentStore::new(vec![alpha_group()]),
        delay: Duration::from_millis(400),
    });
    let sink = PropagationSink::new(Arc::new(FeedPublisher::new(4096)), store.clone());
    let registry = ServiceRegistry::new(prober.clone(), sink);
    let mut config = fast_config("svc-1", "mail.local");
    config.initial_interval = Duration::from_millis(5);

    // Act
    registry.add_service(config).await;
    sleep(Duration::from_millis(500)).await;

    // Assert
    let calls = prober.calls.load(Ordering::SeqCst);
    assert!(calls >= 20, "only {calls} polls in 500ms at a 5ms interval");
    let snapshot = registry.get_status("svc-1").expect("registered");
    assert_eq!(snapshot.ping_results.len(), 10);

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let groups = store.inner.list_groups().await.expect("list");
        if !groups[0].services[0].history.is_empty() {
            break;
        }
        assert!(Instant::now() < deadline, "status change never reached the store");
        sleep(Duration::from_millis(10)).await;
    }

    registry.shutdown().await;
}
