use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::monitor::MonitorState;
use crate::probe::Prober;
use crate::sink::PropagationSink;
use crate::snapshot::{ServiceSnapshot, StatusChange};

const PROPAGATION_QUEUE: usize = 1024;

enum Propagation {
    Poll(ServiceSnapshot),
    Change(StatusChange),
}

struct Slot {
    generation: u64,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    propagation: Option<JoinHandle<()>>,
    snapshot: ServiceSnapshot,
}

impl Slot {
    fn stop(&mut self) -> (Option<JoinHandle<()>>, Option<JoinHandle<()>>) {
        let _ = self.cancel.send(true);
        (self.task.take(), self.propagation.take())
    }
}

struct Shared {
    prober: Arc<dyn Prober>,
    sink: PropagationSink,
    slots: Mutex<HashMap<String, Slot>>,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // A panic while holding the map lock leaves it consistent; keep going.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `snapshot` if `generation` still owns `service_id`. A `false`
    /// return means the monitor was removed or replaced and must stop.
    fn commit(&self, service_id: &str, generation: u64, snapshot: &ServiceSnapshot) -> bool {
        match self.slots().get_mut(service_id) {
            Some(slot) if slot.generation == generation => {
                slot.snapshot = snapshot.clone();
                true
            }
            _ => false,
        }
    }

    fn is_current(&self, service_id: &str, generation: u64) -> bool {
        self.slots()
            .get(service_id)
            .is_some_and(|slot| slot.generation == generation)
    }
}

#[derive(Clone)]
pub struct ServiceRegistry {
    shared: Arc<Shared>,
    generations: Arc<AtomicU64>,
}

impl ServiceRegistry {
    pub fn new(prober: Arc<dyn Prober>, sink: PropagationSink) -> Self {
        Self {
            shared: Arc::new(Shared {
                prober,
                sink,
                slots: Mutex::new(HashMap::new()),
            }),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replaces any monitor already registered under the same id. The old
    /// loop has fully stopped before the new one probes.
    pub async fn add_service(&self, config: MonitorConfig) {
        self.remove_service(&config.service_id).await;

        let service_id = config.service_id.clone();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let state = MonitorState::new(config);
        let snapshot = state.snapshot();
        let (cancel, cancel_rx) = watch::channel(false);
        let (queue, queue_rx) = mpsc::channel(PROPAGATION_QUEUE);

        let mut slots = self.shared.slots();
        let task = tokio::spawn(run_monitor(
            self.shared.clone(),
            generation,
            state,
            cancel_rx,
            queue,
        ));
        let propagation = tokio::spawn(run_propagation(
            self.shared.clone(),
            service_id.clone(),
            generation,
            queue_rx,
        ));
        let displaced = slots.insert(
            service_id.clone(),
            Slot {
                generation,
                cancel,
                task: Some(task),
                propagation: Some(propagation),
                snapshot,
            },
        );
        drop(slots);

        // Only reachable when two adds for one id race each other.
        if let Some(mut old) = displaced {
            let (task, propagation) = old.stop();
            for handle in task.into_iter().chain(propagation) {
                handle.abort();
            }
        }

        info!(%service_id, generation, "service registered");
    }

    /// A probe in flight is abandoned and its result never applied. Queued
    /// propagation is dropped; one already talking to the store may finish.
    pub async fn remove_service(&self, service_id: &str) {
        let removed = self.shared.slots().remove(service_id);
        let Some(mut slot) = removed else {
            debug!(%service_id, "remove for unknown service ignored");
            return;
        };

        let (task, propagation) = slot.stop();
        if let Some(task) = task {
            let _ = task.await;
        }
        if let Some(propagation) = propagation {
            let _ = propagation.await;
        }
        info!(%service_id, generation = slot.generation, "service removed");
    }

    pub fn get_status(&self, service_id: &str) -> Option<ServiceSnapshot> {
        self.shared
            .slots()
            .get(service_id)
            .map(|slot| slot.snapshot.clone())
    }

    // Never triggers a probe.
    pub fn ping(&self, service_id: &str) -> Option<ServiceSnapshot> {
        self.get_status(service_id)
    }

    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.slots().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.shared.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn shutdown(&self) {
        for service_id in self.service_ids() {
            self.remove_service(&service_id).await;
        }
    }
}

async fn run_monitor(
    shared: Arc<Shared>,
    generation: u64,
    mut state: MonitorState,
    mut cancel: watch::Receiver<bool>,
    queue: mpsc::Sender<Propagation>,
) {
    let service_id = state.config().service_id.clone();
    let hostname = state.config().hostname.clone();

    let registered = state.snapshot();
    if !shared.commit(&service_id, generation, &registered) {
        return;
    }
    enqueue(&queue, &service_id, Propagation::Poll(registered));

    let mut delay = Duration::ZERO;
    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = sleep(delay) => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.changed() => break,
            result = shared.prober.probe(&hostname) => result,
        };

        if *cancel.borrow() {
            break;
        }

        let report = state.record(result);
        if !shared.commit(&service_id, generation, &report.snapshot) {
            break;
        }

        delay = report.next_delay;
        enqueue(&queue, &service_id, Propagation::Poll(report.snapshot));
        if let Some(change) = report.change {
            enqueue(&queue, &service_id, Propagation::Change(change));
        }
    }

    debug!(%service_id, generation, "monitor loop stopped");
}

fn enqueue(queue: &mpsc::Sender<Propagation>, service_id: &str, event: Propagation) {
    match queue.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(%service_id, "propagation backlog full, dropping update");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(%service_id, "propagation task gone, dropping update");
        }
    }
}

async fn run_propagation(
    shared: Arc<Shared>,
    service_id: String,
    generation: u64,
    mut queue: mpsc::Receiver<Propagation>,
) {
    while let Some(event) = queue.recv().await {
        if !shared.is_current(&service_id, generation) {
            break;
        }
        match event {
            Propagation::Poll(snapshot) => shared.sink.on_poll(&snapshot).await,
            Propagation::Change(change) => shared.sink.on_change(&change).await,
        }
    }

    debug!(%service_id, generation, "propagation task stopped");
}
