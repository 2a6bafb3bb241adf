use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::trace;

use crate::equipment::{EquipmentGroup, EventLogEntry};
use crate::snapshot::ServiceSnapshot;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum FeedEvent {
    Pong(ServiceSnapshot),
    EquipmentGroups(Vec<EquipmentGroup>),
    NewEventItem(EventLogEntry),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_pong(&self, snapshot: &ServiceSnapshot) -> Result<(), PublishError>;
    async fn publish_equipment_groups(
        &self,
        groups: &[EquipmentGroup],
    ) -> Result<(), PublishError>;
    async fn publish_event(&self, event: &EventLogEntry) -> Result<(), PublishError>;
}

#[derive(Debug, Clone)]
pub struct FeedPublisher {
    sender: broadcast::Sender<FeedEvent>,
}

impl Default for FeedPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FeedPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: FeedEvent) -> Result<(), PublishError> {
        // No listeners is normal between dashboard sessions.
        match self.sender.send(event) {
            Ok(receivers) => trace!(receivers, "feed event sent"),
            Err(_) => trace!("feed event dropped, no subscribers"),
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for FeedPublisher {
    async fn publish_pong(&self, snapshot: &ServiceSnapshot) -> Result<(), PublishError> {
        self.send(FeedEvent::Pong(snapshot.clone()))
    }

    async fn publish_equipment_groups(
        &self,
        groups: &[EquipmentGroup],
    ) -> Result<(), PublishError> {
        self.send(FeedEvent::EquipmentGroups(groups.to_vec()))
    }

    async fn publish_event(&self, event: &EventLogEntry) -> Result<(), PublishError> {
        self.send(FeedEvent::NewEventItem(event.clone()))
    }
}
