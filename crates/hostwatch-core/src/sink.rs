use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::equipment::EventLogEntry;
use crate::feed::{PublishError, Publisher};
use crate::snapshot::{ServiceSnapshot, StatusChange};
use crate::store::{EquipmentStore, StoreError};

pub const DEFAULT_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("publish: {0}")]
    Publish(#[from] PublishError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub struct PropagationSink {
    publisher: Arc<dyn Publisher>,
    store: Arc<dyn EquipmentStore>,
    propagation_timeout: Duration,
    // Equipment writes replace whole groups; serialize them so two services
    // in the same group don't overwrite each other's transition.
    equipment_lock: Mutex<()>,
}

impl PropagationSink {
    pub fn new(publisher: Arc<dyn Publisher>, store: Arc<dyn EquipmentStore>) -> Self {
        Self {
            publisher,
            store,
            propagation_timeout: DEFAULT_PROPAGATION_TIMEOUT,
            equipment_lock: Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, propagation_timeout: Duration) -> Self {
        self.propagation_timeout = propagation_timeout;
        self
    }

    pub async fn on_poll(&self, snapshot: &ServiceSnapshot) {
        let publish = self.publisher.publish_pong(snapshot);
        let result = match timeout(self.propagation_timeout, publish).await {
            Ok(res) => res.map_err(SinkError::from),
            Err(_) => Err(SinkError::Timeout(self.propagation_timeout)),
        };
        if let Err(err) = result {
            warn!(service_id = %snapshot.service_id, error = %err, "pong publish failed");
        }
    }

    pub async fn on_change(&self, change: &StatusChange) {
        let result = match timeout(self.propagation_timeout, self.propagate_change(change)).await {
            Ok(res) => res,
            Err(_) => Err(SinkError::Timeout(self.propagation_timeout)),
        };
        match result {
            Ok(true) => info!(
                service_id = %change.service_id,
                from = %change.previous,
                to = %change.current,
                "status change propagated"
            ),
            Ok(false) => debug!(service_id = %change.service_id, "no equipment record owns service"),
            Err(err) => warn!(
                service_id = %change.service_id,
                to = %change.current,
                error = %err,
                "status change propagation failed"
            ),
        }
    }

    async fn propagate_change(&self, change: &StatusChange) -> Result<bool, SinkError> {
        let event = {
            let _guard = self.equipment_lock.lock().await;
            let Some(mut group) = self.store.find_group_by_service(&change.service_id).await?
            else {
                return Ok(false);
            };
            let Some(service) = group.service_mut(&change.service_id) else {
                return Ok(false);
            };

            let previous_status = service.apply_transition(change);
            let service = service.clone();
            let event = EventLogEntry::status_transition(&group, &service, &previous_status, change);
            self.store.update_group(&group).await?;
            event
        };

        let groups = self.store.list_groups().await?;
        self.publisher.publish_equipment_groups(&groups).await?;
        self.publisher.publish_event(&event).await?;
        Ok(true)
    }
}
