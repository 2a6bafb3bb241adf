pub mod config;
pub mod equipment;
pub mod feed;
pub mod monitor;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod window;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod registry_tests;
#[cfg(test)]
mod scheduler_tests;

pub use config::{ConfigError, MonitorConfig, ServiceRequest};
pub use equipment::{EquipmentGroup, EquipmentService, EventLogEntry, StatusHistoryEntry};
pub use feed::{FeedEvent, FeedPublisher, PublishError, Publisher};
pub use monitor::{CycleReport, MonitorState, HARD_FAILURE_RESPONSE_TIME};
pub use probe::{ProbeError, ProbeOutcome, Prober, SystemPingProber, TcpProber};
pub use registry::ServiceRegistry;
pub use scheduler::{AdaptiveScheduler, Phase};
pub use sink::{PropagationSink, SinkError};
pub use snapshot::{ServiceSnapshot, StatusChange};
pub use status::{classify, HealthStatus, StatusColor};
pub use store::{EquipmentStore, FileEquipmentStore, MemoryEquipmentStore, StoreError};
pub use window::RollingWindow;
