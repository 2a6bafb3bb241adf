use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::Phase;
use crate::status::{HealthStatus, StatusColor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub service_id: String,
    pub hostname: String,
    pub ping_results: Vec<bool>,
    pub response_times: Vec<f64>,
    pub error_count: u32,
    pub status: HealthStatus,
    pub status_color: StatusColor,
    pub current_interval: u64,
    pub average_response_time: f64,
    pub last_updated: DateTime<Utc>,
    pub phase: Phase,
    pub initial_ping_interval: u64,
    pub target_ping_interval: u64,
    pub rolling_average: usize,
    pub error_tolerance: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub service_id: String,
    pub hostname: String,
    pub previous: HealthStatus,
    pub current: HealthStatus,
    pub color: StatusColor,
    pub at: DateTime<Utc>,
}
