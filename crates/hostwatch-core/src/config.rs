use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_TARGET_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_ERROR_TOLERANCE: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("service id must not be empty")]
    EmptyServiceId,
    #[error("hostname must not be empty")]
    EmptyHostname,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub service_id: String,
    pub hostname: String,
    pub initial_interval: Duration,
    pub target_interval: Duration,
    pub window_size: usize,
    pub error_tolerance: u32,
}

impl MonitorConfig {
    pub fn new(service_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            hostname: hostname.into(),
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            target_interval: DEFAULT_TARGET_INTERVAL,
            window_size: DEFAULT_WINDOW_SIZE,
            error_tolerance: DEFAULT_ERROR_TOLERANCE,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_id.trim().is_empty() {
            return Err(ConfigError::EmptyServiceId);
        }
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::EmptyHostname);
        }
        if self.initial_interval.is_zero() {
            return Err(ConfigError::Zero("initialPingInterval"));
        }
        if self.target_interval.is_zero() {
            return Err(ConfigError::Zero("targetPingInterval"));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Zero("rollingAverage"));
        }
        if self.error_tolerance == 0 {
            return Err(ConfigError::Zero("errorTolerance"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub service_id: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_ping_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ping_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_average: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_tolerance: Option<u32>,
}

impl ServiceRequest {
    pub fn new(service_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            hostname: hostname.into(),
            initial_ping_interval: None,
            target_ping_interval: None,
            rolling_average: None,
            error_tolerance: None,
        }
    }
}

impl TryFrom<ServiceRequest> for MonitorConfig {
    type Error = ConfigError;

    fn try_from(req: ServiceRequest) -> Result<Self, Self::Error> {
        let mut config = MonitorConfig::new(req.service_id, req.hostname);
        if let Some(ms) = req.initial_ping_interval {
            config.initial_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = req.target_ping_interval {
            config.target_interval = Duration::from_millis(ms);
        }
        if let Some(size) = req.rolling_average {
            config.window_size = size;
        }
        if let Some(tolerance) = req.error_tolerance {
            config.error_tolerance = tolerance;
        }
        config.validate()?;
        Ok(config)
    }
}
