use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::probe::{ProbeError, ProbeOutcome};
use crate::scheduler::{AdaptiveScheduler, Phase};
use crate::snapshot::{ServiceSnapshot, StatusChange};
use crate::status::{classify, HealthStatus, StatusColor};
use crate::window::RollingWindow;

pub const HARD_FAILURE_RESPONSE_TIME: f64 = -1.0;

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub snapshot: ServiceSnapshot,
    pub change: Option<StatusChange>,
    pub next_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct MonitorState {
    config: MonitorConfig,
    window: RollingWindow,
    consecutive_failures: u32,
    status: HealthStatus,
    color: StatusColor,
    scheduler: AdaptiveScheduler,
    average_response_time: f64,
    last_updated: DateTime<Utc>,
}

impl MonitorState {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            window: RollingWindow::new(config.window_size),
            scheduler: AdaptiveScheduler::new(config.initial_interval, config.target_interval),
            config,
            consecutive_failures: 0,
            status: HealthStatus::NotStarted,
            color: StatusColor::Default,
            average_response_time: 0.0,
            last_updated: Utc::now(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn current_interval(&self) -> Duration {
        self.scheduler.current_interval()
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    pub fn average_response_time(&self) -> f64 {
        self.average_response_time
    }

    /// Applies one probe result: window, failure streak, status and cadence.
    /// Probe errors count as unreachable.
    pub fn record(&mut self, result: Result<ProbeOutcome, ProbeError>) -> CycleReport {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(service_id = %self.config.service_id, hostname = %self.config.hostname, error = %err, "probe fault");
                ProbeOutcome::unreachable()
            }
        };

        if outcome.reachable {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        self.last_updated = outcome.timestamp;
        self.window.push(outcome);

        let previous = self.status;
        let (status, color) = classify(
            &self.window,
            self.consecutive_failures,
            self.config.error_tolerance,
            self.config.window_size,
        );
        self.status = status;
        self.color = color;

        let hard_failure = self.consecutive_failures >= self.config.error_tolerance;
        if hard_failure {
            self.enter_hard_failure();
        } else {
            self.average_response_time = self.window.average_response_time();
        }

        let next_delay = self
            .scheduler
            .next_delay(self.window.is_saturated(), hard_failure);

        debug!(
            service_id = %self.config.service_id,
            status = %self.status,
            failures_in_row = self.consecutive_failures,
            window_len = self.window.len(),
            next_delay_ms = next_delay.as_millis() as u64,
            "poll classified"
        );

        let change = (previous != status).then(|| StatusChange {
            service_id: self.config.service_id.clone(),
            hostname: self.config.hostname.clone(),
            previous,
            current: status,
            color,
            at: self.last_updated,
        });

        CycleReport {
            snapshot: self.snapshot(),
            change,
            next_delay,
        }
    }

    // Stale successes must not mask an ongoing outage, so history is dropped
    // and characterization starts over.
    fn enter_hard_failure(&mut self) {
        self.window.clear();
        self.average_response_time = HARD_FAILURE_RESPONSE_TIME;
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            service_id: self.config.service_id.clone(),
            hostname: self.config.hostname.clone(),
            ping_results: self.window.results(),
            response_times: self.window.response_times(),
            error_count: self.consecutive_failures,
            status: self.status,
            status_color: self.color,
            current_interval: self.scheduler.current_interval().as_millis() as u64,
            average_response_time: self.average_response_time,
            last_updated: self.last_updated,
            phase: self.scheduler.phase(),
            initial_ping_interval: self.config.initial_interval.as_millis() as u64,
            target_ping_interval: self.config.target_interval.as_millis() as u64,
            rolling_average: self.config.window_size,
            error_tolerance: self.config.error_tolerance,
        }
    }
}
