use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Characterizing,
    SteadyState,
    HardFailure,
}

#[derive(Debug, Clone)]
pub struct AdaptiveScheduler {
    initial_interval: Duration,
    target_interval: Duration,
    current: Duration,
    phase: Phase,
}

impl AdaptiveScheduler {
    pub fn new(initial_interval: Duration, target_interval: Duration) -> Self {
        Self {
            initial_interval,
            target_interval,
            current: initial_interval,
            phase: Phase::Characterizing,
        }
    }

    pub fn current_interval(&self) -> Duration {
        self.current
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn next_delay(&mut self, saturated: bool, hard_failure: bool) -> Duration {
        self.phase = if hard_failure {
            Phase::HardFailure
        } else if saturated {
            Phase::SteadyState
        } else {
            Phase::Characterizing
        };

        self.current = match self.phase {
            Phase::SteadyState => self.target_interval,
            Phase::Characterizing | Phase::HardFailure => self.initial_interval,
        };
        self.current
    }
}
