use std::fmt;

use serde::{Deserialize, Serialize};

use crate::window::RollingWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    Online,
    Intermittent,
    Degraded,
    Pending,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Default,
    Success,
    Warning,
    Info,
    Error,
}

impl HealthStatus {
    pub fn label(self) -> &'static str {
        match self {
            HealthStatus::NotStarted => "Not Started",
            HealthStatus::Online => "Online",
            HealthStatus::Intermittent => "Intermittent",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Pending => "Pending",
            HealthStatus::Unreachable => "Unreachable",
        }
    }

    pub fn color(self) -> StatusColor {
        match self {
            HealthStatus::NotStarted => StatusColor::Default,
            HealthStatus::Online => StatusColor::Success,
            HealthStatus::Intermittent | HealthStatus::Degraded => StatusColor::Warning,
            HealthStatus::Pending => StatusColor::Info,
            HealthStatus::Unreachable => StatusColor::Error,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl StatusColor {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusColor::Default => "default",
            StatusColor::Success => "success",
            StatusColor::Warning => "warning",
            StatusColor::Info => "info",
            StatusColor::Error => "error",
        }
    }
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First matching rule wins; the failure streak overrides window contents.
pub fn classify(
    window: &RollingWindow,
    consecutive_failures: u32,
    tolerance: u32,
    window_size: usize,
) -> (HealthStatus, StatusColor) {
    let successes = window.successes();
    let failures = window.failures();
    let tolerance_slots = tolerance as usize;

    let status = if window.is_empty() {
        HealthStatus::NotStarted
    } else if consecutive_failures >= tolerance {
        HealthStatus::Unreachable
    } else if successes == window_size {
        HealthStatus::Online
    } else if failures > tolerance_slots {
        HealthStatus::Degraded
    } else if successes > 0 && failures < tolerance_slots && successes > failures {
        HealthStatus::Intermittent
    } else if !window.is_empty() {
        HealthStatus::Pending
    } else {
        HealthStatus::Unreachable
    };

    (status, status.color())
}
