use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of a single dependency, serialized as `Healthy` etc.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    /// Lowercase form used for the top-level `status` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "checkedAt")]
    pub checked_at: DateTime<Utc>,
}

impl HealthCheck {
    pub fn healthy() -> Self {
        Self::at(HealthStatus::Healthy, None)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::at(HealthStatus::Unhealthy, Some(message.into()))
    }

    /// Maps a dependency check outcome onto a check.
    pub fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::healthy(),
            Err(e) => Self::unhealthy(e.to_string()),
        }
    }

    fn at(status: HealthStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: Utc::now(),
        }
    }
}

/// Named component checks rolled up into one status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    pub components: BTreeMap<String, HealthCheck>,
}

impl HealthReport {
    pub fn with(mut self, name: &str, check: HealthCheck) -> Self {
        self.components.insert(name.to_string(), check);
        self
    }

    /// Unhealthy if any component is; unknown with no components.
    pub fn overall_status(&self) -> HealthStatus {
        let mut statuses = self.components.values().map(|c| c.status).peekable();
        if statuses.peek().is_none() {
            return HealthStatus::Unknown;
        }
        if statuses.any(|s| s == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        }
    }
}
