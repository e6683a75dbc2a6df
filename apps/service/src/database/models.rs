use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::monitoring::checker::CheckType;
use crate::monitoring::types::CheckStatus;

/// Monitor model - represents a monitoring target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub name: String,
    pub target: String,
    pub check_type: CheckType,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub enabled: bool,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Monitor {
    /// Create a new monitor with the defaults for its check type
    pub fn new(name: String, target: String, check_type: CheckType) -> Self {
        let now = SystemTime::now();
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            name,
            target,
            check_type,
            interval_seconds: 60,
            timeout_seconds: check_type.default_timeout_seconds(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Effective probe timeout, falling back to the type default when unset
    pub fn probe_timeout(&self) -> Duration {
        let seconds = if self.timeout_seconds == 0 {
            self.check_type.default_timeout_seconds()
        } else {
            self.timeout_seconds
        };
        Duration::from_secs(seconds)
    }

    /// Convert SystemTime to Unix timestamp
    pub fn timestamp_to_i64(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
    }

    /// Convert Unix timestamp to SystemTime
    pub fn i64_to_timestamp(timestamp: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(timestamp.max(0) as u64)
    }
}

/// A stored check result, as read back from the checks table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    pub id: Option<i64>,
    pub monitor_uuid: Uuid,
    pub timestamp: SystemTime,
    pub status: CheckStatus,
    pub response_time_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

/// Aggregated check outcomes over a time window
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckStats {
    pub total_checks: u64,
    pub up_checks: u64,
    pub down_checks: u64,
    pub error_checks: u64,
    pub avg_response_time_ms: Option<f64>,
    pub min_response_time_ms: Option<u64>,
    pub max_response_time_ms: Option<u64>,
    pub uptime_percentage: Option<f64>,
}

/// Deployment-wide monitor counts plus check aggregates
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub total_monitors: u64,
    pub enabled_monitors: u64,
    pub checks: CheckStats,
}
