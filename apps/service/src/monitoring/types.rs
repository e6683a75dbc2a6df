use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Outcome classification of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The target answered
    Up,
    /// The target is reachable in principle but did not answer properly
    Down,
    /// The check itself could not run (bad target, probe failure)
    Error,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Up => write!(f, "up"),
            CheckStatus::Down => write!(f, "down"),
            CheckStatus::Error => write!(f, "error"),
        }
    }
}

/// What a probe observed, before it is stamped with monitor identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: CheckStatus,
    pub response_time_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

impl ProbeReport {
    /// The target answered within the timeout
    pub fn up(response_time_ms: u64) -> Self {
        Self {
            status: CheckStatus::Up,
            response_time_ms: Some(response_time_ms),
            status_code: None,
            error_message: None,
        }
    }

    /// The target failed to answer properly
    pub fn down(error: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Down,
            response_time_ms: None,
            status_code: None,
            error_message: Some(error.into()),
        }
    }

    /// The probe could not be carried out at all
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Error,
            response_time_ms: None,
            status_code: None,
            error_message: Some(error.into()),
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_response_time(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }
}

/// Result of a monitoring check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// UUID of the monitor that was checked
    pub monitor_id: Uuid,

    /// URL or target that was checked
    pub target: String,

    /// Timestamp when the check was performed
    pub timestamp: SystemTime,

    /// Status of the check (up/down/error)
    pub status: CheckStatus,

    /// Response time in milliseconds, absent when nothing answered
    pub response_time_ms: Option<u64>,

    /// HTTP status code, or the probed port for TCP checks
    pub status_code: Option<u16>,

    /// Error message (if check failed)
    pub error_message: Option<String>,
}

impl CheckResult {
    /// Stamp a probe report with the monitor it was taken for
    pub fn from_report(monitor_id: Uuid, target: impl Into<String>, report: ProbeReport) -> Self {
        Self {
            monitor_id,
            target: target.into(),
            timestamp: SystemTime::now(),
            status: report.status,
            response_time_ms: report.response_time_ms,
            status_code: report.status_code,
            error_message: report.error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&CheckStatus::Up).unwrap(), "\"up\"");
        assert_eq!(serde_json::to_string(&CheckStatus::Down).unwrap(), "\"down\"");
        assert_eq!(serde_json::to_string(&CheckStatus::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn report_builders_set_fields() {
        let up = ProbeReport::up(42).with_status_code(200);
        assert_eq!(up.status, CheckStatus::Up);
        assert_eq!(up.response_time_ms, Some(42));
        assert_eq!(up.status_code, Some(200));
        assert!(up.error_message.is_none());

        let down = ProbeReport::down("Connection refused").with_response_time(7);
        assert_eq!(down.status, CheckStatus::Down);
        assert_eq!(down.response_time_ms, Some(7));
        assert_eq!(down.error_message.as_deref(), Some("Connection refused"));

        let error = ProbeReport::error("bad target");
        assert_eq!(error.status, CheckStatus::Error);
        assert!(error.response_time_ms.is_none());
    }

    #[test]
    fn from_report_carries_identity() {
        let id = Uuid::new_v4();
        let result = CheckResult::from_report(id, "https://example.com", ProbeReport::up(10));
        assert_eq!(result.monitor_id, id);
        assert_eq!(result.target, "https://example.com");
        assert_eq!(result.status, CheckStatus::Up);
    }
}
