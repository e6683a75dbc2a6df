//! Automatic cleanup of old check results.
//!
//! Cleanup runs periodically (every hour) as a background task and
//! deletes check rows older than the configured retention window.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::database::ResultSink;

/// How long check results are kept
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Days to keep check results
    pub result_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { result_days: 30 }
    }
}

/// Cleanup manager for expired check results
pub struct RetentionCleanup {
    sink: Arc<dyn ResultSink>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    /// Create a new retention cleanup manager
    pub fn new(sink: Arc<dyn ResultSink>, policy: RetentionPolicy) -> Self {
        Self { sink, policy }
    }

    /// Delete results past the retention window, returning the row count
    pub async fn cleanup_expired_results(&self) -> Result<u64> {
        let deleted = self.sink.purge_older_than(self.policy.result_days).await?;
        if deleted > 0 {
            debug!(
                "Retention cleanup deleted {} results older than {} days",
                deleted, self.policy.result_days
            );
        }
        Ok(deleted)
    }

    /// Start background cleanup task (runs every hour)
    pub fn start_periodic_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let policy = self.policy.clone();

        tokio::spawn(async move {
            let cleanup = RetentionCleanup::new(sink, policy);
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));

            loop {
                interval.tick().await;

                match cleanup.cleanup_expired_results().await {
                    Ok(count) => {
                        debug!("Periodic cleanup completed: {} deleted", count);
                    }
                    Err(e) => {
                        warn!("Periodic cleanup failed: {}", e);
                    }
                }
            }
        })
    }
}
