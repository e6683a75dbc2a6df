use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tracing::debug;

use super::checker::{CheckType, Checker, HttpChecker, PingChecker, TcpChecker};
use super::types::CheckResult;
use crate::database::models::Monitor;

/// How many checks a batch run executes at once
pub const DEFAULT_BATCH_CONCURRENCY: usize = 10;
/// Pause between batch chunks, keeping bursts off the network
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(1000);

/// Dispatches checks to the probe implementation matching the monitor type
pub struct ProbeExecutor {
    http: Arc<HttpChecker>,
    ping: Arc<PingChecker>,
    tcp: Arc<TcpChecker>,
}

impl ProbeExecutor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: Arc::new(HttpChecker::new()?),
            ping: Arc::new(PingChecker::new()),
            tcp: Arc::new(TcpChecker::new()),
        })
    }

    /// Execute a single check and stamp the outcome with monitor identity
    pub async fn execute_check(&self, monitor: &Monitor) -> CheckResult {
        let checker: &dyn Checker = match monitor.check_type {
            CheckType::Http => self.http.as_ref(),
            CheckType::Ping => self.ping.as_ref(),
            CheckType::Tcp => self.tcp.as_ref(),
        };

        let report = checker.check(&monitor.target, monitor.probe_timeout()).await;

        debug!(monitor = %monitor.uuid, status = %report.status, "check finished");

        CheckResult::from_report(monitor.uuid, monitor.target.clone(), report)
    }

    /// Check a whole set of monitors, a chunk at a time.
    ///
    /// Results come back in monitor order. The optional pause is inserted
    /// between chunks, not after the last one.
    pub async fn check_batch(
        &self,
        monitors: &[Monitor],
        concurrency: usize,
        pause: Option<Duration>,
    ) -> Vec<CheckResult> {
        let concurrency = concurrency.max(1);
        let mut results = Vec::with_capacity(monitors.len());

        for (index, chunk) in monitors.chunks(concurrency).enumerate() {
            if index > 0 {
                if let Some(pause) = pause {
                    tokio::time::sleep(pause).await;
                }
            }

            let checks = chunk.iter().map(|monitor| self.execute_check(monitor));
            results.extend(join_all(checks).await);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::CheckStatus;

    fn tcp_monitor(target: String) -> Monitor {
        let mut monitor = Monitor::new("tcp test".to_string(), target, CheckType::Tcp);
        monitor.timeout_seconds = 2;
        monitor
    }

    #[tokio::test]
    async fn execute_check_dispatches_by_type() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _keepalive = tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let executor = ProbeExecutor::new().unwrap();
        let monitor = tcp_monitor(addr.to_string());

        let result = executor.execute_check(&monitor).await;
        assert_eq!(result.monitor_id, monitor.uuid);
        assert_eq!(result.status, CheckStatus::Up);
        assert_eq!(result.status_code, Some(addr.port()));
    }

    #[tokio::test]
    async fn check_batch_covers_every_monitor_in_order() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _keepalive = tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let executor = ProbeExecutor::new().unwrap();
        let monitors: Vec<Monitor> =
            (0..5).map(|_| tcp_monitor(addr.to_string())).collect();

        let results = executor.check_batch(&monitors, 2, None).await;
        assert_eq!(results.len(), monitors.len());
        for (monitor, result) in monitors.iter().zip(&results) {
            assert_eq!(monitor.uuid, result.monitor_id);
            assert_eq!(result.status, CheckStatus::Up);
        }
    }
}
