//! Validation of monitor definitions before they reach the registry.
//!
//! Targets are checked against the shape their probe expects, so a bad
//! definition is rejected at the API boundary instead of failing on
//! every scheduled check.

use anyhow::{Result, bail};
use url::Url;

use super::checker::{CheckType, parse_host_port};
use crate::database::models::Monitor;

pub const MIN_INTERVAL_SECONDS: u64 = 5;
pub const MAX_INTERVAL_SECONDS: u64 = 86_400;
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Validates a monitor target based on its type
pub fn validate_monitor_target(target: &str, check_type: CheckType) -> Result<()> {
    match check_type {
        CheckType::Http => validate_http_target(target),
        CheckType::Ping => validate_ping_target(target),
        CheckType::Tcp => validate_tcp_target(target),
    }
}

/// Validate HTTP/HTTPS target
fn validate_http_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow::anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => bail!("Invalid scheme for HTTP monitor: {}", other),
    }

    if url.host_str().is_none() {
        bail!("HTTP target must include a host");
    }

    Ok(())
}

/// Validate ping target
fn validate_ping_target(target: &str) -> Result<()> {
    if target.trim().is_empty() {
        bail!("Ping target must not be empty");
    }
    Ok(())
}

/// Validate TCP target, expected format: host:port
fn validate_tcp_target(target: &str) -> Result<()> {
    parse_host_port(target).map(|_| ())
}

/// Validate check interval range
pub fn validate_check_interval(interval_seconds: u64) -> Result<()> {
    if !(MIN_INTERVAL_SECONDS..=MAX_INTERVAL_SECONDS).contains(&interval_seconds) {
        bail!(
            "Check interval must be between {} and {} seconds",
            MIN_INTERVAL_SECONDS,
            MAX_INTERVAL_SECONDS
        );
    }
    Ok(())
}

/// Validate probe timeout range
pub fn validate_timeout(timeout_seconds: u64) -> Result<()> {
    if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&timeout_seconds) {
        bail!(
            "Timeout must be between {} and {} seconds",
            MIN_TIMEOUT_SECONDS,
            MAX_TIMEOUT_SECONDS
        );
    }
    Ok(())
}

/// Validate a full monitor definition
pub fn validate_monitor(monitor: &Monitor) -> Result<()> {
    if monitor.name.trim().is_empty() {
        bail!("Monitor name must not be empty");
    }
    validate_monitor_target(&monitor.target, monitor.check_type)?;
    validate_check_interval(monitor.interval_seconds)?;
    validate_timeout(monitor.timeout_seconds)?;
    Ok(())
}
