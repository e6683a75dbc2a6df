use std::net::IpAddr;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use url::Url;

use super::types::ProbeReport;

/// Type of monitoring check to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// HTTP or HTTPS GET request
    #[serde(alias = "https")]
    Http,
    /// ICMP echo
    Ping,
    /// Plain TCP connect to host:port
    Tcp,
}

impl CheckType {
    /// Probe timeout applied when the monitor does not set one
    pub fn default_timeout_seconds(self) -> u64 {
        match self {
            CheckType::Http => 30,
            CheckType::Ping | CheckType::Tcp => 10,
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckType::Http => write!(f, "http"),
            CheckType::Ping => write!(f, "ping"),
            CheckType::Tcp => write!(f, "tcp"),
        }
    }
}

impl std::str::FromStr for CheckType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" | "https" => Ok(CheckType::Http),
            "ping" => Ok(CheckType::Ping),
            "tcp" => Ok(CheckType::Tcp),
            other => Err(anyhow!("Unsupported check type: {other}")),
        }
    }
}

/// Checker trait for different types of monitoring checks
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Probe the target once, classifying whatever happened
    async fn check(&self, target: &str, timeout: Duration) -> ProbeReport;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("upwatch-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str, timeout: Duration) -> ProbeReport {
        let start = Instant::now();

        match self.client.get(target).timeout(timeout).send().await {
            Ok(response) => {
                let elapsed = start.elapsed().as_millis() as u64;
                classify_http_status(response.status().as_u16(), elapsed)
            }
            Err(e) => {
                let elapsed = start.elapsed().as_millis() as u64;
                classify_http_failure(&e, elapsed)
            }
        }
    }
}

/// Map an HTTP response status onto a check outcome.
///
/// 2xx and 3xx are up. 4xx also counts as up: the endpoint answered, even
/// if it rejected this particular request. Only 5xx marks the target down.
pub fn classify_http_status(code: u16, response_time_ms: u64) -> ProbeReport {
    if (200..500).contains(&code) {
        ProbeReport::up(response_time_ms).with_status_code(code)
    } else {
        ProbeReport::down(format!("HTTP {code}"))
            .with_response_time(response_time_ms)
            .with_status_code(code)
    }
}

fn classify_http_failure(error: &reqwest::Error, response_time_ms: u64) -> ProbeReport {
    if error.is_timeout() {
        return ProbeReport::down("Request timeout").with_response_time(response_time_ms);
    }
    // DNS errors also report is_connect, so they have to be ruled out first
    if is_dns_failure(error) {
        return ProbeReport::down("DNS resolution failed").with_response_time(response_time_ms);
    }
    if error.is_connect() {
        return ProbeReport::down("Connection refused").with_response_time(response_time_ms);
    }

    ProbeReport::error(error.to_string())
}

fn is_dns_failure(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        if inner.to_string().to_lowercase().contains("dns") {
            return true;
        }
        source = inner.source();
    }
    false
}

/// ICMP echo checker
pub struct PingChecker;

impl PingChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for PingChecker {
    async fn check(&self, target: &str, timeout: Duration) -> ProbeReport {
        let host = ping_host(target);
        let Some(addr) = resolve_host(&host).await else {
            return ProbeReport::error(format!("DNS resolution failed for {host}"));
        };

        let config = match addr {
            IpAddr::V4(_) => surge_ping::Config::default(),
            IpAddr::V6(_) => surge_ping::Config::builder().kind(surge_ping::ICMP::V6).build(),
        };
        // Raw ICMP sockets need privileges; treat an unavailable socket as a
        // probe failure rather than reachability information.
        let client = match surge_ping::Client::new(&config) {
            Ok(client) => client,
            Err(e) => return ProbeReport::error(format!("ICMP socket unavailable: {e}")),
        };

        let mut pinger = client.pinger(addr, surge_ping::PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        match pinger.ping(surge_ping::PingSequence(0), &[]).await {
            Ok((_reply, rtt)) => ProbeReport::up(rtt.as_millis() as u64),
            Err(surge_ping::SurgeError::Timeout { .. }) => ProbeReport::down("Host not reachable"),
            Err(e) => ProbeReport::error(e.to_string()),
        }
    }
}

/// Reduce a ping target to a bare host, tolerating URL-style input
fn ping_host(target: &str) -> String {
    let trimmed = target.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        if let Some(host) = Url::parse(trimmed).ok().and_then(|url| url.host_str().map(String::from))
        {
            return host;
        }
    }
    trimmed.to_string()
}

async fn resolve_host(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    tokio::net::lookup_host((host, 0)).await.ok()?.next().map(|addr| addr.ip())
}

/// TCP port checker
pub struct TcpChecker;

impl TcpChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, target: &str, timeout_duration: Duration) -> ProbeReport {
        let (host, port) = match parse_host_port(target) {
            Ok(parts) => parts,
            // A malformed target never reaches the network, so no timing
            Err(e) => return ProbeReport::error(e.to_string()),
        };

        let start = Instant::now();
        let connect = tokio::net::TcpStream::connect((host.as_str(), port));

        match timeout(timeout_duration, connect).await {
            Ok(Ok(_stream)) => {
                let elapsed = start.elapsed().as_millis() as u64;
                ProbeReport::up(elapsed).with_status_code(port)
            }
            Ok(Err(e)) => {
                let elapsed = start.elapsed().as_millis() as u64;
                let detail = match e.kind() {
                    std::io::ErrorKind::ConnectionRefused => "Connection refused".to_string(),
                    _ => e.to_string(),
                };
                ProbeReport::down(detail).with_response_time(elapsed)
            }
            Err(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                ProbeReport::down("Connection timeout").with_response_time(elapsed)
            }
        }
    }
}

/// Parse `host:port` out of a TCP target, tolerating a `tcp://` or
/// `http(s)://` prefix. Bracketed IPv6 literals come back unbracketed,
/// ready for `ToSocketAddrs`.
pub fn parse_host_port(target: &str) -> Result<(String, u16)> {
    let trimmed = target.trim();
    let stripped = trimmed
        .strip_prefix("tcp://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);

    let (host, port) = if let Some(rest) = stripped.strip_prefix('[') {
        let (addr, tail) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("Unclosed bracket in TCP target: {target}"))?;
        if addr.parse::<std::net::Ipv6Addr>().is_err() {
            bail!("Invalid IPv6 address in TCP target: {target}");
        }
        let port = tail
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("TCP target must be host:port: {target}"))?;
        (addr, port)
    } else {
        stripped
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("TCP target must be host:port: {target}"))?
    };
    if host.is_empty() {
        bail!("TCP target must be host:port: {target}");
    }

    let port: u16 = port.parse().map_err(|_| anyhow!("Invalid port in TCP target: {target}"))?;
    if port == 0 {
        bail!("Port 0 is not valid");
    }

    Ok((host.to_string(), port))
}
