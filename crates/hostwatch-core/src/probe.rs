use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub response_time_ms: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn reachable(response_time_ms: f64) -> Self {
        Self {
            reachable: true,
            response_time_ms: Some(response_time_ms),
            timestamp: Utc::now(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            response_time_ms: None,
            timestamp: Utc::now(),
        }
    }
}

/// Environmental faults only. Plain unreachability is an `Ok` outcome.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot resolve host {0}")]
    Resolve(String),
    #[error("failed to launch probe: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(String),
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, hostname: &str) -> Result<ProbeOutcome, ProbeError>;
}

#[derive(Debug, Clone)]
pub struct SystemPingProber {
    program: String,
    timeout: Duration,
}

impl SystemPingProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "ping".to_string(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn wait_secs(&self) -> u64 {
        self.timeout.as_secs().max(1)
    }
}

#[async_trait]
impl Prober for SystemPingProber {
    async fn probe(&self, hostname: &str) -> Result<ProbeOutcome, ProbeError> {
        let started = Instant::now();
        let child = Command::new(&self.program)
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(self.wait_secs().to_string())
            .arg(hostname)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ProbeError::Spawn(format!("{}: {err}", self.program)))?;

        // ping's own -W only bounds the reply wait, not name resolution.
        let grace = self.timeout + Duration::from_millis(500);
        let output = match timeout(grace, child.wait_with_output()).await {
            Ok(res) => res.map_err(|err| ProbeError::Io(err.to_string()))?,
            Err(_) => return Ok(ProbeOutcome::unreachable()),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        trace!(hostname, status = ?output.status, "ping finished");

        if output.status.success() {
            let rtt = parse_ping_time(&stdout)
                .unwrap_or_else(|| started.elapsed().as_secs_f64() * 1000.0);
            return Ok(ProbeOutcome::reachable(rtt));
        }

        if looks_like_resolution_failure(&stderr) {
            return Err(ProbeError::Resolve(hostname.to_string()));
        }
        if stderr.contains("Operation not permitted") || stderr.contains("Permission denied") {
            return Err(ProbeError::Spawn(stderr.trim().to_string()));
        }

        Ok(ProbeOutcome::unreachable())
    }
}

pub fn parse_ping_time(output: &str) -> Option<f64> {
    let idx = output.find("time=").or_else(|| output.find("time<"))?;
    let rest = &output[idx + 5..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn looks_like_resolution_failure(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    lowered.contains("unknown host")
        || lowered.contains("name or service not known")
        || lowered.contains("temporary failure in name resolution")
        || lowered.contains("cannot resolve")
}

#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, hostname: &str) -> Result<ProbeOutcome, ProbeError> {
        let addrs = timeout(
            self.timeout,
            tokio::net::lookup_host((hostname, self.port)),
        )
        .await
        .map_err(|_| ProbeError::Resolve(hostname.to_string()))?
        .map_err(|_| ProbeError::Resolve(hostname.to_string()))?
        .collect::<Vec<_>>();

        if addrs.is_empty() {
            return Err(ProbeError::Resolve(hostname.to_string()));
        }

        let started = Instant::now();
        match timeout(self.timeout, TcpStream::connect(&addrs[..])).await {
            Ok(Ok(_stream)) => Ok(ProbeOutcome::reachable(
                started.elapsed().as_secs_f64() * 1000.0,
            )),
            Ok(Err(err)) => {
                trace!(hostname, port = self.port, error = %err, "tcp connect failed");
                Ok(ProbeOutcome::unreachable())
            }
            Err(_) => Ok(ProbeOutcome::unreachable()),
        }
    }
}
