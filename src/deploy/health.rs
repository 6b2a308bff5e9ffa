// ABOUTME: Parses the workload's health response into a verdict.
// ABOUTME: Only an exact {"status": "healthy"} body counts as healthy.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Outcome of the smoke test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum HealthVerdict {
    Healthy,
    Unhealthy,
    /// No response could be obtained at all.
    Unknown(String),
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthVerdict::Healthy)
    }
}

impl fmt::Display for HealthVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthVerdict::Healthy => f.write_str("healthy"),
            HealthVerdict::Unhealthy => f.write_str("unhealthy"),
            HealthVerdict::Unknown(reason) => write!(f, "unknown ({reason})"),
        }
    }
}

/// Single-shot health evaluation. No retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthProbe;

impl HealthProbe {
    pub fn check(raw: &str) -> HealthVerdict {
        let status = serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|body| body.get("status").and_then(Value::as_str).map(str::to_owned));

        match status.as_deref() {
            Some("healthy") => HealthVerdict::Healthy,
            _ => HealthVerdict::Unhealthy,
        }
    }
}
