// ABOUTME: Timing and rollback policy for a deployment attempt.
// ABOUTME: Settle, soak, error budget, and deadline parameters with their defaults.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeployPolicy {
    /// How long the new color may take to report all replicas ready.
    #[serde(with = "humantime_serde")]
    pub readiness_timeout: Duration,

    /// Pause between readiness and the smoke test for proxy propagation.
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,

    /// Observation window after the traffic switch.
    #[serde(with = "humantime_serde")]
    pub soak: Duration,

    /// Rollback happens when the soak window shows more error lines than this.
    pub error_threshold: usize,

    /// Most recent log lines, merged across all instances, examined after the soak window.
    pub log_lines: u32,

    /// Upper bound on any single control-plane call.
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,

    /// Upper bound on the whole attempt.
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,

    /// Interval between readiness polls.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for DeployPolicy {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(300),
            settle_delay: Duration::from_secs(10),
            soak: Duration::from_secs(30),
            error_threshold: 5,
            log_lines: 100,
            call_timeout: Duration::from_secs(120),
            deadline: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl DeployPolicy {
    /// Whether an observed error count exceeds the budget.
    pub fn exceeds_budget(&self, errors: usize) -> bool {
        errors > self.error_threshold
    }

    /// Reject values that would make an attempt fail instantly or spin.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("deadline", self.deadline),
            ("call_timeout", self.call_timeout),
            ("poll_interval", self.poll_interval),
        ];
        for (name, value) in required {
            if value.is_zero() {
                return Err(Error::InvalidConfig(format!(
                    "policy.{name} must be greater than zero"
                )));
            }
        }
        if self.log_lines == 0 {
            return Err(Error::InvalidConfig(
                "policy.log_lines must be at least 1".to_string(),
            ));
        }
        if self.readiness_timeout > self.deadline {
            return Err(Error::InvalidConfig(format!(
                "policy.readiness_timeout ({}s) exceeds policy.deadline ({}s)",
                self.readiness_timeout.as_secs(),
                self.deadline.as_secs()
            )));
        }
        Ok(())
    }
}
