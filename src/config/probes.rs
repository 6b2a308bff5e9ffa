// ABOUTME: Liveness and readiness probe configuration for deployed workloads.
// ABOUTME: Defaults follow the workload health contract (/health and /ready).

use serde::Deserialize;
use std::time::Duration;

/// A single HTTP probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProbeSpec {
    pub path: String,

    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub period: Duration,
}

/// Probes attached to every workload container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_liveness")]
    pub liveness: ProbeSpec,

    #[serde(default = "default_readiness")]
    pub readiness: ProbeSpec,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            liveness: default_liveness(),
            readiness: default_readiness(),
        }
    }
}

fn default_liveness() -> ProbeSpec {
    ProbeSpec {
        path: "/health".to_string(),
        initial_delay: Duration::from_secs(30),
        period: Duration::from_secs(10),
    }
}

fn default_readiness() -> ProbeSpec {
    ProbeSpec {
        path: "/ready".to_string(),
        initial_delay: Duration::from_secs(5),
        period: Duration::from_secs(5),
    }
}
