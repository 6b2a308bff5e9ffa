// ABOUTME: Error taxonomy for deployment attempts.
// ABOUTME: Groups failures into kinds so callers can tell which ones touched traffic.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::cluster::ClusterError;
use crate::types::Color;

/// Errors that end a deployment attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to apply {color} workload: {message}")]
    Apply { color: Color, message: String },

    #[error("{color} rollout not ready after {}s", .waited.as_secs())]
    RolloutTimeout { color: Color, waited: Duration },

    #[error("no running {color} instances")]
    NoInstances { color: Color },

    #[error("health check exec in {instance} failed: {message}")]
    Exec { instance: String, message: String },

    #[error("smoke test on {instance} reported unhealthy")]
    UnhealthySmokeTest { instance: String },

    #[error("{errors} error lines during soak (threshold {threshold})")]
    ErrorBudgetExceeded { errors: usize, threshold: usize },

    #[error("traffic selector: {0}")]
    Selector(String),

    #[error("conflicting deployment state: {0}")]
    Conflict(String),

    #[error("deploy lock held by {holder} (pid {pid}) since {started_at}")]
    LockHeld {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("deploy lock: {0}")]
    Lock(String),

    #[error("{step} timed out after {}s", .after.as_secs())]
    StepTimeout { step: &'static str, after: Duration },

    #[error("deployment deadline exceeded during {step}")]
    DeadlineExceeded { step: &'static str },

    #[error("cancelled during {step}")]
    Cancelled { step: &'static str },

    #[error("failed to restore traffic to {color}: {message}")]
    RollbackFailed { color: Color, message: String },

    #[error("control plane error: {0}")]
    Cluster(String),
}

/// Broad categories of deployment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Provisioning,
    Readiness,
    SmokeTest,
    ErrorBudget,
    Traffic,
    Conflict,
    Timeout,
    Cancelled,
    Rollback,
    ControlPlane,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Apply { .. } => DeployErrorKind::Provisioning,
            DeployError::RolloutTimeout { .. } => DeployErrorKind::Readiness,
            DeployError::NoInstances { .. }
            | DeployError::Exec { .. }
            | DeployError::UnhealthySmokeTest { .. } => DeployErrorKind::SmokeTest,
            DeployError::ErrorBudgetExceeded { .. } => DeployErrorKind::ErrorBudget,
            DeployError::Selector(_) => DeployErrorKind::Traffic,
            DeployError::Conflict(_) | DeployError::LockHeld { .. } | DeployError::Lock(_) => {
                DeployErrorKind::Conflict
            }
            DeployError::StepTimeout { .. } | DeployError::DeadlineExceeded { .. } => {
                DeployErrorKind::Timeout
            }
            DeployError::Cancelled { .. } => DeployErrorKind::Cancelled,
            DeployError::RollbackFailed { .. } => DeployErrorKind::Rollback,
            DeployError::Cluster(_) => DeployErrorKind::ControlPlane,
        }
    }

    /// Whether this failure category implies the selector was written to
    /// after the switch (reverted, or a revert was attempted).
    pub fn touches_traffic(&self) -> bool {
        matches!(
            self.kind(),
            DeployErrorKind::ErrorBudget | DeployErrorKind::Rollback
        )
    }
}

impl From<ClusterError> for DeployError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::Apply { color, message } => DeployError::Apply { color, message },
            ClusterError::RolloutTimeout { color, waited } => {
                DeployError::RolloutTimeout { color, waited }
            }
            ClusterError::NoInstances { color } => DeployError::NoInstances { color },
            ClusterError::Exec { instance, message } => DeployError::Exec { instance, message },
            ClusterError::InvalidSelector(message) => DeployError::Selector(message),
            err @ (ClusterError::NotFound(_) | ClusterError::Api(_)) => {
                DeployError::Cluster(err.to_string())
            }
        }
    }
}
