// ABOUTME: The per-invocation deployment record and the reports built from it.
// ABOUTME: DeploymentAttempt is created at deploy() entry and returned at exit, never stored.

use serde::Serialize;
use std::fmt;

use super::error::DeployError;
use super::health::HealthVerdict;
use crate::diagnostics::Diagnostics;
use crate::types::{AppName, Color, Version};

/// Where an attempt is in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Provisioning,
    AwaitingReadiness,
    SmokeTesting,
    TrafficSwitched,
    Soaking,
    Finalizing,
    RollingBack,
    Completed,
    RolledBack,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Provisioning => "provisioning",
            Phase::AwaitingReadiness => "awaiting_readiness",
            Phase::SmokeTesting => "smoke_testing",
            Phase::TrafficSwitched => "traffic_switched",
            Phase::Soaking => "soaking",
            Phase::Finalizing => "finalizing",
            Phase::RollingBack => "rolling_back",
            Phase::Completed => "completed",
            Phase::RolledBack => "rolled_back",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::RolledBack | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentAttempt {
    pub app: AppName,
    pub start_color: Color,
    pub target_color: Color,
    pub version: Version,
    pub phase: Phase,
    pub health_verdict: Option<HealthVerdict>,
    pub error_count: Option<usize>,
}

impl DeploymentAttempt {
    pub fn new(app: AppName, start_color: Color, version: Version) -> Self {
        Self {
            app,
            start_color,
            target_color: start_color.opposite(),
            version,
            phase: Phase::Init,
            health_verdict: None,
            error_count: None,
        }
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        tracing::info!(
            app = %self.app,
            version = %self.version,
            from = %self.start_color,
            to = %self.target_color,
            phase = %phase,
            "deployment phase"
        );
        self.phase = phase;
    }
}

/// Successful outcome of `deploy()`.
#[derive(Debug)]
pub struct DeployReport {
    pub attempt: DeploymentAttempt,
    /// The requested version was already live; nothing was changed.
    pub already_live: bool,
    pub diagnostics: Diagnostics,
}

impl DeployReport {
    /// Color receiving traffic after this attempt.
    pub fn live_color(&self) -> Color {
        self.attempt.target_color
    }
}

/// Failed or rolled-back outcome of `deploy()`.
#[derive(Debug)]
pub struct DeployFailure {
    /// Absent when the attempt could not start (the live color was unreadable).
    pub attempt: Option<DeploymentAttempt>,
    pub diagnostics: Diagnostics,
    pub error: DeployError,
}

impl DeployFailure {
    pub fn new(attempt: Option<DeploymentAttempt>, diagnostics: Diagnostics, error: DeployError) -> Self {
        Self {
            attempt,
            diagnostics,
            error,
        }
    }

    pub fn phase(&self) -> Phase {
        self.attempt.as_ref().map_or(Phase::Failed, |a| a.phase)
    }

    pub fn is_rolled_back(&self) -> bool {
        self.phase() == Phase::RolledBack
    }
}

impl fmt::Display for DeployFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attempt {
            Some(attempt) if self.is_rolled_back() => write!(
                f,
                "deployment of {} {} rolled back to {}: {}",
                attempt.app, attempt.version, attempt.start_color, self.error
            ),
            Some(attempt) => write!(
                f,
                "deployment of {} {} failed: {}",
                attempt.app, attempt.version, self.error
            ),
            None => write!(f, "deployment failed: {}", self.error),
        }
    }
}

impl std::error::Error for DeployFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
