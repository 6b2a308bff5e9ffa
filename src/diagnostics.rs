// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

/// Collects non-fatal warnings during deployment operations.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Move another collector's warnings into this one, keeping order.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn cleanup_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::CleanupFailed,
            message: message.into(),
        }
    }

    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }

    pub fn hook_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::HookFailed,
            message: message.into(),
        }
    }

    pub fn stale_workload(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::StaleWorkload,
            message: message.into(),
        }
    }

    pub fn logs_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LogsUnavailable,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Best-effort workload deletion failed; an extra color may remain.
    CleanupFailed,
    /// Failed to remove the deploy lock.
    LockRelease,
    /// A post-deploy or on-error hook failed.
    HookFailed,
    /// A leftover workload of the target color was found and replaced.
    StaleWorkload,
    /// Soak logs could not be read and were counted as zero errors.
    LogsUnavailable,
}
