// ABOUTME: Hooks system for deployment lifecycle events.
// ABOUTME: Discovers and executes shell scripts at pre-deploy, post-deploy, and on-error points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::deploy::DeploymentAttempt;
use crate::types::{AppName, Color, Version};

/// Hook execution points in the deployment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before deployment starts. Failure aborts deployment.
    PreDeploy,
    /// After successful deployment. Failure logs warning.
    PostDeploy,
    /// On deployment failure or rollback. Failure logs warning.
    OnError,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this hook point should abort deployment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreDeploy)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub app: AppName,
    pub version: Version,
    pub namespace: String,
    pub from_color: Color,
    pub to_color: Color,
}

impl HookContext {
    /// Context describing what an attempt actually did. An already-live
    /// attempt reports the same color on both sides.
    pub fn for_attempt(attempt: &DeploymentAttempt, namespace: &str) -> Self {
        Self {
            app: attempt.app.clone(),
            version: attempt.version.clone(),
            namespace: namespace.to_string(),
            from_color: attempt.start_color,
            to_color: attempt.target_color,
        }
    }

    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        HashMap::from([
            ("BLUEGREEN_APP".to_string(), self.app.to_string()),
            ("BLUEGREEN_VERSION".to_string(), self.version.to_string()),
            ("BLUEGREEN_NAMESPACE".to_string(), self.namespace.clone()),
            ("BLUEGREEN_FROM_COLOR".to_string(), self.from_color.to_string()),
            ("BLUEGREEN_TO_COLOR".to_string(), self.to_color.to_string()),
        ])
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a new hook runner looking for hooks in the given project directory.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            hooks_dir: project_dir.join(".bluegreen").join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!(hook = point.filename(), path = %hook_path.display(), "running hook");

        let output = Command::new(&hook_path)
            .envs(context.to_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!(hook = point.filename(), "hook completed");
                } else {
                    tracing::warn!(
                        hook = point.filename(),
                        exit_code = ?result.exit_code,
                        "hook failed"
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!(hook = point.filename(), error = %e, "failed to execute hook");
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}
