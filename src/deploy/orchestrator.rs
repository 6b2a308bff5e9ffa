// ABOUTME: Drives one blue-green deployment attempt through the state machine.
// ABOUTME: Reads live state, plans the attempt, and applies the failure rules per phase.

use tokio::sync::watch;

use crate::cluster::{ClusterClient, ClusterError, Environment, WorkloadStatus};
use crate::config::{Config, DeployPolicy, ProbeConfig};
use crate::diagnostics::{Diagnostics, Warning};
use crate::output::{Output, OutputMode};
use crate::types::{AppName, Color, ImageRef, Version};

use super::Deployment;
use super::attempt::{DeployFailure, DeployReport, DeploymentAttempt, Phase};
use super::clock::{Clock, TokioClock};
use super::error::DeployError;
use super::guard::Guard;
use super::state::Planned;
use super::transitions::StepContext;

/// Everything about a deployment that does not depend on the version.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub app: AppName,
    pub image: ImageRef,
    pub replicas: u32,
    pub probes: ProbeConfig,
    pub policy: DeployPolicy,
}

impl DeploySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            app: config.app.clone(),
            image: config.image.clone(),
            replicas: config.replicas,
            probes: config.probes.clone(),
            policy: config.policy.clone(),
        }
    }
}

/// Color the traffic selector points at. A missing selector means nothing
/// has been deployed yet, which starts on the default color.
pub async fn live_color<C>(cluster: &C, app: &AppName) -> Result<Color, ClusterError>
where
    C: ClusterClient + ?Sized,
{
    match cluster.selector_color(app).await {
        Ok(color) => Ok(color),
        Err(ClusterError::NotFound(what)) => {
            tracing::debug!(app = %app, missing = %what, "no traffic selector yet");
            Ok(Color::DEFAULT_LIVE)
        }
        Err(e) => Err(e),
    }
}

/// What to do with the observed cluster state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Plan {
    /// Requested version is already live on its own; nothing to do.
    AlreadyLive,
    /// Roll out to the opposite color. `stale` is set when a leftover
    /// workload of that color will be overwritten.
    Rollout { stale: Option<String> },
}

/// Decide how to proceed from the live color's workload and the standby's.
pub(crate) fn plan(
    version: &Version,
    live: Option<&WorkloadStatus>,
    standby: Option<&WorkloadStatus>,
) -> Result<Plan, DeployError> {
    match (live, standby) {
        (Some(live), None) if live.runs(version) => Ok(Plan::AlreadyLive),
        (Some(live), Some(standby)) if live.version != standby.version => {
            Err(DeployError::Conflict(format!(
                "both colors exist with different versions ({} live {}, {} standby {})",
                live.color,
                live.version.as_deref().unwrap_or("unlabelled"),
                standby.color,
                standby.version.as_deref().unwrap_or("unlabelled"),
            )))
        }
        (_, Some(standby)) => Ok(Plan::Rollout {
            stale: Some(format!(
                "replacing leftover {} workload ({})",
                standby.color,
                standby.version.as_deref().unwrap_or("unlabelled")
            )),
        }),
        (_, None) => Ok(Plan::Rollout { stale: None }),
    }
}

/// Runs deployments of one app against a cluster.
pub struct Orchestrator<C, K = TokioClock> {
    cluster: C,
    clock: K,
    settings: DeploySettings,
    output: Output,
    cancel: watch::Receiver<bool>,
}

impl<C: ClusterClient> Orchestrator<C> {
    pub fn new(cluster: C, settings: DeploySettings) -> Self {
        // A receiver whose sender is gone never reports cancellation.
        let (_, cancel) = watch::channel(false);
        Self {
            cluster,
            clock: TokioClock,
            settings,
            output: Output::new(OutputMode::Quiet),
            cancel,
        }
    }
}

impl<C: ClusterClient, K: Clock> Orchestrator<C, K> {
    pub fn with_clock<K2: Clock>(self, clock: K2) -> Orchestrator<C, K2> {
        Orchestrator {
            cluster: self.cluster,
            clock,
            settings: self.settings,
            output: self.output,
            cancel: self.cancel,
        }
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Abort the running attempt when `cancel` flips to `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    /// Deploy `version`.
    ///
    /// Returns the report on `Completed` (or when the version is already
    /// live). `Failed` and `RolledBack` both come back as `DeployFailure`.
    pub async fn deploy(&self, version: &Version) -> Result<DeployReport, DeployFailure> {
        let settings = &self.settings;
        let app = &settings.app;
        let guard = Guard::new(&settings.policy, self.cancel.clone());
        let mut diag = Diagnostics::default();

        let start = guard
            .call("selector read", live_color(&self.cluster, app))
            .await
            .map_err(|e| DeployFailure::new(None, Diagnostics::default(), e))?;
        let mut attempt = DeploymentAttempt::new(app.clone(), start, version.clone());
        let target = attempt.target_color;

        let observed = async {
            let live = self.cluster.workload(app, start).await?;
            let standby = self.cluster.workload(app, target).await?;
            Ok::<_, ClusterError>((live, standby))
        };
        let (live, standby) = match guard.call("workload read", observed).await {
            Ok(observed) => observed,
            Err(e) => {
                attempt.enter(Phase::Failed);
                return Err(DeployFailure::new(Some(attempt), diag, e));
            }
        };

        match plan(version, live.as_ref(), standby.as_ref()) {
            Ok(Plan::AlreadyLive) => {
                tracing::info!(app = %app, version = %version, color = %start, "version already live");
                self.output
                    .progress(&format!("{app} {version} is already live on {start}"));
                attempt.target_color = start;
                attempt.enter(Phase::Completed);
                return Ok(DeployReport {
                    attempt,
                    already_live: true,
                    diagnostics: diag,
                });
            }
            Ok(Plan::Rollout { stale: Some(message) }) => {
                diag.warn(Warning::stale_workload(message));
            }
            Ok(Plan::Rollout { stale: None }) => {}
            Err(e) => {
                attempt.enter(Phase::Failed);
                return Err(DeployFailure::new(Some(attempt), diag, e));
            }
        }

        let environment = Environment {
            color: target,
            version: version.clone(),
            replicas: settings.replicas,
            image: settings.image.with_version(version),
        };
        let ctx = StepContext {
            cluster: &self.cluster,
            clock: &self.clock,
            guard: &guard,
            policy: &settings.policy,
            probes: &settings.probes,
        };

        self.output.progress(&format!(
            "Deploying {app} {version}: {start} is live, rolling out {target} ({})",
            environment.image
        ));

        self.run(Deployment::new(attempt, environment, diag), &ctx)
            .await
    }

    async fn run(
        &self,
        deployment: Deployment<Planned>,
        ctx: &StepContext<'_, C, K>,
    ) -> Result<DeployReport, DeployFailure> {
        let target = deployment.target_color();
        let start = deployment.start_color();

        self.output.progress(&format!("  → Applying {target} workload..."));
        let deployment = match deployment.provision(ctx).await {
            Ok(d) => d,
            Err((d, e @ DeployError::Apply { .. })) => return Err(d.fail(e)),
            Err((d, e)) => return Err(d.abandon(ctx, e).await),
        };

        self.output
            .progress(&format!("  → Waiting for {target} replicas to become ready..."));
        let deployment = match deployment.await_readiness(ctx).await {
            Ok(d) => d,
            Err((d, e)) => return Err(d.abandon(ctx, e).await),
        };

        self.output.progress("  → Smoke testing one instance...");
        let deployment = match deployment.smoke_test(ctx).await {
            Ok(d) => d,
            Err((d, e)) => return Err(d.abandon(ctx, e).await),
        };
        self.output.progress(&format!(
            "  → {} reported healthy",
            deployment.instance()
        ));

        self.output
            .progress(&format!("  → Switching traffic {start} → {target}..."));
        let deployment = deployment.switch_traffic(ctx).await?;

        self.output.progress(&format!(
            "  → Soaking for {}s...",
            ctx.policy.soak.as_secs()
        ));
        let deployment = match deployment.soak(ctx).await {
            Ok(d) => d,
            Err((d, e)) => {
                self.output
                    .progress(&format!("  → Rolling back traffic to {start}..."));
                return Err(d.roll_back(ctx, e).await);
            }
        };

        if let Some(violation) = deployment.budget_violation(ctx.policy) {
            self.output.progress(&format!(
                "  → {violation}, rolling back traffic to {start}..."
            ));
            return Err(deployment.roll_back(ctx, violation).await);
        }

        self.output
            .progress(&format!("  → Removing previous {start} workload..."));
        Ok(deployment.finalize(ctx).await.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(color: Color, version: &str) -> WorkloadStatus {
        WorkloadStatus {
            color,
            version: Some(version.to_string()),
            replicas: 2,
            ready_replicas: 2,
        }
    }

    fn v(s: &str) -> Version {
        Version::new(s).unwrap()
    }

    #[test]
    fn fresh_cluster_rolls_out() {
        assert_eq!(
            plan(&v("1.0.0"), None, None).unwrap(),
            Plan::Rollout { stale: None }
        );
    }

    #[test]
    fn live_version_alone_is_already_live() {
        let live = status(Color::Green, "1.2.0");
        assert_eq!(
            plan(&v("1.2.0"), Some(&live), None).unwrap(),
            Plan::AlreadyLive
        );
    }

    #[test]
    fn different_live_version_rolls_out() {
        let live = status(Color::Blue, "1.1.0");
        assert_eq!(
            plan(&v("1.2.0"), Some(&live), None).unwrap(),
            Plan::Rollout { stale: None }
        );
    }

    #[test]
    fn mismatched_colors_conflict() {
        let live = status(Color::Blue, "1.1.0");
        let standby = status(Color::Green, "1.2.0");
        let err = plan(&v("1.3.0"), Some(&live), Some(&standby)).unwrap_err();
        assert!(matches!(err, DeployError::Conflict(_)));
    }

    #[test]
    fn duplicate_standby_is_replaced_with_warning() {
        let live = status(Color::Blue, "1.1.0");
        let standby = status(Color::Green, "1.1.0");
        assert!(matches!(
            plan(&v("1.2.0"), Some(&live), Some(&standby)).unwrap(),
            Plan::Rollout { stale: Some(_) }
        ));
    }

    #[test]
    fn orphaned_standby_without_live_is_replaced() {
        let standby = status(Color::Green, "0.9.0");
        assert!(matches!(
            plan(&v("1.0.0"), None, Some(&standby)).unwrap(),
            Plan::Rollout { stale: Some(_) }
        ));
    }
}
