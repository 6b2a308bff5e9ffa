// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state, or the prior state plus an error.

use crate::cluster::{ClusterClient, ClusterError};
use crate::config::{DeployPolicy, ProbeConfig};
use crate::diagnostics::Warning;

use super::Deployment;
use super::attempt::{DeployFailure, DeployReport, Phase};
use super::clock::Clock;
use super::error::DeployError;
use super::guard::Guard;
use super::health::{HealthProbe, HealthVerdict};
use super::logs::{LogErrorCounter, LogSample};
use super::state::{
    Completed, Planned, PostSwitch, PreSwitch, Provisioned, Ready, Soaked, SmokeTested, Switched,
};

/// Result type for transitions that may need cleanup on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

/// Collaborators shared by every transition of one attempt.
pub struct StepContext<'a, C: ?Sized, K: ?Sized> {
    pub cluster: &'a C,
    pub clock: &'a K,
    pub guard: &'a Guard,
    pub policy: &'a DeployPolicy,
    pub probes: &'a ProbeConfig,
}

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            app: self.app,
            target: self.target,
            attempt: self.attempt,
            diag: self.diag,
            state,
        }
    }

    fn end(mut self, phase: Phase, error: DeployError) -> DeployFailure {
        self.attempt.enter(phase);
        DeployFailure::new(Some(self.attempt), self.diag, error)
    }

    /// Best-effort removal of the target workload.
    async fn delete_target<C, K>(&mut self, ctx: &StepContext<'_, C, K>)
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        let color = self.target.color;
        if let Err(e) = ctx
            .guard
            .cleanup("target cleanup", ctx.cluster.delete_workload(&self.app, color))
            .await
        {
            self.diag.warn(Warning::cleanup_failed(format!(
                "failed to delete {color} workload of {}: {e}",
                self.app
            )));
        }
    }
}

// =============================================================================
// Failure Before the Switch
// =============================================================================

impl<S: PreSwitch> Deployment<S> {
    /// End as `Failed` without touching the cluster.
    pub fn fail(self, error: DeployError) -> DeployFailure {
        self.end(Phase::Failed, error)
    }

    /// Delete the target workload and end as `Failed`. The selector is never
    /// written from here.
    pub async fn abandon<C, K>(mut self, ctx: &StepContext<'_, C, K>, error: DeployError) -> DeployFailure
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        tracing::warn!(
            app = %self.app,
            color = %self.target.color,
            error = %error,
            "abandoning target environment"
        );
        self.delete_target(ctx).await;
        self.end(Phase::Failed, error)
    }
}

// =============================================================================
// Planned -> Provisioned
// =============================================================================

impl Deployment<Planned> {
    /// Create or update the target color's workload.
    #[must_use = "deployment state must be used"]
    pub async fn provision<C, K>(
        mut self,
        ctx: &StepContext<'_, C, K>,
    ) -> TransitionResult<Provisioned, Planned>
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        self.attempt.enter(Phase::Provisioning);

        let applied = ctx
            .guard
            .call(
                "provision",
                ctx.cluster
                    .create_or_update_workload(&self.app, &self.target, ctx.probes),
            )
            .await;

        match applied {
            Ok(()) => Ok(self.transition(Provisioned)),
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Provisioned -> Ready
// =============================================================================

impl Deployment<Provisioned> {
    /// Wait until every target replica reports ready.
    #[must_use = "deployment state must be used"]
    pub async fn await_readiness<C, K>(
        mut self,
        ctx: &StepContext<'_, C, K>,
    ) -> TransitionResult<Ready, Provisioned>
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        self.attempt.enter(Phase::AwaitingReadiness);

        let ready = ctx
            .guard
            .wait(
                "readiness",
                ctx.cluster.wait_for_ready(
                    &self.app,
                    self.target.color,
                    ctx.policy.readiness_timeout,
                ),
            )
            .await;

        match ready {
            Ok(()) => Ok(self.transition(Ready)),
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Ready -> SmokeTested
// =============================================================================

impl Deployment<Ready> {
    /// Settle, then run one health check inside one target instance.
    ///
    /// Only a `healthy` verdict advances. Anything else, including failing to
    /// reach an instance, is returned as an error with the verdict recorded on
    /// the attempt.
    #[must_use = "deployment state must be used"]
    pub async fn smoke_test<C, K>(
        mut self,
        ctx: &StepContext<'_, C, K>,
    ) -> TransitionResult<SmokeTested, Ready>
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        self.attempt.enter(Phase::SmokeTesting);

        if let Err(e) = ctx
            .guard
            .pause(ctx.clock, "settle", ctx.policy.settle_delay)
            .await
        {
            return Err((self, e));
        }

        let color = self.target.color;
        let lookup = ctx
            .guard
            .call("instance lookup", ctx.cluster.one_instance(&self.app, color))
            .await;
        let instance = match lookup {
            Ok(instance) => instance,
            Err(e) => {
                self.attempt.health_verdict = Some(HealthVerdict::Unknown(e.to_string()));
                return Err((self, e));
            }
        };

        let response = ctx
            .guard
            .call("health check", ctx.cluster.exec_health_check(&instance))
            .await;
        let raw = match response {
            Ok(raw) => raw,
            Err(e) => {
                self.attempt.health_verdict = Some(HealthVerdict::Unknown(e.to_string()));
                return Err((self, e));
            }
        };

        let verdict = HealthProbe::check(&raw);
        tracing::info!(app = %self.app, instance = %instance, verdict = %verdict, "smoke test");
        self.attempt.health_verdict = Some(verdict.clone());

        if verdict.is_healthy() {
            Ok(self.transition(SmokeTested { instance }))
        } else {
            Err((
                self,
                DeployError::UnhealthySmokeTest {
                    instance: instance.name,
                },
            ))
        }
    }
}

// =============================================================================
// SmokeTested -> Switched
// =============================================================================

impl Deployment<SmokeTested> {
    /// Point the selector at the target color.
    ///
    /// On failure the patch may still have landed, so the selector is
    /// re-pointed at the start color before the target is deleted.
    pub async fn switch_traffic<C, K>(
        self,
        ctx: &StepContext<'_, C, K>,
    ) -> Result<Deployment<Switched>, DeployFailure>
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        let switched = ctx
            .guard
            .call(
                "traffic switch",
                ctx.cluster.patch_selector(&self.app, self.target.color),
            )
            .await;

        match switched {
            Ok(()) => {
                let mut deployment = self.transition(Switched);
                deployment.attempt.enter(Phase::TrafficSwitched);
                Ok(deployment)
            }
            Err(e) => Err(self.recover_failed_switch(ctx, e).await),
        }
    }

    async fn recover_failed_switch<C, K>(
        mut self,
        ctx: &StepContext<'_, C, K>,
        error: DeployError,
    ) -> DeployFailure
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        let start = self.attempt.start_color;
        let restored = ctx
            .guard
            .cleanup("selector restore", ctx.cluster.patch_selector(&self.app, start))
            .await;

        match restored {
            Ok(()) => self.delete_target(ctx).await,
            Err(e) => self.diag.warn(Warning::cleanup_failed(format!(
                "could not confirm selector of {} is on {start} ({e}); leaving {} workload in place",
                self.app, self.target.color
            ))),
        }
        self.end(Phase::Failed, error)
    }
}

// =============================================================================
// Switched -> Soaked
// =============================================================================

impl Deployment<Switched> {
    /// Wait out the soak window, then count error lines in the target's logs.
    ///
    /// Logs that cannot be read count as zero errors. Cancellation and the
    /// deadline still abort.
    #[must_use = "deployment state must be used"]
    pub async fn soak<C, K>(mut self, ctx: &StepContext<'_, C, K>) -> TransitionResult<Soaked, Switched>
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        self.attempt.enter(Phase::Soaking);

        if let Err(e) = ctx.guard.pause(ctx.clock, "soak", ctx.policy.soak).await {
            return Err((self, e));
        }

        let fetch = async {
            let stream = ctx
                .cluster
                .tail_logs(&self.app, self.target.color, ctx.policy.log_lines)
                .await?;
            Ok::<_, ClusterError>(LogErrorCounter::sample(stream).await)
        };

        let fetched = ctx.guard.call("log fetch", fetch).await;
        let sample = match fetched {
            Ok(sample) => sample,
            Err(e @ (DeployError::Cancelled { .. } | DeployError::DeadlineExceeded { .. })) => {
                return Err((self, e));
            }
            Err(e) => {
                self.diag.warn(Warning::logs_unavailable(format!(
                    "could not read {} logs, counting zero errors: {e}",
                    self.target.color
                )));
                LogSample::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        tracing::info!(
            app = %self.app,
            color = %self.target.color,
            errors = sample.errors(),
            "soak window evaluated"
        );
        self.attempt.error_count = Some(sample.errors());
        Ok(self.transition(Soaked { sample }))
    }
}

// =============================================================================
// Soaked -> Completed
// =============================================================================

impl Deployment<Soaked> {
    /// The error that should trigger a rollback, if the soak sample is over
    /// budget.
    pub fn budget_violation(&self, policy: &DeployPolicy) -> Option<DeployError> {
        let errors = self.state.sample.errors();
        policy
            .exceeds_budget(errors)
            .then_some(DeployError::ErrorBudgetExceeded {
                errors,
                threshold: policy.error_threshold,
            })
    }

    /// Delete the start color's workload. Failure to delete only warns.
    pub async fn finalize<C, K>(mut self, ctx: &StepContext<'_, C, K>) -> Deployment<Completed>
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        self.attempt.enter(Phase::Finalizing);

        let start = self.attempt.start_color;
        if let Err(e) = ctx
            .guard
            .cleanup("previous cleanup", ctx.cluster.delete_workload(&self.app, start))
            .await
        {
            self.diag.warn(Warning::cleanup_failed(format!(
                "failed to delete previous {start} workload of {}: {e}",
                self.app
            )));
        }

        let mut deployment = self.transition(Completed);
        deployment.attempt.enter(Phase::Completed);
        deployment
    }
}

// =============================================================================
// Rollback After the Switch
// =============================================================================

impl<S: PostSwitch> Deployment<S> {
    /// Re-point the selector at the start color and delete the target.
    ///
    /// Ends as `RolledBack` carrying `cause`. If the selector cannot be
    /// restored the target is left running and the attempt ends as `Failed`.
    pub async fn roll_back<C, K>(
        mut self,
        ctx: &StepContext<'_, C, K>,
        cause: DeployError,
    ) -> DeployFailure
    where
        C: ClusterClient + ?Sized,
        K: Clock + ?Sized,
    {
        self.attempt.enter(Phase::RollingBack);
        let start = self.attempt.start_color;
        tracing::warn!(app = %self.app, to = %start, cause = %cause, "rolling back traffic");

        let reverted = ctx
            .guard
            .cleanup("selector revert", ctx.cluster.patch_selector(&self.app, start))
            .await;

        match reverted {
            Ok(()) => {
                self.delete_target(ctx).await;
                self.end(Phase::RolledBack, cause)
            }
            Err(e) => self.end(
                Phase::Failed,
                DeployError::RollbackFailed {
                    color: start,
                    message: format!("{e} (rolling back after: {cause})"),
                },
            ),
        }
    }
}

// =============================================================================
// Completed - Terminal State
// =============================================================================

impl Deployment<Completed> {
    pub fn finish(self) -> DeployReport {
        DeployReport {
            attempt: self.attempt,
            already_live: false,
            diagnostics: self.diag,
        }
    }
}
