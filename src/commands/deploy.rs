// ABOUTME: Deploy command implementation.
// ABOUTME: Wraps the orchestrator with the deploy lock, lifecycle hooks, and user output.

use super::connection::connect_to_cluster;
use bluegreen::config::Config;
use bluegreen::deploy::{DeployLock, DeployReport, DeploySettings, Guard, Orchestrator, live_color};
use bluegreen::diagnostics::{Diagnostics, Warning};
use bluegreen::error::{Error, Result};
use bluegreen::hooks::{HookContext, HookPoint, HookRunner};
use bluegreen::output::{Output, OutputMode};
use bluegreen::types::Version;
use std::env;
use tokio::sync::watch;

/// Deploy `version` of the configured app.
pub async fn deploy(
    config: Config,
    version: &str,
    force: bool,
    mut output: Output,
    cancel: watch::Receiver<bool>,
) -> Result<()> {
    let version = Version::new(version)?;

    output.start_timer();
    let cwd = env::current_dir()?;
    let hook_runner = HookRunner::new(&cwd);
    let mut diag = Diagnostics::default();

    let cluster = connect_to_cluster(&config, &output).await?;

    let guard = Guard::new(&config.policy, cancel.clone());

    let from_color = guard
        .call("selector read", live_color(&cluster, &config.app))
        .await?;
    let hook_context = HookContext {
        app: config.app.clone(),
        version: version.clone(),
        namespace: config.namespace.clone(),
        from_color,
        to_color: from_color.opposite(),
    };

    if let Some(result) = hook_runner.run(HookPoint::PreDeploy, &hook_context).await
        && !result.success
    {
        if !result.stderr.is_empty() {
            output.error(result.stderr.trim_end());
        }
        return Err(Error::Hook("pre-deploy hook failed".to_string()));
    }

    output.progress("  → Acquiring deploy lock...");
    let orchestrator = Orchestrator::new(cluster.clone(), DeploySettings::from_config(&config))
        .with_output(output.clone())
        .with_cancel(cancel);

    let result = DeployLock::with_lock(
        &cluster,
        &config.app,
        &version,
        force,
        config.lock.ttl,
        &guard,
        &mut diag,
        async { orchestrator.deploy(&version).await.map_err(Error::from) },
    )
    .await;

    match result {
        Ok(mut report) => {
            report.diagnostics.absorb(diag);
            let context = HookContext::for_attempt(&report.attempt, &config.namespace);
            if let Some(result) = hook_runner.run(HookPoint::PostDeploy, &context).await
                && !result.success
            {
                report
                    .diagnostics
                    .warn(Warning::hook_failed("post-deploy hook failed"));
            }
            print_warnings(&output, &report.diagnostics);
            print_report(&output, &report);
            Ok(())
        }
        Err(e) => {
            let context = match &e {
                Error::Failed(failure) => failure
                    .attempt
                    .as_ref()
                    .map(|attempt| HookContext::for_attempt(attempt, &config.namespace)),
                _ => None,
            }
            .unwrap_or(hook_context);
            if let Some(result) = hook_runner.run(HookPoint::OnError, &context).await
                && !result.success
            {
                diag.warn(Warning::hook_failed("on-error hook failed"));
            }
            if let Error::Failed(failure) = &e {
                print_warnings(&output, &failure.diagnostics);
            }
            print_warnings(&output, &diag);
            Err(e)
        }
    }
}

fn print_warnings(output: &Output, diag: &Diagnostics) {
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}

fn print_report(output: &Output, report: &DeployReport) {
    let attempt = &report.attempt;
    if output.mode() == OutputMode::Json {
        output.json(attempt);
    }

    let message = if report.already_live {
        format!(
            "{} {} already live on {}",
            attempt.app,
            attempt.version,
            report.live_color()
        )
    } else {
        format!(
            "Deployed {} {} ({} → {}, {} soak errors)",
            attempt.app,
            attempt.version,
            attempt.start_color,
            attempt.target_color,
            attempt.error_count.unwrap_or(0)
        )
    };
    output.success(&message);
}
