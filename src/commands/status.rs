// ABOUTME: Status command implementation.
// ABOUTME: Prints the status snapshot as aligned text or a single JSON object.

use super::connection::connect_to_cluster;
use bluegreen::config::Config;
use bluegreen::error::Result;
use bluegreen::output::{Output, OutputMode};
use bluegreen::status::collect;

pub async fn status(config: Config, output: Output) -> Result<()> {
    let cluster = connect_to_cluster(&config, &output).await?;
    let report = collect(&cluster, &config.app, &config.namespace).await?;

    if output.mode() == OutputMode::Json {
        output.json(&report);
        return Ok(());
    }

    output.info(&format!("App:       {}", report.app));
    output.info(&format!("Namespace: {}", report.namespace));
    match report.live {
        Some(color) => output.info(&format!("Live:      {color}")),
        None => output.info("Live:      none (no traffic selector)"),
    }
    if report.workloads.is_empty() {
        output.info("No workloads");
    }
    for line in &report.workloads {
        let marker = if Some(line.color) == report.live { "*" } else { " " };
        let readiness = if line.ready { "ready" } else { "not ready" };
        output.info(&format!(
            "{marker} {:<5} {:<16} {}/{} {readiness}",
            line.color,
            line.version.as_deref().unwrap_or("-"),
            line.ready_replicas,
            line.replicas
        ));
    }

    Ok(())
}
