// ABOUTME: Shared helper for connecting to the cluster control plane.
// ABOUTME: Used by both the deploy and status commands.

use bluegreen::cluster::KubeCluster;
use bluegreen::config::Config;
use bluegreen::error::Result;
use bluegreen::output::Output;

/// Build a cluster client for the configured namespace.
pub async fn connect_to_cluster(config: &Config, output: &Output) -> Result<KubeCluster> {
    output.progress(&format!(
        "  → Connecting to cluster (namespace {})...",
        config.namespace
    ));

    let cluster = KubeCluster::connect(
        &config.namespace,
        config.workload_template()?,
        config.policy.poll_interval,
    )
    .await?;

    Ok(cluster)
}
