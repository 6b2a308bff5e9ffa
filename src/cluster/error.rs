// ABOUTME: Error types for control-plane operations and client connection.
// ABOUTME: Contract failures use thiserror; connection setup uses the SNAFU pattern.

use snafu::Snafu;
use std::time::Duration;

use crate::types::Color;

/// Failures reported by a `ClusterClient` or `LockStore`.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("control plane rejected {color} workload: {message}")]
    Apply { color: Color, message: String },

    #[error("{color} rollout not ready after {}s", .waited.as_secs())]
    RolloutTimeout { color: Color, waited: Duration },

    #[error("no running {color} instances")]
    NoInstances { color: Color },

    #[error("exec in {instance} failed: {message}")]
    Exec { instance: String, message: String },

    #[error("invalid traffic selector: {0}")]
    InvalidSelector(String),

    #[error("control plane error: {0}")]
    Api(String),
}

/// Failures while building a control-plane client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("failed to load cluster configuration: {source}"))]
    Config {
        source: kube::config::InferConfigError,
    },

    #[snafu(display("failed to create cluster client: {source}"))]
    Client { source: kube::Error },
}
