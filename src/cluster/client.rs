// ABOUTME: Control-plane contract consumed by the deployment orchestrator.
// ABOUTME: Defines ClusterClient, LockStore, and the value types they exchange.

use async_trait::async_trait;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use super::error::ClusterError;
use crate::config::ProbeConfig;
use crate::types::{AppName, Color, ImageRef, Version};

/// One color's workload as the orchestrator wants it to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub color: Color,
    pub version: Version,
    pub replicas: u32,
    pub image: ImageRef,
}

/// Observed state of a color's workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub color: Color,
    /// Value of the `version` label, if present.
    pub version: Option<String>,
    pub replicas: u32,
    pub ready_replicas: u32,
}

impl WorkloadStatus {
    pub fn is_ready(&self) -> bool {
        self.ready_replicas >= self.replicas
    }

    pub fn runs(&self, version: &Version) -> bool {
        self.version.as_deref() == Some(version.as_str())
    }
}

/// A single running instance of a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRef {
    pub name: String,
    pub color: Color,
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Lazily produced log lines; finite, ends after the requested tail.
pub type LogLines = Pin<Box<dyn Stream<Item = Result<String, ClusterError>> + Send>>;

/// Stateless facade over the cluster's authoritative state.
///
/// Implementations must not cache anything between calls: the traffic
/// selector read here is the single source of truth for which color is live.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Color currently referenced by the traffic selector.
    ///
    /// Returns `ClusterError::NotFound` when no selector exists yet.
    async fn selector_color(&self, app: &AppName) -> Result<Color, ClusterError>;

    /// Inspect the workload of one color. `None` if it does not exist.
    async fn workload(
        &self,
        app: &AppName,
        color: Color,
    ) -> Result<Option<WorkloadStatus>, ClusterError>;

    /// Idempotent upsert of a color's workload.
    async fn create_or_update_workload(
        &self,
        app: &AppName,
        env: &Environment,
        probes: &ProbeConfig,
    ) -> Result<(), ClusterError>;

    /// Block until every replica of `color` is ready.
    async fn wait_for_ready(
        &self,
        app: &AppName,
        color: Color,
        timeout: Duration,
    ) -> Result<(), ClusterError>;

    /// Pick one running instance of `color`.
    async fn one_instance(&self, app: &AppName, color: Color)
    -> Result<InstanceRef, ClusterError>;

    /// Run the health request inside an instance and return the raw body.
    async fn exec_health_check(&self, instance: &InstanceRef) -> Result<String, ClusterError>;

    /// Point the traffic selector at `color` in one atomic, idempotent write.
    async fn patch_selector(&self, app: &AppName, color: Color) -> Result<(), ClusterError>;

    /// The `lines` most recent log lines across all instances of `color`, oldest first.
    async fn tail_logs(
        &self,
        app: &AppName,
        color: Color,
        lines: u32,
    ) -> Result<LogLines, ClusterError>;

    /// Delete a color's workload. Deleting an absent workload succeeds.
    async fn delete_workload(&self, app: &AppName, color: Color) -> Result<(), ClusterError>;
}

/// Cluster-side storage for the per-app deploy lock.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically create the lock record. Returns `false` if one already exists.
    async fn try_create_lock(&self, app: &AppName, record: &str) -> Result<bool, ClusterError>;

    /// Read the current lock record, if any.
    async fn read_lock(&self, app: &AppName) -> Result<Option<String>, ClusterError>;

    /// Remove the lock record. Removing an absent lock succeeds.
    async fn delete_lock(&self, app: &AppName) -> Result<(), ClusterError>;
}
