// ABOUTME: Read-only snapshot of an app's blue-green state.
// ABOUTME: Reports the live color and the version and readiness of each color's workload.

use serde::Serialize;

use crate::cluster::{ClusterClient, ClusterError, WorkloadStatus};
use crate::types::{AppName, Color};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub app: String,
    pub namespace: String,
    /// `None` when no traffic selector exists yet.
    pub live: Option<Color>,
    pub workloads: Vec<WorkloadLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadLine {
    pub color: Color,
    pub version: Option<String>,
    pub ready_replicas: u32,
    pub replicas: u32,
    /// Every desired replica reports ready.
    pub ready: bool,
}

impl From<WorkloadStatus> for WorkloadLine {
    fn from(status: WorkloadStatus) -> Self {
        Self {
            ready: status.is_ready(),
            color: status.color,
            version: status.version,
            ready_replicas: status.ready_replicas,
            replicas: status.replicas,
        }
    }
}

/// Read the selector and both colors' workloads. A missing selector is
/// reported as no live color rather than an error.
pub async fn collect<C>(
    cluster: &C,
    app: &AppName,
    namespace: &str,
) -> Result<StatusReport, ClusterError>
where
    C: ClusterClient + ?Sized,
{
    let live = match cluster.selector_color(app).await {
        Ok(color) => Some(color),
        Err(ClusterError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let mut workloads: Vec<WorkloadLine> = Vec::new();
    for color in [Color::Blue, Color::Green] {
        if let Some(status) = cluster.workload(app, color).await? {
            workloads.push(status.into());
        }
    }

    Ok(StatusReport {
        app: app.to_string(),
        namespace: namespace.to_string(),
        live,
        workloads,
    })
}
