// ABOUTME: Control-plane abstraction and its Kubernetes implementation.
// ABOUTME: The orchestrator only sees the ClusterClient and LockStore traits.

mod client;
mod error;
mod kubernetes;
mod manifest;

pub use client::{ClusterClient, Environment, InstanceRef, LockStore, LogLines, WorkloadStatus};
pub use error::{ClusterError, ConnectError};
pub use kubernetes::KubeCluster;
pub use manifest::{
    LABEL_APP, LABEL_COLOR, LABEL_MANAGED_BY, LABEL_VERSION, MANAGER, ResourceLimits,
    WorkloadTemplate, color_selector, deployment_manifest, lock_name, service_manifest,
    workload_name,
};
