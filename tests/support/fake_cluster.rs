// ABOUTME: In-memory ClusterClient and LockStore for orchestrator tests.
// ABOUTME: Records every call in order and supports per-operation failure injection.

use async_trait::async_trait;
use bluegreen::cluster::{
    ClusterClient, ClusterError, Environment, InstanceRef, LockStore, LogLines, WorkloadStatus,
};
use bluegreen::config::ProbeConfig;
use bluegreen::types::{AppName, Color};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// One recorded control-plane call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SelectorColor,
    Workload(Color),
    Apply { color: Color, version: String },
    WaitForReady(Color),
    OneInstance(Color),
    ExecHealthCheck(String),
    PatchSelector(Color),
    TailLogs { color: Color, lines: u32 },
    Delete(Color),
}

#[derive(Debug, Default)]
struct Failures {
    selector_read: bool,
    apply: bool,
    readiness: bool,
    no_instances: bool,
    exec: bool,
    patch_to: Option<Color>,
    logs: bool,
    logs_mid_stream: bool,
    delete: Option<Color>,
    lock_delete: bool,
}

#[derive(Debug)]
struct State {
    selector: Option<Color>,
    workloads: HashMap<Color, WorkloadStatus>,
    health_body: String,
    log_lines: Vec<String>,
    fail: Failures,
    calls: Vec<Call>,
    lock: Option<String>,
}

/// Shared-state fake; clones observe the same cluster.
#[derive(Debug, Clone)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    /// Empty cluster: no selector, no workloads, healthy instances, clean logs.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                selector: None,
                workloads: HashMap::new(),
                health_body: r#"{"status": "healthy"}"#.to_string(),
                log_lines: Vec::new(),
                fail: Failures::default(),
                calls: Vec::new(),
                lock: None,
            })),
        }
    }

    /// A ready workload of `color` running `version`, with the selector on it.
    pub fn with_live(self, color: Color, version: &str) -> Self {
        self.state.lock().selector = Some(color);
        self.with_workload(color, version)
    }

    /// A ready workload of `color` that may or may not be selected.
    pub fn with_workload(self, color: Color, version: &str) -> Self {
        self.state.lock().workloads.insert(
            color,
            WorkloadStatus {
                color,
                version: Some(version.to_string()),
                replicas: 2,
                ready_replicas: 2,
            },
        );
        self
    }

    /// A workload of `color` with only `ready` of its 2 replicas ready.
    pub fn with_scaling_workload(self, color: Color, version: &str, ready: u32) -> Self {
        self.state.lock().workloads.insert(
            color,
            WorkloadStatus {
                color,
                version: Some(version.to_string()),
                replicas: 2,
                ready_replicas: ready,
            },
        );
        self
    }

    pub fn with_health_body(self, body: &str) -> Self {
        self.state.lock().health_body = body.to_string();
        self
    }

    pub fn with_logs(self, lines: &[&str]) -> Self {
        self.state.lock().log_lines = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// `n` error lines mixed with the same number of info lines.
    pub fn with_error_lines(self, n: usize) -> Self {
        {
            let mut state = self.state.lock();
            state.log_lines = (0..n)
                .flat_map(|i| [format!("INFO request {i} ok"), format!("ERROR request {i} failed")])
                .collect();
        }
        self
    }

    pub fn with_lock_record(self, record: &str) -> Self {
        self.state.lock().lock = Some(record.to_string());
        self
    }

    pub fn fail_selector_read(self) -> Self {
        self.state.lock().fail.selector_read = true;
        self
    }

    pub fn fail_apply(self) -> Self {
        self.state.lock().fail.apply = true;
        self
    }

    pub fn fail_readiness(self) -> Self {
        self.state.lock().fail.readiness = true;
        self
    }

    pub fn without_instances(self) -> Self {
        self.state.lock().fail.no_instances = true;
        self
    }

    pub fn fail_exec(self) -> Self {
        self.state.lock().fail.exec = true;
        self
    }

    /// Reject selector patches that point at `color`.
    pub fn fail_patch_to(self, color: Color) -> Self {
        self.state.lock().fail.patch_to = Some(color);
        self
    }

    pub fn fail_logs(self) -> Self {
        self.state.lock().fail.logs = true;
        self
    }

    /// Log stream breaks after the configured lines.
    pub fn break_logs_mid_stream(self) -> Self {
        self.state.lock().fail.logs_mid_stream = true;
        self
    }

    pub fn fail_delete_of(self, color: Color) -> Self {
        self.state.lock().fail.delete = Some(color);
        self
    }

    pub fn fail_lock_delete(self) -> Self {
        self.state.lock().fail.lock_delete = true;
        self
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn selector(&self) -> Option<Color> {
        self.state.lock().selector
    }

    pub fn workload_version(&self, color: Color) -> Option<String> {
        self.state
            .lock()
            .workloads
            .get(&color)
            .and_then(|w| w.version.clone())
    }

    pub fn has_workload(&self, color: Color) -> bool {
        self.state.lock().workloads.contains_key(&color)
    }

    pub fn lock_record(&self) -> Option<String> {
        self.state.lock().lock.clone()
    }

    /// Calls that write to the cluster.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Apply { .. } | Call::PatchSelector(_) | Call::Delete(_)
                )
            })
            .collect()
    }

    fn record(&self, call: Call) -> parking_lot::MutexGuard<'_, State> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn selector_color(&self, app: &AppName) -> Result<Color, ClusterError> {
        let state = self.record(Call::SelectorColor);
        if state.fail.selector_read {
            return Err(ClusterError::Api("selector read refused".to_string()));
        }
        state
            .selector
            .ok_or_else(|| ClusterError::NotFound(format!("service {app}")))
    }

    async fn workload(
        &self,
        _app: &AppName,
        color: Color,
    ) -> Result<Option<WorkloadStatus>, ClusterError> {
        let state = self.record(Call::Workload(color));
        Ok(state.workloads.get(&color).cloned())
    }

    async fn create_or_update_workload(
        &self,
        _app: &AppName,
        env: &Environment,
        _probes: &ProbeConfig,
    ) -> Result<(), ClusterError> {
        let mut state = self.record(Call::Apply {
            color: env.color,
            version: env.version.to_string(),
        });
        if state.fail.apply {
            return Err(ClusterError::Apply {
                color: env.color,
                message: "admission webhook denied the request".to_string(),
            });
        }
        state.workloads.insert(
            env.color,
            WorkloadStatus {
                color: env.color,
                version: Some(env.version.to_string()),
                replicas: env.replicas,
                ready_replicas: 0,
            },
        );
        Ok(())
    }

    async fn wait_for_ready(
        &self,
        _app: &AppName,
        color: Color,
        timeout: Duration,
    ) -> Result<(), ClusterError> {
        let mut state = self.record(Call::WaitForReady(color));
        if state.fail.readiness {
            return Err(ClusterError::RolloutTimeout {
                color,
                waited: timeout,
            });
        }
        match state.workloads.get_mut(&color) {
            Some(workload) => {
                workload.ready_replicas = workload.replicas;
                Ok(())
            }
            None => Err(ClusterError::NotFound(format!("{color} workload"))),
        }
    }

    async fn one_instance(
        &self,
        app: &AppName,
        color: Color,
    ) -> Result<InstanceRef, ClusterError> {
        let state = self.record(Call::OneInstance(color));
        if state.fail.no_instances || !state.workloads.contains_key(&color) {
            return Err(ClusterError::NoInstances { color });
        }
        Ok(InstanceRef {
            name: format!("{app}-{color}-0"),
            color,
        })
    }

    async fn exec_health_check(&self, instance: &InstanceRef) -> Result<String, ClusterError> {
        let state = self.record(Call::ExecHealthCheck(instance.name.clone()));
        if state.fail.exec {
            return Err(ClusterError::Exec {
                instance: instance.name.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(state.health_body.clone())
    }

    async fn patch_selector(&self, _app: &AppName, color: Color) -> Result<(), ClusterError> {
        let mut state = self.record(Call::PatchSelector(color));
        if state.fail.patch_to == Some(color) {
            return Err(ClusterError::Api("selector patch refused".to_string()));
        }
        state.selector = Some(color);
        Ok(())
    }

    async fn tail_logs(
        &self,
        _app: &AppName,
        color: Color,
        lines: u32,
    ) -> Result<LogLines, ClusterError> {
        let state = self.record(Call::TailLogs { color, lines });
        if state.fail.logs {
            return Err(ClusterError::Api("logs forbidden".to_string()));
        }

        let keep = state.log_lines.len().saturating_sub(lines as usize);
        let mut items: Vec<Result<String, ClusterError>> =
            state.log_lines[keep..].iter().cloned().map(Ok).collect();
        if state.fail.logs_mid_stream {
            items.push(Err(ClusterError::Api("stream reset".to_string())));
            items.push(Ok("ERROR after reset".to_string()));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn delete_workload(&self, _app: &AppName, color: Color) -> Result<(), ClusterError> {
        let mut state = self.record(Call::Delete(color));
        if state.fail.delete == Some(color) {
            return Err(ClusterError::Api("delete refused".to_string()));
        }
        state.workloads.remove(&color);
        Ok(())
    }
}

#[async_trait]
impl LockStore for FakeCluster {
    async fn try_create_lock(&self, _app: &AppName, record: &str) -> Result<bool, ClusterError> {
        let mut state = self.state.lock();
        if state.lock.is_some() {
            return Ok(false);
        }
        state.lock = Some(record.to_string());
        Ok(true)
    }

    async fn read_lock(&self, _app: &AppName) -> Result<Option<String>, ClusterError> {
        Ok(self.state.lock().lock.clone())
    }

    async fn delete_lock(&self, _app: &AppName) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        if state.fail.lock_delete {
            return Err(ClusterError::Api("lock delete refused".to_string()));
        }
        state.lock = None;
        Ok(())
    }
}
