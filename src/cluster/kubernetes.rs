// ABOUTME: Kubernetes implementation of ClusterClient and LockStore using kube-rs.
// ABOUTME: Workloads are Deployments, the selector is a Service, the lock is a ConfigMap.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Api;
use kube::api::{AttachParams, DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use super::client::{ClusterClient, Environment, InstanceRef, LockStore, LogLines, WorkloadStatus};
use super::error::{ClientSnafu, ClusterError, ConfigSnafu, ConnectError};
use super::manifest::{
    self, LABEL_COLOR, LABEL_MANAGED_BY, LABEL_VERSION, MANAGER, WorkloadTemplate,
};
use crate::config::ProbeConfig;
use crate::types::{AppName, Color};

const LOCK_KEY: &str = "lock";

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == code)
}

fn api_error(context: impl std::fmt::Display, err: kube::Error) -> ClusterError {
    ClusterError::Api(format!("{context}: {err}"))
}

/// Control-plane client bound to one namespace.
#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
    namespace: String,
    template: WorkloadTemplate,
    poll_interval: Duration,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl KubeCluster {
    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn connect(
        namespace: &str,
        template: WorkloadTemplate,
        poll_interval: Duration,
    ) -> Result<Self, ConnectError> {
        let config = kube::Config::infer().await.context(ConfigSnafu)?;
        let client = kube::Client::try_from(config).context(ClientSnafu)?;
        Ok(Self::new(client, namespace, template, poll_interval))
    }

    pub fn new(
        client: kube::Client,
        namespace: &str,
        template: WorkloadTemplate,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            template,
            poll_interval,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn config_maps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Names of pods of one color that are running and not being deleted.
    async fn running_pods(&self, app: &AppName, color: Color) -> Result<Vec<String>, ClusterError> {
        let params = ListParams::default()
            .labels(&manifest::color_selector(app, color))
            .fields("status.phase=Running");

        let pods = self
            .pods()
            .list(&params)
            .await
            .map_err(|e| api_error(format!("failed to list {color} pods"), e))?;

        let mut names: Vec<String> = pods
            .items
            .into_iter()
            .filter(|pod| pod.metadata.deletion_timestamp.is_none())
            .filter_map(|pod| pod.metadata.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Whether the Deployment has rolled out its latest spec on every replica.
    fn rolled_out(deployment: &Deployment) -> bool {
        let desired = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let Some(status) = deployment.status.as_ref() else {
            return false;
        };
        let observed = status.observed_generation.unwrap_or(0);
        let generation = deployment.metadata.generation.unwrap_or(0);

        observed >= generation
            && status.updated_replicas.unwrap_or(0) >= desired
            && status.ready_replicas.unwrap_or(0) >= desired
            && status.replicas.unwrap_or(0) == desired
    }
}

/// Merge per-pod tails read with `timestamps=true` into one chronological
/// tail of at most `lines` entries, timestamps stripped. Lines without a
/// parseable timestamp sort first.
fn merge_tails(tails: &[String], lines: u32) -> Vec<String> {
    let mut entries: Vec<(Option<DateTime<FixedOffset>>, &str)> = tails
        .iter()
        .flat_map(|text| text.lines())
        .map(split_timestamp)
        .collect();
    entries.sort_by_key(|(at, _)| *at);

    let keep = usize::try_from(lines).unwrap_or(usize::MAX);
    let skip = entries.len().saturating_sub(keep);
    entries
        .into_iter()
        .skip(skip)
        .map(|(_, line)| line.to_string())
        .collect()
}

fn split_timestamp(line: &str) -> (Option<DateTime<FixedOffset>>, &str) {
    let (prefix, rest) = line.split_once(' ').unwrap_or((line, ""));
    match DateTime::parse_from_rfc3339(prefix) {
        Ok(at) => (Some(at), rest),
        Err(_) => (None, line),
    }
}

fn workload_status(color: Color, deployment: &Deployment) -> WorkloadStatus {
    let version = deployment
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(LABEL_VERSION))
        .cloned();
    let replicas = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);

    WorkloadStatus {
        color,
        version,
        replicas: u32::try_from(replicas).unwrap_or(0),
        ready_replicas: u32::try_from(ready).unwrap_or(0),
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn selector_color(&self, app: &AppName) -> Result<Color, ClusterError> {
        let service = self
            .services()
            .get_opt(app.as_str())
            .await
            .map_err(|e| api_error("failed to read service", e))?
            .ok_or_else(|| ClusterError::NotFound(format!("service {app}")))?;

        let color = service
            .spec
            .and_then(|spec| spec.selector)
            .and_then(|selector| selector.get(LABEL_COLOR).cloned())
            .ok_or_else(|| {
                ClusterError::InvalidSelector(format!("service {app} has no color selector"))
            })?;

        color
            .parse()
            .map_err(|e: crate::types::ParseColorError| ClusterError::InvalidSelector(e.to_string()))
    }

    async fn workload(
        &self,
        app: &AppName,
        color: Color,
    ) -> Result<Option<WorkloadStatus>, ClusterError> {
        let name = manifest::workload_name(app, color);
        let deployment = self
            .deployments()
            .get_opt(&name)
            .await
            .map_err(|e| api_error(format!("failed to read deployment {name}"), e))?;

        Ok(deployment.map(|d| workload_status(color, &d)))
    }

    async fn create_or_update_workload(
        &self,
        app: &AppName,
        env: &Environment,
        probes: &ProbeConfig,
    ) -> Result<(), ClusterError> {
        let name = manifest::workload_name(app, env.color);
        let body = manifest::deployment_manifest(app, env, probes, &self.template);
        let params = PatchParams::apply(MANAGER).force();

        self.deployments()
            .patch(&name, &params, &Patch::Apply(&body))
            .await
            .map_err(|e| ClusterError::Apply {
                color: env.color,
                message: e.to_string(),
            })?;

        tracing::debug!(workload = %name, version = %env.version, "applied workload");
        Ok(())
    }

    async fn wait_for_ready(
        &self,
        app: &AppName,
        color: Color,
        timeout: Duration,
    ) -> Result<(), ClusterError> {
        let name = manifest::workload_name(app, color);
        let api = self.deployments();

        let poll = async {
            loop {
                let deployment = api
                    .get_opt(&name)
                    .await
                    .map_err(|e| api_error(format!("failed to read deployment {name}"), e))?;

                match deployment {
                    Some(d) if Self::rolled_out(&d) => return Ok(()),
                    Some(d) => {
                        let status = workload_status(color, &d);
                        tracing::debug!(
                            workload = %name,
                            ready = status.ready_replicas,
                            desired = status.replicas,
                            "waiting for rollout"
                        );
                    }
                    None => tracing::debug!(workload = %name, "deployment not visible yet"),
                }

                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ClusterError::RolloutTimeout {
                color,
                waited: timeout,
            }),
        }
    }

    async fn one_instance(
        &self,
        app: &AppName,
        color: Color,
    ) -> Result<InstanceRef, ClusterError> {
        self.running_pods(app, color)
            .await?
            .into_iter()
            .next()
            .map(|name| InstanceRef { name, color })
            .ok_or(ClusterError::NoInstances { color })
    }

    async fn exec_health_check(&self, instance: &InstanceRef) -> Result<String, ClusterError> {
        let exec_error = |message: String| ClusterError::Exec {
            instance: instance.name.clone(),
            message,
        };

        let params = AttachParams::default()
            .stdin(false)
            .stdout(true)
            .stderr(false);

        let mut attached = self
            .pods()
            .exec(&instance.name, self.template.health_command.clone(), &params)
            .await
            .map_err(|e| exec_error(e.to_string()))?;

        let mut stdout = attached
            .stdout()
            .ok_or_else(|| exec_error("no stdout attached".to_string()))?;

        let mut body = String::new();
        stdout
            .read_to_string(&mut body)
            .await
            .map_err(|e| exec_error(e.to_string()))?;

        Ok(body)
    }

    async fn patch_selector(&self, app: &AppName, color: Color) -> Result<(), ClusterError> {
        // Server-side apply replaces the whole selector in one write, so a
        // retried patch can never leave both colors (or neither) selected.
        let body = manifest::service_manifest(app, color, &self.template);
        let params = PatchParams::apply(MANAGER).force();

        self.services()
            .patch(app.as_str(), &params, &Patch::Apply(&body))
            .await
            .map_err(|e| api_error(format!("failed to point service {app} at {color}"), e))?;

        Ok(())
    }

    async fn tail_logs(
        &self,
        app: &AppName,
        color: Color,
        lines: u32,
    ) -> Result<LogLines, ClusterError> {
        let pods = self.running_pods(app, color).await?;
        let api = self.pods();
        let params = LogParams {
            tail_lines: Some(i64::from(lines)),
            timestamps: true,
            ..LogParams::default()
        };

        let mut tails = Vec::with_capacity(pods.len());
        let mut failure = None;
        for pod in &pods {
            match api.logs(pod, &params).await {
                Ok(text) => tails.push(text),
                Err(e) => {
                    tracing::debug!(pod = %pod, error = %e, "log tail failed");
                    failure = Some(api_error(format!("failed to read logs of {pod}"), e));
                }
            }
        }
        if tails.is_empty()
            && let Some(e) = failure.take()
        {
            return Err(e);
        }

        // A partial read still yields what was merged, then ends with the error.
        let items: Vec<Result<String, ClusterError>> = merge_tails(&tails, lines)
            .into_iter()
            .map(Ok)
            .chain(failure.map(Err))
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn delete_workload(&self, app: &AppName, color: Color) -> Result<(), ClusterError> {
        let name = manifest::workload_name(app, color);
        match self
            .deployments()
            .delete(&name, &DeleteParams::background())
            .await
        {
            Ok(_) => {
                tracing::debug!(workload = %name, "deleted workload");
                Ok(())
            }
            Err(e) if is_status(&e, 404) => {
                tracing::info!(workload = %name, "workload already absent");
                Ok(())
            }
            Err(e) => Err(api_error(format!("failed to delete deployment {name}"), e)),
        }
    }
}

#[async_trait]
impl LockStore for KubeCluster {
    async fn try_create_lock(&self, app: &AppName, record: &str) -> Result<bool, ClusterError> {
        let lock = ConfigMap {
            metadata: ObjectMeta {
                name: Some(manifest::lock_name(app)),
                labels: Some(BTreeMap::from([
                    (manifest::LABEL_APP.to_string(), app.to_string()),
                    (LABEL_MANAGED_BY.to_string(), MANAGER.to_string()),
                ])),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(LOCK_KEY.to_string(), record.to_string())])),
            ..ConfigMap::default()
        };

        // Create fails with 409 when the object exists, which makes this an
        // atomic test-and-set.
        match self.config_maps().create(&PostParams::default(), &lock).await {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 409) => Ok(false),
            Err(e) => Err(api_error("failed to create deploy lock", e)),
        }
    }

    async fn read_lock(&self, app: &AppName) -> Result<Option<String>, ClusterError> {
        let lock = self
            .config_maps()
            .get_opt(&manifest::lock_name(app))
            .await
            .map_err(|e| api_error("failed to read deploy lock", e))?;

        Ok(lock
            .and_then(|cm| cm.data)
            .map(|mut data| data.remove(LOCK_KEY).unwrap_or_default()))
    }

    async fn delete_lock(&self, app: &AppName) -> Result<(), ClusterError> {
        match self
            .config_maps()
            .delete(&manifest::lock_name(app), &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 404) => Ok(()),
            Err(e) => Err(api_error("failed to delete deploy lock", e)),
        }
    }
}
