// ABOUTME: Kubernetes manifests for color workloads, the routing service, and the lock.
// ABOUTME: Pure functions so object shapes can be checked without a cluster.

use serde_json::{Value, json};
use std::collections::BTreeMap;

use super::client::Environment;
use crate::config::{ProbeConfig, ProbeSpec};
use crate::types::{AppName, Color};

pub const LABEL_APP: &str = "app";
pub const LABEL_COLOR: &str = "color";
pub const LABEL_VERSION: &str = "version";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGER: &str = "bluegreen";

/// Version-independent parts of a workload, taken from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadTemplate {
    pub port: u16,
    pub service_port: u16,
    pub resources: ResourceLimits,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub health_command: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

pub fn workload_name(app: &AppName, color: Color) -> String {
    format!("{app}-{color}")
}

pub fn lock_name(app: &AppName) -> String {
    format!("{app}-deploy-lock")
}

/// Label selector matching every instance of one color.
pub fn color_selector(app: &AppName, color: Color) -> String {
    format!("{LABEL_APP}={app},{LABEL_COLOR}={color}")
}

fn selector_labels(app: &AppName, color: Color) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_APP.to_string(), app.to_string()),
        (LABEL_COLOR.to_string(), color.to_string()),
    ])
}

fn workload_labels(
    app: &AppName,
    env: &Environment,
    template: &WorkloadTemplate,
) -> BTreeMap<String, String> {
    let mut labels = template.labels.clone();
    labels.insert(LABEL_MANAGED_BY.to_string(), MANAGER.to_string());
    labels.extend(selector_labels(app, env.color));
    labels.insert(LABEL_VERSION.to_string(), env.version.to_string());
    labels
}

fn probe(spec: &ProbeSpec, port: u16) -> Value {
    json!({
        "httpGet": { "path": spec.path, "port": port },
        "initialDelaySeconds": spec.initial_delay.as_secs(),
        "periodSeconds": spec.period.as_secs(),
    })
}

fn resource_limits(limits: &ResourceLimits) -> Value {
    let mut map = serde_json::Map::new();
    if let Some(cpu) = &limits.cpu {
        map.insert("cpu".to_string(), json!(cpu));
    }
    if let Some(memory) = &limits.memory {
        map.insert("memory".to_string(), json!(memory));
    }
    json!({ "limits": map })
}

/// Deployment for one color. The pod selector only uses app and color, so it
/// stays stable across versions (Deployment selectors are immutable).
pub fn deployment_manifest(
    app: &AppName,
    env: &Environment,
    probes: &ProbeConfig,
    template: &WorkloadTemplate,
) -> Value {
    let labels = workload_labels(app, env, template);
    let env_vars: Vec<Value> = template
        .env
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();

    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": workload_name(app, env.color),
            "labels": labels,
        },
        "spec": {
            "replicas": env.replicas,
            "selector": { "matchLabels": selector_labels(app, env.color) },
            "template": {
                "metadata": { "labels": labels },
                "spec": {
                    "containers": [{
                        "name": app.as_str(),
                        "image": env.image.to_string(),
                        "ports": [{ "containerPort": template.port }],
                        "env": env_vars,
                        "resources": resource_limits(&template.resources),
                        "livenessProbe": probe(&probes.liveness, template.port),
                        "readinessProbe": probe(&probes.readiness, template.port),
                    }],
                },
            },
        },
    })
}

/// Service whose selector decides which color receives traffic.
pub fn service_manifest(app: &AppName, color: Color, template: &WorkloadTemplate) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": app.as_str(),
            "labels": {
                LABEL_APP: app.as_str(),
                LABEL_MANAGED_BY: MANAGER,
            },
        },
        "spec": {
            "selector": selector_labels(app, color),
            "ports": [{
                "name": "http",
                "port": template.service_port,
                "targetPort": template.port,
            }],
        },
    })
}
