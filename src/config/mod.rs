// ABOUTME: Configuration types and parsing for bluegreen.yml.
// ABOUTME: Handles YAML parsing, file discovery, and environment variable defaults.

mod deserialize;
mod env_value;
mod policy;
mod probes;

pub use env_value::{EnvValue, resolve_env_map};
pub use policy::DeployPolicy;
pub use probes::{ProbeConfig, ProbeSpec};

use crate::cluster::{ResourceLimits, WorkloadTemplate};
use crate::error::{Error, Result};
use crate::types::{AppName, ImageRef};
use deserialize::{deserialize_app_name, deserialize_image_ref};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "bluegreen.yml";
pub const CONFIG_FILENAME_ALT: &str = "bluegreen.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".bluegreen/config.yml";

pub const ENV_APP: &str = "BLUEGREEN_APP";
pub const ENV_NAMESPACE: &str = "BLUEGREEN_NAMESPACE";
pub const ENV_IMAGE: &str = "BLUEGREEN_IMAGE";
pub const ENV_REPLICAS: &str = "BLUEGREEN_REPLICAS";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_app_name")]
    pub app: AppName,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Image repository; the deployed version becomes the tag.
    #[serde(deserialize_with = "deserialize_image_ref")]
    pub image: ImageRef,

    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Port the container listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port exposed by the traffic-routing service.
    #[serde(default = "default_service_port")]
    pub service_port: u16,

    #[serde(default)]
    pub resources: ResourcesConfig,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub probes: ProbeConfig,

    /// Command run inside an instance for the smoke test.
    #[serde(default)]
    pub health_command: Option<Vec<String>>,

    #[serde(default)]
    pub policy: DeployPolicy,

    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesConfig {
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            cpu: Some("500m".to_string()),
            memory: Some("512Mi".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Locks older than this are considered abandoned.
    #[serde(default = "default_lock_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: default_lock_ttl(),
        }
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_replicas() -> u32 {
    2
}

fn default_port() -> u16 {
    8080
}

fn default_service_port() -> u16 {
    80
}

fn default_lock_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Find a config file in `dir`, if any.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => Self::load(&path),
            None => Err(Error::ConfigNotFound(dir.to_path_buf())),
        }
    }

    /// Resolve the effective configuration for a run.
    ///
    /// An explicit path wins, then a discovered file, then a config built
    /// purely from `BLUEGREEN_*` variables. Environment variables override
    /// file values in every case.
    pub fn resolve(dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let lookup = |var: &str| std::env::var(var).ok();

        let config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::find(dir) {
                Some(path) => Self::load(&path)?,
                None => Self::from_env_with(&lookup)
                    .ok_or_else(|| Error::ConfigNotFound(dir.to_path_buf()))??,
            },
        };

        config.with_env_overrides(&lookup)
    }

    /// Build a config from environment variables alone. Returns `None` when
    /// the required variables are not set.
    pub fn from_env_with(lookup: &impl Fn(&str) -> Option<String>) -> Option<Result<Self>> {
        let app = lookup(ENV_APP)?;
        let image = lookup(ENV_IMAGE)?;

        let build = || -> Result<Self> {
            let mut config = Self::template();
            config.app = AppName::new(&app).map_err(|e| Error::InvalidConfig(e.to_string()))?;
            config.image =
                ImageRef::parse(&image).map_err(|e| Error::InvalidConfig(e.to_string()))?;
            Ok(config)
        };
        Some(build())
    }

    /// Apply `BLUEGREEN_*` overrides on top of file values.
    pub fn with_env_overrides(mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(app) = lookup(ENV_APP) {
            self.app = AppName::new(&app)
                .map_err(|e| Error::InvalidConfig(format!("{ENV_APP}: {e}")))?;
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            self.namespace = namespace;
        }
        if let Some(image) = lookup(ENV_IMAGE) {
            self.image = ImageRef::parse(&image)
                .map_err(|e| Error::InvalidConfig(format!("{ENV_IMAGE}: {e}")))?;
        }
        if let Some(replicas) = lookup(ENV_REPLICAS) {
            self.replicas = replicas
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("{ENV_REPLICAS}: not a number: {replicas}")))?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(Error::InvalidConfig("replicas must be at least 1".to_string()));
        }
        if self.namespace.is_empty() {
            return Err(Error::InvalidConfig("namespace cannot be empty".to_string()));
        }
        if matches!(&self.health_command, Some(cmd) if cmd.is_empty()) {
            return Err(Error::InvalidConfig("health_command cannot be empty".to_string()));
        }
        for reserved in ["app", "color", "version"] {
            if self.labels.contains_key(reserved) {
                return Err(Error::InvalidConfig(format!(
                    "label '{reserved}' is managed by bluegreen"
                )));
            }
        }
        self.policy.validate()
    }

    /// Command used for the in-instance smoke test.
    pub fn health_command(&self) -> Vec<String> {
        self.health_command.clone().unwrap_or_else(|| {
            vec![
                "curl".to_string(),
                "-fsS".to_string(),
                format!("http://localhost:{}{}", self.port, self.probes.liveness.path),
            ]
        })
    }

    /// Everything about the workload that does not change between versions.
    pub fn workload_template(&self) -> Result<WorkloadTemplate> {
        Ok(WorkloadTemplate {
            port: self.port,
            service_port: self.service_port,
            resources: ResourceLimits {
                cpu: self.resources.cpu.clone(),
                memory: self.resources.memory.clone(),
            },
            env: resolve_env_map(&self.env)?,
            labels: self.labels.clone().into_iter().collect(),
            health_command: self.health_command(),
        })
    }

    pub fn template() -> Self {
        Config {
            app: AppName::new("my-app").expect("template app name is valid"),
            namespace: default_namespace(),
            image: ImageRef::parse("registry.example.com/my-app")
                .expect("template image is valid"),
            replicas: default_replicas(),
            port: default_port(),
            service_port: default_service_port(),
            resources: ResourcesConfig::default(),
            env: HashMap::new(),
            labels: HashMap::new(),
            probes: ProbeConfig::default(),
            health_command: None,
            policy: DeployPolicy::default(),
            lock: LockConfig::default(),
        }
    }
}

pub fn init_config(dir: &Path, app: Option<&str>, image: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(a) = app {
        config.app = AppName::new(a).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    if let Some(i) = image {
        config.image = ImageRef::parse(i).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    std::fs::write(&config_path, generate_template_yaml(&config))?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let policy = &config.policy;
    format!(
        r#"app: {}
namespace: {}
image: {}
replicas: {}
port: {}

resources:
  cpu: 500m
  memory: 512Mi

policy:
  settle_delay: {}s
  soak: {}s
  error_threshold: {}
"#,
        config.app,
        config.namespace,
        config.image.repository(),
        config.replicas,
        config.port,
        policy.settle_delay.as_secs(),
        policy.soak.as_secs(),
        policy.error_threshold,
    )
}
