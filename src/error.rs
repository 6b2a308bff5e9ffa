// ABOUTME: Application-wide error types for bluegreen.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::cluster::{ClusterError, ConnectError};
use crate::deploy::{DeployError, DeployFailure};
use crate::types::VersionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid version: {0}")]
    InvalidVersion(#[from] VersionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Failed(Box<DeployFailure>),

    #[error("hook failed: {0}")]
    Hook(String),
}

impl From<DeployFailure> for Error {
    fn from(failure: DeployFailure) -> Self {
        Error::Failed(Box::new(failure))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
