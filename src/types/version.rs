// ABOUTME: Release version identifier used as image tag and workload label.
// ABOUTME: Restricted to characters valid in both a Docker tag and a label value.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Kubernetes label values are capped at 63 characters.
const MAX_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version cannot be empty")]
    Empty,

    #[error("version exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("version must start with a letter or digit")]
    BadStart,

    #[error("invalid character in version: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(value: &str) -> Result<Self, VersionError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(VersionError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(VersionError::TooLong);
        }

        if !value.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(VersionError::BadStart);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
        {
            return Err(VersionError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::new(s)
    }
}
