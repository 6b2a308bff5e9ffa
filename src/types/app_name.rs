// ABOUTME: DNS-compatible application name validation.
// ABOUTME: App names become Kubernetes object names and label values.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Longest app name that still leaves room for the `-green` and
/// `-deploy-lock` suffixes inside a 63 character object name.
const MAX_LEN: usize = 51;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppNameError {
    #[error("app name cannot be empty")]
    Empty,

    #[error("app name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("app name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("app name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("app name must be lowercase")]
    NotLowercase,

    #[error("invalid character in app name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(AppNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(AppNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(AppNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(AppNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(AppNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
