// ABOUTME: Container image reference parsing for the deployed workload.
// ABOUTME: The configured repository is combined with a release version to form the tag.

use std::fmt;
use thiserror::Error;

use super::Version;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '/' | ':' | '.' | '-' | '_' | '@'))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (without_tag, tag) = match without_digest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, Some(after.to_string())),
            _ => (without_digest, None),
        };

        let (registry, name) = split_registry(without_tag)?;

        Ok(Self {
            registry,
            name,
            tag,
            digest,
        })
    }

    /// Pin this repository to a release version, dropping any tag or digest
    /// that was present in the configured reference.
    pub fn with_version(&self, version: &Version) -> ImageRef {
        ImageRef {
            registry: self.registry.clone(),
            name: self.name.clone(),
            tag: Some(version.to_string()),
            digest: None,
        }
    }

    /// Registry and name without tag or digest.
    pub fn repository(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.name),
            None => self.name.clone(),
        }
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

fn split_registry(input: &str) -> Result<(Option<String>, String), ParseImageRefError> {
    if input.is_empty() || input.starts_with('/') || input.ends_with('/') || input.contains("//")
    {
        return Err(ParseImageRefError::InvalidFormat(input.to_string()));
    }

    match input.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            Ok((Some(first.to_string()), rest.to_string()))
        }
        _ => Ok((None, input.to_string())),
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository())?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_with_port() {
        let image = ImageRef::parse("localhost:5000/team/api").unwrap();
        assert_eq!(image.registry(), Some("localhost:5000"));
        assert_eq!(image.name(), "team/api");
        assert_eq!(image.tag(), None);
    }

    #[test]
    fn docker_hub_path_has_no_registry() {
        let image = ImageRef::parse("library/nginx:1.25").unwrap();
        assert_eq!(image.registry(), None);
        assert_eq!(image.name(), "library/nginx");
        assert_eq!(image.tag(), Some("1.25"));
    }

    #[test]
    fn with_version_replaces_tag_and_digest() {
        let image = ImageRef::parse("ghcr.io/org/app:latest@sha256:abc").unwrap();
        let pinned = image.with_version(&Version::new("1.2.0").unwrap());
        assert_eq!(pinned.to_string(), "ghcr.io/org/app:1.2.0");
        assert_eq!(pinned.digest(), None);
    }

    #[test]
    fn rejects_malformed_references() {
        assert_eq!(ImageRef::parse(""), Err(ParseImageRefError::Empty));
        assert_eq!(
            ImageRef::parse("app name"),
            Err(ParseImageRefError::InvalidChar(' '))
        );
        assert!(matches!(
            ImageRef::parse("/app"),
            Err(ParseImageRefError::InvalidFormat(_))
        ));
    }
}
