//! Version tags and store handles

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Identifier of one deployed asset set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Result<Self, CoreError> {
        let tag = tag.into();

        if tag.is_empty() || tag.len() > 64 {
            return Err(CoreError::InvalidVersion(format!(
                "Version tag must be 1-64 characters: {:?}",
                tag
            )));
        }

        if !tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(CoreError::InvalidVersion(format!(
                "Version tag may only contain letters, digits, '.', '_' and '-': {}",
                tag
            )));
        }

        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VersionTag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared prefix of every store owned by one deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(namespace: impl Into<String>) -> Result<Self, CoreError> {
        let namespace = namespace.into();

        // No '-': the handle splits on the first one
        if namespace.is_empty()
            || namespace.len() > 32
            || !namespace
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(CoreError::InvalidNamespace(format!(
                "Namespace must be 1-32 of [a-z0-9_]: {:?}",
                namespace
            )));
        }

        Ok(Self(namespace))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the store holding one version: `<namespace>-<version>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreHandle {
    namespace: Namespace,
    version: VersionTag,
}

impl StoreHandle {
    pub fn new(namespace: Namespace, version: VersionTag) -> Self {
        Self { namespace, version }
    }

    /// Parse a store name, returning `None` for stores of other namespaces
    pub fn parse(namespace: &Namespace, name: &str) -> Option<Self> {
        let version = name
            .strip_prefix(namespace.as_str())?
            .strip_prefix('-')?;

        VersionTag::new(version)
            .ok()
            .map(|version| Self::new(namespace.clone(), version))
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    /// Backend store name
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.namespace, self.version)
    }
}

impl Serialize for StoreHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_tag_validation() {
        assert!(VersionTag::new("v1.0.0").is_ok());
        assert!(VersionTag::new("2024-10-19_rc1").is_ok());
        assert!(VersionTag::new("").is_err());
        assert!(VersionTag::new("v1/evil").is_err());
        assert!(VersionTag::new("v 1").is_err());
        assert!("v2".parse::<VersionTag>().is_ok());
    }

    #[test]
    fn test_namespace_validation() {
        assert!(Namespace::new("turbosign").is_ok());
        assert!(Namespace::new("shell_cache2").is_ok());
        assert!(Namespace::new("turbo-sign").is_err());
        assert!(Namespace::new("Turbosign").is_err());
        assert!(Namespace::new("").is_err());
    }

    #[test]
    fn test_handle_name_and_parse() {
        let ns = Namespace::new("turbosign").unwrap();
        let handle = StoreHandle::new(ns.clone(), VersionTag::new("v1.0.0").unwrap());
        assert_eq!(handle.name(), "turbosign-v1.0.0");

        let parsed = StoreHandle::parse(&ns, "turbosign-v1.0.0").unwrap();
        assert_eq!(parsed, handle);

        // Versions may contain '-'
        let parsed = StoreHandle::parse(&ns, "turbosign-2024-10-19").unwrap();
        assert_eq!(parsed.version().as_str(), "2024-10-19");
    }

    #[test]
    fn test_parse_ignores_other_namespaces() {
        let ns = Namespace::new("turbosign").unwrap();
        assert!(StoreHandle::parse(&ns, "other-v1").is_none());
        assert!(StoreHandle::parse(&ns, "turbosignv1").is_none());
        assert!(StoreHandle::parse(&ns, "turbosign-").is_none());
        assert!(StoreHandle::parse(&ns, "turbosignx-v1").is_none());
    }
}
