//! Asset manifest: precache lists and runtime patterns

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::CoreError;

/// Manifest as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Document served for every navigation request
    #[serde(default = "default_root_document")]
    pub root_document: String,
    /// Paths that must be cached for a version to install
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
    /// Paths cached on a best-effort basis during install
    #[serde(default = "default_optional")]
    pub optional: Vec<String>,
    /// Path predicates for cache-first handling. A leading `^` marks a
    /// regular expression, anything else is a literal prefix.
    #[serde(default = "default_runtime_patterns")]
    pub runtime_patterns: Vec<String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            root_document: default_root_document(),
            precache: default_precache(),
            optional: default_optional(),
            runtime_patterns: default_runtime_patterns(),
        }
    }
}

fn default_root_document() -> String {
    "/index.html".to_string()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/web/viewer.html",
        "/web/viewer.css",
        "/web/viewer.mjs",
        "/web/locale/locale.json",
        "/web/locale/en-US/viewer.properties",
        "/build/pdf.mjs",
        "/build/pdf.worker.mjs",
        "/build/pdf_viewer.mjs",
        "/build/pdf_viewer.css",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_optional() -> Vec<String> {
    [
        "/web/images/toolbarButton-openFile.svg",
        "/web/images/toolbarButton-print.svg",
        "/web/images/toolbarButton-download.svg",
        "/web/images/toolbarButton-pageUp.svg",
        "/web/images/toolbarButton-pageDown.svg",
        "/web/images/secondaryToolbarToggle.svg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_runtime_patterns() -> Vec<String> {
    ["^/web/", "^/build/", "^/cmaps/", "^/standard_fonts/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// A compiled runtime pattern
#[derive(Debug, Clone)]
pub enum RuntimePattern {
    /// Literal path prefix
    Prefix(String),
    /// Regular expression matched against the path
    Regex(Regex),
}

impl RuntimePattern {
    pub fn parse(pattern: &str) -> Result<Self, CoreError> {
        if pattern.is_empty() {
            return Err(CoreError::InvalidManifest(
                "Runtime pattern must not be empty".to_string(),
            ));
        }

        if pattern.starts_with('^') {
            Regex::new(pattern).map(RuntimePattern::Regex).map_err(|e| {
                CoreError::InvalidManifest(format!("Invalid runtime pattern {}: {}", pattern, e))
            })
        } else if pattern.starts_with('/') {
            Ok(RuntimePattern::Prefix(pattern.to_string()))
        } else {
            Err(CoreError::InvalidManifest(format!(
                "Runtime pattern must start with '^' or '/': {}",
                pattern
            )))
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RuntimePattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            RuntimePattern::Regex(re) => re.is_match(path),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuntimePattern::Prefix(prefix) => prefix,
            RuntimePattern::Regex(re) => re.as_str(),
        }
    }
}

impl fmt::Display for RuntimePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, immutable manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    root_document: String,
    precache: Vec<String>,
    optional: Vec<String>,
    patterns: Vec<RuntimePattern>,
}

impl Manifest {
    pub fn new(config: ManifestConfig) -> Result<Self, CoreError> {
        validate_path("root_document", &config.root_document)?;
        validate_list("precache", &config.precache)?;
        validate_list("optional", &config.optional)?;

        let patterns = config
            .runtime_patterns
            .iter()
            .map(|p| RuntimePattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root_document: config.root_document,
            precache: config.precache,
            optional: config.optional,
            patterns,
        })
    }

    /// Paths fetched eagerly at install; any failure fails the install
    pub fn precache_list(&self) -> &[String] {
        &self.precache
    }

    /// Paths fetched eagerly at install; failures are ignored
    pub fn optional_list(&self) -> &[String] {
        &self.optional
    }

    pub fn root_document(&self) -> &str {
        &self.root_document
    }

    pub fn runtime_patterns(&self) -> &[RuntimePattern] {
        &self.patterns
    }

    /// First runtime pattern matching `path`, in declaration order
    pub fn matching_pattern(&self, path: &str) -> Option<&RuntimePattern> {
        self.patterns.iter().find(|p| p.matches(path))
    }

    pub fn matches_runtime_pattern(&self, path: &str) -> bool {
        self.matching_pattern(path).is_some()
    }
}

fn validate_path(field: &str, path: &str) -> Result<(), CoreError> {
    if !path.starts_with('/') {
        return Err(CoreError::InvalidManifest(format!(
            "{} entry must be an absolute path: {:?}",
            field, path
        )));
    }
    Ok(())
}

fn validate_list(field: &str, paths: &[String]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for path in paths {
        validate_path(field, path)?;
        if !seen.insert(path.as_str()) {
            return Err(CoreError::InvalidManifest(format!(
                "Duplicate {} entry: {}",
                field, path
            )));
        }
    }
    Ok(())
}
