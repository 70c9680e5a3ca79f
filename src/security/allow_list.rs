//! Organization allow-list for restricted distributions.
//!
//! # Responsibilities
//! - Load `{"<org_id>": ["<pattern>", ...]}` from a JSON file
//! - Answer "may org X build distribution Y"
//! - Publish replacements atomically for concurrent readers
//!
//! # Design Decisions
//! - Patterns are regular expressions searched anywhere in the name
//! - A pattern that fails to compile is kept; lookups that reach it fail
//! - Readers never observe a half-updated list (whole-structure swap)

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AllowListError {
    #[error("failed to read allow-list {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse allow-list {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid allow-list pattern '{pattern}' for organization {org_id}: {reason}")]
    InvalidPattern {
        org_id: String,
        pattern: String,
        reason: String,
    },
}

/// Lookup seam used by the access gate.
pub trait AllowListSource: Send + Sync + std::fmt::Debug {
    fn is_allowed(&self, org_id: &str, distribution: &str) -> Result<bool, AllowListError>;
}

#[derive(Debug, Clone)]
enum AllowPattern {
    Valid(Regex),
    Invalid { pattern: String, reason: String },
}

impl AllowPattern {
    fn compile(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => Self::Valid(re),
            Err(e) => Self::Invalid {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

/// An immutable allow-list.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    orgs: HashMap<String, Vec<AllowPattern>>,
}

impl AllowList {
    pub fn from_map(map: HashMap<String, Vec<String>>) -> Self {
        let orgs = map
            .into_iter()
            .map(|(org, patterns)| {
                let compiled = patterns.iter().map(|p| AllowPattern::compile(p)).collect();
                (org, compiled)
            })
            .collect();
        Self { orgs }
    }

    /// Load from `path`, or an empty list when no file is configured.
    pub fn load(path: Option<&Path>) -> Result<Self, AllowListError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| AllowListError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let map: HashMap<String, Vec<String>> =
            serde_json::from_str(&text).map_err(|e| AllowListError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let list = Self::from_map(map);
        for (org_id, pattern) in list.invalid_patterns() {
            warn!(org_id = %org_id, pattern = %pattern, "allow-list pattern does not compile");
        }
        Ok(list)
    }

    pub fn org_count(&self) -> usize {
        self.orgs.len()
    }

    /// `(org_id, pattern)` pairs that failed to compile.
    pub fn invalid_patterns(&self) -> Vec<(&str, &str)> {
        self.orgs
            .iter()
            .flat_map(|(org, patterns)| {
                patterns.iter().filter_map(move |p| match p {
                    AllowPattern::Invalid { pattern, .. } => Some((org.as_str(), pattern.as_str())),
                    AllowPattern::Valid(_) => None,
                })
            })
            .collect()
    }
}

impl AllowListSource for AllowList {
    /// Patterns are tried in file order; the first match or broken pattern decides.
    fn is_allowed(&self, org_id: &str, distribution: &str) -> Result<bool, AllowListError> {
        let Some(patterns) = self.orgs.get(org_id) else {
            return Ok(false);
        };
        for pattern in patterns {
            match pattern {
                AllowPattern::Valid(re) => {
                    if re.is_match(distribution) {
                        return Ok(true);
                    }
                }
                AllowPattern::Invalid { pattern, reason } => {
                    return Err(AllowListError::InvalidPattern {
                        org_id: org_id.to_string(),
                        pattern: pattern.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }
        Ok(false)
    }
}

/// Allow-list that can be replaced while requests read it.
#[derive(Debug)]
pub struct SharedAllowList {
    current: ArcSwap<AllowList>,
}

impl SharedAllowList {
    pub fn new(list: AllowList) -> Self {
        Self {
            current: ArcSwap::from_pointee(list),
        }
    }

    pub fn replace(&self, list: AllowList) {
        self.current.store(Arc::new(list));
    }

    pub fn snapshot(&self) -> Arc<AllowList> {
        self.current.load_full()
    }
}

impl Default for SharedAllowList {
    fn default() -> Self {
        Self::new(AllowList::default())
    }
}

impl AllowListSource for SharedAllowList {
    fn is_allowed(&self, org_id: &str, distribution: &str) -> Result<bool, AllowListError> {
        self.current.load().is_allowed(org_id, distribution)
    }
}
