//! Distribution registry loading and lookup.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("distribution not available")]
    NotFound,

    #[error("failed to read distributions from {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid distribution file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("distribution '{0}' is defined more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub restricted_access: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureInfo {
    #[serde(default)]
    pub image_types: Vec<String>,
}

/// One distribution definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionFile {
    pub distribution: DistributionItem,
    #[serde(default)]
    pub architectures: BTreeMap<String, ArchitectureInfo>,
}

impl DistributionFile {
    pub fn name(&self) -> &str {
        &self.distribution.name
    }

    pub fn is_restricted(&self) -> bool {
        self.distribution.restricted_access
    }
}

/// A set of distributions indexed by name.
#[derive(Debug, Clone, Default)]
pub struct DistroRegistry {
    distros: BTreeMap<String, Arc<DistributionFile>>,
}

impl DistroRegistry {
    pub fn get(&self, name: &str) -> Result<Arc<DistributionFile>, DistributionError> {
        self.distros
            .get(name)
            .cloned()
            .ok_or(DistributionError::NotFound)
    }

    /// All distributions, sorted by name.
    pub fn list(&self) -> impl Iterator<Item = &Arc<DistributionFile>> {
        self.distros.values()
    }

    pub fn len(&self) -> usize {
        self.distros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distros.is_empty()
    }
}

/// The full catalog plus its unrestricted subset.
#[derive(Debug, Clone, Default)]
pub struct AllDistroRegistry {
    all: DistroRegistry,
    unrestricted: DistroRegistry,
}

impl AllDistroRegistry {
    pub fn from_distributions(files: Vec<DistributionFile>) -> Result<Self, DistributionError> {
        let mut all = BTreeMap::new();
        for file in files {
            let name = file.name().to_string();
            if all.insert(name.clone(), Arc::new(file)).is_some() {
                return Err(DistributionError::Duplicate(name));
            }
        }
        let unrestricted = all
            .iter()
            .filter(|(_, d)| !d.is_restricted())
            .map(|(k, d)| (k.clone(), Arc::clone(d)))
            .collect();
        Ok(Self {
            all: DistroRegistry { distros: all },
            unrestricted: DistroRegistry {
                distros: unrestricted,
            },
        })
    }

    /// Load every `*.json` file in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, DistributionError> {
        let io_err = |source| DistributionError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|source| DistributionError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let file: DistributionFile =
                serde_json::from_str(&text).map_err(|e| DistributionError::Parse {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(name = %file.name(), restricted = file.is_restricted(), "loaded distribution");
            files.push(file);
        }

        let registry = Self::from_distributions(files)?;
        info!(
            dir = %dir.display(),
            total = registry.all.len(),
            unrestricted = registry.unrestricted.len(),
            "distribution registry loaded"
        );
        Ok(registry)
    }

    /// The catalog visible to a caller of the given entitlement tier.
    pub fn available(&self, entitled: bool) -> &DistroRegistry {
        if entitled {
            &self.all
        } else {
            &self.unrestricted
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn distro(name: &str, restricted: bool) -> DistributionFile {
        DistributionFile {
            distribution: DistributionItem {
                name: name.to_string(),
                description: format!("{name} description"),
                product: "test".to_string(),
                restricted_access: restricted,
            },
            architectures: BTreeMap::from([(
                "x86_64".to_string(),
                ArchitectureInfo {
                    image_types: vec!["guest-image".to_string()],
                },
            )]),
        }
    }

    #[test]
    fn test_available_by_entitlement() {
        let all = AllDistroRegistry::from_distributions(vec![
            distro("rhel-9", false),
            distro("rhel-10-nightly", true),
        ])
        .unwrap();

        assert_eq!(all.available(true).len(), 2);
        assert_eq!(all.available(false).len(), 1);
        assert!(all.available(true).get("rhel-10-nightly").is_ok());
        assert!(matches!(
            all.available(false).get("rhel-10-nightly"),
            Err(DistributionError::NotFound)
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = AllDistroRegistry::from_distributions(vec![distro("a", false), distro("a", true)])
            .unwrap_err();
        assert!(matches!(err, DistributionError::Duplicate(n) if n == "a"));
    }

    #[test]
    fn test_load_dir_reads_json_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("fedora-41.json"),
            serde_json::to_string(&distro("fedora-41", false)).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let all = AllDistroRegistry::load_dir(dir.path()).unwrap();
        let names: Vec<_> = all.available(false).list().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["fedora-41"]);
    }

    #[test]
    fn test_bundled_catalog_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("distributions");
        let all = AllDistroRegistry::load_dir(&dir).unwrap();
        assert!(all.available(true).get("rhel-10-nightly").unwrap().is_restricted());
        assert!(!all.available(false).get("rhel-9").unwrap().is_restricted());
    }
}
