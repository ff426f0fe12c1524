// Logical resource names

use super::serialization::DeserializationService;
use super::{AssetError, AssetKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a named resource lives and what kind of asset it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub kind: AssetKind,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: AssetKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
        }
    }
}

/// Immutable table from logical name to resource descriptor
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, ResourceDescriptor>,
}

impl ResourceRegistry {
    /// Load every resource listed in the table at `path`
    pub fn load(service: &dyn DeserializationService, path: &Path) -> Result<Self, AssetError> {
        let resources = service.deserialize_resources(path)?;
        log::info!(
            "Loaded {} resources from {} ({})",
            resources.len(),
            path.display(),
            service.name()
        );
        Ok(Self { resources })
    }

    /// Build a registry in memory; the first descriptor wins for a repeated name
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ResourceDescriptor>) -> Self {
        let mut resources = HashMap::new();
        for descriptor in descriptors {
            if resources.contains_key(&descriptor.name) {
                log::warn!(
                    "Duplicate resource {}; keeping the first entry",
                    descriptor.name
                );
                continue;
            }
            resources.insert(descriptor.name.clone(), descriptor);
        }
        Self { resources }
    }

    /// Resolve a logical name
    pub fn get(&self, name: &str) -> Result<&ResourceDescriptor, AssetError> {
        self.resources
            .get(name)
            .ok_or_else(|| AssetError::NoResourceFound(name.to_string()))
    }

    /// Resolved path of a logical name
    pub fn path(&self, name: &str) -> Result<&Path, AssetError> {
        self.get(name).map(|descriptor| descriptor.path.as_path())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.values()
    }
}
