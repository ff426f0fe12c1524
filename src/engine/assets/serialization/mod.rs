// Descriptor deserialization services
//
// A service turns files on disk into `AssetDescriptor`s and resource tables.
// Services hold no state between calls.

mod ron_service;
mod xml_service;

pub use ron_service::RonService;
pub use xml_service::XmlService;

use super::registry::ResourceDescriptor;
use super::{AssetDescriptor, AssetError, AssetKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Reads asset descriptors and resource tables from disk
pub trait DeserializationService {
    /// Short format name used in log messages
    fn name(&self) -> &str;

    /// Parse the descriptor of a `kind` asset stored at `path`
    ///
    /// Malformed content, a program without stages or a texture without an
    /// image source fail with `AssetError::DeserializeFailed`.
    fn deserialize(&self, kind: AssetKind, path: &Path) -> Result<AssetDescriptor, AssetError>;

    /// Parse a resource table mapping logical names to descriptors
    ///
    /// Fails with `AssetError::NoResourceFound` if the file cannot be opened
    /// or parsed. Individual malformed entries are skipped with a warning.
    fn deserialize_resources(
        &self,
        path: &Path,
    ) -> Result<HashMap<String, ResourceDescriptor>, AssetError>;
}

/// On-disk descriptor formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DescriptorFormat {
    #[default]
    Ron,
    Xml,
}

impl DescriptorFormat {
    /// Service able to read this format
    pub fn service(self) -> Rc<dyn DeserializationService> {
        match self {
            DescriptorFormat::Ron => Rc::new(RonService),
            DescriptorFormat::Xml => Rc::new(XmlService),
        }
    }
}

impl fmt::Display for DescriptorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorFormat::Ron => write!(f, "ron"),
            DescriptorFormat::Xml => write!(f, "xml"),
        }
    }
}

/// Resource table entry as written on disk, before validation
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawResource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub kind: String,
}

fn read_descriptor(path: &Path) -> Result<String, AssetError> {
    Ok(std::fs::read_to_string(path)?)
}

fn read_resource_table(path: &Path) -> Result<String, AssetError> {
    std::fs::read_to_string(path).map_err(|e| {
        AssetError::NoResourceFound(format!(
            "cannot open resource file {}: {}",
            path.display(),
            e
        ))
    })
}

fn parse_failed(path: &Path, reason: impl fmt::Display) -> AssetError {
    AssetError::DeserializeFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a single attribute-style enum value, falling back to its default
fn parse_or_default<T>(path: &Path, value: &str) -> Result<T, AssetError>
where
    T: std::str::FromStr<Err = String> + Default,
{
    if value.trim().is_empty() {
        return Ok(T::default());
    }
    value.parse().map_err(|e: String| parse_failed(path, e))
}

/// Validate raw entries into a name-keyed table
///
/// Entries missing a name, source or valid kind are skipped. The first entry
/// wins when a name repeats. Relative sources resolve against the directory
/// of the table file.
pub(crate) fn collect_resources(
    path: &Path,
    entries: Vec<RawResource>,
) -> HashMap<String, ResourceDescriptor> {
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut resources = HashMap::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry.name.trim();
        let source = entry.source.trim();

        if name.is_empty() || source.is_empty() {
            log::warn!(
                "Skipping resource #{} in {}: missing name or source",
                index,
                path.display()
            );
            continue;
        }

        let kind = match entry.kind.parse::<AssetKind>() {
            Ok(kind) => kind,
            Err(e) => {
                log::warn!("Skipping resource {} in {}: {}", name, path.display(), e);
                continue;
            }
        };

        if resources.contains_key(name) {
            log::warn!(
                "Duplicate resource {} in {}; keeping the first entry",
                name,
                path.display()
            );
            continue;
        }

        let descriptor = ResourceDescriptor {
            name: name.to_string(),
            path: super::descriptor::resolve(&base, &PathBuf::from(source)),
            kind,
        };
        resources.insert(name.to_string(), descriptor);
    }

    resources
}
