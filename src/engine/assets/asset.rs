// Asset capability shared by every cached resource kind

use super::descriptor::AssetDescriptor;
use super::AssetError;
use crate::engine::renderer::backend::{GpuHandle, SharedBackend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of assets the engine knows how to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Shader,
    ShaderProgram,
    Texture,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Shader => write!(f, "shader"),
            AssetKind::ShaderProgram => write!(f, "shader program"),
            AssetKind::Texture => write!(f, "texture"),
        }
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "shader" => Ok(AssetKind::Shader),
            "shaderprogram" | "program" => Ok(AssetKind::ShaderProgram),
            "texture" => Ok(AssetKind::Texture),
            _ => Err(format!("unknown asset kind '{}'", s.trim())),
        }
    }
}

/// Process-unique identifier of a loaded asset
///
/// Taken from the backend object the asset owns; `AssetId::NONE` marks an
/// asset that has no backend object (e.g. a shader that never compiled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub(crate) u64);

impl AssetId {
    pub const NONE: AssetId = AssetId(0);

    /// Create an asset ID from a raw u64
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl From<GpuHandle> for AssetId {
    fn from(handle: GpuHandle) -> Self {
        Self(u64::from(handle.get()))
    }
}

impl From<Option<GpuHandle>> for AssetId {
    fn from(handle: Option<GpuHandle>) -> Self {
        handle.map(AssetId::from).unwrap_or(AssetId::NONE)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// A named, identity-bearing resource that a factory can cache
///
/// Reference counts are not part of the asset: they live in the owning
/// factory's store and are driven by `AssetHandle`s.
pub trait Asset: Sized + 'static {
    /// The kind of descriptor this asset is built from
    const KIND: AssetKind;

    fn id(&self) -> AssetId;

    /// Display name for diagnostics
    fn name(&self) -> &str;

    /// Build the asset (and its GPU objects) from a parsed descriptor
    fn from_descriptor(
        descriptor: AssetDescriptor,
        backend: &SharedBackend,
    ) -> Result<Self, AssetError>;

    /// Engine fallback returned when loading fails; must always be usable
    fn placeholder(backend: &SharedBackend) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("texture".parse::<AssetKind>(), Ok(AssetKind::Texture));
        assert_eq!("Shader".parse::<AssetKind>(), Ok(AssetKind::Shader));
        assert_eq!(
            "shader_program".parse::<AssetKind>(),
            Ok(AssetKind::ShaderProgram)
        );
        assert_eq!(
            "ShaderProgram".parse::<AssetKind>(),
            Ok(AssetKind::ShaderProgram)
        );
        assert!("mesh".parse::<AssetKind>().is_err());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AssetKind::ShaderProgram.to_string(), "shader program");
    }

    #[test]
    fn test_asset_id_roundtrip() {
        let id = AssetId::from_u64(12345);
        assert_eq!(id.as_u64(), 12345);
        assert!(!id.is_none());
        assert!(AssetId::from(None).is_none());
    }
}
