// Asset management system
//
// Named resources are resolved through the registry, deserialized into
// descriptors, built into GPU-backed assets and cached per kind by an
// `AssetFactory`. Handles keep cached assets alive across eviction sweeps.

mod asset;
pub mod descriptor;
mod factory;
mod handle;
mod manager;
mod registry;
pub mod serialization;
mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use asset::{Asset, AssetId, AssetKind};
pub use descriptor::AssetDescriptor;
pub use factory::{AssetFactory, DEFAULT_THRESHOLD};
pub use handle::{AssetHandle, ShaderHandle, ShaderProgramHandle, TextureHandle};
pub use manager::{AssetStats, ResourceManager};
pub use registry::{ResourceDescriptor, ResourceRegistry};
pub use serialization::{DeserializationService, DescriptorFormat};
pub use store::AssetKey;

/// Asset loading errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("No resource found: {0}")]
    NoResourceFound(String),

    #[error("Failed to deserialize {path}: {reason}")]
    DeserializeFailed { path: String, reason: String },

    #[error("Resource {name} is declared as {declared}, expected {expected}")]
    KindMismatch {
        name: String,
        declared: AssetKind,
        expected: AssetKind,
    },

    #[error("Failed to build {kind} {name}: {reason}")]
    Build {
        kind: AssetKind,
        name: String,
        reason: String,
    },

    #[error("No factory registered for {0} assets")]
    NoFactoryFound(AssetKind),

    #[error("A factory for {0} assets is already registered")]
    DuplicateFactory(AssetKind),

    #[error("No deserialization service set on the {0} factory")]
    MissingService(AssetKind),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    /// Wiring mistakes that must reach the caller instead of being absorbed
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            AssetError::NoFactoryFound(_)
                | AssetError::DuplicateFactory(_)
                | AssetError::MissingService(_)
        )
    }
}
