// Texture assets

use super::backend::{
    BackendError, FilterMode, GpuHandle, SharedBackend, TextureData, WrapMode,
};
use crate::engine::assets::descriptor::TextureDescription;
use crate::engine::assets::{Asset, AssetDescriptor, AssetError, AssetId, AssetKind};
use glam::UVec2;
use std::rc::Rc;

const PLACEHOLDER_COLOR: [u8; 4] = [255, 255, 255, 255];

/// An image uploaded through the render backend
///
/// The backend texture is released when the asset is dropped.
pub struct Texture {
    handle: Option<GpuHandle>,
    name: String,
    size: UVec2,
    filtering: FilterMode,
    wrapping: WrapMode,
    backend: SharedBackend,
}

impl Texture {
    /// Upload decoded pixels
    pub fn from_data(
        backend: &SharedBackend,
        name: &str,
        data: &TextureData,
    ) -> Result<Self, BackendError> {
        let handle = backend.create_texture(name, data)?;
        Ok(Self {
            handle: Some(handle),
            name: name.to_string(),
            size: UVec2::new(data.width, data.height),
            filtering: data.filtering,
            wrapping: data.wrapping,
            backend: Rc::clone(backend),
        })
    }

    /// Create a solid color texture (useful for testing)
    pub fn from_color(
        backend: &SharedBackend,
        name: &str,
        color: [u8; 4],
    ) -> Result<Self, BackendError> {
        Self::from_data(backend, name, &TextureData::solid(color))
    }

    /// Decode the image a descriptor points at and upload it
    pub fn load(
        backend: &SharedBackend,
        description: &TextureDescription,
    ) -> Result<Self, AssetError> {
        let build_error = |reason: String| AssetError::Build {
            kind: AssetKind::Texture,
            name: description.name.clone(),
            reason,
        };

        let img = image::open(&description.source).map_err(|e| {
            build_error(format!("{}: {}", description.source.display(), e))
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let data = TextureData {
            width,
            height,
            pixels: rgba.into_raw(),
            filtering: description.filtering,
            wrapping: description.wrapping,
        };

        let texture = Self::from_data(backend, &description.name, &data)
            .map_err(|e| build_error(e.to_string()))?;
        log::info!(
            "Loaded texture {} ({}x{}) from {}",
            texture.name,
            width,
            height,
            description.source.display()
        );
        Ok(texture)
    }

    /// Backend texture, `None` only for a placeholder the backend rejected
    pub fn handle(&self) -> Option<GpuHandle> {
        self.handle
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.x
    }

    pub fn height(&self) -> u32 {
        self.size.y
    }

    pub fn filtering(&self) -> FilterMode {
        self.filtering
    }

    pub fn wrapping(&self) -> WrapMode {
        self.wrapping
    }

    /// Bind to a texture unit
    pub fn bind(&self, unit: u32) {
        self.backend.bind_texture(unit, self.handle);
    }

    pub fn unbind(&self, unit: u32) {
        self.backend.bind_texture(unit, None);
    }
}

impl Asset for Texture {
    const KIND: AssetKind = AssetKind::Texture;

    fn id(&self) -> AssetId {
        AssetId::from(self.handle)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn from_descriptor(
        descriptor: AssetDescriptor,
        backend: &SharedBackend,
    ) -> Result<Self, AssetError> {
        match descriptor {
            AssetDescriptor::Texture(description) => Self::load(backend, &description),
            other => Err(AssetError::KindMismatch {
                name: other.name().to_string(),
                declared: other.kind(),
                expected: AssetKind::Texture,
            }),
        }
    }

    fn placeholder(backend: &SharedBackend) -> Self {
        match Self::from_color(backend, "default.texture", PLACEHOLDER_COLOR) {
            Ok(texture) => texture,
            Err(e) => {
                log::error!("Backend rejected the default texture: {}", e);
                Self {
                    handle: None,
                    name: "default.texture".to_string(),
                    size: UVec2::ONE,
                    filtering: FilterMode::Nearest,
                    wrapping: WrapMode::Clamp,
                    backend: Rc::clone(backend),
                }
            }
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.delete_texture(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::test_support::{headless, Fixture};
    use std::path::PathBuf;

    #[test]
    fn test_load_png() {
        let (headless, backend) = headless();
        let fixture = Fixture::new();
        let source = fixture.png("grass.png", 4, 2, [0, 200, 0, 255]);

        let description = TextureDescription {
            name: "grass".to_string(),
            source,
            filtering: FilterMode::Nearest,
            wrapping: WrapMode::Repeat,
        };
        let texture = Texture::load(&backend, &description).unwrap();

        assert_eq!(texture.size(), UVec2::new(4, 2));
        assert_eq!(texture.wrapping(), WrapMode::Repeat);
        let handle = texture.handle().unwrap();
        assert_eq!(headless.texture_size(handle), Some((4, 2)));
        assert_eq!(texture.id(), AssetId::from(handle));

        drop(texture);
        assert!(!headless.is_live(handle));
    }

    #[test]
    fn test_missing_image_is_a_build_error() {
        let (_, backend) = headless();
        let description = TextureDescription {
            name: "ghost".to_string(),
            source: PathBuf::from("does/not/exist.png"),
            filtering: FilterMode::Linear,
            wrapping: WrapMode::Clamp,
        };

        let result = Texture::load(&backend, &description);
        assert!(matches!(result, Err(AssetError::Build { .. })));
    }

    #[test]
    fn test_placeholder_is_white_pixel() {
        let (headless, backend) = headless();
        let texture = Texture::placeholder(&backend);

        assert_eq!(texture.size(), UVec2::ONE);
        assert!(!texture.id().is_none());
        assert_eq!(headless.texture_size(texture.handle().unwrap()), Some((1, 1)));
    }

    #[test]
    fn test_bind_unbind() {
        let (headless, backend) = headless();
        let texture = Texture::from_color(&backend, "red", [255, 0, 0, 255]).unwrap();

        texture.bind(2);
        assert_eq!(headless.bound_texture(2), texture.handle());
        texture.unbind(2);
        assert_eq!(headless.bound_texture(2), None);
    }
}
