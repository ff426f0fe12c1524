// Parsed asset descriptors
//
// A descriptor is the format-independent result of reading an asset file.
// Both deserialization services produce these and hand them to
// `Asset::from_descriptor`.

use super::{AssetError, AssetKind};
use crate::engine::renderer::backend::{FilterMode, ShaderStage, WrapMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single shader stage and the file holding its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderDescription {
    #[serde(default)]
    pub name: String,
    pub stage: ShaderStage,
    pub source: PathBuf,
}

/// A shader program made of one or more stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderProgramDescription {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "shaders")]
    pub stages: Vec<ShaderDescription>,
}

/// An image file plus its sampler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDescription {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: PathBuf,
    #[serde(default)]
    pub filtering: FilterMode,
    #[serde(default)]
    pub wrapping: WrapMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetDescriptor {
    Shader(ShaderDescription),
    ShaderProgram(ShaderProgramDescription),
    Texture(TextureDescription),
}

impl AssetDescriptor {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetDescriptor::Shader(_) => AssetKind::Shader,
            AssetDescriptor::ShaderProgram(_) => AssetKind::ShaderProgram,
            AssetDescriptor::Texture(_) => AssetKind::Texture,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AssetDescriptor::Shader(d) => &d.name,
            AssetDescriptor::ShaderProgram(d) => &d.name,
            AssetDescriptor::Texture(d) => &d.name,
        }
    }

    /// Validate a freshly parsed descriptor read from `path`
    ///
    /// Relative source paths are resolved against the descriptor's directory
    /// and empty names fall back to the file stem. A program without stages or
    /// a texture without an image source is rejected.
    pub fn finish(self, path: &Path) -> Result<Self, AssetError> {
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let fail = |reason: &str| AssetError::DeserializeFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        match self {
            AssetDescriptor::Shader(mut shader) => {
                if shader.source.as_os_str().is_empty() {
                    return Err(fail("shader has no source file"));
                }
                name_or(&mut shader.name, &stem);
                shader.source = resolve(base, &shader.source);
                Ok(AssetDescriptor::Shader(shader))
            }
            AssetDescriptor::ShaderProgram(mut program) => {
                if program.stages.is_empty() {
                    return Err(fail("shader program has no shader stages"));
                }
                name_or(&mut program.name, &stem);
                for (i, stage) in program.stages.iter_mut().enumerate() {
                    if stage.source.as_os_str().is_empty() {
                        return Err(fail(&format!("shader stage {} has no source file", i)));
                    }
                    let fallback = format!("{}.{}", program.name, stage.stage);
                    name_or(&mut stage.name, &fallback);
                    stage.source = resolve(base, &stage.source);
                }
                Ok(AssetDescriptor::ShaderProgram(program))
            }
            AssetDescriptor::Texture(mut texture) => {
                if texture.source.as_os_str().is_empty() {
                    return Err(fail("texture has no image source"));
                }
                name_or(&mut texture.name, &stem);
                texture.source = resolve(base, &texture.source);
                Ok(AssetDescriptor::Texture(texture))
            }
        }
    }
}

fn name_or(name: &mut String, fallback: &str) {
    if name.trim().is_empty() {
        *name = fallback.to_string();
    }
}

/// Resolve `path` against `base` unless it is already absolute
pub(crate) fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
