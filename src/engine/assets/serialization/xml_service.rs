// XML descriptor format
//
//   <Resources>
//     <Resource><Name>tex.checker</Name><Source>textures/checker.xml</Source><Kind>texture</Kind></Resource>
//   </Resources>
//
//   <ShaderProgram name="basic">
//     <Shader stage="vertex" source="basic.vert.wgsl"/>
//     <Shader stage="fragment" source="basic.frag.wgsl"/>
//   </ShaderProgram>
//
//   <Shader name="basic.vert" stage="vertex" source="basic.vert.wgsl"/>
//   <Texture name="checker" source="checker.png" filtering="nearest" wrapping="repeat"/>

use super::{
    collect_resources, parse_failed, parse_or_default, read_descriptor, read_resource_table,
    DeserializationService, RawResource,
};
use crate::engine::assets::descriptor::{
    ShaderDescription, ShaderProgramDescription, TextureDescription,
};
use crate::engine::assets::registry::ResourceDescriptor;
use crate::engine::assets::{AssetDescriptor, AssetError, AssetKind};
use crate::engine::renderer::backend::ShaderStage;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct XmlResources {
    #[serde(rename = "Resource", default)]
    resources: Vec<XmlResource>,
}

#[derive(Debug, Deserialize)]
struct XmlResource {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Source", default)]
    source: String,
    #[serde(rename = "Kind", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct XmlShader {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@stage", default)]
    stage: String,
    #[serde(rename = "@source", default)]
    source: String,
}

#[derive(Debug, Deserialize)]
struct XmlShaderProgram {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "Shader", default)]
    shaders: Vec<XmlShader>,
}

#[derive(Debug, Deserialize)]
struct XmlTexture {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@source", default)]
    source: String,
    #[serde(rename = "@filtering", default)]
    filtering: String,
    #[serde(rename = "@wrapping", default)]
    wrapping: String,
}

impl XmlShader {
    fn into_description(self, path: &Path) -> Result<ShaderDescription, AssetError> {
        let stage: ShaderStage = self.stage.parse().map_err(|e| parse_failed(path, e))?;
        Ok(ShaderDescription {
            name: self.name,
            stage,
            source: PathBuf::from(self.source.trim()),
        })
    }
}

/// Reads descriptors written as XML documents
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlService;

fn parse<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T, AssetError> {
    quick_xml::de::from_str(text).map_err(|e| parse_failed(path, e))
}

impl DeserializationService for XmlService {
    fn name(&self) -> &str {
        "xml"
    }

    fn deserialize(&self, kind: AssetKind, path: &Path) -> Result<AssetDescriptor, AssetError> {
        let text = read_descriptor(path)?;

        let descriptor = match kind {
            AssetKind::Shader => {
                let shader: XmlShader = parse(path, &text)?;
                AssetDescriptor::Shader(shader.into_description(path)?)
            }
            AssetKind::ShaderProgram => {
                let program: XmlShaderProgram = parse(path, &text)?;
                let stages = program
                    .shaders
                    .into_iter()
                    .map(|shader| shader.into_description(path))
                    .collect::<Result<Vec<_>, _>>()?;
                AssetDescriptor::ShaderProgram(ShaderProgramDescription {
                    name: program.name,
                    stages,
                })
            }
            AssetKind::Texture => {
                let texture: XmlTexture = parse(path, &text)?;
                AssetDescriptor::Texture(TextureDescription {
                    name: texture.name,
                    source: PathBuf::from(texture.source.trim()),
                    filtering: parse_or_default(path, &texture.filtering)?,
                    wrapping: parse_or_default(path, &texture.wrapping)?,
                })
            }
        };

        descriptor.finish(path)
    }

    fn deserialize_resources(
        &self,
        path: &Path,
    ) -> Result<HashMap<String, ResourceDescriptor>, AssetError> {
        let text = read_resource_table(path)?;
        let table: XmlResources = quick_xml::de::from_str(&text).map_err(|e| {
            AssetError::NoResourceFound(format!(
                "cannot parse resource file {}: {}",
                path.display(),
                e
            ))
        })?;

        let entries = table
            .resources
            .into_iter()
            .map(|r| RawResource {
                name: r.name,
                source: r.source,
                kind: r.kind,
            })
            .collect();

        Ok(collect_resources(path, entries))
    }
}
