// RON descriptor format
//
//   resources.ron:  (resources: [(name: "tex.checker", source: "textures/checker.ron", kind: "texture")])
//   program:        (name: "basic", stages: [(stage: Vertex, source: "basic.vert.wgsl")])
//   shader:         (name: "basic.vert", stage: Vertex, source: "basic.vert.wgsl")
//   texture:        (name: "checker", source: "checker.png", filtering: Nearest, wrapping: Repeat)

use super::{
    collect_resources, parse_failed, read_descriptor, read_resource_table,
    DeserializationService, RawResource,
};
use crate::engine::assets::registry::ResourceDescriptor;
use crate::engine::assets::{AssetDescriptor, AssetError, AssetKind};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ResourceTable {
    #[serde(default)]
    resources: Vec<RawResource>,
}

/// Reads descriptors written in Rusty Object Notation
#[derive(Debug, Clone, Copy, Default)]
pub struct RonService;

fn parse<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T, AssetError> {
    ron::de::from_str(text).map_err(|e| parse_failed(path, e))
}

impl DeserializationService for RonService {
    fn name(&self) -> &str {
        "ron"
    }

    fn deserialize(&self, kind: AssetKind, path: &Path) -> Result<AssetDescriptor, AssetError> {
        let text = read_descriptor(path)?;

        let descriptor = match kind {
            AssetKind::Shader => AssetDescriptor::Shader(parse(path, &text)?),
            AssetKind::ShaderProgram => AssetDescriptor::ShaderProgram(parse(path, &text)?),
            AssetKind::Texture => AssetDescriptor::Texture(parse(path, &text)?),
        };

        descriptor.finish(path)
    }

    fn deserialize_resources(
        &self,
        path: &Path,
    ) -> Result<HashMap<String, ResourceDescriptor>, AssetError> {
        let text = read_resource_table(path)?;
        let table: ResourceTable = ron::de::from_str(&text).map_err(|e| {
            AssetError::NoResourceFound(format!(
                "cannot parse resource file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(collect_resources(path, table.resources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::test_support::Fixture;
    use crate::engine::renderer::backend::{FilterMode, ShaderStage, WrapMode};

    #[test]
    fn test_program_descriptor() {
        let fixture = Fixture::new();
        let path = fixture.write(
            "shaders/basic.ron",
            r#"(
                name: "basic",
                stages: [
                    (stage: Vertex, source: "basic.vert.wgsl"),
                    (stage: Fragment, source: "basic.frag.wgsl"),
                ],
            )"#,
        );

        let descriptor = RonService
            .deserialize(AssetKind::ShaderProgram, &path)
            .unwrap();
        let AssetDescriptor::ShaderProgram(program) = descriptor else {
            panic!("expected a shader program");
        };
        assert_eq!(program.name, "basic");
        assert_eq!(program.stages.len(), 2);
        assert_eq!(program.stages[1].stage, ShaderStage::Fragment);
        assert_eq!(
            program.stages[0].source,
            fixture.path("shaders/basic.vert.wgsl")
        );
    }

    #[test]
    fn test_texture_descriptor_defaults() {
        let fixture = Fixture::new();
        let path = fixture.write("checker.ron", r#"(source: "checker.png", wrapping: Repeat)"#);

        let descriptor = RonService.deserialize(AssetKind::Texture, &path).unwrap();
        let AssetDescriptor::Texture(texture) = descriptor else {
            panic!("expected a texture");
        };
        assert_eq!(texture.name, "checker");
        assert_eq!(texture.filtering, FilterMode::Linear);
        assert_eq!(texture.wrapping, WrapMode::Repeat);
    }

    #[test]
    fn test_empty_stage_list_fails() {
        let fixture = Fixture::new();
        let path = fixture.write("broken.ron", r#"(name: "broken", stages: [])"#);

        let result = RonService.deserialize(AssetKind::ShaderProgram, &path);
        assert!(matches!(result, Err(AssetError::DeserializeFailed { .. })));
    }

    #[test]
    fn test_malformed_file_fails() {
        let fixture = Fixture::new();
        let path = fixture.write("garbage.ron", "(name: ");

        let result = RonService.deserialize(AssetKind::Texture, &path);
        assert!(matches!(result, Err(AssetError::DeserializeFailed { .. })));
    }

    #[test]
    fn test_resource_table() {
        let fixture = Fixture::new();
        let path = fixture.write(
            "resources.ron",
            r#"(resources: [
                (name: "tex.a", source: "images/a.ron", kind: "texture"),
                (name: "prog.basic", source: "shaders/basic.ron", kind: "shader_program"),
                (name: "broken", kind: "texture"),
            ])"#,
        );

        let resources = RonService.deserialize_resources(&path).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources["prog.basic"].kind, AssetKind::ShaderProgram);
        assert_eq!(resources["tex.a"].path, fixture.path("images/a.ron"));
    }

    #[test]
    fn test_missing_resource_table() {
        let fixture = Fixture::new();
        let result = RonService.deserialize_resources(&fixture.path("nope.ron"));
        assert!(matches!(result, Err(AssetError::NoResourceFound(_))));
    }
}
