// Shader stages and linked shader programs

use super::backend::{BackendError, GpuHandle, ShaderStage, SharedBackend};
use crate::engine::assets::descriptor::ShaderDescription;
use crate::engine::assets::{Asset, AssetDescriptor, AssetError, AssetId, AssetKind};
use std::rc::Rc;

pub(crate) const DEFAULT_VERTEX_SOURCE: &str = include_str!("shaders/default.vert.wgsl");
pub(crate) const DEFAULT_FRAGMENT_SOURCE: &str = include_str!("shaders/default.frag.wgsl");

fn build_error(kind: AssetKind, name: &str, reason: impl ToString) -> AssetError {
    AssetError::Build {
        kind,
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn kind_mismatch(descriptor: &AssetDescriptor, expected: AssetKind) -> AssetError {
    AssetError::KindMismatch {
        name: descriptor.name().to_string(),
        declared: descriptor.kind(),
        expected,
    }
}

/// A single shader stage
///
/// Holds its source until compiled; the backend object is released on drop.
pub struct Shader {
    handle: Option<GpuHandle>,
    name: String,
    stage: ShaderStage,
    source: String,
    backend: SharedBackend,
}

impl Shader {
    /// Create an uncompiled shader from source text
    pub fn from_source(
        backend: &SharedBackend,
        name: &str,
        stage: ShaderStage,
        source: impl Into<String>,
    ) -> Self {
        Self {
            handle: None,
            name: name.to_string(),
            stage,
            source: source.into(),
            backend: Rc::clone(backend),
        }
    }

    /// Read the stage's source file; the shader is not compiled yet
    pub fn load(backend: &SharedBackend, description: &ShaderDescription) -> Result<Self, AssetError> {
        let source = std::fs::read_to_string(&description.source).map_err(|e| {
            build_error(
                AssetKind::Shader,
                &description.name,
                format!("{}: {}", description.source.display(), e),
            )
        })?;
        Ok(Self::from_source(
            backend,
            &description.name,
            description.stage,
            source,
        ))
    }

    /// Compile through the backend; compiling twice is a no-op
    pub fn compile(&mut self) -> Result<(), BackendError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = self
            .backend
            .create_shader(self.stage, &self.name, &self.source)?;
        self.handle = Some(handle);
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<GpuHandle> {
        self.handle
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Asset for Shader {
    const KIND: AssetKind = AssetKind::Shader;

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
        let description = match descriptor {
            AssetDescriptor::Shader(description) => description,
            other => return Err(kind_mismatch(&other, AssetKind::Shader)),
        };

        let mut shader = Self::load(backend, &description)?;
        shader
            .compile()
            .map_err(|e| build_error(AssetKind::Shader, &description.name, e))?;
        Ok(shader)
    }

    fn placeholder(backend: &SharedBackend) -> Self {
        let mut shader = Self::from_source(
            backend,
            "default.vertex",
            ShaderStage::Vertex,
            DEFAULT_VERTEX_SOURCE,
        );
        if let Err(e) = shader.compile() {
            log::error!("Backend rejected the default shader: {}", e);
        }
        shader
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.delete_shader(handle);
        }
    }
}

/// A set of shader stages linked into one program
pub struct ShaderProgram {
    handle: Option<GpuHandle>,
    name: String,
    shaders: Vec<Shader>,
    backend: SharedBackend,
}

impl ShaderProgram {
    pub fn new(backend: &SharedBackend, name: &str) -> Self {
        Self {
            handle: None,
            name: name.to_string(),
            shaders: Vec::new(),
            backend: Rc::clone(backend),
        }
    }

    /// Attach a stage; takes effect at the next `compile`
    pub fn attach(&mut self, shader: Shader) {
        self.shaders.push(shader);
    }

    /// Compile every uncompiled stage and link them
    pub fn compile(&mut self) -> Result<(), BackendError> {
        for shader in &mut self.shaders {
            shader.compile()?;
        }

        let stages: Vec<GpuHandle> = self.shaders.iter().filter_map(Shader::handle).collect();
        let handle = self.backend.link_program(&self.name, &stages)?;

        if let Some(old) = self.handle.replace(handle) {
            self.backend.delete_program(old);
        }
        log::info!(
            "Linked shader program {} with {} stages",
            self.name,
            stages.len()
        );
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<GpuHandle> {
        self.handle
    }

    pub fn shaders(&self) -> &[Shader] {
        &self.shaders
    }

    /// Make this the active program
    pub fn bind(&self) {
        self.backend.use_program(self.handle);
    }

    pub fn unbind(&self) {
        self.backend.use_program(None);
    }
}

impl Asset for ShaderProgram {
    const KIND: AssetKind = AssetKind::ShaderProgram;

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
        let description = match descriptor {
            AssetDescriptor::ShaderProgram(description) => description,
            other => return Err(kind_mismatch(&other, AssetKind::ShaderProgram)),
        };

        let mut program = Self::new(backend, &description.name);
        for stage in &description.stages {
            program.attach(Shader::load(backend, stage)?);
        }
        program
            .compile()
            .map_err(|e| build_error(AssetKind::ShaderProgram, &description.name, e))?;
        Ok(program)
    }

    fn placeholder(backend: &SharedBackend) -> Self {
        let mut program = Self::new(backend, "default.program");
        program.attach(Shader::from_source(
            backend,
            "default.vertex",
            ShaderStage::Vertex,
            DEFAULT_VERTEX_SOURCE,
        ));
        program.attach(Shader::from_source(
            backend,
            "default.fragment",
            ShaderStage::Fragment,
            DEFAULT_FRAGMENT_SOURCE,
        ));

        if let Err(e) = program.compile() {
            log::error!("Backend rejected the default shader program: {}", e);
        }
        program
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.delete_program(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::descriptor::ShaderProgramDescription;
    use crate::engine::assets::test_support::{headless, Fixture};
    use crate::engine::renderer::backend::RenderBackend;

    #[test]
    fn test_compile_is_idempotent() {
        let (headless, backend) = headless();
        let mut shader =
            Shader::from_source(&backend, "v", ShaderStage::Vertex, DEFAULT_VERTEX_SOURCE);
        assert!(!shader.is_compiled());

        shader.compile().unwrap();
        let handle = shader.handle();
        shader.compile().unwrap();
        assert_eq!(shader.handle(), handle);
        assert_eq!(headless.stats().shaders, 1);
    }

    #[test]
    fn test_empty_source_fails_to_compile() {
        let (_, backend) = headless();
        let mut shader = Shader::from_source(&backend, "blank", ShaderStage::Fragment, "  ");
        assert!(shader.compile().is_err());
        assert!(!shader.is_compiled());
    }

    #[test]
    fn test_program_from_descriptor() {
        let (headless, backend) = headless();
        let fixture = Fixture::new();
        let vert = fixture.write("basic.vert.wgsl", DEFAULT_VERTEX_SOURCE);
        let frag = fixture.write("basic.frag.wgsl", DEFAULT_FRAGMENT_SOURCE);

        let descriptor = AssetDescriptor::ShaderProgram(ShaderProgramDescription {
            name: "basic".to_string(),
            stages: vec![
                ShaderDescription {
                    name: "basic.vertex".to_string(),
                    stage: ShaderStage::Vertex,
                    source: vert,
                },
                ShaderDescription {
                    name: "basic.fragment".to_string(),
                    stage: ShaderStage::Fragment,
                    source: frag,
                },
            ],
        });

        let program = ShaderProgram::from_descriptor(descriptor, &backend).unwrap();
        assert!(program.is_compiled());
        assert_eq!(program.shaders().len(), 2);
        assert!(program.shaders().iter().all(Shader::is_compiled));

        let handle = program.handle().unwrap();
        let stages: Vec<GpuHandle> = program.shaders().iter().filter_map(Shader::handle).collect();
        assert_eq!(headless.program_shaders(handle), Some(stages));

        drop(program);
        assert_eq!(headless.stats().total(), 0);
    }

    #[test]
    fn test_fragment_only_program_fails_to_link() {
        let (_, backend) = headless();
        let mut program = ShaderProgram::new(&backend, "frag-only");
        program.attach(Shader::from_source(
            &backend,
            "f",
            ShaderStage::Fragment,
            DEFAULT_FRAGMENT_SOURCE,
        ));

        assert!(program.compile().is_err());
        assert!(!program.is_compiled());
    }

    #[test]
    fn test_missing_stage_file() {
        let (_, backend) = headless();
        let descriptor = AssetDescriptor::Shader(ShaderDescription {
            name: "ghost".to_string(),
            stage: ShaderStage::Vertex,
            source: "missing/ghost.wgsl".into(),
        });

        let result = Shader::from_descriptor(descriptor, &backend);
        assert!(matches!(result, Err(AssetError::Build { .. })));
    }

    #[test]
    fn test_placeholder_program_is_compiled() {
        let (headless, backend) = headless();
        let program = ShaderProgram::placeholder(&backend);
        assert!(program.is_compiled());

        program.bind();
        assert_eq!(headless.active_program(), program.handle());
        program.unbind();
        assert_eq!(headless.active_program(), None);
    }

    #[test]
    fn test_wrong_descriptor_kind() {
        let (_, backend) = headless();
        let descriptor = AssetDescriptor::ShaderProgram(ShaderProgramDescription {
            name: "basic".to_string(),
            stages: Vec::new(),
        });

        let result = Shader::from_descriptor(descriptor, &backend);
        assert!(matches!(result, Err(AssetError::KindMismatch { .. })));
    }
}
