// wgpu implementation of the rendering backend
//
// Shader modules are validated inside an error scope so that a broken WGSL
// file turns into a `BackendError` instead of an uncaptured device error.
// "Linking" a program builds a render pipeline for the quad vertex layout
// and the shared texture bind group layout.

use super::backend::{
    BackendError, BufferDescription, BufferKind, BufferUsage, FilterMode, GpuHandle,
    HandleAllocator, RenderBackend, ShaderStage, TextureData, WrapMode,
};
use super::vertex::Vertex2D;
use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use wgpu::util::DeviceExt;

/// Entry point every stage module must export
pub const ENTRY_POINT: &str = "main";

/// A texture uploaded to the GPU, bound for sampling at group 0
pub struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl GpuTexture {
    /// Texture view (binding 0) and sampler (binding 1)
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// A GPU buffer and the number of elements it holds
pub struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    pub kind: BufferKind,
    pub element_count: u32,
}

struct ShaderModuleEntry {
    stage: ShaderStage,
    module: Rc<wgpu::ShaderModule>,
}

/// Backend that owns a wgpu device and queue
///
/// Every program shares one pipeline layout: a sampled texture at
/// `@group(0) @binding(0)` and its sampler at `@binding(1)`. Stages that do
/// not sample simply ignore the group.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    /// 1x1 white texture sampled when unit 0 has nothing bound
    fallback_texture: Rc<GpuTexture>,
    allocator: HandleAllocator,
    shaders: RefCell<HashMap<GpuHandle, ShaderModuleEntry>>,
    programs: RefCell<HashMap<GpuHandle, Rc<wgpu::RenderPipeline>>>,
    textures: RefCell<HashMap<GpuHandle, Rc<GpuTexture>>>,
    buffers: RefCell<HashMap<GpuHandle, Rc<GpuBuffer>>>,
    active_program: Cell<Option<GpuHandle>>,
    bound_textures: RefCell<HashMap<u32, GpuHandle>>,
    bound_buffers: RefCell<HashMap<BufferKind, GpuHandle>>,
}

impl WgpuBackend {
    /// Wrap a device; pipelines will render into `target_format`
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("program layout"),
            bind_group_layouts: &[&texture_layout],
            push_constant_ranges: &[],
        });

        let fallback_texture = Rc::new(upload_texture(
            &device,
            &queue,
            &texture_layout,
            "fallback texture",
            &TextureData::solid([255, 255, 255, 255]),
        ));

        Self {
            device,
            queue,
            target_format,
            texture_layout,
            pipeline_layout,
            fallback_texture,
            allocator: HandleAllocator::new(),
            shaders: RefCell::new(HashMap::new()),
            programs: RefCell::new(HashMap::new()),
            textures: RefCell::new(HashMap::new()),
            buffers: RefCell::new(HashMap::new()),
            active_program: Cell::new(None),
            bound_textures: RefCell::new(HashMap::new()),
            bound_buffers: RefCell::new(HashMap::new()),
        }
    }

    /// Get a reference to the device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get a reference to the queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Render pipeline of a linked program
    pub fn pipeline(&self, program: GpuHandle) -> Option<Rc<wgpu::RenderPipeline>> {
        self.programs.borrow().get(&program).cloned()
    }

    /// GPU buffer behind a handle
    pub fn gpu_buffer(&self, buffer: GpuHandle) -> Option<Rc<GpuBuffer>> {
        self.buffers.borrow().get(&buffer).cloned()
    }

    /// Buffer currently bound for a kind
    pub fn bound_buffer(&self, kind: BufferKind) -> Option<GpuHandle> {
        self.bound_buffers.borrow().get(&kind).copied()
    }

    /// Texture to sample for `unit`: the bound one, or the white fallback
    pub fn sampled_texture(&self, unit: u32) -> Rc<GpuTexture> {
        self.bound_textures
            .borrow()
            .get(&unit)
            .and_then(|handle| self.textures.borrow().get(handle).cloned())
            .unwrap_or_else(|| Rc::clone(&self.fallback_texture))
    }

    /// Run `f` inside a validation error scope
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }
}

fn address_mode(wrapping: WrapMode) -> wgpu::AddressMode {
    match wrapping {
        WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn filter_mode(filtering: FilterMode) -> wgpu::FilterMode {
    match filtering {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// Create the texture, write its pixels and build its sampling bind group
fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    label: &str,
    data: &TextureData,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let wrap = address_mode(data.wrapping);
    let filter = filter_mode(data.filtering);
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wrap,
        address_mode_v: wrap,
        address_mode_w: wrap,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });

    GpuTexture {
        texture,
        bind_group,
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_shader(
        &self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<GpuHandle, BackendError> {
        let (module, error) = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });

        if let Some(error) = error {
            return Err(BackendError::Compile {
                label: label.to_string(),
                message: error.to_string(),
            });
        }

        let handle = self.allocator.allocate();
        self.shaders.borrow_mut().insert(
            handle,
            ShaderModuleEntry {
                stage,
                module: Rc::new(module),
            },
        );
        debug!("wgpu: compiled {} shader {} as {}", stage, label, handle);
        Ok(handle)
    }

    fn delete_shader(&self, shader: GpuHandle) {
        self.shaders.borrow_mut().remove(&shader);
    }

    fn link_program(&self, label: &str, shaders: &[GpuHandle]) -> Result<GpuHandle, BackendError> {
        let mut vertex_module = None;
        let mut fragment_module = None;
        {
            let modules = self.shaders.borrow();
            for shader in shaders {
                let entry = modules
                    .get(shader)
                    .ok_or(BackendError::UnknownObject(*shader))?;
                match entry.stage {
                    ShaderStage::Vertex => vertex_module = Some(Rc::clone(&entry.module)),
                    ShaderStage::Fragment => fragment_module = Some(Rc::clone(&entry.module)),
                }
            }
        }

        let vertex_module = vertex_module.ok_or_else(|| BackendError::Link {
            label: label.to_string(),
            message: "no vertex stage attached".to_string(),
        })?;

        let vertex: &wgpu::ShaderModule = &vertex_module;
        let fragment: Option<&wgpu::ShaderModule> = fragment_module.as_deref();
        let targets = [Some(wgpu::ColorTargetState {
            format: self.target_format,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let (pipeline, error) = self.scoped(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: ENTRY_POINT,
                    buffers: &[Vertex2D::desc()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: fragment.map(|module| wgpu::FragmentState {
                    module,
                    entry_point: ENTRY_POINT,
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        });

        if let Some(error) = error {
            return Err(BackendError::Link {
                label: label.to_string(),
                message: error.to_string(),
            });
        }

        let handle = self.allocator.allocate();
        self.programs.borrow_mut().insert(handle, Rc::new(pipeline));
        debug!("wgpu: linked program {} as {}", label, handle);
        Ok(handle)
    }

    fn delete_program(&self, program: GpuHandle) {
        if self.active_program.get() == Some(program) {
            self.active_program.set(None);
        }
        self.programs.borrow_mut().remove(&program);
    }

    fn use_program(&self, program: Option<GpuHandle>) {
        self.active_program.set(program);
    }

    fn active_program(&self) -> Option<GpuHandle> {
        self.active_program.get()
    }

    fn create_texture(&self, label: &str, data: &TextureData) -> Result<GpuHandle, BackendError> {
        if data.width == 0 || data.height == 0 || data.pixels.len() != data.expected_len() {
            return Err(BackendError::Texture {
                label: label.to_string(),
                message: format!(
                    "{}x{} texture with {} bytes of pixel data",
                    data.width,
                    data.height,
                    data.pixels.len()
                ),
            });
        }

        let texture = upload_texture(&self.device, &self.queue, &self.texture_layout, label, data);
        let handle = self.allocator.allocate();
        self.textures.borrow_mut().insert(handle, Rc::new(texture));
        debug!(
            "wgpu: uploaded {}x{} texture {} as {}",
            data.width, data.height, label, handle
        );
        Ok(handle)
    }

    fn delete_texture(&self, texture: GpuHandle) {
        self.bound_textures
            .borrow_mut()
            .retain(|_, bound| *bound != texture);
        if let Some(gpu) = self.textures.borrow_mut().remove(&texture) {
            gpu.texture.destroy();
        }
    }

    fn bind_texture(&self, unit: u32, texture: Option<GpuHandle>) {
        let mut bound = self.bound_textures.borrow_mut();
        match texture {
            Some(texture) => {
                bound.insert(unit, texture);
            }
            None => {
                bound.remove(&unit);
            }
        }
    }

    fn create_buffer(
        &self,
        label: &str,
        description: &BufferDescription,
    ) -> Result<GpuHandle, BackendError> {
        if description.contents.is_empty() {
            return Err(BackendError::Buffer {
                label: label.to_string(),
                message: "empty contents".to_string(),
            });
        }

        let mut usage = match description.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        if description.usage == BufferUsage::Dynamic {
            usage |= wgpu::BufferUsages::COPY_DST;
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: &description.contents,
                usage,
            });

        let handle = self.allocator.allocate();
        self.buffers.borrow_mut().insert(
            handle,
            Rc::new(GpuBuffer {
                buffer,
                kind: description.kind,
                element_count: description.element_count(),
            }),
        );
        Ok(handle)
    }

    fn delete_buffer(&self, buffer: GpuHandle) {
        self.bound_buffers
            .borrow_mut()
            .retain(|_, bound| *bound != buffer);
        self.buffers.borrow_mut().remove(&buffer);
    }

    fn bind_buffer(&self, kind: BufferKind, buffer: Option<GpuHandle>) {
        let mut bound = self.bound_buffers.borrow_mut();
        match buffer {
            Some(buffer) => {
                bound.insert(kind, buffer);
            }
            None => {
                bound.remove(&kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::renderer::shader::{DEFAULT_FRAGMENT_SOURCE, DEFAULT_VERTEX_SOURCE};

    const BASIC_VERTEX: &str = include_str!("../../../assets/shaders/basic.vert.wgsl");
    const BASIC_FRAGMENT: &str = include_str!("../../../assets/shaders/basic.frag.wgsl");

    /// Backend on any available adapter; `None` on machines without one
    fn backend() -> Option<WgpuBackend> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("test device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .ok()?;
        Some(WgpuBackend::new(
            device,
            queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ))
    }

    fn link(backend: &WgpuBackend, vertex: &str, fragment: &str) -> Result<GpuHandle, BackendError> {
        let vertex = backend.create_shader(ShaderStage::Vertex, "vertex", vertex)?;
        let fragment = backend.create_shader(ShaderStage::Fragment, "fragment", fragment)?;
        backend.link_program("program", &[vertex, fragment])
    }

    #[test]
    fn test_sampling_program_links_against_texture_layout() {
        let Some(backend) = backend() else {
            return;
        };
        assert!(link(&backend, BASIC_VERTEX, BASIC_FRAGMENT).is_ok());
        assert!(link(&backend, DEFAULT_VERTEX_SOURCE, DEFAULT_FRAGMENT_SOURCE).is_ok());
    }

    #[test]
    fn test_binding_outside_layout_fails_to_link() {
        let Some(backend) = backend() else {
            return;
        };
        let fragment = BASIC_FRAGMENT.replace("@group(0)", "@group(1)");
        assert!(matches!(
            link(&backend, BASIC_VERTEX, &fragment),
            Err(BackendError::Link { .. })
        ));
    }

    #[test]
    fn test_sampled_texture_follows_unit_zero() {
        let Some(backend) = backend() else {
            return;
        };
        let fallback = backend.sampled_texture(0);

        let checker = backend
            .create_texture("checker", &TextureData::solid([10, 20, 30, 255]))
            .unwrap();
        backend.bind_texture(0, Some(checker));
        assert!(!Rc::ptr_eq(&backend.sampled_texture(0), &fallback));
        assert!(Rc::ptr_eq(&backend.sampled_texture(1), &fallback));

        backend.delete_texture(checker);
        assert!(Rc::ptr_eq(&backend.sampled_texture(0), &fallback));
    }
}
