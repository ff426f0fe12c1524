// Rendering system using wgpu

pub mod backend;
pub mod buffer;
pub mod headless;
pub mod shader;
pub mod texture;
pub mod vertex;
pub mod wgpu_backend;

pub use backend::{RenderBackend, SharedBackend};
pub use buffer::Buffer;
pub use headless::HeadlessBackend;
pub use shader::{Shader, ShaderProgram};
pub use texture::Texture;
pub use vertex::Vertex2D;
pub use wgpu_backend::WgpuBackend;

use crate::engine::config::WindowConfig;
use anyhow::Result;
use backend::{BufferDescription, BufferKind, BufferUsage};
use log::{debug, info};
use std::rc::Rc;
use std::sync::Arc;
use winit::window::Window;

/// Half extent of the quad drawn each frame, in clip space
const QUAD_HALF_EXTENT: f32 = 0.5;

/// Owns the window surface and draws a quad with the active program
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    backend: Rc<WgpuBackend>,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    clear_color: wgpu::Color,
    quad: Buffer,
}

/// Prefer an sRGB surface format; vsync picks FIFO presentation
fn surface_configuration(
    caps: &wgpu::SurfaceCapabilities,
    size: winit::dpi::PhysicalSize<u32>,
    window_config: &WindowConfig,
) -> Result<wgpu::SurfaceConfiguration> {
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|format| format.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| anyhow::anyhow!("Surface reports no supported formats"))?;

    let present_mode = if window_config.vsync {
        wgpu::PresentMode::Fifo
    } else {
        wgpu::PresentMode::AutoNoVsync
    };

    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode,
        alpha_mode: caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}

fn clear_color([r, g, b, a]: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: a as f64,
    }
}

impl Renderer {
    /// Set up the GPU device and window surface
    pub async fn new(window: Arc<Window>, window_config: &WindowConfig) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No GPU adapter can present to this window"))?;
        info!("Using GPU: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("ember device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        let config = surface_configuration(&surface.get_capabilities(&adapter), size, window_config)?;
        surface.configure(&device, &config);

        let backend = Rc::new(WgpuBackend::new(device, queue, config.format));
        let shared: SharedBackend = backend.clone();
        let quad = Buffer::new(
            &shared,
            "quad",
            &BufferDescription::vertices(&Vertex2D::quad(QUAD_HALF_EXTENT), BufferUsage::Static),
        )?;

        info!(
            "Renderer ready at {}x{} ({:?}, {:?})",
            size.width, size.height, config.format, config.present_mode
        );

        Ok(Self {
            surface,
            backend,
            config,
            size,
            clear_color: clear_color(window_config.background),
            quad,
        })
    }

    /// The wgpu backend as a shared trait object, for asset factories
    pub fn backend(&self) -> SharedBackend {
        self.backend.clone()
    }

    /// Resize the renderer
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(self.backend.device(), &self.config);
            debug!("Surface reconfigured to {}x{}", new_size.width, new_size.height);
        }
    }

    /// Render a frame: clear, then draw the quad with `program` if it is linked,
    /// sampling whatever texture is bound to unit 0
    pub fn render(&mut self, program: Option<&ShaderProgram>) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.resize(self.size);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(program) = program {
            program.bind();
        }
        self.quad.bind();

        let pipeline = self
            .backend
            .active_program()
            .and_then(|handle| self.backend.pipeline(handle));
        let vertices = self
            .backend
            .bound_buffer(BufferKind::Vertex)
            .and_then(|handle| self.backend.gpu_buffer(handle));
        let texture = self.backend.sampled_texture(0);

        let mut encoder = self
            .backend
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let (Some(pipeline), Some(vertices)) = (&pipeline, &vertices) {
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, texture.bind_group(), &[]);
                render_pass.set_vertex_buffer(0, vertices.buffer.slice(..));
                render_pass.draw(0..vertices.element_count, 0..1);
            }
        }

        self.backend.queue().submit([encoder.finish()]);
        output.present();

        Ok(())
    }
}
