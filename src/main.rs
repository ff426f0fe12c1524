use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use winit::{
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    window::WindowBuilder,
};

use ember::engine::assets::{
    Asset, AssetFactory, AssetKind, DeserializationService, ResourceManager, ResourceRegistry,
    ShaderProgramHandle, TextureHandle,
};
use ember::engine::config::{EngineConfig, DEFAULT_CONFIG_PATH};
use ember::engine::frame_clock::FrameClock;
use ember::engine::renderer::{
    HeadlessBackend, Renderer, Shader, ShaderProgram, SharedBackend, Texture,
};

/// How often the render loop logs frame and cache statistics
const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "ember")]
#[command(about = "A small rendering engine with a reference-counted asset cache")]
struct CliArgs {
    /// Engine configuration file
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Load assets against a headless backend and exit instead of opening a window
    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let (mut config, found) = EngineConfig::load_or_default(&args.config)?;
    if args.headless {
        config.renderer.headless = true;
    }

    // Initialize logger; RUST_LOG overrides the configured level
    env_logger::Builder::new()
        .filter_level(config.logging.level.into())
        .parse_default_env()
        .init();

    info!("Starting Ember...");
    if !found {
        warn!(
            "Config {} not found, using defaults",
            args.config.display()
        );
    }

    if config.renderer.headless {
        run_headless(&config, &args.config)
    } else {
        run_windowed(config, &args.config)
    }
}

/// Load the resource table named by the configuration
fn load_registry(
    config: &EngineConfig,
    config_path: &Path,
) -> Result<(Rc<ResourceRegistry>, Rc<dyn DeserializationService>)> {
    let service = config.resources.format.service();
    let path = config.resources_path(config_path);
    let registry = ResourceRegistry::load(service.as_ref(), &path)
        .with_context(|| format!("Failed to load resource table {}", path.display()))?;
    Ok((Rc::new(registry), service))
}

/// Register one factory per asset kind
fn build_resources(
    config: &EngineConfig,
    registry: &Rc<ResourceRegistry>,
    service: &Rc<dyn DeserializationService>,
    backend: &SharedBackend,
) -> Result<ResourceManager> {
    let mut resources = ResourceManager::new();

    resources.register_factory(
        AssetFactory::<Shader>::new(Rc::clone(registry), Rc::clone(backend))
            .with_service(Rc::clone(service))
            .with_threshold(config.assets.shader_threshold),
    )?;
    resources.register_factory(
        AssetFactory::<ShaderProgram>::new(Rc::clone(registry), Rc::clone(backend))
            .with_service(Rc::clone(service))
            .with_threshold(config.assets.program_threshold),
    )?;
    resources.register_factory(
        AssetFactory::<Texture>::new(Rc::clone(registry), Rc::clone(backend))
            .with_service(Rc::clone(service))
            .with_threshold(config.assets.texture_threshold),
    )?;

    Ok(resources)
}

/// Load every registered resource once against the headless backend
fn run_headless(config: &EngineConfig, config_path: &Path) -> Result<()> {
    let headless = Rc::new(HeadlessBackend::new());
    let backend: SharedBackend = headless.clone();
    let (registry, service) = load_registry(config, config_path)?;
    let mut resources = build_resources(config, &registry, &service, &backend)?;

    let program: ShaderProgramHandle = resources.get(&config.renderer.default_program)?;
    let texture: TextureHandle = resources.get(&config.renderer.default_texture)?;

    if let Some(program) = program.get() {
        program.bind();
        info!(
            "Default program {} (compiled: {})",
            program.name(),
            program.is_compiled()
        );
    }
    if let Some(texture) = texture.get() {
        texture.bind(0);
        info!("Default texture is {}x{}", texture.width(), texture.height());
    }

    let mut names: Vec<_> = registry.iter().collect();
    names.sort_by(|a, b| a.name.cmp(&b.name));
    for resource in names {
        match resource.kind {
            AssetKind::Shader => drop(resources.get::<Shader>(&resource.name)?),
            AssetKind::ShaderProgram => drop(resources.get::<ShaderProgram>(&resource.name)?),
            AssetKind::Texture => drop(resources.get::<Texture>(&resource.name)?),
        }
    }
    info!("Loaded {} resources: {}", registry.len(), resources.stats());

    let evicted = resources.collect_garbage();
    info!(
        "Evicted {} unreferenced assets, {} remain; {} live backend objects",
        evicted,
        resources.stats(),
        headless.stats().total()
    );

    Ok(())
}

fn run_windowed(config: EngineConfig, config_path: &Path) -> Result<()> {
    // Create event loop and window
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window.title.as_str())
            .with_inner_size(winit::dpi::LogicalSize::new(
                config.window.width,
                config.window.height,
            ))
            .with_resizable(true)
            .build(&event_loop)?,
    );

    info!("Window created successfully");

    let mut renderer = pollster::block_on(Renderer::new(window.clone(), &config.window))?;
    let backend = renderer.backend();
    let (registry, service) = load_registry(&config, config_path)?;
    let mut resources = build_resources(&config, &registry, &service, &backend)?;

    let program: ShaderProgramHandle = resources.get(&config.renderer.default_program)?;
    let texture: TextureHandle = resources.get(&config.renderer.default_texture)?;
    if let Some(texture) = texture.get() {
        texture.bind(0);
    }

    let mut clock = FrameClock::new();

    // Main event loop
    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                info!("Close requested, shutting down...");
                elwt.exit();
            }
            Event::WindowEvent {
                event: WindowEvent::Resized(physical_size),
                ..
            } => {
                renderer.resize(physical_size);
            }
            Event::WindowEvent {
                event: WindowEvent::RedrawRequested,
                ..
            } => {
                clock.begin_frame();
                let active = program.get();
                if let Err(e) = renderer.render(active.as_deref()) {
                    error!("Render failed: {}", e);
                }
                if clock.report_due(STATS_INTERVAL) {
                    debug!(
                        "{:.1} fps over {} frames; {}",
                        clock.fps(),
                        clock.frame_count(),
                        resources.stats()
                    );
                }
            }
            Event::AboutToWait => {
                // Request redraw on next frame
                window.request_redraw();
            }
            _ => {}
        })
        .map_err(|e| anyhow::anyhow!("Event loop error: {}", e))?;

    Ok(())
}
