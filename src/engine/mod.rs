// Engine modules: assets, renderer, configuration, frame timing

pub mod assets;
pub mod config;
pub mod frame_clock;
pub mod renderer;
