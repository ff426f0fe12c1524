// Ember engine library: asset cache, rendering backends and configuration.
// The `ember` binary in main.rs is the composition root.

pub mod engine;
