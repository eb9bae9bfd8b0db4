//! Engine core: configuration types shared across the crate.

pub mod config;

pub use config::{Config, ConfigError, RendererConfig, ShaderConfig};
