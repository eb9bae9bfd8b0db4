//! # Forge Engine
//!
//! A real-time rendering engine with a Vulkan backend.
//!
//! The crate is organized in layers. [`foundation`] holds math and logging
//! utilities with no rendering dependencies. [`core`] holds configuration.
//! [`assets`] holds CPU-side resources such as meshes, images, and compiled
//! shader binaries. [`render`] holds the window layer, the public [`render::Renderer`]
//! facade, and the Vulkan backend behind it.
//!
//! ## Features
//!
//! - Vulkan 1.0 backend with optional validation layers
//! - Swapchain management with automatic recreation on resize and minimize
//! - Multisampled forward rendering with depth testing
//! - Staged vertex, index, and texture uploads with full mipmap chains
//! - Frames-in-flight pipelining with per-frame uniform buffers
//! - TOML and RON configuration files
//!
//! ## Quick Start
//!
//! ```no_run
//! use forge_engine::core::config::RendererConfig;
//! use forge_engine::assets::Model;
//! use forge_engine::render::{Renderer, Window};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::new("Demo")
//!         .with_max_frames_in_flight(2)
//!         .with_clear_color([0.02, 0.02, 0.02, 1.0]);
//!
//!     let mut window = Window::new("Demo", 1280, 720)?;
//!     let mut renderer = Renderer::new(&mut window, &config)?;
//!     renderer.upload_model(&Model::quad())?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.render(&mut window)?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::missing_errors_doc
)]

pub mod assets;
pub mod core;
pub mod foundation;
pub mod render;

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::assets::{Mesh, Model, TextureData, Vertex};
    pub use crate::core::config::{Config, RendererConfig, ShaderConfig};
    pub use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3, Vec4};
    pub use crate::render::{RenderError, RenderResult, Renderer, Window};
}
