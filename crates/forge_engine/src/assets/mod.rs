//! CPU-side assets: meshes, images, shader binaries, and models.
//!
//! Everything in this module is plain data with no GPU handles attached.
//! The Vulkan backend consumes these types when uploading resources.

pub mod mesh;
pub mod model;
pub mod shader;
pub mod texture;

pub use mesh::{Mesh, Vertex};
pub use model::Model;
pub use shader::ShaderSet;
pub use texture::TextureData;

use thiserror::Error;

/// Errors produced while loading or validating assets.
#[derive(Error, Debug)]
pub enum AssetError {
    /// File could not be read.
    #[error("asset I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File contents could not be decoded.
    #[error("failed to load asset: {0}")]
    LoadFailed(String),
    /// Decoded data is inconsistent or out of range.
    #[error("invalid asset data: {0}")]
    InvalidData(String),
}
