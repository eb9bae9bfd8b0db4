//! Renderable models: geometry plus an optional texture.

use super::mesh::Mesh;
use super::texture::TextureData;

/// A mesh paired with the texture it samples, if any.
///
/// Models without a texture render with the renderer's built-in white
/// fallback, so vertex colors show through unmodified.
#[derive(Debug, Clone)]
pub struct Model {
    /// Geometry.
    pub mesh: Mesh,
    /// Texture sampled by the fragment shader, when present.
    pub texture: Option<TextureData>,
}

impl Model {
    /// A model from a mesh, with no texture attached.
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            texture: None,
        }
    }

    /// A unit quad with no texture.
    pub fn quad() -> Self {
        Self::new(Mesh::quad())
    }

    /// Attach a texture.
    #[must_use]
    pub fn with_texture(mut self, texture: TextureData) -> Self {
        self.texture = Some(texture);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_model_has_no_texture() {
        let model = Model::quad();
        assert!(model.texture.is_none());
        assert_eq!(model.mesh.vertices.len(), 4);
    }

    #[test]
    fn with_texture_attaches_pixels() {
        let model = Model::quad().with_texture(TextureData::solid_color(2, 2, [255; 4]));
        let texture = model.texture.expect("texture should be attached");
        assert_eq!(texture.width, 2);
        assert_eq!(texture.size_bytes(), 16);
    }
}
