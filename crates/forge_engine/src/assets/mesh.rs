//! Vertex and mesh data.
//!
//! [`Vertex`] is the single vertex layout the engine uses. It is `#[repr(C)]`
//! so the in-memory layout matches what the vertex shader declares, and it
//! implements `bytemuck::Pod` so vertex slices can be reinterpreted as byte
//! slices for GPU upload without copying field by field.

use super::AssetError;

/// One vertex: position, color, and texture coordinates.
///
/// Field order and types must stay in sync with the vertex attribute
/// descriptions the pipeline declares: three `f32` position at offset 0,
/// three `f32` color at offset 12, two `f32` texture coordinates at
/// offset 24, 32 bytes per vertex in total.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Linear RGB vertex color.
    pub color: [f32; 3],
    /// UV texture coordinates, origin at the top left.
    pub tex_coord: [f32; 2],
}

unsafe impl bytemuck::Zeroable for Vertex {}
unsafe impl bytemuck::Pod for Vertex {}

impl Vertex {
    /// Construct a vertex from its components.
    pub const fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }
}

/// An indexed triangle mesh.
///
/// Indices are `u32` and reference `vertices` in triangle-list order with
/// counter-clockwise front faces.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,
    /// Triangle-list indices into `vertices`.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Build a mesh from vertex and index data, checking that the mesh is
    /// non-empty, indices form whole triangles, and every index is in range.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, AssetError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(AssetError::InvalidData("mesh has no geometry".into()));
        }
        if indices.len() % 3 != 0 {
            return Err(AssetError::InvalidData(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        let limit = vertices.len() as u32;
        if let Some(bad) = indices.iter().find(|&&i| i >= limit) {
            return Err(AssetError::InvalidData(format!(
                "index {bad} out of range for {limit} vertices"
            )));
        }
        Ok(Self { vertices, indices })
    }

    /// A unit quad in the XY plane, centered on the origin, facing +Z.
    ///
    /// Two counter-clockwise triangles; texture coordinates cover the full
    /// image with V increasing downward.
    pub fn quad() -> Self {
        let vertices = vec![
            Vertex::new([-0.5, -0.5, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, 0.0], [1.0, 1.0, 1.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, 0.0], [1.0, 1.0, 1.0], [0.0, 0.0]),
        ];
        let indices = vec![0, 1, 2, 2, 3, 0];
        Self { vertices, indices }
    }

    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn vertex_bytes_round_trip_through_pod_cast() {
        let vertices = [
            Vertex::new([1.0, 2.0, 3.0], [0.5, 0.5, 0.5], [0.0, 1.0]),
            Vertex::new([-1.0, 0.0, 4.0], [1.0, 0.0, 0.0], [1.0, 0.0]),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 64);
        let back: &[Vertex] = bytemuck::cast_slice(bytes);
        assert_eq!(back, &vertices);
    }

    #[test]
    fn quad_has_four_vertices_and_two_triangles() {
        let quad = Mesh::quad();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices.len(), 6);
        assert_eq!(quad.triangle_count(), 2);
    }

    #[test]
    fn quad_indices_are_in_range() {
        let quad = Mesh::quad();
        assert!(quad.indices.iter().all(|&i| (i as usize) < quad.vertices.len()));
    }

    #[test]
    fn empty_mesh_is_rejected() {
        assert!(Mesh::new(vec![], vec![]).is_err());
    }

    #[test]
    fn partial_triangle_is_rejected() {
        let vertices = Mesh::quad().vertices;
        assert!(Mesh::new(vertices, vec![0, 1]).is_err());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let vertices = Mesh::quad().vertices;
        assert!(Mesh::new(vertices, vec![0, 1, 9]).is_err());
    }
}
