//! CPU-side mesh representation produced by the importer.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::texture::TextureId;

/// Normal used when a primitive carries no NORMAL attribute.
pub const DEFAULT_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];
/// Texture coordinate used when a primitive carries no TEXCOORD_0 attribute.
pub const DEFAULT_UV: [f32; 2] = [0.0, 0.0];

/// Vertex with position/normal/uv. Values are in node space.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Vertex at `position` with the default normal and uv.
    pub fn at(position: [f32; 3]) -> Self {
        Self::new(position, DEFAULT_NORMAL, DEFAULT_UV)
    }
}

impl Default for MeshVertex {
    fn default() -> Self {
        Self::at([0.0; 3])
    }
}

/// One drawable unit: a primitive's geometry with its baked node transform.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshRecord {
    pub vertices: Vec<MeshVertex>,
    /// Triangle list, already re-wound. `None` means a flat vertex list.
    pub indices: Option<Vec<u32>>,
    /// Node-to-model matrix.
    pub transform: Mat4,
    pub texture: Option<TextureId>,
}

impl MeshRecord {
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// Number of complete triangles this record draws.
    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.vertices.len() / 3,
        }
    }
}

/// Swap the 2nd and 3rd entry of every complete triple, flipping the front
/// face of each triangle. Trailing entries of an incomplete triple are left
/// untouched.
pub fn rewind_triangles<T>(items: &mut [T]) {
    for tri in items.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
}
