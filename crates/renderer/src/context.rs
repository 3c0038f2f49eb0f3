//! The seam between the scene renderer and a graphics backend.

use asset::{MeshVertex, TextureData};
use corelib::{Mat3, Mat4, Vec3, lighting::Lighting};

use crate::RenderResult;

/// How a vertex stream is assembled into primitives. Imported meshes are
/// always triangle lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
}

impl PrimitiveTopology {
    /// Vertices (or indices) consumed by `count` primitives.
    pub fn element_count(self, count: usize) -> usize {
        match self {
            Self::TriangleList => count * 3,
        }
    }
}

/// Per-draw shading state: transforms, fixed lighting and the texture switch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectState {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub lighting: Lighting,
    pub texture_enabled: bool,
}

impl EffectState {
    pub fn new(view: Mat4, projection: Mat4, lighting: Lighting) -> Self {
        Self {
            world: Mat4::IDENTITY,
            view,
            projection,
            lighting,
            texture_enabled: false,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn world_view_projection(&self) -> Mat4 {
        self.view_projection() * self.world
    }

    /// Inverse-transpose of the world rotation/scale, so normals stay
    /// perpendicular under non-uniform scale. Falls back to the plain upper
    /// 3x3 for singular matrices.
    pub fn normal_matrix(&self) -> Mat3 {
        let m = Mat3::from_mat4(self.world);
        if m.determinant().abs() > f32::EPSILON {
            m.inverse().transpose()
        } else {
            m
        }
    }

    /// Camera position in world space.
    pub fn eye_position(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }
}

/// Graphics API abstraction the scene renderer draws through.
///
/// Backends receive raw decoded pixels for texture creation and plain
/// vertex / index slices plus a topology for every draw.
pub trait RenderContext {
    /// Backend texture handle.
    type Texture;

    fn create_texture(&mut self, texture: &TextureData) -> RenderResult<Self::Texture>;

    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Bind shading state for the draws that follow. `texture` is `None`
    /// when texturing is disabled.
    fn apply_effect(&mut self, effect: &EffectState, texture: Option<&Self::Texture>);

    fn draw_user_primitives(
        &mut self,
        topology: PrimitiveTopology,
        vertices: &[MeshVertex],
        primitive_count: usize,
    );

    fn draw_user_indexed_primitives(
        &mut self,
        topology: PrimitiveTopology,
        vertices: &[MeshVertex],
        indices: &[u32],
        primitive_count: usize,
    );

    /// Release effect / shader state owned on behalf of a renderer.
    fn release_effect(&mut self) {}

    fn backend_name(&self) -> &'static str;
}
