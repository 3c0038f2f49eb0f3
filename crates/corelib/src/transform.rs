//! Node transforms and the composition rule used when baking a hierarchy.
//!
//! Matrices follow glam's column-vector convention: `m * v` transforms `v`.
//! A child's local matrix therefore sits on the right of its parent's, which
//! is the same ordering a row-vector renderer writes as `local * parent`.

use crate::{Mat4, Quat, Vec3};

/// Translation / rotation / scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    #[inline]
    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Pure rotation about +Y, the usual turntable transform for a viewer.
    #[inline]
    pub fn from_rotation_y(angle: f32) -> Self {
        Self {
            rotation: Quat::from_rotation_y(angle),
            ..Self::identity()
        }
    }

    /// Build matrix = T * R * S.
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Accumulate a child's `local` matrix under its `parent`'s accumulated one.
#[inline]
pub fn compose(parent: Mat4, local: Mat4) -> Mat4 {
    parent * local
}
