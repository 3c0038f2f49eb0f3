//! Core types: math re-exports, Transform, Camera, Lighting.

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4, vec3};

pub mod camera;
pub mod lighting;
pub mod transform;
