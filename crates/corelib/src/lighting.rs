//! Fixed three-light lighting rig: an ambient term plus three directional
//! lights. Values are plain configuration and never derived from an asset.

use crate::{Vec3, vec3};

pub const MAX_DIRECTIONAL_LIGHTS: usize = 3;

/// Exponent of the specular highlight.
pub const SPECULAR_POWER: f32 = 16.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub enabled: bool,
    pub diffuse: Vec3,
    pub specular: Vec3,
    /// Direction the light travels in (not the direction towards the light).
    pub direction: Vec3,
}

impl DirectionalLight {
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            diffuse: Vec3::ZERO,
            specular: Vec3::ZERO,
            direction: Vec3::NEG_Y,
        }
    }

    pub fn new(diffuse: Vec3, direction: Vec3) -> Self {
        Self {
            enabled: true,
            diffuse,
            specular: Vec3::ZERO,
            direction: direction.normalize_or(Vec3::NEG_Y),
        }
    }

    pub fn with_specular(mut self, specular: Vec3) -> Self {
        self.specular = specular;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub ambient: Vec3,
    pub lights: [DirectionalLight; MAX_DIRECTIONAL_LIGHTS],
}

impl Lighting {
    /// Lighting with only an ambient term.
    pub fn ambient_only(ambient: Vec3) -> Self {
        Self {
            ambient,
            lights: [DirectionalLight::disabled(); MAX_DIRECTIONAL_LIGHTS],
        }
    }

    pub fn enabled_lights(&self) -> impl Iterator<Item = &DirectionalLight> {
        self.lights.iter().filter(|l| l.enabled)
    }

    /// Lit colour of an untextured white surface with normal `n`, ignoring
    /// specular. Mirrors the per-vertex term the shader evaluates.
    pub fn diffuse_at(&self, n: Vec3) -> Vec3 {
        let n = n.normalize_or_zero();
        self.enabled_lights().fold(self.ambient, |acc, l| {
            acc + l.diffuse * n.dot(-l.direction).max(0.0)
        })
    }
}

impl Default for Lighting {
    /// Grey key light from above, red fill from +X, blue fill from -X.
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.4),
            lights: [
                DirectionalLight::new(Vec3::splat(0.3), vec3(0.0, -1.0, 0.0))
                    .with_specular(Vec3::splat(0.1)),
                DirectionalLight::new(vec3(0.3, 0.0, 0.0), vec3(-1.0, 0.0, 0.0)),
                DirectionalLight::new(vec3(0.0, 0.0, 0.3), vec3(1.0, 0.0, 0.0)),
            ],
        }
    }
}
