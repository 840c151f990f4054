//! Lighting, material and background settings
//!
//! The occlusion, shadow and fog constants are tuned defaults rather than
//! physical quantities; scenes may override any of them.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Surface response for one checkerboard cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Diffuse color (RGB, 0-1)
    pub color: Vec3,
    /// Specular intensity (0-1)
    pub specular: f32,
    /// Share of the reflected ray's color mixed in (0-1)
    pub reflectivity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::splat(0.75),
            specular: 0.5,
            reflectivity: 0.1,
        }
    }
}

/// Environment settings that control the appearance of the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    // Lighting
    /// Direction toward the light (will be normalized)
    pub light_direction: Vec3,
    /// Ambient light color (RGB, 0-1)
    pub ambient: Vec3,
    /// Specular exponent
    pub shininess: f32,

    // Material
    /// Materials of the even and odd checkerboard cells
    pub materials: [Material; 2],
    /// Edge length of a checkerboard cell
    pub checker_period: f32,

    // Background
    /// Color of missed rays and distant fog (RGB, 0-1)
    pub sky_color: Vec3,
    /// Distance at which surfaces are half faded into the sky
    pub fog_distance: f32,
    /// Width of the fade; larger values fade more gradually
    pub fog_falloff: f32,

    // Ambient occlusion
    /// Samples taken along the normal
    pub ao_samples: u32,
    /// Spacing between samples
    pub ao_step: f32,
    /// Occlusion intensity
    pub ao_strength: f32,

    // Shadows
    /// Penumbra sharpness; larger values give harder shadows
    pub shadow_softness: f32,
    /// Added to the shadow term before clamping so shadowed areas keep some light
    pub shadow_bias: f32,
    /// Maximum steps of the shadow march
    pub shadow_iterations: u32,
    /// Distance after which the light is considered unoccluded
    pub shadow_distance: f32,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            // Warm sun from upper right
            light_direction: Vec3::new(0.8, 0.9, -0.6),
            ambient: Vec3::new(0.12, 0.13, 0.16),
            shininess: 32.0,

            // Light and dark checker cells
            materials: [
                Material {
                    color: Vec3::new(0.8, 0.78, 0.74),
                    specular: 0.5,
                    reflectivity: 0.15,
                },
                Material {
                    color: Vec3::new(0.32, 0.34, 0.4),
                    specular: 0.25,
                    reflectivity: 0.05,
                },
            ],
            checker_period: 1.0,

            // Pale blue sky
            sky_color: Vec3::new(0.62, 0.74, 0.88),
            fog_distance: 40.0,
            fog_falloff: 6.0,

            ao_samples: 5,
            ao_step: 0.06,
            ao_strength: 2.5,

            shadow_softness: 8.0,
            shadow_bias: 0.2,
            shadow_iterations: 64,
            shadow_distance: 20.0,
        }
    }
}

impl Environment {
    /// Normalized direction toward the light
    pub fn light(&self) -> Vec3 {
        self.light_direction.try_normalize().unwrap_or(Vec3::Y)
    }

    /// Material of the checkerboard cell containing `p`
    pub fn material_at(&self, p: Vec3) -> &Material {
        let cell = (p / self.checker_period).floor();
        let parity = sdflow_math::fmod(cell.x + cell.y + cell.z, 2.0);
        &self.materials[usize::from(parity >= 1.0)]
    }

    /// Fraction of a surface's own color kept at distance `traveled`
    pub fn rolloff(&self, traveled: f32) -> f32 {
        1.0 - sdflow_math::logistic((traveled - self.fog_distance) / self.fog_falloff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn checker_alternates_between_cells() {
        let env = Environment::default();
        let a = env.material_at(Vec3::new(0.5, 0.5, 0.5));
        let b = env.material_at(Vec3::new(1.5, 0.5, 0.5));
        let c = env.material_at(Vec3::new(-0.5, 0.5, 0.5));
        assert_eq!(a, &env.materials[0]);
        assert_eq!(b, &env.materials[1]);
        assert_eq!(c, &env.materials[1]);
    }

    #[test]
    fn rolloff_fades_with_distance() {
        let env = Environment::default();
        assert!(env.rolloff(0.0) > 0.99);
        assert_relative_eq!(env.rolloff(env.fog_distance), 0.5);
        assert!(env.rolloff(1000.0) < 1e-3);
    }

    #[test]
    fn zero_light_direction_falls_back_to_up() {
        let env = Environment {
            light_direction: Vec3::ZERO,
            ..Environment::default()
        };
        assert_eq!(env.light(), Vec3::Y);
    }
}
