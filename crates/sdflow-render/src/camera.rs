//! Pinhole camera for the sphere tracer

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A camera looking from `origin` toward `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Camera position in world space
    pub origin: Vec3,
    /// Point the camera is looking at
    pub target: Vec3,
    /// Up vector (usually Y-up)
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Derive the right vector from `cross(up, origin)` instead of
    /// `cross(forward, up)`
    ///
    /// The two agree when the target is the world origin. The legacy form
    /// degenerates when the camera sits on the up axis.
    pub legacy_basis: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            origin: Vec3::new(0.0, 1.5, -5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 60.0,
            legacy_basis: true,
        }
    }
}

impl Camera {
    /// Create a camera looking at a target from a position
    pub fn look_at(origin: Vec3, target: Vec3) -> Self {
        Self {
            origin,
            target,
            ..Default::default()
        }
    }

    /// Get the forward direction (normalized)
    pub fn forward(&self) -> Vec3 {
        (self.target - self.origin).normalize()
    }

    /// Get the right direction (normalized)
    pub fn right(&self) -> Vec3 {
        if self.legacy_basis {
            self.up.cross(self.origin).normalize()
        } else {
            self.forward().cross(self.up).normalize()
        }
    }

    /// Get the actual up direction (may differ from self.up due to camera orientation)
    pub fn actual_up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Precompute the per-frame ray basis for an image of the given size
    pub fn basis(&self, width: u32, height: u32) -> CameraBasis {
        let half_height = (self.fov.to_radians() * 0.5).tan();
        CameraBasis {
            origin: self.origin,
            forward: self.forward(),
            right: self.right(),
            up: self.actual_up(),
            half_height,
            aspect: width as f32 / height.max(1) as f32,
            width: width as f32,
            height: height.max(1) as f32,
        }
    }
}

/// Camera frame resolved for one image
#[derive(Debug, Clone, Copy)]
pub struct CameraBasis {
    pub origin: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    half_height: f32,
    aspect: f32,
    width: f32,
    height: f32,
}

impl CameraBasis {
    /// Direction of the ray through image position (`x`, `y`) in pixels
    ///
    /// Pixel centers sit at half-integer positions; `y` grows downward.
    pub fn ray(&self, x: f32, y: f32) -> Vec3 {
        let u = (2.0 * x / self.width - 1.0) * self.aspect * self.half_height;
        let v = (1.0 - 2.0 * y / self.height) * self.half_height;
        (self.forward + self.right * u + self.up * v).normalize()
    }
}
