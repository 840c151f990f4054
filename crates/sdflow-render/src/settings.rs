//! Render configuration

use crate::camera::Camera;
use crate::environment::Environment;
use serde::{Deserialize, Serialize};

/// Ray marching limits and scene appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Steps per ray before giving up
    pub max_iterations: u32,
    /// Distance after which a ray counts as a miss
    pub max_distance: f32,
    /// A ray hits when the distance drops below this
    pub epsilon: f32,
    /// Fraction of the sampled distance advanced per step
    ///
    /// Values below 1 trade speed for robustness on fields that overestimate
    /// distance.
    pub step_size: f32,
    /// Maximum nested reflection bounces
    pub reflection_depth: u32,
    /// Offset along the normal before tracing a reflected ray
    pub reflection_offset: f32,
    pub environment: Environment,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_iterations: 256,
            max_distance: 100.0,
            epsilon: 1e-3,
            step_size: 1.0,
            reflection_depth: 4,
            reflection_offset: 1e-2,
            environment: Environment::default(),
        }
    }
}

/// Byte order of pixels in a [`PixelBuffer`](crate::PixelBuffer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Rgba8,
    Bgra8,
}

impl PixelFormat {
    /// Reorder an RGBA pixel into this format
    pub fn encode(self, [r, g, b, a]: [u8; 4]) -> [u8; 4] {
        match self {
            Self::Rgba8 => [r, g, b, a],
            Self::Bgra8 => [b, g, r, a],
        }
    }

    /// Reorder a pixel in this format back into RGBA
    pub fn decode(self, px: [u8; 4]) -> [u8; 4] {
        // Both orders are their own inverse
        self.encode(px)
    }
}

/// Everything needed to render one image, apart from the distance field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    pub width: u32,
    pub height: u32,
    /// Worker threads; 0 uses every available core
    pub workers: usize,
    pub format: PixelFormat,
    pub camera: Camera,
    pub settings: RenderSettings,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            workers: 0,
            format: PixelFormat::Rgba8,
            camera: Camera::default(),
            settings: RenderSettings::default(),
        }
    }
}

impl RenderRequest {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Worker count with 0 resolved to the machine's parallelism
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            self.workers
        }
    }
}
