//! sdflow Render - CPU sphere tracing for distance fields
//!
//! This crate turns any [`Sdf`](sdflow_core::Sdf) into an image by marching
//! rays through it on a pool of worker threads.
//!
//! ## Features
//!
//! - Nine-sample antialiasing per pixel
//! - Diffuse and specular lighting, ambient occlusion, soft shadows
//! - Recursive reflections on a checkerboard material
//! - Cooperative cancellation and progress reporting
//! - PNG output
//!
//! ## Example
//!
//! ```rust
//! use sdflow_render::{CancelToken, RenderRequest, Renderer};
//! use glam::Vec3;
//!
//! let sphere = |p: Vec3| p.length() - 1.0;
//! let request = RenderRequest::new(32, 24);
//! let image = Renderer::render(&sphere, &request, &CancelToken::new(), None);
//! assert!(image.is_some());
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod camera;
pub mod control;
pub mod environment;
pub mod pixels;
pub mod raymarcher;
pub mod settings;

mod error;

pub use camera::{Camera, CameraBasis};
pub use control::{CancelToken, Progress, ProgressSink};
pub use environment::{Environment, Material};
pub use error::{Error, Result};
pub use pixels::PixelBuffer;
pub use raymarcher::{Renderer, Tracer};
pub use settings::{PixelFormat, RenderRequest, RenderSettings};
