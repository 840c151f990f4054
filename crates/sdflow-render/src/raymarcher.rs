//! Multithreaded CPU sphere tracing
//!
//! The image is split into horizontal stripes, one per worker. Each worker
//! owns its stripe's bytes and reads only the distance field and settings, so
//! no locking is needed. Workers poll the [`CancelToken`] before every pixel;
//! a render that any worker saw cancelled produces no image.

use crate::camera::CameraBasis;
use crate::control::{CancelToken, Progress, ProgressSink};
use crate::environment::Environment;
use crate::pixels::{BYTES_PER_PIXEL, PixelBuffer, to_rgba8};
use crate::settings::{RenderRequest, RenderSettings};
use glam::{Vec2, Vec3};
use rayon::prelude::*;
use sdflow_core::Sdf;
use sdflow_math::reflect;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Pixels a worker renders between progress reports
const PROGRESS_INTERVAL: usize = 100;

/// Sub-pixel sample offsets and weights, summing to 16
const SAMPLES: [(Vec2, f32); 9] = [
    (Vec2::new(-1.0 / 3.0, -1.0 / 3.0), 1.0),
    (Vec2::new(1.0 / 3.0, -1.0 / 3.0), 1.0),
    (Vec2::new(-1.0 / 3.0, 1.0 / 3.0), 1.0),
    (Vec2::new(1.0 / 3.0, 1.0 / 3.0), 1.0),
    (Vec2::new(0.0, -1.0 / 3.0), 2.0),
    (Vec2::new(0.0, 1.0 / 3.0), 2.0),
    (Vec2::new(-1.0 / 3.0, 0.0), 2.0),
    (Vec2::new(1.0 / 3.0, 0.0), 2.0),
    (Vec2::new(0.0, 0.0), 4.0),
];
const SAMPLE_WEIGHT: f32 = 16.0;

/// Where a ray met the surface
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub position: Vec3,
    /// Distance along the ray
    pub traveled: f32,
}

/// Ray marching and shading against one distance field
pub struct Tracer<'a> {
    sdf: &'a dyn Sdf,
    settings: &'a RenderSettings,
    light: Vec3,
}

impl<'a> Tracer<'a> {
    pub fn new(sdf: &'a dyn Sdf, settings: &'a RenderSettings) -> Self {
        Self {
            sdf,
            settings,
            light: settings.environment.light(),
        }
    }

    fn env(&self) -> &Environment {
        &self.settings.environment
    }

    /// Step along the ray until the surface is closer than epsilon
    ///
    /// Leaving `max_distance` or running out of iterations is a miss.
    pub fn march(&self, origin: Vec3, dir: Vec3) -> Option<Hit> {
        let s = self.settings;
        let mut traveled = 0.0;
        for _ in 0..s.max_iterations {
            let position = origin + dir * traveled;
            let d = self.sdf.distance(position);
            if d < s.epsilon {
                return Some(Hit { position, traveled });
            }
            traveled += d * s.step_size;
            if traveled > s.max_distance {
                return None;
            }
        }
        None
    }

    /// Surface normal by central differences
    pub fn normal(&self, p: Vec3) -> Vec3 {
        let e = self.settings.epsilon;
        let d = |o: Vec3| self.sdf.distance(p + o) - self.sdf.distance(p - o);
        Vec3::new(d(Vec3::X * e), d(Vec3::Y * e), d(Vec3::Z * e)).normalize_or_zero()
    }

    /// 1 for open surfaces, falling toward 0 in creases
    pub fn ambient_occlusion(&self, p: Vec3, n: Vec3) -> f32 {
        let env = self.env();
        let mut occlusion = 0.0;
        let mut weight = 1.0;
        for i in 1..=env.ao_samples {
            let h = env.ao_step * i as f32;
            occlusion += weight * (h - self.sdf.distance(p + n * h));
            weight *= 0.5;
        }
        (1.0 - env.ao_strength * occlusion).clamp(0.0, 1.0)
    }

    /// Penumbra estimate from a march toward the light
    pub fn soft_shadow(&self, p: Vec3, n: Vec3) -> f32 {
        let env = self.env();
        let eps = self.settings.epsilon;
        let origin = p + n * (eps * 2.0);
        let mut shade: f32 = 1.0;
        let mut t = eps * 10.0;
        for _ in 0..env.shadow_iterations {
            let h = self.sdf.distance(origin + self.light * t);
            if h < eps {
                shade = 0.0;
                break;
            }
            shade = shade.min(env.shadow_softness * h / t);
            t += h;
            if t > env.shadow_distance {
                break;
            }
        }
        (shade + env.shadow_bias).clamp(0.0, 1.0)
    }

    /// Color seen along a ray
    ///
    /// `depth` counts reflection bounces already taken.
    pub fn shade(&self, origin: Vec3, dir: Vec3, depth: u32) -> Vec3 {
        let env = self.env();
        let Some(hit) = self.march(origin, dir) else {
            return env.sky_color;
        };
        let p = hit.position;
        let n = self.normal(p);
        let material = env.material_at(p);

        let diffuse = self.light.dot(n).max(0.0);
        let specular = dir
            .dot(reflect(-self.light, dir))
            .max(0.0)
            .powf(env.shininess);
        let shadow = self.soft_shadow(p, n);
        let ao = self.ambient_occlusion(p, n);

        let reflection = if material.reflectivity > 0.0 && depth < self.settings.reflection_depth {
            let bounce = reflect(dir, n);
            self.shade(p + n * self.settings.reflection_offset, bounce, depth + 1)
        } else {
            env.sky_color
        };

        let lit = env.ambient
            + material.color * diffuse * shadow
            + Vec3::splat(specular * material.specular * shadow)
            + reflection * material.reflectivity;
        let rolloff = env.rolloff(hit.traveled);
        lit * ao * rolloff + env.sky_color * (1.0 - rolloff)
    }

    /// Box-filtered color of pixel (`x`, `y`)
    pub fn pixel(&self, basis: &CameraBasis, x: u32, y: u32) -> Vec3 {
        let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
        let sum: Vec3 = SAMPLES
            .iter()
            .map(|&(offset, weight)| {
                let at = center + offset;
                self.shade(basis.origin, basis.ray(at.x, at.y), 0) * weight
            })
            .sum();
        sum / SAMPLE_WEIGHT
    }
}

/// CPU sphere-tracing renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer;

impl Renderer {
    /// Render `sdf` as described by `request`
    ///
    /// Returns `None` if `cancel` fired before every pixel was written.
    pub fn render(
        sdf: &dyn Sdf,
        request: &RenderRequest,
        cancel: &CancelToken,
        progress: Option<&ProgressSink>,
    ) -> Option<PixelBuffer> {
        let (width, height) = (request.width, request.height);
        let workers = request.worker_count();
        let start = Instant::now();
        info!(width, height, workers, "render started");

        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let mut data = vec![0u8; row_bytes * height as usize];
        let stripe_rows = (height as usize).div_ceil(workers).max(1);
        let total = width as usize * height as usize;
        let done = AtomicUsize::new(0);

        let tracer = Tracer::new(sdf, &request.settings);
        let basis = request.camera.basis(width, height);
        let stripe = StripeContext {
            tracer: &tracer,
            basis: &basis,
            request,
            cancel,
            progress,
            done: &done,
            total,
        };

        let mut run = || {
            data.par_chunks_mut((stripe_rows * row_bytes).max(1))
                .enumerate()
                .map(|(i, bytes)| stripe.render(i * stripe_rows, bytes))
                .collect::<Option<Vec<()>>>()
        };
        let completed = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!(error = %e, "could not build render pool; using the global pool");
                run()
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if completed.is_none() {
            info!(elapsed_ms, "render cancelled");
            return None;
        }
        info!(elapsed_ms, "render finished");
        PixelBuffer::from_raw(width, height, request.format, data).ok()
    }
}

/// Shared, read-only state for every stripe of one render
struct StripeContext<'a> {
    tracer: &'a Tracer<'a>,
    basis: &'a CameraBasis,
    request: &'a RenderRequest,
    cancel: &'a CancelToken,
    progress: Option<&'a ProgressSink>,
    done: &'a AtomicUsize,
    total: usize,
}

impl StripeContext<'_> {
    /// Fill one stripe starting at image row `first_row`
    fn render(&self, first_row: usize, bytes: &mut [u8]) -> Option<()> {
        let width = self.request.width as usize;
        let mut pending = 0;

        for (i, px) in bytes.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            if self.cancel.is_cancelled() {
                debug!(first_row, "stripe cancelled");
                return None;
            }
            let x = (i % width) as u32;
            let y = (first_row + i / width) as u32;
            let color = self.tracer.pixel(self.basis, x, y);
            px.copy_from_slice(&self.request.format.encode(to_rgba8(color)));

            pending += 1;
            if pending == PROGRESS_INTERVAL {
                self.flush(&mut pending);
            }
        }
        self.flush(&mut pending);
        Some(())
    }

    fn flush(&self, pending: &mut usize) {
        if *pending == 0 {
            return;
        }
        let done = self.done.fetch_add(*pending, Ordering::Relaxed) + *pending;
        *pending = 0;
        if let Some(sink) = self.progress {
            sink.report(Progress {
                done,
                total: self.total,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    fn sphere(p: Vec3) -> f32 {
        p.length() - 1.0
    }

    fn small(workers: usize) -> RenderRequest {
        RenderRequest {
            workers,
            ..RenderRequest::new(24, 16)
        }
    }

    #[test]
    fn samples_cover_the_full_weight() {
        let total: f32 = SAMPLES.iter().map(|(_, w)| w).sum();
        assert_relative_eq!(total, SAMPLE_WEIGHT);
    }

    #[test]
    fn march_hits_a_sphere_head_on() {
        let settings = RenderSettings::default();
        let tracer = Tracer::new(&sphere, &settings);
        let hit = tracer.march(Vec3::new(0.0, 0.0, -5.0), Vec3::Z).unwrap();
        assert_relative_eq!(hit.traveled, 4.0, epsilon = 1e-2);
        assert_relative_eq!(tracer.normal(hit.position), -Vec3::Z, epsilon = 1e-2);
        assert!(tracer.march(Vec3::new(0.0, 3.0, -5.0), Vec3::Z).is_none());
    }

    #[test]
    fn open_surfaces_are_unoccluded() {
        let settings = RenderSettings::default();
        let plane = |p: Vec3| p.y;
        let tracer = Tracer::new(&plane, &settings);
        assert_relative_eq!(tracer.ambient_occlusion(Vec3::ZERO, Vec3::Y), 1.0);
        assert_relative_eq!(tracer.soft_shadow(Vec3::ZERO, Vec3::Y), 1.0);
    }

    #[test]
    fn renders_are_deterministic_across_worker_counts() {
        let one = Renderer::render(&sphere, &small(1), &CancelToken::new(), None).unwrap();
        let again = Renderer::render(&sphere, &small(1), &CancelToken::new(), None).unwrap();
        let many = Renderer::render(&sphere, &small(5), &CancelToken::new(), None).unwrap();
        assert_eq!(one, again);
        assert_eq!(one.as_bytes(), many.as_bytes());
    }

    #[test]
    fn far_constant_field_is_all_sky() {
        let far = |_: Vec3| 4.0_f32;
        let request = small(3);
        let image = Renderer::render(&far, &request, &CancelToken::new(), None).unwrap();
        let sky = to_rgba8(request.settings.environment.sky_color);
        for y in 0..image.height() {
            for x in 0..image.width() {
                let px = image.pixel(x, y).unwrap();
                for (got, want) in px.iter().zip(sky) {
                    assert!(got.abs_diff(want) <= 1, "pixel {x},{y} is {px:?}");
                }
            }
        }
    }

    #[test]
    fn exhausting_iterations_is_a_miss() {
        // Never below epsilon, and 8 steps travel far less than max_distance
        let hover = |_: Vec3| 0.002_f32;
        let request = RenderRequest {
            settings: RenderSettings {
                max_iterations: 8,
                ..RenderSettings::default()
            },
            ..small(2)
        };
        let tracer = Tracer::new(&hover, &request.settings);
        assert!(tracer.march(Vec3::ZERO, Vec3::Z).is_none());

        let image = Renderer::render(&hover, &request, &CancelToken::new(), None).unwrap();
        let sky = to_rgba8(request.settings.environment.sky_color);
        for y in 0..image.height() {
            for x in 0..image.width() {
                let px = image.pixel(x, y).unwrap();
                for (got, want) in px.iter().zip(sky) {
                    assert!(got.abs_diff(want) <= 1, "pixel {x},{y} is {px:?}");
                }
            }
        }
    }

    #[test]
    fn reflection_depth_counts_every_bounce() {
        // Floor at y = 0 and ceiling at y = 2 keep reflecting into each other
        let corridor = |p: Vec3| p.y.min(2.0 - p.y);
        let mut settings = RenderSettings::default();
        for material in &mut settings.environment.materials {
            material.reflectivity = 0.5;
        }
        let origin = Vec3::new(0.0, 1.0, 0.0);
        let dir = Vec3::new(1.0, -1.0, 0.3).normalize();
        let shade = |depth: u32| {
            let settings = RenderSettings {
                reflection_depth: depth,
                ..settings.clone()
            };
            Tracer::new(&corridor, &settings).shade(origin, dir, 0)
        };

        // A depth of 1 already traces one reflected ray
        assert!(shade(0).distance(shade(1)) > 1e-3);
        // and a depth of 4 traces a fourth
        assert!(shade(3).distance(shade(4)) > 1e-3);
    }

    #[test]
    fn cancelled_render_yields_no_image() {
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(Renderer::render(&sphere, &small(2), &cancel, None).is_none());
    }

    #[test]
    fn cancelling_mid_render_stops_early() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let sink = ProgressSink::new(move |p| {
            if p.done >= 100 {
                trigger.cancel();
            }
        });
        let request = RenderRequest {
            workers: 2,
            ..RenderRequest::new(64, 64)
        };
        assert!(Renderer::render(&sphere, &request, &cancel, Some(&sink)).is_none());
    }

    #[test]
    fn progress_reaches_the_total() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let sink = ProgressSink::new(move |p| log.lock().unwrap().push(p));
        let request = small(2);
        Renderer::render(&sphere, &request, &CancelToken::new(), Some(&sink)).unwrap();

        let reports = seen.lock().unwrap();
        let last = reports.iter().map(|p| p.done).max().unwrap();
        assert_eq!(last, 24 * 16);
        assert!(reports.iter().all(|p| p.total == 24 * 16));
    }

    #[test]
    fn bgra_output_swaps_channels() {
        let rgba = Renderer::render(&sphere, &small(1), &CancelToken::new(), None).unwrap();
        let request = RenderRequest {
            format: crate::PixelFormat::Bgra8,
            ..small(1)
        };
        let bgra = Renderer::render(&sphere, &request, &CancelToken::new(), None).unwrap();
        assert_eq!(rgba.pixel(12, 8), bgra.pixel(12, 8));
        assert_eq!(rgba.as_bytes()[0], bgra.as_bytes()[2]);
    }
}
