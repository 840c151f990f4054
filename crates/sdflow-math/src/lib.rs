//! sdflow Math - scalar and vector primitives
//!
//! The compiled node functions and the CPU renderer share these helpers so a
//! node graph evaluates to exactly the same numbers wherever it is used.
//!
//! Vectors are [`glam`] types. Operations that glam does not provide with the
//! semantics the node language needs (floored modulo, reflection about an
//! arbitrary axis, componentwise application of scalar functions) live here.
//!
//! # Example
//!
//! ```rust
//! use sdflow_math::{Componentwise, fmod};
//! use glam::Vec3;
//!
//! // Modulo follows the sign of the divisor
//! assert_eq!(fmod(-0.5, 2.0), 1.5);
//!
//! let v = Vec3::new(-0.5, 2.5, 4.0).zip_map(Vec3::splat(2.0), fmod);
//! assert_eq!(v, Vec3::new(1.5, 0.5, 0.0));
//! ```

pub use glam::{Vec2, Vec3, Vec4};

// ============================================================================
// Componentwise application
// ============================================================================

/// Shapes that scalar functions can be applied to one component at a time
pub trait Componentwise: Copy {
    /// Number of `f32` components in this shape
    const DIM: usize;

    /// Apply `f` to every component
    fn map(self, f: impl Fn(f32) -> f32) -> Self;

    /// Apply `f` to matching components of `self` and `other`
    fn zip_map(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self;

    /// Euclidean length; the absolute value for scalars
    fn length(self) -> f32;
}

impl Componentwise for f32 {
    const DIM: usize = 1;

    #[inline]
    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        f(self)
    }

    #[inline]
    fn zip_map(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        f(self, other)
    }

    #[inline]
    fn length(self) -> f32 {
        self.abs()
    }
}

impl Componentwise for Vec2 {
    const DIM: usize = 2;

    #[inline]
    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Vec2::new(f(self.x), f(self.y))
    }

    #[inline]
    fn zip_map(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Vec2::new(f(self.x, other.x), f(self.y, other.y))
    }

    #[inline]
    fn length(self) -> f32 {
        Vec2::length(self)
    }
}

impl Componentwise for Vec3 {
    const DIM: usize = 3;

    #[inline]
    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Vec3::new(f(self.x), f(self.y), f(self.z))
    }

    #[inline]
    fn zip_map(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Vec3::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }

    #[inline]
    fn length(self) -> f32 {
        Vec3::length(self)
    }
}

impl Componentwise for Vec4 {
    const DIM: usize = 4;

    #[inline]
    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Vec4::new(f(self.x), f(self.y), f(self.z), f(self.w))
    }

    #[inline]
    fn zip_map(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Vec4::new(
            f(self.x, other.x),
            f(self.y, other.y),
            f(self.z, other.z),
            f(self.w, other.w),
        )
    }

    #[inline]
    fn length(self) -> f32 {
        Vec4::length(self)
    }
}

// ============================================================================
// Scalar helpers
// ============================================================================

/// Floored modulo: `a - b * floor(a / b)`
///
/// The result takes the sign of the divisor, unlike Rust's `%` which
/// truncates toward zero. `b == 0` yields NaN.
#[inline]
pub fn fmod(a: f32, b: f32) -> f32 {
    a - b * (a / b).floor()
}

/// Convert degrees to radians
#[inline]
pub fn radians(degrees: f32) -> f32 {
    degrees * (std::f32::consts::PI / 180.0)
}

/// Convert radians to degrees
#[inline]
pub fn degrees(radians: f32) -> f32 {
    radians * (180.0 / std::f32::consts::PI)
}

/// Clamp to `[0, 1]`
#[inline]
pub fn saturate(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Standard logistic curve `1 / (1 + e^-x)`
#[inline]
pub fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ============================================================================
// Vector helpers
// ============================================================================

/// Reflect `v` about the axis `n`
///
/// `n` is expected to be normalized; the result is `v - 2 (v . n) n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Normalize without the glam debug assertion on zero-length input
///
/// Zero vectors produce NaN components, matching IEEE division.
#[inline]
pub fn normalize_or_nan<T: Componentwise>(v: T) -> T {
    let len = v.length();
    v.map(|c| c / len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fmod_follows_divisor_sign() {
        assert_relative_eq!(fmod(5.5, 2.0), 1.5);
        assert_relative_eq!(fmod(-5.5, 2.0), 0.5);
        assert_relative_eq!(fmod(5.5, -2.0), -0.5);
        // Truncating remainder would give -1.5 here
        assert!((-5.5_f32 % 2.0 - fmod(-5.5, 2.0)).abs() > 1.0);
    }

    #[test]
    fn fmod_by_zero_is_nan() {
        assert!(fmod(1.0, 0.0).is_nan());
    }

    #[test]
    fn angle_conversion_round_trips() {
        assert_relative_eq!(radians(180.0), std::f32::consts::PI);
        assert_relative_eq!(degrees(std::f32::consts::FRAC_PI_2), 90.0);
    }

    #[test]
    fn reflect_mirrors_about_normal() {
        let v = Vec3::new(1.0, -1.0, 0.0);
        let r = reflect(v, Vec3::Y);
        assert_relative_eq!(r.x, 1.0);
        assert_relative_eq!(r.y, 1.0);
        assert_relative_eq!(r.z, 0.0);
    }

    #[test]
    fn componentwise_map_touches_every_lane() {
        let v = Vec4::new(-1.0, 2.0, -3.0, 4.0).map(f32::abs);
        assert_eq!(v, Vec4::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(Vec2::DIM, 2);
        assert_eq!(<f32 as Componentwise>::DIM, 1);
    }

    #[test]
    fn normalizing_zero_is_nan() {
        let n = normalize_or_nan(Vec2::new(3.0, 4.0));
        assert_relative_eq!(n.x, 0.6);
        assert_relative_eq!(n.y, 0.8);
        assert!(normalize_or_nan(Vec3::ZERO).is_nan());
        assert_relative_eq!(Componentwise::length(-2.0_f32), 2.0);
    }

    #[test]
    fn saturate_clamps_to_unit_range() {
        assert_eq!(saturate(-0.5), 0.0);
        assert_eq!(saturate(0.25), 0.25);
        assert_eq!(saturate(7.0), 1.0);
    }

    #[test]
    fn logistic_is_centered() {
        assert_relative_eq!(logistic(0.0), 0.5);
        assert!(logistic(10.0) > 0.99);
        assert!(logistic(-10.0) < 0.01);
    }
}
