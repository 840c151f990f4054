//! Node output types and runtime values

use glam::{Vec2, Vec3, Vec4};
use sdflow_math::Componentwise;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The type a node produces
///
/// `None`, `Indeterminate` and `Invalid` are ordinary graph states rather than
/// errors: an editor shows them on the node and the compiler refuses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeType {
    /// No input is wired
    #[default]
    None,
    /// Not resolvable yet (an upstream input is missing or unresolved)
    Indeterminate,
    /// A definite type error
    Invalid,
    Float,
    Float2,
    Float3,
    Float4,
}

impl NodeType {
    /// Returns the vector type with `dim` components (`1` is `Float`)
    pub fn with_dim(dim: usize) -> Option<Self> {
        match dim {
            1 => Some(Self::Float),
            2 => Some(Self::Float2),
            3 => Some(Self::Float3),
            4 => Some(Self::Float4),
            _ => None,
        }
    }

    /// Number of components for concrete types
    pub fn dim(self) -> Option<usize> {
        match self {
            Self::Float => Some(1),
            Self::Float2 => Some(2),
            Self::Float3 => Some(3),
            Self::Float4 => Some(4),
            Self::None | Self::Indeterminate | Self::Invalid => None,
        }
    }

    /// True for `Float` through `Float4`
    pub fn is_concrete(self) -> bool {
        self.dim().is_some()
    }

    /// True for `Float2` through `Float4`
    pub fn is_vector(self) -> bool {
        self.dim().is_some_and(|d| d > 1)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Indeterminate => "indeterminate",
            Self::Invalid => "invalid",
            Self::Float => "float",
            Self::Float2 => "float2",
            Self::Float3 => "float3",
            Self::Float4 => "float4",
        };
        f.write_str(s)
    }
}

/// A concrete runtime value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
}

impl Value {
    /// The type of this value (always concrete)
    pub fn ty(&self) -> NodeType {
        match self {
            Self::Float(_) => NodeType::Float,
            Self::Float2(_) => NodeType::Float2,
            Self::Float3(_) => NodeType::Float3,
            Self::Float4(_) => NodeType::Float4,
        }
    }

    /// Replicate a scalar across every component of `ty`
    ///
    /// Non-concrete types fall back to a scalar.
    pub fn splat(x: f32, ty: NodeType) -> Self {
        match ty {
            NodeType::Float2 => Self::Float2(Vec2::splat(x)),
            NodeType::Float3 => Self::Float3(Vec3::splat(x)),
            NodeType::Float4 => Self::Float4(Vec4::splat(x)),
            _ => Self::Float(x),
        }
    }

    /// A value of type `ty` with every component NaN
    pub fn nan(ty: NodeType) -> Self {
        Self::splat(f32::NAN, ty)
    }

    /// Build a value from 1 to 4 components
    pub fn from_components(c: &[f32]) -> Option<Self> {
        match *c {
            [x] => Some(Self::Float(x)),
            [x, y] => Some(Self::Float2(Vec2::new(x, y))),
            [x, y, z] => Some(Self::Float3(Vec3::new(x, y, z))),
            [x, y, z, w] => Some(Self::Float4(Vec4::new(x, y, z, w))),
            _ => None,
        }
    }

    /// Component `i`, if this value has one
    pub fn component(&self, i: usize) -> Option<f32> {
        match (self, i) {
            (Self::Float(x), 0) => Some(*x),
            (Self::Float2(v), 0..=1) => Some(v[i]),
            (Self::Float3(v), 0..=2) => Some(v[i]),
            (Self::Float4(v), 0..=3) => Some(v[i]),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_float2(&self) -> Option<Vec2> {
        match self {
            Self::Float2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float3(&self) -> Option<Vec3> {
        match self {
            Self::Float3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float4(&self) -> Option<Vec4> {
        match self {
            Self::Float4(v) => Some(*v),
            _ => None,
        }
    }

    /// Apply `f` to every component
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        match self {
            Self::Float(x) => Self::Float(x.map(f)),
            Self::Float2(v) => Self::Float2(v.map(f)),
            Self::Float3(v) => Self::Float3(v.map(f)),
            Self::Float4(v) => Self::Float4(v.map(f)),
        }
    }

    /// Apply `f` to matching components of two values of the same shape
    pub fn zip_map(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Option<Self> {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a.zip_map(b, f))),
            (Self::Float2(a), Self::Float2(b)) => Some(Self::Float2(a.zip_map(b, f))),
            (Self::Float3(a), Self::Float3(b)) => Some(Self::Float3(a.zip_map(b, f))),
            (Self::Float4(a), Self::Float4(b)) => Some(Self::Float4(a.zip_map(b, f))),
            _ => None,
        }
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Self::Float(x)
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Self::Float2(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Self::Float3(v)
    }
}

impl From<Vec4> for Value {
    fn from(v: Vec4) -> Self {
        Self::Float4(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(x) => write!(f, "{x}"),
            Self::Float2(v) => write!(f, "({}, {})", v.x, v.y),
            Self::Float3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Self::Float4(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
        }
    }
}
