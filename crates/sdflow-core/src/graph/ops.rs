//! Operators and their typing rules
//!
//! Each operator knows which type it produces for a given set of operand types
//! and how to apply itself to runtime values. The graph uses the first half
//! for type propagation, the compiler uses both.

use crate::value::{NodeType, Value};
use sdflow_math::{degrees, fmod, normalize_or_nan, radians};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Unary operators
// ============================================================================

/// Single-operand operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Abs,
    Negate,
    Length,
    Normalize,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Floor,
    Ceil,
    Radians,
    Degrees,
    /// Extract the first component
    X,
    Y,
    Z,
    W,
}

impl UnaryOp {
    /// Every unary operator, in declaration order
    pub const ALL: [UnaryOp; 19] = [
        Self::Abs,
        Self::Negate,
        Self::Length,
        Self::Normalize,
        Self::Sin,
        Self::Cos,
        Self::Tan,
        Self::Asin,
        Self::Acos,
        Self::Atan,
        Self::Exp,
        Self::Floor,
        Self::Ceil,
        Self::Radians,
        Self::Degrees,
        Self::X,
        Self::Y,
        Self::Z,
        Self::W,
    ];

    /// Component index for extraction operators
    pub fn component(self) -> Option<usize> {
        match self {
            Self::X => Some(0),
            Self::Y => Some(1),
            Self::Z => Some(2),
            Self::W => Some(3),
            _ => None,
        }
    }

    /// Result type for an operand of type `input`
    pub fn result_type(self, input: NodeType) -> NodeType {
        let Some(dim) = input.dim() else {
            return NodeType::Indeterminate;
        };
        match self {
            Self::Length => NodeType::Float,
            Self::Normalize if dim == 1 => NodeType::Invalid,
            Self::X | Self::Y | Self::Z | Self::W => match self.component() {
                Some(c) if dim > 1 && c < dim => NodeType::Float,
                _ => NodeType::Invalid,
            },
            _ => input,
        }
    }

    /// Apply to a runtime value
    ///
    /// Operand shapes that typing rejects produce NaN rather than panicking.
    pub fn apply(self, v: Value) -> Value {
        match self {
            Self::Abs => v.map(f32::abs),
            Self::Negate => v.map(|x| -x),
            Self::Sin => v.map(f32::sin),
            Self::Cos => v.map(f32::cos),
            Self::Tan => v.map(f32::tan),
            Self::Asin => v.map(f32::asin),
            Self::Acos => v.map(f32::acos),
            Self::Atan => v.map(f32::atan),
            Self::Exp => v.map(f32::exp),
            Self::Floor => v.map(f32::floor),
            Self::Ceil => v.map(f32::ceil),
            Self::Radians => v.map(radians),
            Self::Degrees => v.map(degrees),
            Self::Length => Value::Float(match v {
                Value::Float(x) => x.abs(),
                Value::Float2(v) => v.length(),
                Value::Float3(v) => v.length(),
                Value::Float4(v) => v.length(),
            }),
            Self::Normalize => match v {
                Value::Float(_) => Value::Float(f32::NAN),
                Value::Float2(v) => Value::Float2(normalize_or_nan(v)),
                Value::Float3(v) => Value::Float3(normalize_or_nan(v)),
                Value::Float4(v) => Value::Float4(normalize_or_nan(v)),
            },
            Self::X | Self::Y | Self::Z | Self::W => Value::Float(
                self.component()
                    .and_then(|c| v.component(c))
                    .unwrap_or(f32::NAN),
            ),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Binary operators
// ============================================================================

/// Two-operand operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Floored modulo, result follows the sign of the divisor
    Mod,
    Min,
    Max,
    Atan2,
    Dot,
    Cross,
}

impl BinaryOp {
    /// Every binary operator, in declaration order
    pub const ALL: [BinaryOp; 10] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Mod,
        Self::Min,
        Self::Max,
        Self::Atan2,
        Self::Dot,
        Self::Cross,
    ];

    /// True for operators applied per component, with scalar broadcast
    pub fn is_componentwise(self) -> bool {
        !matches!(self, Self::Dot | Self::Cross)
    }

    /// Result type for operands of type `lhs` and `rhs`
    ///
    /// An unwired operand is passed as [`NodeType::None`].
    pub fn result_type(self, lhs: NodeType, rhs: NodeType) -> NodeType {
        let (Some(a), Some(b)) = (lhs.dim(), rhs.dim()) else {
            return NodeType::Indeterminate;
        };
        match self {
            Self::Cross => {
                if lhs == NodeType::Float3 && rhs == NodeType::Float3 {
                    NodeType::Float3
                } else {
                    NodeType::Invalid
                }
            }
            Self::Dot => {
                if a == b {
                    NodeType::Float
                } else {
                    NodeType::Invalid
                }
            }
            _ => match (a, b) {
                (1, _) => rhs,
                (_, 1) => lhs,
                _ if a == b => lhs,
                _ => NodeType::Invalid,
            },
        }
    }

    fn scalar(self) -> fn(f32, f32) -> f32 {
        match self {
            Self::Add => |a, b| a + b,
            Self::Sub => |a, b| a - b,
            Self::Mul | Self::Dot => |a, b| a * b,
            Self::Div => |a, b| a / b,
            Self::Mod => fmod,
            Self::Min => f32::min,
            Self::Max => f32::max,
            Self::Atan2 => f32::atan2,
            Self::Cross => |_, _| f32::NAN,
        }
    }

    /// Apply to two runtime values of equal shape
    ///
    /// Broadcasting is resolved before this point; mismatched shapes yield NaN.
    pub fn apply(self, lhs: Value, rhs: Value) -> Value {
        match self {
            Self::Dot => Value::Float(match (lhs, rhs) {
                (Value::Float(a), Value::Float(b)) => a * b,
                (Value::Float2(a), Value::Float2(b)) => a.dot(b),
                (Value::Float3(a), Value::Float3(b)) => a.dot(b),
                (Value::Float4(a), Value::Float4(b)) => a.dot(b),
                _ => f32::NAN,
            }),
            Self::Cross => match (lhs, rhs) {
                (Value::Float3(a), Value::Float3(b)) => Value::Float3(a.cross(b)),
                _ => Value::nan(NodeType::Float3),
            },
            _ => lhs
                .zip_map(rhs, self.scalar())
                .unwrap_or_else(|| Value::nan(lhs.ty())),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Vector construction
// ============================================================================

/// Result type for a vector constructor with the given slot types
pub fn construct_type(slots: &[NodeType]) -> NodeType {
    if !(2..=4).contains(&slots.len()) {
        return NodeType::Invalid;
    }
    let mut result = NodeType::with_dim(slots.len()).unwrap_or(NodeType::Invalid);
    for &slot in slots {
        match slot {
            NodeType::Float => {}
            t if t.is_concrete() || t == NodeType::Invalid => result = NodeType::Invalid,
            _ => return NodeType::Indeterminate,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Vec2, Vec3};

    const CONCRETE: [NodeType; 4] = [
        NodeType::Float,
        NodeType::Float2,
        NodeType::Float3,
        NodeType::Float4,
    ];

    #[test]
    fn binary_broadcast_table() {
        use NodeType::{Float, Float2, Float3, Float4, Invalid};
        for op in BinaryOp::ALL.into_iter().filter(|op| op.is_componentwise()) {
            // Scalar with scalar
            assert_eq!(op.result_type(Float, Float), Float);
            // Scalar broadcasts on either side
            assert_eq!(op.result_type(Float3, Float), Float3);
            assert_eq!(op.result_type(Float, Float2), Float2);
            // Matching vectors
            assert_eq!(op.result_type(Float4, Float4), Float4);
            // Mismatched vectors
            assert_eq!(op.result_type(Float2, Float3), Invalid);
            assert_eq!(op.result_type(Float4, Float3), Invalid);
        }
    }

    #[test]
    fn binary_unresolved_operands_are_indeterminate() {
        for op in BinaryOp::ALL {
            for t in CONCRETE {
                for bad in [NodeType::None, NodeType::Indeterminate, NodeType::Invalid] {
                    assert_eq!(op.result_type(t, bad), NodeType::Indeterminate);
                    assert_eq!(op.result_type(bad, t), NodeType::Indeterminate);
                }
            }
        }
    }

    #[test]
    fn cross_requires_float3() {
        for a in CONCRETE {
            for b in CONCRETE {
                let expected = if a == NodeType::Float3 && b == NodeType::Float3 {
                    NodeType::Float3
                } else {
                    NodeType::Invalid
                };
                assert_eq!(BinaryOp::Cross.result_type(a, b), expected, "{a} x {b}");
            }
        }
    }

    #[test]
    fn dot_reduces_matching_shapes() {
        assert_eq!(
            BinaryOp::Dot.result_type(NodeType::Float3, NodeType::Float3),
            NodeType::Float
        );
        assert_eq!(
            BinaryOp::Dot.result_type(NodeType::Float3, NodeType::Float),
            NodeType::Invalid
        );
    }

    #[test]
    fn unary_rules() {
        use NodeType::{Float, Float2, Float3, Float4, Indeterminate, Invalid};
        assert_eq!(UnaryOp::Length.result_type(Float3), Float);
        assert_eq!(UnaryOp::Length.result_type(Float), Float);
        assert_eq!(UnaryOp::Normalize.result_type(Float), Invalid);
        assert_eq!(UnaryOp::Normalize.result_type(Float2), Float2);
        assert_eq!(UnaryOp::X.result_type(Float), Invalid);
        assert_eq!(UnaryOp::Y.result_type(Float2), Float);
        assert_eq!(UnaryOp::Z.result_type(Float2), Invalid);
        assert_eq!(UnaryOp::W.result_type(Float4), Float);
        assert_eq!(UnaryOp::Sin.result_type(Float3), Float3);
        assert_eq!(UnaryOp::Abs.result_type(NodeType::None), Indeterminate);
        assert_eq!(UnaryOp::Floor.result_type(Invalid), Indeterminate);
    }

    #[test]
    fn construct_rules() {
        use NodeType::{Float, Float2, Float3, Indeterminate, Invalid};
        assert_eq!(construct_type(&[Float, Float, Float]), Float3);
        assert_eq!(construct_type(&[Float, Float2]), Invalid);
        assert_eq!(construct_type(&[Float, NodeType::None]), Indeterminate);
        assert_eq!(construct_type(&[Float]), Invalid);
    }

    #[test]
    fn mod_is_floored() {
        let r = BinaryOp::Mod.apply(Value::Float(-1.0), Value::Float(3.0));
        assert_relative_eq!(r.as_float().unwrap_or_default(), 2.0);
    }

    #[test]
    fn unary_apply_matches_glam() {
        let v = Value::Float3(Vec3::new(3.0, 0.0, 4.0));
        assert_eq!(UnaryOp::Length.apply(v), Value::Float(5.0));
        assert_eq!(UnaryOp::Z.apply(v), Value::Float(4.0));
        let n = UnaryOp::Normalize.apply(Value::Float2(Vec2::new(0.0, 2.0)));
        assert_eq!(n, Value::Float2(Vec2::Y));
    }
}
