//! # sdflow Core
//!
//! Node graphs that describe signed distance fields.
//!
//! A [`Graph`] holds typed dataflow nodes whose output types are kept
//! consistent on every edit. Before evaluation the graph is checked for
//! cycles and lowered by [`compile`] into a flat [`Program`], which can be
//! wrapped as a [`CompiledSdf`] for rendering.
//!
//! ## Quick Start
//!
//! ```rust
//! use sdflow_core::prelude::*;
//!
//! // Sphere of radius 1: length(p) - 1
//! let mut graph = Graph::new();
//! let p = graph.input(0, NodeType::Float3);
//! let len = graph.unary(UnaryOp::Length, p)?;
//! let one = graph.constant(1.0);
//! let d = graph.binary(BinaryOp::Sub, len, one)?;
//! let out = graph.output(d)?;
//!
//! assert!(graph.find_cycle(out).is_empty());
//! let sdf = CompiledSdf::from_graph(&graph, out)?;
//! assert_eq!(sdf.distance(Vec3::new(0.0, 3.0, 0.0)), 2.0);
//! # Ok::<(), sdflow_core::Error>(())
//! ```
//!
//! ## Conventions
//!
//! - **Precision**: every value is `f32` or a 2 to 4 component `f32` vector
//! - **Angles**: trigonometric operators use radians
//! - **Numeric edge cases**: NaN and infinity propagate, they are not errors

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod compile;
pub mod cycle;
pub mod graph;
pub mod sdf;
pub mod value;

mod error;

pub use compile::{Evaluator, Program, compile};
pub use cycle::find_cycle;
pub use error::{CompileError, Error, Result};
pub use graph::{BinaryOp, Graph, Node, NodeId, Port, UnaryOp};
pub use sdf::{CompiledSdf, Sdf};
pub use value::{NodeType, Value};

/// Prelude module for convenient imports
pub mod prelude {
    // Graph building
    pub use crate::graph::{BinaryOp, Graph, Node, NodeId, Port, UnaryOp};
    pub use crate::value::{NodeType, Value};

    // Validation and lowering
    pub use crate::compile::{Program, compile};
    pub use crate::cycle::find_cycle;
    pub use crate::sdf::{CompiledSdf, Sdf};

    // Math (re-export glam)
    pub use glam::{Vec2, Vec3, Vec4};

    // Error handling
    pub use crate::{CompileError, Error, Result};
}
