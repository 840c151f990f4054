//! Signed distance functions
//!
//! A signed distance function returns the distance from a point to the
//! nearest surface: negative inside, positive outside, zero on the surface.
//! The renderer only ever sees the [`Sdf`] trait; graphs reach it through
//! [`CompiledSdf`].

use crate::compile::{Program, compile};
use crate::graph::{Graph, NodeId};
use crate::value::{NodeType, Value};
use crate::{Error, Result};
use glam::Vec3;
use std::cell::RefCell;

/// Anything that can report a signed distance
pub trait Sdf: Send + Sync {
    /// Signed distance from `p` to the surface
    fn distance(&self, p: Vec3) -> f32;
}

impl<F> Sdf for F
where
    F: Fn(Vec3) -> f32 + Send + Sync,
{
    fn distance(&self, p: Vec3) -> f32 {
        self(p)
    }
}

thread_local! {
    static REGISTERS: RefCell<Vec<Value>> = const { RefCell::new(Vec::new()) };
}

/// A compiled program with signature `(float3) -> float`
///
/// A program without parameters is accepted too and yields the same
/// distance everywhere.
#[derive(Debug, Clone)]
pub struct CompiledSdf {
    program: Program,
}

impl CompiledSdf {
    /// Wrap a program, checking its signature
    pub fn new(program: Program) -> Result<Self> {
        let params_ok = matches!(program.params(), [] | [NodeType::Float3]);
        if !params_ok || program.result_type() != NodeType::Float {
            let params = program
                .params()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::NotADistanceField {
                params,
                result: program.result_type(),
            });
        }
        Ok(Self { program })
    }

    /// Compile the graph rooted at `output` as a distance field
    pub fn from_graph(graph: &Graph, output: NodeId) -> Result<Self> {
        Self::new(compile(graph, output, Some(NodeType::Float))?)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl Sdf for CompiledSdf {
    fn distance(&self, p: Vec3) -> f32 {
        let args = [Value::Float3(p)];
        let eval = |regs: &mut Vec<Value>| self.program.eval_with(regs, &args);
        let value = REGISTERS
            .try_with(|cell| match cell.try_borrow_mut() {
                Ok(mut regs) => eval(&mut regs),
                Err(_) => eval(&mut Vec::new()),
            })
            .unwrap_or_else(|_| eval(&mut Vec::new()));
        value.as_float().unwrap_or(f32::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BinaryOp, UnaryOp};
    use approx::assert_relative_eq;

    fn sphere(graph: &mut Graph, radius: f32) -> NodeId {
        let p = graph.input(0, NodeType::Float3);
        let len = graph.unary(UnaryOp::Length, p).unwrap();
        let r = graph.constant(radius);
        let d = graph.binary(BinaryOp::Sub, len, r).unwrap();
        graph.output(d).unwrap()
    }

    #[test]
    fn compiled_sphere_matches_closed_form() {
        let mut g = Graph::new();
        let out = sphere(&mut g, 1.0);
        let sdf = CompiledSdf::from_graph(&g, out).unwrap();
        assert_relative_eq!(sdf.distance(Vec3::new(3.0, 0.0, 0.0)), 2.0);
        assert_relative_eq!(sdf.distance(Vec3::ZERO), -1.0);
    }

    #[test]
    fn constant_programs_are_distance_fields() {
        let mut g = Graph::new();
        let c = g.constant(4.0);
        let out = g.output(c).unwrap();
        let sdf = CompiledSdf::from_graph(&g, out).unwrap();
        assert_relative_eq!(sdf.distance(Vec3::splat(100.0)), 4.0);
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let mut g = Graph::new();
        let p = g.input(0, NodeType::Float2);
        let len = g.unary(UnaryOp::Length, p).unwrap();
        let out = g.output(len).unwrap();
        assert!(matches!(
            CompiledSdf::from_graph(&g, out),
            Err(Error::NotADistanceField { .. })
        ));

        let mut g = Graph::new();
        let v = g.constant(Vec3::ONE);
        let out = g.output(v).unwrap();
        assert!(matches!(
            CompiledSdf::from_graph(&g, out),
            Err(Error::Compile(_))
        ));
    }

    #[test]
    fn closures_are_distance_fields() {
        let plane = |p: Vec3| p.y;
        assert_relative_eq!(plane.distance(Vec3::new(0.0, 2.5, 0.0)), 2.5);
    }
}
