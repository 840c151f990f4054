//! Built-in demo scenes
//!
//! Each demo is an ordinary node graph, built through the same [`Graph`] API
//! an editor would use.

use crate::scene::{Scene, SceneError};
use glam::Vec3;
use sdflow_core::{BinaryOp, Graph, NodeId, NodeType, Result, UnaryOp};
use sdflow_render::Camera;

/// A named scene constructor
pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Result<Scene>,
}

impl Demo {
    pub fn build(&self) -> std::result::Result<Scene, SceneError> {
        Ok((self.build)()?)
    }
}

/// Every demo scene, in display order
pub const DEMOS: &[Demo] = &[
    Demo {
        name: "sphere",
        description: "Unit sphere resting above a checkered floor",
        build: sphere_on_floor,
    },
    Demo {
        name: "rounded-box",
        description: "Box rounded by a composite node, merged with the floor by another",
        build: rounded_box,
    },
    Demo {
        name: "repeat",
        description: "Grid of spheres repeated with mod on x and z",
        build: repeated_spheres,
    },
];

/// Look up a demo by name
pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|d| d.name == name)
}

/// Build the demo called `name`
pub fn build(name: &str) -> std::result::Result<Scene, SceneError> {
    find(name)
        .ok_or_else(|| SceneError::Unknown(name.to_string()))?
        .build()
}

// ============================================================================
// Graph fragments
// ============================================================================

/// `length(p - center) - radius`
fn sphere(g: &mut Graph, p: NodeId, center: Vec3, radius: f32) -> Result<NodeId> {
    let c = g.constant(center);
    let rel = g.binary(BinaryOp::Sub, p, c)?;
    let len = g.unary(UnaryOp::Length, rel)?;
    let r = g.constant(radius);
    g.binary(BinaryOp::Sub, len, r)
}

/// Horizontal plane at `height`
fn floor(g: &mut Graph, p: NodeId, height: f32) -> Result<NodeId> {
    let y = g.unary(UnaryOp::Y, p)?;
    let h = g.constant(height);
    g.binary(BinaryOp::Sub, y, h)
}

/// Exact distance to an origin-centered box with half extents `size`
fn cuboid(g: &mut Graph, p: NodeId, size: Vec3) -> Result<NodeId> {
    let a = g.unary(UnaryOp::Abs, p)?;
    let b = g.constant(size);
    let q = g.binary(BinaryOp::Sub, a, b)?;

    let zero = g.constant(0.0);
    let clamped = g.binary(BinaryOp::Max, q, zero)?;
    let outside = g.unary(UnaryOp::Length, clamped)?;

    let qx = g.unary(UnaryOp::X, q)?;
    let qy = g.unary(UnaryOp::Y, q)?;
    let qz = g.unary(UnaryOp::Z, q)?;
    let yz = g.binary(BinaryOp::Max, qy, qz)?;
    let xyz = g.binary(BinaryOp::Max, qx, yz)?;
    let inside = g.binary(BinaryOp::Min, xyz, zero)?;

    g.binary(BinaryOp::Add, outside, inside)
}

/// Composite computing `arg - radius`, which rounds any distance field
fn rounding(g: &mut Graph, radius: f32) -> Result<NodeId> {
    let comp = g.composite_unary();
    let arg = g.placeholder(comp, 0)?;
    let r = g.constant(radius);
    let d = g.binary(BinaryOp::Sub, arg, r)?;
    let body = g.output(d)?;
    g.set_body(comp, body)?;
    Ok(comp)
}

/// Composite computing `min(lhs, rhs)`
fn union(g: &mut Graph) -> Result<NodeId> {
    let comp = g.composite_binary();
    let a = g.placeholder(comp, 0)?;
    let b = g.placeholder(comp, 1)?;
    let m = g.binary(BinaryOp::Min, a, b)?;
    let body = g.output(m)?;
    g.set_body(comp, body)?;
    Ok(comp)
}

/// Composite folding a coordinate into `[-period/2, period/2)`
fn repeat(g: &mut Graph, period: f32) -> Result<NodeId> {
    let comp = g.composite_unary();
    let arg = g.placeholder(comp, 0)?;
    let half = g.constant(period * 0.5);
    let per = g.constant(period);
    let shifted = g.binary(BinaryOp::Add, arg, half)?;
    let wrapped = g.binary(BinaryOp::Mod, shifted, per)?;
    let centered = g.binary(BinaryOp::Sub, wrapped, half)?;
    let body = g.output(centered)?;
    g.set_body(comp, body)?;
    Ok(comp)
}

// ============================================================================
// Scenes
// ============================================================================

fn sphere_on_floor() -> Result<Scene> {
    let mut g = Graph::new();
    let p = g.input(0, NodeType::Float3);
    let ball = sphere(&mut g, p, Vec3::ZERO, 1.0)?;
    let ground = floor(&mut g, p, -1.0)?;
    let d = g.binary(BinaryOp::Min, ball, ground)?;
    let out = g.output(d)?;
    Ok(Scene::new("sphere", g, out))
}

fn rounded_box() -> Result<Scene> {
    let mut g = Graph::new();
    let p = g.input(0, NodeType::Float3);
    let body = cuboid(&mut g, p, Vec3::new(0.8, 0.6, 0.8))?;

    let round = rounding(&mut g, 0.2)?;
    g.set_input(round, body)?;

    let ground = floor(&mut g, p, -0.8)?;
    let merge = union(&mut g)?;
    g.set_lhs(merge, round)?;
    g.set_rhs(merge, ground)?;

    let out = g.output(merge)?;
    Ok(Scene::new("rounded-box", g, out)
        .with_camera(Camera::look_at(Vec3::new(2.5, 2.0, -4.0), Vec3::ZERO)))
}

fn repeated_spheres() -> Result<Scene> {
    let mut g = Graph::new();
    let p = g.input(0, NodeType::Float3);
    let px = g.unary(UnaryOp::X, p)?;
    let py = g.unary(UnaryOp::Y, p)?;
    let pz = g.unary(UnaryOp::Z, p)?;

    // One repeat composite, duplicated for the z axis
    let rx = repeat(&mut g, 3.0)?;
    g.set_input(rx, px)?;
    let rz = g.duplicate(rx)?;
    g.set_input(rz, pz)?;

    let q = g.construct(&[rx, py, rz])?;
    let ball = sphere(&mut g, q, Vec3::ZERO, 0.7)?;
    let ground = floor(&mut g, p, -0.7)?;
    let d = g.binary(BinaryOp::Min, ball, ground)?;
    let out = g.output(d)?;
    Ok(Scene::new("repeat", g, out)
        .with_camera(Camera::look_at(Vec3::new(0.0, 3.0, -9.0), Vec3::ZERO)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sdflow_core::{CompiledSdf, Sdf};

    fn field(name: &str) -> CompiledSdf {
        let scene = build(name).unwrap();
        assert!(scene.graph.find_cycle(scene.output).is_empty());
        CompiledSdf::from_graph(&scene.graph, scene.output).unwrap()
    }

    #[test]
    fn every_demo_builds_into_a_distance_field() {
        for demo in DEMOS {
            let scene = demo.build().unwrap();
            assert_eq!(scene.name, demo.name);
            assert_eq!(scene.graph.output_type(scene.output), Some(NodeType::Float));
            CompiledSdf::from_graph(&scene.graph, scene.output).unwrap();
        }
    }

    #[test]
    fn sphere_demo_distances() {
        let sdf = field("sphere");
        assert_relative_eq!(sdf.distance(Vec3::ZERO), -1.0);
        assert_relative_eq!(sdf.distance(Vec3::new(0.0, 3.0, 0.0)), 2.0);
        assert_relative_eq!(sdf.distance(Vec3::new(5.0, -0.5, 0.0)), 0.5);
    }

    #[test]
    fn rounded_box_uses_both_composites() {
        let sdf = field("rounded-box");
        assert_relative_eq!(sdf.distance(Vec3::ZERO), -0.8, epsilon = 1e-6);
        assert_relative_eq!(sdf.distance(Vec3::new(0.0, 3.0, 0.0)), 2.2, epsilon = 1e-5);
    }

    #[test]
    fn repeat_demo_tiles_space() {
        let sdf = field("repeat");
        assert_relative_eq!(sdf.distance(Vec3::ZERO), -0.7, epsilon = 1e-6);
        assert_relative_eq!(sdf.distance(Vec3::new(3.0, 0.0, -6.0)), -0.7, epsilon = 1e-5);
    }

    #[test]
    fn unknown_names_are_errors() {
        assert!(matches!(build("teapot"), Err(SceneError::Unknown(_))));
        assert!(find("repeat").is_some());
    }
}
