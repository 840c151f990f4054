//! Integration tests for the engine: demo scenes through validation,
//! compilation and rendering

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sdflow_core::{Node, UnaryOp, Value};
use sdflow_engine::{Engine, NodeId, PreviewError, RenderRequest, scenes};
use sdflow_render::pixels::to_rgba8;

fn small(workers: usize) -> RenderRequest {
    RenderRequest {
        workers,
        ..RenderRequest::new(48, 36)
    }
}

/// Nodes of the current scene matching `pred`
fn find_nodes(engine: &Engine, pred: impl Fn(&Node) -> bool) -> Vec<NodeId> {
    let graph = &engine.scene().unwrap().graph;
    graph
        .ids()
        .filter(|&id| graph.node(id).is_some_and(&pred))
        .collect()
}

#[test]
fn test_every_demo_renders_something() {
    for demo in scenes::DEMOS {
        let mut engine = Engine::new();
        engine.load_demo(demo.name).unwrap();
        let request = small(2);
        let image = engine.render(&request).unwrap();
        assert_eq!(image.width(), 48);
        assert_eq!(image.height(), 36);

        let sky = to_rgba8(request.settings.environment.sky_color);
        let surface = image
            .as_bytes()
            .chunks_exact(4)
            .filter(|px| px.iter().zip(sky).any(|(&a, b)| a.abs_diff(b) > 4))
            .count();
        assert!(surface > 0, "demo '{}' rendered only sky", demo.name);
    }
}

#[test]
fn test_render_is_independent_of_worker_count() {
    let mut engine = Engine::new();
    engine.load_demo("rounded-box").unwrap();
    let one = engine.render(&small(1)).unwrap();
    let three = engine.render(&small(3)).unwrap();
    let again = engine.render(&small(3)).unwrap();
    assert_eq!(one.as_bytes(), three.as_bytes());
    assert_eq!(three.as_bytes(), again.as_bytes());
}

#[test]
fn test_check_disassembles_demo() {
    let mut engine = Engine::new();
    engine.load_demo("repeat").unwrap();
    let program = engine.check().unwrap();
    let listing = program.to_string();
    assert!(listing.lines().last().unwrap().starts_with("return r"));
    assert_eq!(listing.lines().count(), program.len() + 1);
}

#[test]
fn test_edit_and_preview_again() {
    let mut engine = Engine::new();
    engine.load_demo("sphere").unwrap();
    engine.start_preview(small(2)).unwrap();
    let first = engine.preview_mut().wait().unwrap();
    assert_eq!(engine.preview().generation(), 1);

    // Grow the sphere
    let radius = find_nodes(&engine, |n| *n == Node::Constant(Value::Float(1.0)));
    assert_eq!(radius.len(), 1);
    let scene = engine.scene_mut().unwrap();
    scene.graph.set_constant(radius[0], Value::Float(1.5)).unwrap();

    engine.start_preview(small(2)).unwrap();
    let second = engine.preview_mut().wait().unwrap();
    assert_eq!(engine.preview().generation(), 2);
    assert_ne!(first.as_bytes(), second.as_bytes());
}

#[test]
fn test_cycle_keeps_previous_image() {
    let mut engine = Engine::new();
    engine.load_demo("sphere").unwrap();
    engine.start_preview(small(2)).unwrap();
    let before = engine.preview_mut().wait().unwrap();

    // Feed the union back into the sphere's length node
    let length = find_nodes(&engine, |n| {
        matches!(
            n,
            Node::Unary {
                op: UnaryOp::Length,
                ..
            }
        )
    })[0];
    let scene = engine.scene_mut().unwrap();
    let Some(Node::Output { input: Some(union) }) = scene.graph.node(scene.output).cloned() else {
        panic!("output is wired");
    };
    scene.graph.set_input(length, union).unwrap();

    let err = engine.start_preview(small(2)).unwrap_err();
    let preview_err = err.downcast_ref::<PreviewError>().unwrap();
    assert!(matches!(preview_err, PreviewError::Cycle(_)));
    let flagged = preview_err.offending_nodes();
    assert!(flagged.contains(&length));
    assert!(flagged.contains(&union));
    assert_eq!(engine.preview().offending_nodes(), flagged.as_slice());

    let after = engine.preview_mut().wait().unwrap();
    assert_eq!(before.as_bytes(), after.as_bytes());
    assert_eq!(engine.preview().generation(), 1);
}

#[test]
fn test_compile_error_names_one_node() {
    let mut engine = Engine::new();
    engine.load_demo("rounded-box").unwrap();
    let abs = find_nodes(&engine, |n| {
        matches!(
            n,
            Node::Unary {
                op: UnaryOp::Abs,
                ..
            }
        )
    })[0];
    // Normalizing a scalar is a type error
    let scene = engine.scene_mut().unwrap();
    scene.graph.set_unary_op(abs, UnaryOp::Normalize).unwrap();
    let scalar = scene.graph.constant(2.0);
    scene.graph.set_input(abs, scalar).unwrap();

    let err = engine.check().unwrap_err();
    let preview_err = err.downcast_ref::<PreviewError>().unwrap();
    assert_eq!(preview_err.offending_nodes(), vec![abs]);
}
