//! Scene representation for the sdflow engine
//!
//! A Scene is a node graph with a designated output plus the camera it is
//! meant to be viewed from. It is the complete renderable state handed to the
//! preview or to a one-shot render.

use sdflow_core::{Graph, NodeId};
use sdflow_render::Camera;
use thiserror::Error;

/// Errors that can occur when working with scenes
#[derive(Error, Debug)]
pub enum SceneError {
    /// No scene is currently loaded
    #[error("No scene loaded")]
    NoScene,

    /// No demo scene has this name
    #[error("Unknown scene '{0}'")]
    Unknown(String),

    /// Building the scene graph failed
    #[error("Failed to build scene: {0}")]
    Build(#[from] sdflow_core::Error),
}

/// A graph ready to render
#[derive(Debug, Clone)]
pub struct Scene {
    pub name: String,

    /// The distance field graph
    pub graph: Graph,

    /// Output node the distance field is read from
    pub output: NodeId,

    /// Suggested viewpoint
    pub camera: Camera,
}

impl Scene {
    /// Create a scene viewed from the default camera
    pub fn new(name: impl Into<String>, graph: Graph, output: NodeId) -> Self {
        Self {
            name: name.into(),
            graph,
            output,
            camera: Camera::default(),
        }
    }

    /// Replace the suggested camera
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }
}
