//! sdflow Engine - validation, compilation and rendering of node graphs
//!
//! The Engine is a thin orchestration layer over sdflow-core and
//! sdflow-render. It owns the current [`Scene`], runs the cycle check and
//! compiler on demand, and drives either a one-shot render or a live
//! [`Preview`] session.
//!
//! ## Example
//!
//! ```rust
//! use sdflow_engine::{Engine, RenderRequest};
//!
//! let mut engine = Engine::new();
//! engine.load_demo("sphere")?;
//!
//! // Validate and inspect the compiled program
//! let program = engine.check()?;
//! assert!(program.len() > 0);
//!
//! // Render synchronously
//! let image = engine.render(&RenderRequest::new(32, 24))?;
//! assert_eq!(image.width(), 32);
//! # Ok::<(), anyhow::Error>(())
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod preview;
pub mod scene;
pub mod scenes;

use anyhow::Result;
use sdflow_core::{Program, Sdf};
use std::time::Instant;
use tracing::{debug, info};

// Re-export commonly used types from dependencies
pub use sdflow_core::{CompileError, CompiledSdf, Graph, NodeId};
pub use sdflow_render::{
    Camera, CancelToken, PixelBuffer, PixelFormat, ProgressSink, RenderRequest, RenderSettings,
    Renderer,
};

// Re-export our own types
pub use preview::{Preview, PreviewError, prepare};
pub use scene::{Scene, SceneError};

/// The main sdflow engine
///
/// Provides a unified interface for:
/// - Scene access (graph, output and camera)
/// - Graph validation and compilation
/// - One-shot and live preview rendering
#[derive(Default)]
pub struct Engine {
    /// The currently loaded scene
    current_scene: Option<Scene>,

    /// Live preview session for the current scene
    preview: Preview,
}

impl Engine {
    /// Create a new engine instance
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Scene Access
    // ========================================================================

    /// Replace the current scene
    pub fn set_scene(&mut self, scene: Scene) -> &Scene {
        info!(scene = %scene.name, nodes = scene.graph.len(), "scene loaded");
        self.current_scene.insert(scene)
    }

    /// Load one of the built-in demo scenes
    pub fn load_demo(&mut self, name: &str) -> Result<&Scene> {
        let scene = scenes::build(name)?;
        Ok(self.set_scene(scene))
    }

    /// Get the currently loaded scene (if any)
    pub fn scene(&self) -> Option<&Scene> {
        self.current_scene.as_ref()
    }

    /// Get a mutable reference to the current scene
    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.current_scene.as_mut()
    }

    /// Check if a scene is currently loaded
    pub fn has_scene(&self) -> bool {
        self.current_scene.is_some()
    }

    /// Clear the current scene and stop any preview render
    pub fn clear_scene(&mut self) {
        self.preview.cancel();
        self.current_scene = None;
    }

    fn require_scene(&self) -> Result<&Scene> {
        Ok(self.current_scene.as_ref().ok_or(SceneError::NoScene)?)
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate the current scene and return its compiled program
    ///
    /// Failures carry a [`PreviewError`], whose offending nodes can be read
    /// back with `downcast_ref`.
    pub fn check(&self) -> Result<Program> {
        let scene = self.require_scene()?;
        let sdf = prepare(&scene.graph, scene.output)?;
        Ok(sdf.program().clone())
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the current scene and wait for the image
    ///
    /// The request's camera is replaced by the scene's suggested camera.
    pub fn render(&self, request: &RenderRequest) -> Result<PixelBuffer> {
        let scene = self.require_scene()?;
        let request = RenderRequest {
            camera: scene.camera.clone(),
            ..request.clone()
        };
        self.render_with(&prepare(&scene.graph, scene.output)?, &request, None)
    }

    /// Render any distance field exactly as requested
    pub fn render_with(
        &self,
        sdf: &dyn Sdf,
        request: &RenderRequest,
        progress: Option<&ProgressSink>,
    ) -> Result<PixelBuffer> {
        let start = Instant::now();
        let image = Renderer::render(sdf, request, &CancelToken::new(), progress)
            .ok_or_else(|| anyhow::anyhow!("Render was cancelled"))?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "render complete");
        Ok(image)
    }

    /// Start a background preview of the current scene
    ///
    /// Any preview render already running is cancelled first.
    pub fn start_preview(&mut self, request: RenderRequest) -> Result<()> {
        let scene = self
            .current_scene
            .as_ref()
            .ok_or(SceneError::NoScene)?;
        let request = RenderRequest {
            camera: scene.camera.clone(),
            ..request
        };
        self.preview.request(&scene.graph, scene.output, request)?;
        Ok(())
    }

    /// The live preview session
    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut Preview {
        &mut self.preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdflow_core::{BinaryOp, Port};

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new();
        assert!(!engine.has_scene());
        assert!(engine.scene().is_none());
        assert!(engine.check().is_err());
    }

    #[test]
    fn test_load_demo() {
        let mut engine = Engine::new();
        engine.load_demo("sphere").unwrap();
        assert!(engine.has_scene());
        assert!(engine.load_demo("nope").is_err());
        // A failed load keeps the previous scene
        assert_eq!(engine.scene().unwrap().name, "sphere");
    }

    #[test]
    fn test_check_reports_offending_node() {
        let mut engine = Engine::new();
        engine.load_demo("sphere").unwrap();
        let scene = engine.scene_mut().unwrap();
        let out = scene.output;
        let Some(sdflow_core::Node::Output { input: Some(min) }) = scene.graph.node(out).cloned()
        else {
            panic!("demo output is wired");
        };
        assert!(matches!(
            scene.graph.node(min),
            Some(sdflow_core::Node::Binary {
                op: BinaryOp::Min,
                ..
            })
        ));
        scene.graph.disconnect(min, Port::Lhs).unwrap();

        let err = engine.check().unwrap_err();
        let preview = err.downcast_ref::<PreviewError>().unwrap();
        assert_eq!(preview.offending_nodes(), vec![min]);
    }

    #[test]
    fn test_clear_scene() {
        let mut engine = Engine::new();
        engine.load_demo("repeat").unwrap();
        engine.clear_scene();
        assert!(!engine.has_scene());
    }
}
