//! Live preview sessions
//!
//! A [`Preview`] turns graph edits into images. Each request validates the
//! graph (cycle check, then compile) and renders on a background thread.
//! At most one render is in flight: a new request cancels and joins the
//! previous one before starting. When validation fails nothing is rendered,
//! the last good image stays available and the offending nodes are recorded
//! for the editor to highlight.

use parking_lot::Mutex;
use sdflow_core::{CompileError, CompiledSdf, Graph, NodeId, find_cycle};
use sdflow_render::{CancelToken, PixelBuffer, ProgressSink, RenderRequest, Renderer};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a preview could not be started
#[derive(Error, Debug)]
pub enum PreviewError {
    /// The graph contains a cycle through these nodes
    #[error("Graph contains a cycle through {} nodes", .0.len())]
    Cycle(Vec<NodeId>),

    /// Lowering failed at one node
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The output compiled but is not a `(float3) -> float` function
    #[error("Output {node} is not a distance field: {message}")]
    Signature { node: NodeId, message: String },

    /// The render thread could not be started
    #[error("Failed to start render thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl PreviewError {
    /// Nodes an editor should flag for this error
    pub fn offending_nodes(&self) -> Vec<NodeId> {
        match self {
            Self::Cycle(nodes) => nodes.clone(),
            Self::Compile(e) => vec![e.node()],
            Self::Signature { node, .. } => vec![*node],
            Self::Spawn(_) => Vec::new(),
        }
    }
}

/// Validate and compile the graph rooted at `output` as a distance field
pub fn prepare(graph: &Graph, output: NodeId) -> Result<CompiledSdf, PreviewError> {
    let nodes: Vec<NodeId> = graph.ids().collect();
    let cycle = find_cycle(graph, output, &nodes);
    if !cycle.is_empty() {
        return Err(PreviewError::Cycle(cycle));
    }

    let program = sdflow_core::compile(graph, output, Some(sdflow_core::NodeType::Float))?;
    debug!(instructions = program.len(), "preview program compiled");
    CompiledSdf::new(program).map_err(|e| match e {
        sdflow_core::Error::Compile(c) => PreviewError::Compile(c),
        other => PreviewError::Signature {
            node: output,
            message: other.to_string(),
        },
    })
}

/// State shared between the session and its render thread
#[derive(Debug, Default)]
struct Shared {
    image: Option<Arc<PixelBuffer>>,
    /// Fraction of the in-flight render completed
    progress: f32,
    /// Completed renders, used to tell fresh images from old ones
    generation: u64,
}

struct Job {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

/// A live preview session
#[derive(Default)]
pub struct Preview {
    shared: Arc<Mutex<Shared>>,
    job: Option<Job>,
    offending: Vec<NodeId>,
}

impl Preview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `graph` and start rendering it in the background
    ///
    /// Any render already in flight is cancelled and joined first. On error
    /// the previous image is kept and [`Preview::offending_nodes`] reports
    /// the nodes at fault.
    pub fn request(
        &mut self,
        graph: &Graph,
        output: NodeId,
        request: RenderRequest,
    ) -> Result<(), PreviewError> {
        self.cancel();

        let sdf = match prepare(graph, output) {
            Ok(sdf) => sdf,
            Err(e) => {
                warn!(error = %e, nodes = ?e.offending_nodes(), "preview rejected");
                self.offending = e.offending_nodes();
                return Err(e);
            }
        };
        self.offending.clear();
        self.shared.lock().progress = 0.0;

        let cancel = CancelToken::new();
        let token = cancel.clone();
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("sdflow-preview".into())
            .spawn(move || render_job(&sdf, &request, &token, &shared))?;

        self.job = Some(Job { cancel, handle });
        Ok(())
    }

    /// Cancel the in-flight render, if any, and wait for it to stop
    pub fn cancel(&mut self) {
        if let Some(job) = self.job.take() {
            job.cancel.cancel();
            join(job.handle);
        }
    }

    /// Wait for the in-flight render to finish and return the latest image
    pub fn wait(&mut self) -> Option<Arc<PixelBuffer>> {
        if let Some(job) = self.job.take() {
            join(job.handle);
        }
        self.image()
    }

    /// Whether a render is still running
    pub fn is_rendering(&self) -> bool {
        self.job.as_ref().is_some_and(|j| !j.handle.is_finished())
    }

    /// Most recent completed image
    pub fn image(&self) -> Option<Arc<PixelBuffer>> {
        self.shared.lock().image.clone()
    }

    /// Completion of the current render in `[0, 1]`
    pub fn progress(&self) -> f32 {
        self.shared.lock().progress
    }

    /// Number of renders that have completed in this session
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Nodes flagged by the last rejected request; empty after a success
    pub fn offending_nodes(&self) -> &[NodeId] {
        &self.offending
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn render_job(
    sdf: &CompiledSdf,
    request: &RenderRequest,
    cancel: &CancelToken,
    shared: &Arc<Mutex<Shared>>,
) {
    let sink_state = Arc::clone(shared);
    let sink = ProgressSink::new(move |p| sink_state.lock().progress = p.fraction());

    if let Some(image) = Renderer::render(sdf, request, cancel, Some(&sink)) {
        let mut state = shared.lock();
        state.image = Some(Arc::new(image));
        state.progress = 1.0;
        state.generation += 1;
        info!(generation = state.generation, "preview image ready");
    }
}

fn join(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("preview render thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdflow_core::{BinaryOp, NodeType, UnaryOp};

    fn sphere(graph: &mut Graph) -> (NodeId, NodeId) {
        let p = graph.input(0, NodeType::Float3);
        let len = graph.unary(UnaryOp::Length, p).unwrap();
        let r = graph.constant(1.0);
        let d = graph.binary(BinaryOp::Sub, len, r).unwrap();
        (d, graph.output(d).unwrap())
    }

    fn tiny() -> RenderRequest {
        RenderRequest {
            workers: 2,
            ..RenderRequest::new(16, 12)
        }
    }

    #[test]
    fn successful_request_produces_an_image() {
        let mut graph = Graph::new();
        let (_, out) = sphere(&mut graph);
        let mut preview = Preview::new();
        preview.request(&graph, out, tiny()).unwrap();
        let image = preview.wait().unwrap();
        assert_eq!(image.width(), 16);
        assert_eq!(preview.generation(), 1);
        assert_eq!(preview.progress(), 1.0);
        assert!(preview.offending_nodes().is_empty());
    }

    #[test]
    fn compile_errors_keep_the_previous_image() {
        let mut graph = Graph::new();
        let (d, out) = sphere(&mut graph);
        let mut preview = Preview::new();
        preview.request(&graph, out, tiny()).unwrap();
        let before = preview.wait().unwrap();

        // Break the graph: cross product of scalars
        let cross = graph.binary(BinaryOp::Cross, d, d).unwrap();
        graph.set_input(out, cross).unwrap();
        let err = preview.request(&graph, out, tiny()).unwrap_err();
        assert_eq!(err.offending_nodes(), vec![cross]);
        assert_eq!(preview.offending_nodes(), &[cross]);

        let after = preview.wait().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(preview.generation(), 1);
    }

    #[test]
    fn cycles_are_rejected_before_compiling() {
        let mut graph = Graph::new();
        let (d, out) = sphere(&mut graph);
        let abs = graph.unary(UnaryOp::Abs, d).unwrap();
        let neg = graph.unary(UnaryOp::Negate, abs).unwrap();
        graph.set_input(abs, neg).unwrap();
        graph.set_input(out, neg).unwrap();

        let mut preview = Preview::new();
        let err = preview.request(&graph, out, tiny()).unwrap_err();
        let mut nodes = err.offending_nodes();
        nodes.sort();
        assert_eq!(nodes, vec![abs, neg]);
        assert!(preview.image().is_none());
    }

    #[test]
    fn wrong_signature_flags_the_output() {
        let mut graph = Graph::new();
        let p = graph.input(0, NodeType::Float2);
        let len = graph.unary(UnaryOp::Length, p).unwrap();
        let out = graph.output(len).unwrap();
        let err = prepare(&graph, out).unwrap_err();
        assert!(matches!(err, PreviewError::Signature { .. }));
        assert_eq!(err.offending_nodes(), vec![out]);
    }

    #[test]
    fn new_request_replaces_the_running_one() {
        let mut graph = Graph::new();
        let (_, out) = sphere(&mut graph);
        let mut preview = Preview::new();
        let big = RenderRequest {
            workers: 1,
            ..RenderRequest::new(400, 300)
        };
        preview.request(&graph, out, big).unwrap();
        preview.request(&graph, out, tiny()).unwrap();
        let image = preview.wait().unwrap();
        assert_eq!(image.width(), 16);
        assert!(!preview.is_rendering());
    }
}
