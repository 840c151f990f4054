//! Node graph arena with reactive type propagation
//!
//! Nodes live in a [`Graph`] and refer to each other by [`NodeId`]. Every
//! node keeps the list of nodes consuming it; wiring an edge moves the
//! consumer between dependent lists and re-types everything downstream before
//! returning, so [`Graph::output_type`] is always consistent.
//!
//! ## Example
//!
//! ```rust
//! use sdflow_core::graph::{BinaryOp, Graph};
//! use sdflow_core::{NodeType, Value};
//! use glam::Vec3;
//!
//! let mut graph = Graph::new();
//! let v = graph.constant(Vec3::new(1.0, 2.0, 3.0));
//! let s = graph.constant(10.0);
//! let add = graph.binary(BinaryOp::Add, v, s)?;
//! assert_eq!(graph.output_type(add), Some(NodeType::Float3));
//!
//! // Re-typing a source updates every consumer immediately
//! graph.set_constant(s, Value::Float2(glam::Vec2::ONE))?;
//! assert_eq!(graph.output_type(add), Some(NodeType::Invalid));
//! # Ok::<(), sdflow_core::Error>(())
//! ```

pub mod node;
pub mod ops;

pub use node::{Edges, Node, NodeId, Port};
pub use ops::{BinaryOp, UnaryOp, construct_type};

use crate::value::{NodeType, Value};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{trace, warn};

/// Recomputations allowed per live node during one propagation.
///
/// Acyclic graphs settle in far fewer steps; the limit only matters when an
/// editor has wired a cycle that the cycle detector has not rejected yet.
const PROPAGATION_BUDGET_PER_NODE: usize = 16;

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    ty: NodeType,
    /// Consumers of this node, one entry per wired edge
    dependents: Vec<NodeId>,
}

/// Arena of nodes with derived output types
#[derive(Debug, Clone, Default)]
pub struct Graph {
    entries: Vec<Option<Entry>>,
    live: usize,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of arena slots, including removed nodes
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Check whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_ok()
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.entry(id).ok().map(|e| &e.node)
    }

    /// The derived output type of a node
    pub fn output_type(&self, id: NodeId) -> Option<NodeType> {
        self.entry(id).ok().map(|e| e.ty)
    }

    /// Nodes consuming `id`, once per wired edge
    pub fn dependents(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map_or(&[], |e| e.dependents.as_slice())
    }

    /// Iterate over live node ids in creation order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    fn entry(&self, id: NodeId) -> Result<&Entry> {
        self.entries
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownNode(id))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut Entry> {
        self.entries
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownNode(id))
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Insert a node, subscribing it to every wired source
    pub fn add(&mut self, node: Node) -> Result<NodeId> {
        for source in node.edges() {
            self.entry(source)?;
        }
        for &p in node.placeholders() {
            match self.node(p) {
                Some(Node::Input { .. }) => {}
                Some(other) => {
                    return Err(Error::WrongKind {
                        node: p,
                        expected: "input",
                        found: other.kind(),
                    });
                }
                None => return Err(Error::UnknownNode(p)),
            }
        }
        if let Node::Construct { slots } = &node
            && !(2..=4).contains(&slots.len())
        {
            return Err(Error::ConstructorArity(slots.len()));
        }

        let sources: Vec<NodeId> = node.edges().collect();
        let id = self.push(node);
        for source in sources {
            self.entry_mut(source)?.dependents.push(id);
        }
        self.propagate([id]);
        Ok(id)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.entries.len() as u32);
        self.entries.push(Some(Entry {
            node,
            ty: NodeType::None,
            dependents: Vec::new(),
        }));
        self.live += 1;
        id
    }

    /// Add a literal
    pub fn constant(&mut self, value: impl Into<Value>) -> NodeId {
        let id = self.push(Node::Constant(value.into()));
        self.propagate([id]);
        id
    }

    /// Add a positional parameter of the compiled function
    pub fn input(&mut self, index: usize, ty: NodeType) -> NodeId {
        let id = self.push(Node::Input { index, ty });
        self.propagate([id]);
        id
    }

    pub fn unary(&mut self, op: UnaryOp, input: NodeId) -> Result<NodeId> {
        self.add(Node::Unary {
            op,
            input: Some(input),
        })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.add(Node::Binary {
            op,
            lhs: Some(lhs),
            rhs: Some(rhs),
        })
    }

    /// Add a vector constructor with every slot wired
    pub fn construct(&mut self, slots: &[NodeId]) -> Result<NodeId> {
        self.add(Node::Construct {
            slots: slots.iter().copied().map(Some).collect(),
        })
    }

    /// Add a compile root
    pub fn output(&mut self, input: NodeId) -> Result<NodeId> {
        self.add(Node::Output { input: Some(input) })
    }

    /// Add a single-argument composite with its placeholder input
    ///
    /// Build the body from [`Graph::placeholder`] and attach it with
    /// [`Graph::set_body`].
    pub fn composite_unary(&mut self) -> NodeId {
        let param = self.input(0, NodeType::None);
        let id = self.push(Node::CompositeUnary {
            input: None,
            body: None,
            param,
        });
        self.propagate([id]);
        id
    }

    /// Add a two-argument composite with its placeholder inputs
    pub fn composite_binary(&mut self) -> NodeId {
        let params = [self.input(0, NodeType::None), self.input(1, NodeType::None)];
        let id = self.push(Node::CompositeBinary {
            lhs: None,
            rhs: None,
            body: None,
            params,
        });
        self.propagate([id]);
        id
    }

    /// The placeholder standing in for argument `index` inside a composite body
    pub fn placeholder(&self, composite: NodeId, index: usize) -> Result<NodeId> {
        let node = &self.entry(composite)?.node;
        match node {
            Node::CompositeUnary { .. } | Node::CompositeBinary { .. } => node
                .placeholders()
                .get(index)
                .copied()
                .ok_or(Error::NoSuchPort {
                    node: composite,
                    port: Port::Slot(index),
                }),
            other => Err(Error::WrongKind {
                node: composite,
                expected: "composite",
                found: other.kind(),
            }),
        }
    }

    /// Shallow copy of a node
    ///
    /// Edges are copied as references, so the upstream graph is shared rather
    /// than cloned. A copied composite gets its own placeholders and its own
    /// copy of every body node that reads them; body nodes independent of the
    /// placeholders stay shared.
    pub fn duplicate(&mut self, id: NodeId) -> Result<NodeId> {
        let node = self.entry(id)?.node.clone();
        if node.placeholders().is_empty() {
            self.add(node)
        } else {
            self.copy_composite(node, &HashMap::new())
        }
    }

    /// Add a copy of a composite with fresh placeholders
    ///
    /// Argument edges are remapped through `outer`.
    fn copy_composite(
        &mut self,
        mut node: Node,
        outer: &HashMap<NodeId, NodeId>,
    ) -> Result<NodeId> {
        let fresh: Vec<NodeId> = (0..node.placeholders().len())
            .map(|index| self.input(index, NodeType::None))
            .collect();
        let mut map = outer.clone();
        map.extend(node.placeholders().iter().copied().zip(fresh.iter().copied()));

        let body = match node.port(Port::Body).flatten() {
            Some(body) => Some(self.copy_body(body, &mut map)?),
            None => None,
        };
        for port in node.ports() {
            if port != Port::Body {
                remap(&mut node, port, outer);
            }
        }
        if let Some(edge) = node.port_mut(Port::Body) {
            *edge = body;
        }
        match &mut node {
            Node::CompositeUnary { param, .. } => *param = fresh[0],
            Node::CompositeBinary { params, .. } => params.copy_from_slice(&fresh),
            _ => {}
        }
        self.add(node)
    }

    /// Copy the nodes under `root` that read any key of `map`
    ///
    /// Copies are recorded in `map`; the id standing in for `root` is returned.
    fn copy_body(&mut self, root: NodeId, map: &mut HashMap<NodeId, NodeId>) -> Result<NodeId> {
        let mut reads = HashSet::new();
        for id in self.post_order(root, true) {
            let node = &self.entry(id)?.node;
            if map.contains_key(&id) || node.edges().any(|e| reads.contains(&e)) {
                reads.insert(id);
            }
        }

        for id in self.post_order(root, false) {
            if map.contains_key(&id) || !reads.contains(&id) {
                continue;
            }
            let mut node = self.entry(id)?.node.clone();
            let copy = if node.placeholders().is_empty() {
                for port in node.ports() {
                    remap(&mut node, port, map);
                }
                self.add(node)?
            } else {
                self.copy_composite(node, map)?
            };
            map.insert(id, copy);
        }
        Ok(map.get(&root).copied().unwrap_or(root))
    }

    /// Remove a node, unwiring every consumer edge that pointed at it
    ///
    /// Placeholders owned only by a removed composite are removed with it.
    pub fn remove(&mut self, id: NodeId) -> Result<Node> {
        let entry = self
            .entries
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(Error::UnknownNode(id))?;
        self.live -= 1;

        for source in entry.node.edges() {
            self.unsubscribe(source, id);
        }

        let mut consumers = entry.dependents;
        consumers.sort_unstable();
        consumers.dedup();
        for &consumer in &consumers {
            if let Ok(c) = self.entry_mut(consumer) {
                for port in c.node.ports() {
                    if let Some(edge) = c.node.port_mut(port)
                        && *edge == Some(id)
                    {
                        *edge = None;
                    }
                }
            }
        }
        self.propagate(consumers);

        for &p in entry.node.placeholders() {
            let shared = self
                .entries
                .iter()
                .flatten()
                .any(|e| e.node.placeholders().contains(&p));
            if !shared && self.contains(p) {
                self.remove(p)?;
            }
        }
        Ok(entry.node)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Rewire one input port, or clear it with `None`
    pub fn set_edge(&mut self, node: NodeId, port: Port, source: Option<NodeId>) -> Result<()> {
        if let Some(s) = source {
            self.entry(s)?;
        }
        let edge = self
            .entry_mut(node)?
            .node
            .port_mut(port)
            .ok_or(Error::NoSuchPort { node, port })?;
        let previous = std::mem::replace(edge, source);

        if let Some(prev) = previous {
            self.unsubscribe(prev, node);
        }
        if let Some(s) = source {
            self.entry_mut(s)?.dependents.push(node);
        }
        self.propagate([node]);
        Ok(())
    }

    pub fn set_input(&mut self, node: NodeId, source: NodeId) -> Result<()> {
        self.set_edge(node, Port::Input, Some(source))
    }

    pub fn set_lhs(&mut self, node: NodeId, source: NodeId) -> Result<()> {
        self.set_edge(node, Port::Lhs, Some(source))
    }

    pub fn set_rhs(&mut self, node: NodeId, source: NodeId) -> Result<()> {
        self.set_edge(node, Port::Rhs, Some(source))
    }

    pub fn set_slot(&mut self, node: NodeId, slot: usize, source: NodeId) -> Result<()> {
        self.set_edge(node, Port::Slot(slot), Some(source))
    }

    pub fn set_body(&mut self, composite: NodeId, body: NodeId) -> Result<()> {
        self.set_edge(composite, Port::Body, Some(body))
    }

    /// Clear an input port
    pub fn disconnect(&mut self, node: NodeId, port: Port) -> Result<()> {
        self.set_edge(node, port, None)
    }

    /// Replace the literal of a constant node
    pub fn set_constant(&mut self, id: NodeId, value: Value) -> Result<()> {
        match &mut self.entry_mut(id)?.node {
            Node::Constant(v) => *v = value,
            other => return Err(wrong_kind(id, "constant", other)),
        }
        self.propagate([id]);
        Ok(())
    }

    /// Change the operator of a unary node
    pub fn set_unary_op(&mut self, id: NodeId, new_op: UnaryOp) -> Result<()> {
        match &mut self.entry_mut(id)?.node {
            Node::Unary { op, .. } => *op = new_op,
            other => return Err(wrong_kind(id, "unary", other)),
        }
        self.propagate([id]);
        Ok(())
    }

    /// Change the operator of a binary node
    pub fn set_binary_op(&mut self, id: NodeId, new_op: BinaryOp) -> Result<()> {
        match &mut self.entry_mut(id)?.node {
            Node::Binary { op, .. } => *op = new_op,
            other => return Err(wrong_kind(id, "binary", other)),
        }
        self.propagate([id]);
        Ok(())
    }

    /// Change the declared type of a parameter
    pub fn set_input_type(&mut self, id: NodeId, new_ty: NodeType) -> Result<()> {
        match &mut self.entry_mut(id)?.node {
            Node::Input { ty, .. } => *ty = new_ty,
            other => return Err(wrong_kind(id, "input", other)),
        }
        self.propagate([id]);
        Ok(())
    }

    fn unsubscribe(&mut self, source: NodeId, consumer: NodeId) {
        if let Ok(entry) = self.entry_mut(source)
            && let Some(pos) = entry.dependents.iter().position(|&d| d == consumer)
        {
            entry.dependents.remove(pos);
        }
    }

    // ========================================================================
    // Type propagation
    // ========================================================================

    fn edge_type(&self, edge: Option<NodeId>) -> NodeType {
        edge.and_then(|e| self.output_type(e))
            .unwrap_or(NodeType::None)
    }

    /// Compute a node's type from its operation and its inputs' current types
    fn infer(&self, node: &Node) -> NodeType {
        match node {
            Node::Constant(v) => v.ty(),
            Node::Unary { op, input } => op.result_type(self.edge_type(*input)),
            Node::Binary { op, lhs, rhs } => {
                op.result_type(self.edge_type(*lhs), self.edge_type(*rhs))
            }
            Node::Construct { slots } => {
                let types: Vec<NodeType> = slots.iter().map(|s| self.edge_type(*s)).collect();
                construct_type(&types)
            }
            Node::Input { ty, .. } => *ty,
            Node::Output { input } => self.edge_type(*input),
            Node::CompositeUnary { body, .. } | Node::CompositeBinary { body, .. } => {
                match self.edge_type(*body) {
                    NodeType::None => NodeType::Indeterminate,
                    t => t,
                }
            }
        }
    }

    /// Placeholder types a composite should publish into its body
    fn placeholder_types(&self, node: &Node) -> Vec<(NodeId, NodeType)> {
        match node {
            Node::CompositeUnary { input, param, .. } => {
                vec![(*param, self.edge_type(*input))]
            }
            Node::CompositeBinary {
                lhs, rhs, params, ..
            } => vec![
                (params[0], self.edge_type(*lhs)),
                (params[1], self.edge_type(*rhs)),
            ],
            _ => vec![],
        }
    }

    /// Recompute types starting from `seeds`, republishing to dependents
    /// whenever a node's type changes
    fn propagate(&mut self, seeds: impl IntoIterator<Item = NodeId>) {
        let mut queue: VecDeque<NodeId> = seeds.into_iter().collect();
        let budget = PROPAGATION_BUDGET_PER_NODE * (self.live + 1);
        let mut steps = 0;

        while let Some(id) = queue.pop_front() {
            steps += 1;
            if steps > budget {
                warn!(
                    node = %id,
                    pending = queue.len(),
                    "type propagation did not settle; graph likely contains a cycle"
                );
                break;
            }
            let Ok(entry) = self.entry(id) else {
                continue;
            };

            for (param, ty) in self.placeholder_types(&entry.node) {
                if let Ok(p) = self.entry_mut(param)
                    && let Node::Input { ty: current, .. } = &mut p.node
                    && *current != ty
                {
                    *current = ty;
                    queue.push_back(param);
                }
            }

            let Ok(entry) = self.entry(id) else {
                continue;
            };
            let ty = self.infer(&entry.node);
            if ty != entry.ty {
                trace!(node = %id, from = %entry.ty, to = %ty, "retyped");
                queue.extend(entry.dependents.iter().copied());
                if let Ok(entry) = self.entry_mut(id) {
                    entry.ty = ty;
                }
            }
        }
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Nodes reachable from `root`, each after everything it reads
    ///
    /// With `bodies` false, composite bodies are not entered. Edges closing a
    /// cycle are skipped.
    fn post_order(&self, root: NodeId, bodies: bool) -> Vec<NodeId> {
        let mut entered = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, ready)) = stack.pop() {
            if ready {
                out.push(id);
                continue;
            }
            let Some(node) = self.node(id) else {
                continue;
            };
            if !entered.insert(id) {
                continue;
            }
            stack.push((id, true));
            let body = if bodies {
                None
            } else {
                node.port(Port::Body).flatten()
            };
            stack.extend(
                node.edges()
                    .filter(|&e| Some(e) != body && !entered.contains(&e))
                    .map(|e| (e, false)),
            );
        }
        out
    }

    /// Every node reachable from `root` through edges, `root` included
    pub fn reachable(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = vec![false; self.capacity()];
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            out.push(id);
            stack.extend(node.edges());
        }
        out
    }
}

/// Point the edge behind `port` at its replacement in `map`, if any
fn remap(node: &mut Node, port: Port, map: &HashMap<NodeId, NodeId>) {
    if let Some(edge) = node.port_mut(port)
        && let Some(to) = (*edge).and_then(|e| map.get(&e))
    {
        *edge = Some(*to);
    }
}

fn wrong_kind(node: NodeId, expected: &'static str, found: &Node) -> Error {
    Error::WrongKind {
        node,
        expected,
        found: found.kind(),
    }
}
