//! Lowering node graphs into executable programs
//!
//! [`compile`] walks the graph from an output node and emits one instruction
//! per node. Composite nodes are inlined: their arguments are lowered first,
//! then the body is lowered in a fresh scope where the composite's
//! placeholders resolve to those arguments. Only body nodes that read a
//! placeholder are emitted again per expansion. Scalar operands of componentwise
//! vector operators are splatted at compile time, so the evaluator never
//! broadcasts.
//!
//! The graph must be acyclic; run [`find_cycle`](crate::cycle::find_cycle)
//! first. A cycle that slips through is reported as [`CompileError::Cycle`].
//!
//! ## Example
//!
//! ```rust
//! use sdflow_core::compile::compile;
//! use sdflow_core::graph::{BinaryOp, Graph};
//! use sdflow_core::{NodeType, Value};
//! use glam::Vec3;
//!
//! let mut graph = Graph::new();
//! let v = graph.constant(Vec3::new(1.0, 2.0, 3.0));
//! let s = graph.constant(10.0);
//! let add = graph.binary(BinaryOp::Add, v, s)?;
//! let out = graph.output(add)?;
//!
//! let program = compile(&graph, out, Some(NodeType::Float3))?;
//! assert_eq!(program.call(&[])?, Value::Float3(Vec3::new(11.0, 12.0, 13.0)));
//! # Ok::<(), sdflow_core::Error>(())
//! ```

mod program;

pub use program::{Evaluator, Instr, Op, Program, Reg};

use crate::error::CompileError;
use crate::graph::{Graph, Node, NodeId, Port};
use crate::value::NodeType;
use std::collections::{HashMap, HashSet};
use tracing::debug;

type Result<T> = std::result::Result<T, CompileError>;

/// Compile the graph rooted at `output` into a [`Program`]
///
/// When `expected` is given, the output's type must match it exactly.
pub fn compile(graph: &Graph, output: NodeId, expected: Option<NodeType>) -> Result<Program> {
    match graph.node(output) {
        Some(Node::Output { .. }) => {}
        Some(_) => return Err(CompileError::NotAnOutput { node: output }),
        None => return Err(CompileError::UnknownNode { node: output }),
    }

    let mut compiler = Compiler::new(graph);
    let reg = compiler.lower(output)?;
    let found = compiler.ty(reg);
    if let Some(expected) = expected
        && found != expected
    {
        return Err(CompileError::TypeMismatch {
            node: output,
            expected,
            found,
        });
    }

    debug!(
        output = %output,
        instructions = compiler.instrs.len(),
        params = compiler.params.len(),
        expansions = compiler.next_scope - 1,
        result = %found,
        "compiled graph"
    );
    Ok(Program::new(compiler.instrs, reg, compiler.params))
}

/// Placeholder bindings for one composite expansion
struct Scope {
    id: usize,
    composite: NodeId,
    bindings: Vec<(NodeId, Reg)>,
}

struct Compiler<'g> {
    graph: &'g Graph,
    instrs: Vec<Instr>,
    /// (scope, node) -> register holding the node's value
    memo: HashMap<(usize, NodeId), Reg>,
    /// Nodes whose operands are being lowered, per scope
    pending: HashSet<(usize, NodeId)>,
    /// Every composite placeholder in the graph
    placeholders: HashSet<NodeId>,
    /// Whether a node's value is the same in every scope
    unscoped: HashMap<NodeId, bool>,
    /// Registers loaded by `Op::Param`, by parameter index
    param_regs: HashMap<usize, Reg>,
    params: Vec<NodeType>,
    scopes: Vec<Scope>,
    next_scope: usize,
}

impl<'g> Compiler<'g> {
    fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            instrs: Vec::new(),
            memo: HashMap::new(),
            pending: HashSet::new(),
            placeholders: graph
                .ids()
                .filter_map(|id| graph.node(id))
                .flat_map(|n| n.placeholders().iter().copied())
                .collect(),
            unscoped: HashMap::new(),
            param_regs: HashMap::new(),
            params: Vec::new(),
            scopes: Vec::new(),
            next_scope: 1,
        }
    }

    fn scope(&self) -> usize {
        self.scopes.last().map_or(0, |s| s.id)
    }

    /// Memo key for `id` in the current scope
    ///
    /// Nodes that read no placeholder, directly or through a body, are keyed
    /// to the outermost scope so every expansion shares one register.
    fn key(&mut self, id: NodeId) -> (usize, NodeId) {
        if self.scopes.is_empty() || self.is_unscoped(id) {
            (0, id)
        } else {
            (self.scope(), id)
        }
    }

    fn is_unscoped(&mut self, root: NodeId) -> bool {
        let graph = self.graph;
        let mut entered = HashSet::new();
        let mut stack = vec![(root, false)];
        while let Some((id, ready)) = stack.pop() {
            if self.unscoped.contains_key(&id) {
                continue;
            }
            let Some(node) = graph.node(id) else {
                self.unscoped.insert(id, true);
                continue;
            };
            if ready {
                // Edges still unknown here close a cycle
                let free = !self.placeholders.contains(&id)
                    && node
                        .edges()
                        .all(|e| self.unscoped.get(&e).copied().unwrap_or(false));
                self.unscoped.insert(id, free);
            } else if entered.insert(id) {
                stack.push((id, true));
                stack.extend(node.edges().map(|e| (e, false)));
            }
        }
        self.unscoped.get(&root).copied().unwrap_or(false)
    }

    fn ty(&self, reg: Reg) -> NodeType {
        self.instrs
            .get(reg.index())
            .map_or(NodeType::None, |i| i.ty)
    }

    fn node(&self, id: NodeId) -> Result<&'g Node> {
        self.graph
            .node(id)
            .ok_or(CompileError::UnknownNode { node: id })
    }

    fn emit(&mut self, op: Op, ty: NodeType, source: NodeId) -> Reg {
        let reg = Reg(self.instrs.len() as u32);
        self.instrs.push(Instr { op, ty, source });
        reg
    }

    /// Register already holding `edge` in the current scope
    fn operand(&mut self, node: NodeId, edge: Option<NodeId>, port: Port) -> Result<Reg> {
        let source = edge.ok_or(CompileError::MissingInput { node, port })?;
        let key = self.key(source);
        self.memo
            .get(&key)
            .copied()
            .ok_or(CompileError::UnknownNode { node: source })
    }

    /// Lower `root` and everything it depends on in the current scope
    ///
    /// Operands are visited with an explicit stack; only composite expansion
    /// recurses.
    fn lower(&mut self, root: NodeId) -> Result<Reg> {
        let mut stack = vec![(root, false)];

        while let Some((id, ready)) = stack.pop() {
            let key = self.key(id);
            if self.memo.contains_key(&key) {
                continue;
            }
            if ready {
                let reg = self.lower_node(id)?;
                self.pending.remove(&key);
                self.memo.insert(key, reg);
                continue;
            }
            if !self.pending.insert(key) {
                return Err(CompileError::Cycle { node: id });
            }
            stack.push((id, true));
            stack.extend(operands(self.node(id)?).into_iter().rev().map(|n| (n, false)));
        }

        let key = self.key(root);
        self.memo
            .get(&key)
            .copied()
            .ok_or(CompileError::UnknownNode { node: root })
    }

    /// Emit the instructions for one node whose operands are already lowered
    fn lower_node(&mut self, id: NodeId) -> Result<Reg> {
        match self.node(id)? {
            Node::Constant(value) => Ok(self.emit(Op::Const(*value), value.ty(), id)),
            &Node::Input { index, ty } => self.lower_input(id, index, ty),
            Node::Output { input } => self.operand(id, *input, Port::Input),
            &Node::Unary { op, input } => {
                let arg = self.operand(id, input, Port::Input)?;
                let operand = self.ty(arg);
                let ty = op.result_type(operand);
                if !ty.is_concrete() {
                    return Err(CompileError::UnsupportedOperand {
                        node: id,
                        op: op.to_string(),
                        operands: operand.to_string(),
                    });
                }
                Ok(self.emit(Op::Unary(op, arg), ty, id))
            }
            &Node::Binary { op, lhs, rhs } => {
                let mut a = self.operand(id, lhs, Port::Lhs)?;
                let mut b = self.operand(id, rhs, Port::Rhs)?;
                let (ta, tb) = (self.ty(a), self.ty(b));
                let ty = op.result_type(ta, tb);
                if !ty.is_concrete() {
                    return Err(CompileError::UnsupportedOperand {
                        node: id,
                        op: op.to_string(),
                        operands: format!("{ta}, {tb}"),
                    });
                }
                if op.is_componentwise() && ta != tb {
                    if ta == NodeType::Float {
                        a = self.emit(Op::Splat(a), ty, id);
                    } else {
                        b = self.emit(Op::Splat(b), ty, id);
                    }
                }
                Ok(self.emit(Op::Binary(op, a, b), ty, id))
            }
            Node::Construct { slots } => {
                let mut args = [Reg(0); 4];
                for (slot, (dst, edge)) in args.iter_mut().zip(slots).enumerate() {
                    let source = edge.ok_or(CompileError::MissingSlot { node: id, slot })?;
                    *dst = self.operand(id, Some(source), Port::Slot(slot))?;
                    if self.ty(*dst) != NodeType::Float {
                        return Err(CompileError::UnsupportedOperand {
                            node: id,
                            op: "construct".into(),
                            operands: format!("{} in slot {slot}", self.ty(*dst)),
                        });
                    }
                }
                let ty = NodeType::with_dim(slots.len()).ok_or(CompileError::UnsupportedOperand {
                    node: id,
                    op: "construct".into(),
                    operands: format!("{} slots", slots.len()),
                })?;
                Ok(self.emit(
                    Op::Construct {
                        args,
                        len: slots.len(),
                    },
                    ty,
                    id,
                ))
            }
            Node::CompositeUnary { input, body, param } => {
                let args = [(*param, *input)];
                self.expand(id, *body, &args)
            }
            Node::CompositeBinary {
                lhs,
                rhs,
                body,
                params,
            } => {
                let args = [(params[0], *lhs), (params[1], *rhs)];
                self.expand(id, *body, &args)
            }
        }
    }

    fn lower_input(&mut self, id: NodeId, index: usize, ty: NodeType) -> Result<Reg> {
        // Placeholders resolve to the innermost expansion that binds them
        let bound = self.scopes.iter().rev().find_map(|s| {
            s.bindings
                .iter()
                .find(|(p, _)| *p == id)
                .map(|&(_, reg)| reg)
        });
        if let Some(reg) = bound {
            return Ok(reg);
        }

        if !ty.is_concrete() {
            return Err(CompileError::Unresolved { node: id, ty });
        }
        if self.params.len() <= index {
            self.params.resize(index + 1, NodeType::None);
        }
        match self.params[index] {
            NodeType::None => self.params[index] = ty,
            declared if declared != ty => {
                return Err(CompileError::ParameterConflict {
                    node: id,
                    index,
                    expected: declared,
                    found: ty,
                });
            }
            _ => {}
        }
        if let Some(&reg) = self.param_regs.get(&index) {
            return Ok(reg);
        }
        let reg = self.emit(Op::Param(index), ty, id);
        self.param_regs.insert(index, reg);
        Ok(reg)
    }

    /// Inline a composite body with its placeholders bound to `args`
    fn expand(
        &mut self,
        composite: NodeId,
        body: Option<NodeId>,
        args: &[(NodeId, Option<NodeId>)],
    ) -> Result<Reg> {
        let body = body.ok_or(CompileError::MissingBody { node: composite })?;
        if self.scopes.iter().any(|s| s.composite == composite) {
            return Err(CompileError::Cycle { node: composite });
        }

        let mut bindings = Vec::with_capacity(args.len());
        for (index, &(placeholder, edge)) in args.iter().enumerate() {
            let source = edge.ok_or(CompileError::MissingArgument {
                node: composite,
                index,
            })?;
            let port = if args.len() == 1 {
                Port::Input
            } else if index == 0 {
                Port::Lhs
            } else {
                Port::Rhs
            };
            bindings.push((placeholder, self.operand(composite, Some(source), port)?));
        }

        let id = self.next_scope;
        self.next_scope += 1;
        self.scopes.push(Scope {
            id,
            composite,
            bindings,
        });
        let result = self.lower(body);
        self.scopes.pop();
        result
    }
}

/// Nodes that must be lowered before `node`, in port order
///
/// Composite bodies are excluded; they are lowered in their own scope.
fn operands(node: &Node) -> Vec<NodeId> {
    match node {
        Node::CompositeUnary { input, .. } => input.iter().copied().collect(),
        Node::CompositeBinary { lhs, rhs, .. } => lhs.iter().chain(rhs).copied().collect(),
        other => other.edges().collect(),
    }
}
