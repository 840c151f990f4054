//! Node variants and their edges

use super::ops::{BinaryOp, UnaryOp};
use crate::value::{NodeType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node in a [`Graph`](super::Graph) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position of this node in the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named input port on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    /// The single input of unary, output and composite-unary nodes
    Input,
    /// Left operand of binary nodes
    Lhs,
    /// Right operand of binary nodes
    Rhs,
    /// Indexed slot of a vector constructor
    Slot(usize),
    /// Body of a composite node
    Body,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Lhs => f.write_str("lhs"),
            Self::Rhs => f.write_str("rhs"),
            Self::Slot(i) => write!(f, "slot {i}"),
            Self::Body => f.write_str("body"),
        }
    }
}

/// A node in the dataflow graph
///
/// Edges point from a consumer to the node producing its input. Composite
/// nodes own their placeholder [`Node::Input`] nodes; the body is an
/// [`Node::Output`] of a subgraph built from those placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Constant(Value),
    Unary {
        op: UnaryOp,
        input: Option<NodeId>,
    },
    Binary {
        op: BinaryOp,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
    },
    /// Build a `Float2`..`Float4` from scalar slots
    Construct {
        slots: Vec<Option<NodeId>>,
    },
    /// Positional parameter, or a composite placeholder
    Input {
        index: usize,
        ty: NodeType,
    },
    /// Compile root
    Output {
        input: Option<NodeId>,
    },
    CompositeUnary {
        input: Option<NodeId>,
        body: Option<NodeId>,
        param: NodeId,
    },
    CompositeBinary {
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
        body: Option<NodeId>,
        params: [NodeId; 2],
    },
}

impl Node {
    /// Short name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Unary { .. } => "unary",
            Self::Binary { .. } => "binary",
            Self::Construct { .. } => "construct",
            Self::Input { .. } => "input",
            Self::Output { .. } => "output",
            Self::CompositeUnary { .. } => "composite-unary",
            Self::CompositeBinary { .. } => "composite-binary",
        }
    }

    /// Every wired upstream node, including composite bodies
    pub fn edges(&self) -> Edges<'_> {
        match self {
            Self::Constant(_) | Self::Input { .. } => Edges::Fixed([None; 3].into_iter()),
            Self::Unary { input, .. } | Self::Output { input } => {
                Edges::Fixed([*input, None, None].into_iter())
            }
            Self::Binary { lhs, rhs, .. } => Edges::Fixed([*lhs, *rhs, None].into_iter()),
            Self::Construct { slots } => Edges::Slots(slots.iter()),
            Self::CompositeUnary { input, body, .. } => {
                Edges::Fixed([*input, *body, None].into_iter())
            }
            Self::CompositeBinary { lhs, rhs, body, .. } => {
                Edges::Fixed([*lhs, *rhs, *body].into_iter())
            }
        }
    }

    /// Ports that may be wired on this node
    pub fn ports(&self) -> Vec<Port> {
        match self {
            Self::Constant(_) | Self::Input { .. } => vec![],
            Self::Unary { .. } | Self::Output { .. } => vec![Port::Input],
            Self::Binary { .. } => vec![Port::Lhs, Port::Rhs],
            Self::Construct { slots } => (0..slots.len()).map(Port::Slot).collect(),
            Self::CompositeUnary { .. } => vec![Port::Input, Port::Body],
            Self::CompositeBinary { .. } => vec![Port::Lhs, Port::Rhs, Port::Body],
        }
    }

    /// Mutable access to the edge behind `port`, if this node has that port
    pub(crate) fn port_mut(&mut self, port: Port) -> Option<&mut Option<NodeId>> {
        match (self, port) {
            (
                Self::Unary { input, .. }
                | Self::Output { input }
                | Self::CompositeUnary { input, .. },
                Port::Input,
            )
            | (
                Self::Binary { lhs: input, .. } | Self::CompositeBinary { lhs: input, .. },
                Port::Lhs,
            )
            | (
                Self::Binary { rhs: input, .. } | Self::CompositeBinary { rhs: input, .. },
                Port::Rhs,
            )
            | (
                Self::CompositeUnary { body: input, .. }
                | Self::CompositeBinary { body: input, .. },
                Port::Body,
            ) => Some(input),
            (Self::Construct { slots }, Port::Slot(i)) => slots.get_mut(i),
            _ => None,
        }
    }

    /// The current edge behind `port`, or `None` if this node lacks the port
    pub fn port(&self, port: Port) -> Option<Option<NodeId>> {
        match (self, port) {
            (
                Self::Unary { input, .. }
                | Self::Output { input }
                | Self::CompositeUnary { input, .. },
                Port::Input,
            )
            | (
                Self::Binary { lhs: input, .. } | Self::CompositeBinary { lhs: input, .. },
                Port::Lhs,
            )
            | (
                Self::Binary { rhs: input, .. } | Self::CompositeBinary { rhs: input, .. },
                Port::Rhs,
            )
            | (
                Self::CompositeUnary { body: input, .. }
                | Self::CompositeBinary { body: input, .. },
                Port::Body,
            ) => Some(*input),
            (Self::Construct { slots }, Port::Slot(i)) => slots.get(i).copied(),
            _ => None,
        }
    }

    /// Placeholder inputs owned by a composite node
    pub fn placeholders(&self) -> &[NodeId] {
        match self {
            Self::CompositeUnary { param, .. } => std::slice::from_ref(param),
            Self::CompositeBinary { params, .. } => params,
            _ => &[],
        }
    }
}

/// Iterator over the wired edges of a [`Node`]
pub enum Edges<'a> {
    Fixed(std::array::IntoIter<Option<NodeId>, 3>),
    Slots(std::slice::Iter<'a, Option<NodeId>>),
}

impl Iterator for Edges<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        match self {
            Self::Fixed(it) => it.find_map(|e| e),
            Self::Slots(it) => it.find_map(|e| *e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_skip_unwired_ports() {
        let node = Node::Binary {
            op: BinaryOp::Add,
            lhs: None,
            rhs: Some(NodeId(4)),
        };
        assert_eq!(node.edges().collect::<Vec<_>>(), vec![NodeId(4)]);

        let node = Node::Construct {
            slots: vec![Some(NodeId(1)), None, Some(NodeId(2))],
        };
        assert_eq!(node.edges().collect::<Vec<_>>(), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn composite_edges_include_body() {
        let node = Node::CompositeUnary {
            input: Some(NodeId(0)),
            body: Some(NodeId(3)),
            param: NodeId(1),
        };
        assert_eq!(node.edges().collect::<Vec<_>>(), vec![NodeId(0), NodeId(3)]);
        assert_eq!(node.placeholders(), &[NodeId(1)]);
    }

    #[test]
    fn ports_are_kind_specific() {
        let mut node = Node::Unary {
            op: UnaryOp::Abs,
            input: None,
        };
        assert!(node.port_mut(Port::Lhs).is_none());
        if let Some(edge) = node.port_mut(Port::Input) {
            *edge = Some(NodeId(7));
        }
        assert_eq!(node.port(Port::Input), Some(Some(NodeId(7))));
    }
}
