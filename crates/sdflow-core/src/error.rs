//! Error types for sdflow

use crate::graph::{NodeId, Port};
use crate::value::NodeType;
use thiserror::Error;

/// Result type alias using sdflow's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from graph editing and program invocation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The id does not refer to a live node
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    /// The node has no such input port
    #[error("Node {node} has no {port} port")]
    NoSuchPort { node: NodeId, port: Port },

    /// The operation needs a different kind of node
    #[error("Node {node} is a {found} node, expected {expected}")]
    WrongKind {
        node: NodeId,
        expected: &'static str,
        found: &'static str,
    },

    /// Vector constructors take between 2 and 4 slots
    #[error("Vector constructor with {0} slots (expected 2 to 4)")]
    ConstructorArity(usize),

    /// Wrong number of arguments passed to a compiled program
    #[error("Expected {expected} arguments, got {found}")]
    Arity { expected: usize, found: usize },

    /// An argument has the wrong type
    #[error("Argument {index} should be {expected}, got {found}")]
    ArgumentType {
        index: usize,
        expected: NodeType,
        found: NodeType,
    },

    /// The program cannot be used as a distance field
    #[error("Distance fields take (float3) and return float, program is ({params}) -> {result}")]
    NotADistanceField { params: String, result: NodeType },

    /// Lowering failed
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A node that could not be lowered
///
/// Every variant names exactly one offending node so an editor can flag it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// The compile root is not a live node
    #[error("Unknown node {node}")]
    UnknownNode { node: NodeId },

    /// The compile root is not an output node
    #[error("Node {node} is not an output node")]
    NotAnOutput { node: NodeId },

    /// A required input or operand is not wired
    #[error("Node {node} is missing its {port} input")]
    MissingInput { node: NodeId, port: Port },

    /// The operator does not accept these operand types
    #[error("Node {node}: {op} does not accept {operands}")]
    UnsupportedOperand {
        node: NodeId,
        op: String,
        operands: String,
    },

    /// A composite has no body attached
    #[error("Composite node {node} has no body")]
    MissingBody { node: NodeId },

    /// A composite argument is not wired
    #[error("Composite node {node} is missing argument {index}")]
    MissingArgument { node: NodeId, index: usize },

    /// A vector constructor slot is not wired
    #[error("Constructor {node} is missing slot {slot}")]
    MissingSlot { node: NodeId, slot: usize },

    /// A parameter's declared type is not concrete
    #[error("Node {node} has unresolved type {ty}")]
    Unresolved { node: NodeId, ty: NodeType },

    /// Two parameter nodes share an index but not a type
    #[error("Parameter {index} at node {node} is {found}, but was already declared {expected}")]
    ParameterConflict {
        node: NodeId,
        index: usize,
        expected: NodeType,
        found: NodeType,
    },

    /// The output type differs from what the caller required
    #[error("Output {node} produces {found}, expected {expected}")]
    TypeMismatch {
        node: NodeId,
        expected: NodeType,
        found: NodeType,
    },

    /// Lowering reached a node that is still being lowered
    #[error("Node {node} depends on itself")]
    Cycle { node: NodeId },
}

impl CompileError {
    /// The node responsible for this error
    pub fn node(&self) -> NodeId {
        match self {
            Self::UnknownNode { node }
            | Self::NotAnOutput { node }
            | Self::MissingInput { node, .. }
            | Self::UnsupportedOperand { node, .. }
            | Self::MissingBody { node }
            | Self::MissingArgument { node, .. }
            | Self::MissingSlot { node, .. }
            | Self::Unresolved { node, .. }
            | Self::ParameterConflict { node, .. }
            | Self::TypeMismatch { node, .. }
            | Self::Cycle { node } => *node,
        }
    }
}
