//! Compiled programs
//!
//! A [`Program`] is a flat tape in single-assignment form: instruction `i`
//! writes register `i` and only reads registers written before it. Shared
//! graph nodes occupy one register, so each is evaluated once per call.

use crate::graph::{BinaryOp, NodeId, UnaryOp};
use crate::value::{NodeType, Value};
use crate::{Error, Result};
use std::fmt;

/// Register holding the result of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(pub(crate) u32);

impl Reg {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Operation performed by an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Load a positional argument
    Param(usize),
    Const(Value),
    /// Replicate a scalar register to the instruction's vector type
    Splat(Reg),
    Unary(UnaryOp, Reg),
    Binary(BinaryOp, Reg, Reg),
    /// Assemble a vector from `len` scalar registers
    Construct { args: [Reg; 4], len: usize },
}

/// One step of a [`Program`]
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: Op,
    /// Concrete result type
    pub ty: NodeType,
    /// Graph node this instruction was lowered from
    pub source: NodeId,
}

/// An executable function lowered from a node graph
#[derive(Debug, Clone)]
pub struct Program {
    instrs: Vec<Instr>,
    output: Reg,
    result: NodeType,
    params: Vec<NodeType>,
}

impl Program {
    pub(crate) fn new(instrs: Vec<Instr>, output: Reg, params: Vec<NodeType>) -> Self {
        let result = instrs
            .get(output.index())
            .map_or(NodeType::None, |i| i.ty);
        Self {
            instrs,
            output,
            result,
            params,
        }
    }

    /// Type of the value returned by [`Program::call`]
    pub fn result_type(&self) -> NodeType {
        self.result
    }

    /// Parameter types by index
    ///
    /// Indices that no input node uses are [`NodeType::None`] and accept any
    /// argument.
    pub fn params(&self) -> &[NodeType] {
        &self.params
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Number of instructions emitted on behalf of `node`
    pub fn instructions_for(&self, node: NodeId) -> usize {
        self.instrs.iter().filter(|i| i.source == node).count()
    }

    /// Check that `args` match the parameter list
    pub fn check_args(&self, args: &[Value]) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(Error::Arity {
                expected: self.params.len(),
                found: args.len(),
            });
        }
        for (index, (arg, &expected)) in args.iter().zip(&self.params).enumerate() {
            if expected != NodeType::None && arg.ty() != expected {
                return Err(Error::ArgumentType {
                    index,
                    expected,
                    found: arg.ty(),
                });
            }
        }
        Ok(())
    }

    /// Validate the arguments and evaluate once
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.check_args(args)?;
        Ok(self.evaluator().eval(args))
    }

    /// Build a reusable evaluator for repeated calls
    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator {
            program: self,
            regs: Vec::with_capacity(self.instrs.len()),
        }
    }

    /// Evaluate using a caller-provided register file
    ///
    /// Arguments are not validated; missing ones read as NaN.
    pub fn eval_with(&self, regs: &mut Vec<Value>, args: &[Value]) -> Value {
        regs.clear();
        for instr in &self.instrs {
            let value = match &instr.op {
                Op::Param(i) => args.get(*i).copied().unwrap_or(Value::nan(instr.ty)),
                Op::Const(v) => *v,
                Op::Splat(r) => {
                    Value::splat(regs[r.index()].as_float().unwrap_or(f32::NAN), instr.ty)
                }
                Op::Unary(op, r) => op.apply(regs[r.index()]),
                Op::Binary(op, a, b) => op.apply(regs[a.index()], regs[b.index()]),
                Op::Construct { args, len } => {
                    let mut c = [f32::NAN; 4];
                    for (dst, r) in c.iter_mut().zip(&args[..*len]) {
                        *dst = regs[r.index()].as_float().unwrap_or(f32::NAN);
                    }
                    Value::from_components(&c[..*len]).unwrap_or(Value::nan(instr.ty))
                }
            };
            regs.push(value);
        }
        regs.get(self.output.index())
            .copied()
            .unwrap_or(Value::nan(self.result))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instr) in self.instrs.iter().enumerate() {
            write!(f, "r{i} = ")?;
            match &instr.op {
                Op::Param(p) => write!(f, "param {p}")?,
                Op::Const(v) => write!(f, "const {v}")?,
                Op::Splat(r) => write!(f, "splat {r}")?,
                Op::Unary(op, r) => write!(f, "{op} {r}")?,
                Op::Binary(op, a, b) => write!(f, "{op} {a} {b}")?,
                Op::Construct { args, len } => {
                    f.write_str("construct")?;
                    for r in &args[..*len] {
                        write!(f, " {r}")?;
                    }
                }
            }
            writeln!(f, " : {} ({})", instr.ty, instr.source)?;
        }
        write!(f, "return {}", self.output)
    }
}

/// Register file bound to a [`Program`] for repeated evaluation
pub struct Evaluator<'a> {
    program: &'a Program,
    regs: Vec<Value>,
}

impl Evaluator<'_> {
    /// Evaluate without argument validation
    pub fn eval(&mut self, args: &[Value]) -> Value {
        self.program.eval_with(&mut self.regs, args)
    }
}
