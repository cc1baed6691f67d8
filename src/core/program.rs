//! Linear program form: the output side of the lowering.
//!
//! One [`InstProgram`] holds the flat micro-op list produced for a single
//! instruction, plus the bookkeeping the acceptance filter and the table
//! emitter need. Micro-ops only ever reference values defined by earlier
//! micro-ops, so a consumer can execute a program in one forward pass.

use std::fmt;

use super::facts::{OpcodeId, OperandKindId, RegId};
use super::model::{PredicateId, SelectorId};
use super::tree::ValueType;

/// First cell value reserved for builtin micro-opcodes. Target operator ids
/// pack below this, builtins at and above it.
pub const BUILTIN_OPCODE_BASE: u16 = 0xff00;

/// Operation of one micro-op.
///
/// The builtin variants cover operand access, value movement, and control of
/// the interpreting consumer; `Node` carries a semantic operator straight
/// from the target catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOpcode {
    /// Read a register-class operand; operand: declared slot.
    ReadRegClass,
    /// Read an immediate operand; operand: declared slot.
    ReadImmediate,
    /// Read a custom operand; operands: kind, declared slot.
    ReadCustomOperand,
    /// Materialize a pooled constant; operand: position in the pool array.
    LoadConstant,
    /// Read a specific register; operand: register.
    ReadReg,
    /// Write a value to a register-class operand; operands: slot, value.
    WriteRegClass,
    /// Write a value to a specific register; operands: register, value.
    WriteReg,
    /// Invoke an opaque selection function; operands: selector, then inputs.
    CallSelector,
    /// Predicate-guarded operation; operands: predicate, then inputs.
    Guarded,
    /// Side-destination record appended after the program body.
    Implicit,
    /// Terminator; doubles as the padding cell between programs.
    EndOfProgram,
    /// Semantic operator from the target catalog; operands: inputs.
    Node(OpcodeId),
}

impl MicroOpcode {
    /// Cell value in the packed table.
    pub fn code(self) -> u16 {
        match self {
            MicroOpcode::ReadRegClass => BUILTIN_OPCODE_BASE,
            MicroOpcode::ReadImmediate => BUILTIN_OPCODE_BASE + 1,
            MicroOpcode::ReadCustomOperand => BUILTIN_OPCODE_BASE + 2,
            MicroOpcode::LoadConstant => BUILTIN_OPCODE_BASE + 3,
            MicroOpcode::ReadReg => BUILTIN_OPCODE_BASE + 4,
            MicroOpcode::WriteRegClass => BUILTIN_OPCODE_BASE + 5,
            MicroOpcode::WriteReg => BUILTIN_OPCODE_BASE + 6,
            MicroOpcode::CallSelector => BUILTIN_OPCODE_BASE + 7,
            MicroOpcode::Guarded => BUILTIN_OPCODE_BASE + 8,
            MicroOpcode::Implicit => BUILTIN_OPCODE_BASE + 9,
            MicroOpcode::EndOfProgram => u16::MAX,
            MicroOpcode::Node(op) => {
                debug_assert!(
                    op.0 < u32::from(BUILTIN_OPCODE_BASE),
                    "operator id {} collides with builtin opcodes",
                    op.0
                );
                op.0 as u16
            }
        }
    }

    /// Inverse of [`code`](Self::code); `None` for unassigned builtin cells.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            c if c < BUILTIN_OPCODE_BASE => MicroOpcode::Node(OpcodeId(c.into())),
            c if c == BUILTIN_OPCODE_BASE => MicroOpcode::ReadRegClass,
            c if c == BUILTIN_OPCODE_BASE + 1 => MicroOpcode::ReadImmediate,
            c if c == BUILTIN_OPCODE_BASE + 2 => MicroOpcode::ReadCustomOperand,
            c if c == BUILTIN_OPCODE_BASE + 3 => MicroOpcode::LoadConstant,
            c if c == BUILTIN_OPCODE_BASE + 4 => MicroOpcode::ReadReg,
            c if c == BUILTIN_OPCODE_BASE + 5 => MicroOpcode::WriteRegClass,
            c if c == BUILTIN_OPCODE_BASE + 6 => MicroOpcode::WriteReg,
            c if c == BUILTIN_OPCODE_BASE + 7 => MicroOpcode::CallSelector,
            c if c == BUILTIN_OPCODE_BASE + 8 => MicroOpcode::Guarded,
            c if c == BUILTIN_OPCODE_BASE + 9 => MicroOpcode::Implicit,
            u16::MAX => MicroOpcode::EndOfProgram,
            _ => return None,
        })
    }
}

impl fmt::Display for MicroOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MicroOpcode::ReadRegClass => f.write_str("read_rc"),
            MicroOpcode::ReadImmediate => f.write_str("read_imm"),
            MicroOpcode::ReadCustomOperand => f.write_str("read_custom"),
            MicroOpcode::LoadConstant => f.write_str("load_const"),
            MicroOpcode::ReadReg => f.write_str("read_reg"),
            MicroOpcode::WriteRegClass => f.write_str("write_rc"),
            MicroOpcode::WriteReg => f.write_str("write_reg"),
            MicroOpcode::CallSelector => f.write_str("call_selector"),
            MicroOpcode::Guarded => f.write_str("guarded"),
            MicroOpcode::Implicit => f.write_str("implicit"),
            MicroOpcode::EndOfProgram => f.write_str("end"),
            MicroOpcode::Node(op) => write!(f, "op#{}", op.0),
        }
    }
}

/// One operand cell of a micro-op. Every variant packs into a single `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOperand {
    /// Plain number: an operand slot or a constant-pool position.
    Literal(u16),
    /// Value defined by an earlier micro-op of the same program.
    Value(u16),
    Reg(RegId),
    Kind(OperandKindId),
    Selector(SelectorId),
    Predicate(PredicateId),
}

impl MicroOperand {
    pub fn pack(self) -> u16 {
        let id = match self {
            MicroOperand::Literal(v) | MicroOperand::Value(v) => return v,
            MicroOperand::Reg(r) => r.0,
            MicroOperand::Kind(k) => k.0,
            MicroOperand::Selector(s) => s.0,
            MicroOperand::Predicate(p) => p.0,
        };
        debug_assert!(
            id <= u32::from(u16::MAX),
            "id {id} does not fit an operand cell"
        );
        id as u16
    }
}

impl fmt::Display for MicroOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MicroOperand::Literal(v) => write!(f, "{v}"),
            MicroOperand::Value(v) => write!(f, "v{v}"),
            MicroOperand::Reg(r) => write!(f, "reg{}", r.0),
            MicroOperand::Kind(k) => write!(f, "kind{}", k.0),
            MicroOperand::Selector(s) => write!(f, "sel{}", s.0),
            MicroOperand::Predicate(p) => write!(f, "pred{}", p.0),
        }
    }
}

/// One micro-op: opcode, result types, operand cells.
///
/// `results` keeps void entries so the packed type list matches the tree the
/// op came from; void results do not receive def numbers.
#[derive(Debug, Clone)]
pub struct MicroOp {
    pub opcode: MicroOpcode,
    pub results: Vec<ValueType>,
    pub operands: Vec<MicroOperand>,
}

impl MicroOp {
    /// Packed count cell: result count in the high byte, operand count in
    /// the low byte.
    pub fn header(&self) -> u16 {
        debug_assert!(self.results.len() <= 0xff, "too many results");
        debug_assert!(self.operands.len() <= 0xff, "too many operands");
        ((self.results.len() as u16) << 8) | self.operands.len() as u16
    }

    /// Cells this op occupies in the packed table.
    pub fn packed_len(&self) -> usize {
        2 + self.results.len() + self.operands.len()
    }
}

/// A defined value: its program-wide number and its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSlot {
    pub def: u16,
    pub ty: ValueType,
}

/// Flat lowering of one instruction.
#[derive(Debug, Default)]
pub struct InstProgram {
    pub ops: Vec<MicroOp>,
    /// Registers written by `WriteReg` micro-ops, in program order.
    pub explicit_defs: Vec<RegId>,
    /// Side-destinations: declared ones first, then those discovered as
    /// register destinations beyond the root's result count.
    pub implicit_defs: Vec<RegId>,
    /// Index of the last micro-op that defined a value.
    pub last_def_op: Option<usize>,
    /// First def number of that micro-op.
    pub last_def_no: Option<u16>,
    /// True when a subtree called an opaque external function or produced
    /// an opaque-typed value.
    pub has_opaque_call: bool,
    /// True when a subtree went through an opaque selection function.
    pub has_selector: bool,
}

impl InstProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: MicroOp) -> usize {
        let index = self.ops.len();
        self.ops.push(op);
        index
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }
}

impl fmt::Display for InstProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut def = 0u16;
        for (index, op) in self.ops.iter().enumerate() {
            write!(f, "{index:3}: ")?;
            let mut lead = true;
            for ty in &op.results {
                if ty.is_void() {
                    continue;
                }
                if !lead {
                    write!(f, ", ")?;
                }
                write!(f, "v{def}:{ty}")?;
                def += 1;
                lead = false;
            }
            if !lead {
                write!(f, " = ")?;
            }
            write!(f, "{}", op.opcode)?;
            for (pos, operand) in op.operands.iter().enumerate() {
                if pos == 0 {
                    write!(f, " ")?;
                } else {
                    write!(f, ", ")?;
                }
                write!(f, "{operand}")?;
            }
            writeln!(f)?;
        }
        for reg in &self.implicit_defs {
            writeln!(f, "     implicit reg{}", reg.0)?;
        }
        Ok(())
    }
}
