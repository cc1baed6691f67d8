//! Core data model shared by the lowering pipeline.
//!
//! Split by lifecycle: `facts` is the immutable target description, `tree`
//! the arena-backed input form, `model` the state one run accumulates,
//! `program` the linear output form, and `error` the failure channel.

pub mod error;
pub mod facts;
pub mod model;
pub mod program;
pub mod tree;

pub use error::{SemaError, SemaResult};

pub use facts::{
    InstId, InstInfo, OpcodeId, OpcodeInfo, OperandInfo, OperandKind, OperandKindId, RegClassId,
    RegClassInfo, RegId, RegisterBank, SemaAdaptor, TargetFacts,
};

pub use model::{ConstantPool, NameRegistry, PredicateId, SelectorId, TargetModel};

pub use program::{
    InstProgram, MicroOp, MicroOpcode, MicroOperand, ValueSlot, BUILTIN_OPCODE_BASE,
};

pub use tree::{LeafValue, SemanticTree, TreeArena, TreeOperator, TreeRef, ValueType};
