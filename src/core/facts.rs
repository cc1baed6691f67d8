//! Static description of the target: registers, register classes, the
//! semantic operator catalog, declared operand kinds, and operator
//! equivalences.
//!
//! Everything here is produced by a description provider before lowering
//! starts and is read-only afterwards. The [`SemaAdaptor`] trait is the
//! boundary between a provider and the rest of the crate: the engine and the
//! table emitter only ever see a provider through it, so descriptions can
//! come from hand-built fixtures or from a parsed target description without
//! either side knowing the difference.

use std::fmt;

use super::tree::{TreeRef, ValueType};

/// Index of an instruction in the provider's instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(pub u32);

/// Index into the semantic operator catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeId(pub u32);

/// Index of a register in the register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegId(pub u32);

/// Index of a register class in the register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegClassId(pub u32);

/// Index into the declared operand-kind catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandKindId(pub u32);

/// One entry of the semantic operator catalog.
#[derive(Debug, Clone)]
pub struct OpcodeInfo {
    pub name: String,
    /// Number of values the operator produces.
    pub results: u16,
}

/// One register class: a named subset of the bank with a common value type.
#[derive(Debug, Clone)]
pub struct RegClassInfo {
    pub name: String,
    pub members: Vec<RegId>,
    /// Type of a value held in this class, emitted into the class-type table.
    pub ty: ValueType,
}

/// Registers and register classes of the target.
#[derive(Debug, Default)]
pub struct RegisterBank {
    regs: Vec<String>,
    classes: Vec<RegClassInfo>,
}

impl RegisterBank {
    pub fn add_reg(&mut self, name: &str) -> RegId {
        let id = RegId(self.regs.len() as u32);
        self.regs.push(name.to_string());
        id
    }

    pub fn add_class(&mut self, name: &str, ty: ValueType, members: &[RegId]) -> RegClassId {
        let id = RegClassId(self.classes.len() as u32);
        self.classes.push(RegClassInfo {
            name: name.to_string(),
            members: members.to_vec(),
            ty,
        });
        id
    }

    pub fn reg_name(&self, reg: RegId) -> &str {
        &self.regs[reg.0 as usize]
    }

    pub fn class(&self, class: RegClassId) -> &RegClassInfo {
        &self.classes[class.0 as usize]
    }

    pub fn num_regs(&self) -> u32 {
        self.regs.len() as u32
    }

    pub fn classes(&self) -> impl Iterator<Item = &RegClassInfo> {
        self.classes.iter()
    }
}

/// How one declared instruction operand is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Value lives in a register of this class.
    RegClass(RegClassId),
    /// Immediate encoded in the instruction word.
    Immediate,
    /// Target-specific operand decoded by custom code.
    Custom(OperandKindId),
}

/// One declared operand of an instruction.
#[derive(Debug, Clone)]
pub struct OperandInfo {
    pub name: String,
    /// Position in the decoded instruction's flat operand list.
    pub slot: u16,
    pub kind: OperandKind,
}

/// Declared shape of one instruction.
#[derive(Debug, Clone, Default)]
pub struct InstInfo {
    pub name: String,
    pub operands: Vec<OperandInfo>,
    /// Side-destinations declared on the instruction itself.
    pub implicit_defs: Vec<RegId>,
}

impl InstInfo {
    /// Operand lookup by declared name. Operand lists are a handful of
    /// entries, so a scan beats carrying a map per instruction.
    pub fn operand(&self, name: &str) -> Option<&OperandInfo> {
        self.operands.iter().find(|op| op.name == name)
    }
}

/// Immutable facts about the target shared by every lowering.
#[derive(Debug)]
pub struct TargetFacts {
    pub name: String,
    bank: RegisterBank,
    opcodes: Vec<OpcodeInfo>,
    operand_kinds: Vec<String>,
    equivalences: Vec<(OpcodeId, OpcodeId)>,
}

impl TargetFacts {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bank: RegisterBank::default(),
            opcodes: Vec::new(),
            operand_kinds: Vec::new(),
            equivalences: Vec::new(),
        }
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut RegisterBank {
        &mut self.bank
    }

    /// Register a semantic operator producing `results` values.
    pub fn add_opcode(&mut self, name: &str, results: u16) -> OpcodeId {
        debug_assert!(
            self.lookup_opcode(name).is_none(),
            "duplicate operator {name}"
        );
        let id = OpcodeId(self.opcodes.len() as u32);
        self.opcodes.push(OpcodeInfo {
            name: name.to_string(),
            results,
        });
        id
    }

    pub fn opcode(&self, id: OpcodeId) -> &OpcodeInfo {
        &self.opcodes[id.0 as usize]
    }

    pub fn lookup_opcode(&self, name: &str) -> Option<OpcodeId> {
        self.opcodes
            .iter()
            .position(|op| op.name == name)
            .map(|idx| OpcodeId(idx as u32))
    }

    pub fn num_opcodes(&self) -> u32 {
        self.opcodes.len() as u32
    }

    pub fn opcodes(&self) -> impl Iterator<Item = &OpcodeInfo> {
        self.opcodes.iter()
    }

    /// Register a custom operand kind by name.
    pub fn add_operand_kind(&mut self, name: &str) -> OperandKindId {
        let id = OperandKindId(self.operand_kinds.len() as u32);
        self.operand_kinds.push(name.to_string());
        id
    }

    pub fn operand_kind_name(&self, id: OperandKindId) -> &str {
        &self.operand_kinds[id.0 as usize]
    }

    pub fn operand_kinds(&self) -> impl Iterator<Item = &str> {
        self.operand_kinds.iter().map(String::as_str)
    }

    /// Declare that `from` lowers as `to`, discarding trailing results.
    pub fn add_equivalence(&mut self, from: OpcodeId, to: OpcodeId) {
        self.equivalences.push((from, to));
    }

    pub fn equivalences(&self) -> &[(OpcodeId, OpcodeId)] {
        &self.equivalences
    }
}

impl fmt::Display for TargetFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} regs, {} opcodes, {} operand kinds",
            self.name,
            self.bank.num_regs(),
            self.opcodes.len(),
            self.operand_kinds.len()
        )
    }
}

/// Boundary between a target description provider and the lowering pipeline.
///
/// `'t` is the lifetime of the provider's tree storage; semantic trees handed
/// out by [`semantics`](Self::semantics) stay borrowed from it.
pub trait SemaAdaptor<'t> {
    /// Target facts shared by all instructions.
    fn facts(&self) -> &TargetFacts;

    /// Number of instructions; ids `0..inst_count()` are valid.
    fn inst_count(&self) -> u32;

    /// Declared shape of one instruction.
    fn inst(&self, inst: InstId) -> &InstInfo;

    /// Semantic trees of one instruction, in description order. Empty means
    /// the instruction has no usable description.
    fn semantics(&self, inst: InstId) -> &[TreeRef<'t>];
}
