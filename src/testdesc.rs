//! Hand-built target descriptions for tests and the dump binary.
//!
//! [`TestDescription`] is a plain in-memory [`SemaAdaptor`]: push
//! instructions with their trees and hand it to the table builder.
//! [`TestDescription::sample`] builds a small fictional target that touches
//! every lowering path, including the ones the acceptance filter drops.

use crate::core::facts::{
    InstId, InstInfo, OperandInfo, OperandKind, OperandKindId, SemaAdaptor, TargetFacts,
};
use crate::core::tree::{TreeArena, TreeRef, ValueType};

pub struct TestDescription<'t> {
    facts: TargetFacts,
    insts: Vec<InstInfo>,
    trees: Vec<Vec<TreeRef<'t>>>,
}

impl<'t> TestDescription<'t> {
    pub fn new(facts: TargetFacts) -> Self {
        Self {
            facts,
            insts: Vec::new(),
            trees: Vec::new(),
        }
    }

    pub fn add_inst(&mut self, inst: InstInfo, trees: Vec<TreeRef<'t>>) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(inst);
        self.trees.push(trees);
        id
    }

    /// A small demo target: four general registers plus a flags register,
    /// integer arithmetic, a memory-increment instruction, and one
    /// representative of each unsupported construct.
    pub fn sample(arena: &'t TreeArena) -> Self {
        let mut facts = TargetFacts::new("demo");

        let r0 = facts.bank_mut().add_reg("r0");
        let r1 = facts.bank_mut().add_reg("r1");
        let r2 = facts.bank_mut().add_reg("r2");
        let r3 = facts.bank_mut().add_reg("r3");
        let flags = facts.bank_mut().add_reg("flags");
        let gpr = facts
            .bank_mut()
            .add_class("gpr", ValueType::I32, &[r0, r1, r2, r3]);

        let add = facts.add_opcode("add", 1);
        let sub = facts.add_opcode("sub", 1);
        let load = facts.add_opcode("load", 1);
        let store = facts.add_opcode("store", 0);
        let addf = facts.add_opcode("add_with_flags", 2);
        facts.add_equivalence(addf, add);

        let mem = facts.add_operand_kind("mem");
        let imm32 = facts.add_operand_kind("imm32");

        let mut desc = TestDescription::new(facts);
        let i32t = ValueType::I32;
        let rc = |name: &str, slot: u16| OperandInfo {
            name: name.to_string(),
            slot,
            kind: OperandKind::RegClass(gpr),
        };
        let imm = |name: &str, slot: u16| OperandInfo {
            name: name.to_string(),
            slot,
            kind: OperandKind::Immediate,
        };
        let custom = |name: &str, slot: u16, kind: OperandKindId| OperandInfo {
            name: name.to_string(),
            slot,
            kind: OperandKind::Custom(kind),
        };
        let read = |name: &str| arena.named(name, arena.class_leaf(gpr, i32t));

        // MOVrr: dst = src.
        desc.add_inst(
            InstInfo {
                name: "MOVrr".to_string(),
                operands: vec![rc("dst", 0), rc("src", 1)],
                implicit_defs: Vec::new(),
            },
            vec![arena.set(&[read("dst"), read("src")])],
        );

        // ADDrr: dst = a + b.
        desc.add_inst(
            InstInfo {
                name: "ADDrr".to_string(),
                operands: vec![rc("dst", 0), rc("a", 1), rc("b", 2)],
                implicit_defs: Vec::new(),
            },
            vec![arena.set(&[
                read("dst"),
                arena.node(add, &[i32t], &[read("a"), read("b")]),
            ])],
        );

        // SUBri: dst = a - imm.
        desc.add_inst(
            InstInfo {
                name: "SUBri".to_string(),
                operands: vec![rc("dst", 0), rc("a", 1), imm("k", 2)],
                implicit_defs: Vec::new(),
            },
            vec![arena.set(&[
                read("dst"),
                arena.node(
                    sub,
                    &[i32t],
                    &[read("a"), arena.named("k", arena.kind_leaf(imm32, i32t))],
                ),
            ])],
        );

        // INCr: dst = src + 1, flags set through the add_with_flags
        // equivalence; the dropped flags destination becomes implicit.
        desc.add_inst(
            InstInfo {
                name: "INCr".to_string(),
                operands: vec![rc("dst", 0), rc("src", 1)],
                implicit_defs: Vec::new(),
            },
            vec![arena.set(&[
                read("dst"),
                arena.reg_leaf(flags, i32t),
                arena.node(
                    addf,
                    &[i32t, i32t],
                    &[read("src"), arena.const_leaf(1, i32t)],
                ),
            ])],
        );

        // INCm: mem[addr] += 1. The custom address operand is read once and
        // reused by the store; the constant 1 shares INCr's pool entry.
        let addr = arena.named("addr", arena.kind_leaf(mem, i32t));
        desc.add_inst(
            InstInfo {
                name: "INCm".to_string(),
                operands: vec![custom("addr", 0, mem)],
                implicit_defs: Vec::new(),
            },
            vec![arena.node(
                store,
                &[],
                &[
                    arena.node(
                        add,
                        &[i32t],
                        &[
                            arena.node(load, &[i32t], &[addr]),
                            arena.const_leaf(1, i32t),
                        ],
                    ),
                    addr,
                ],
            )],
        );

        // LDa: aligned load, guarded by a predicate.
        desc.add_inst(
            InstInfo {
                name: "LDa".to_string(),
                operands: vec![rc("dst", 0), rc("a", 1)],
                implicit_defs: Vec::new(),
            },
            vec![arena.set(&[
                read("dst"),
                arena.guarded("aligned", arena.node(load, &[i32t], &[read("a")])),
            ])],
        );

        // LDsel: address goes through a selection function; lowered but
        // dropped by the filter.
        desc.add_inst(
            InstInfo {
                name: "LDsel".to_string(),
                operands: vec![rc("dst", 0), rc("a", 1)],
                implicit_defs: Vec::new(),
            },
            vec![arena.set(&[
                read("dst"),
                arena.selector("selectAddr", &[i32t], &[read("a")]),
            ])],
        );

        // SYSr: result comes from an opaque external call; dropped.
        desc.add_inst(
            InstInfo {
                name: "SYSr".to_string(),
                operands: vec![rc("dst", 0), rc("a", 1)],
                implicit_defs: Vec::new(),
            },
            vec![arena.set(&[
                read("dst"),
                arena.opaque(arena.node(add, &[i32t], &[read("a"), read("a")])),
            ])],
        );

        // CLC: only clears flags; with no anchoring value the implicit def
        // cannot be placed, so the filter drops it.
        desc.add_inst(
            InstInfo {
                name: "CLC".to_string(),
                operands: Vec::new(),
                implicit_defs: vec![flags],
            },
            vec![arena.implicit(&[arena.reg_leaf(flags, i32t)])],
        );

        // UDF: no description at all.
        desc.add_inst(
            InstInfo {
                name: "UDF".to_string(),
                operands: Vec::new(),
                implicit_defs: Vec::new(),
            },
            Vec::new(),
        );

        desc
    }
}

impl<'t> SemaAdaptor<'t> for TestDescription<'t> {
    fn facts(&self) -> &TargetFacts {
        &self.facts
    }

    fn inst_count(&self) -> u32 {
        self.insts.len() as u32
    }

    fn inst(&self, inst: InstId) -> &InstInfo {
        &self.insts[inst.0 as usize]
    }

    fn semantics(&self, inst: InstId) -> &[TreeRef<'t>] {
        &self.trees[inst.0 as usize]
    }
}
