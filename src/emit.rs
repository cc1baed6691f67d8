//! Table emission: drives the lowering across a whole target description
//! and packs the results into flat side tables.
//!
//! Accepted programs are laid end-to-end in one `u16` array, each op as
//! opcode cell, count cell, result-type cells, operand cells. Cell 0 is a
//! terminator guard, so offset 0 can never be mistaken for a program and
//! real offsets start at 1. Constants, name tables, and register-class types
//! ride alongside in [`SemanticsTables`].

use log::debug;

use crate::accept;
use crate::core::error::SemaResult;
use crate::core::facts::{InstId, SemaAdaptor};
use crate::core::model::TargetModel;
use crate::core::program::{InstProgram, MicroOp, MicroOpcode, MicroOperand};
use crate::core::tree::ValueType;
use crate::linearize::Linearizer;

/// Everything emitted for one target: the packed program array plus its
/// side tables. All name tables are indexed by the corresponding id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticsTables {
    /// Packed micro-op cells for all accepted instructions.
    pub program: Vec<u16>,
    /// Offset of each instruction's first opcode cell; `None` when the
    /// instruction has no usable program.
    pub offsets: Vec<Option<u32>>,
    /// Pooled constants; a `LoadConstant` operand indexes this directly.
    pub constants: Vec<u64>,
    /// Operator catalog names, whether used or not.
    pub opcode_names: Vec<String>,
    /// Selection functions encountered during lowering, in id order.
    pub selector_names: Vec<String>,
    /// Guard predicates encountered during lowering, in id order.
    pub predicate_names: Vec<String>,
    /// Declared custom operand kinds, whether used or not.
    pub operand_kind_names: Vec<String>,
    /// Canonical value type of each register class.
    pub reg_class_types: Vec<ValueType>,
    pub reg_class_names: Vec<String>,
    /// All instruction names, indexed like `offsets`.
    pub inst_names: Vec<String>,
}

impl SemanticsTables {
    /// Number of instructions that got a program.
    pub fn num_accepted(&self) -> usize {
        self.offsets.iter().filter(|o| o.is_some()).count()
    }
}

/// Packs lowered programs into the flat array.
pub struct TableBuilder {
    cells: Vec<u16>,
    offsets: Vec<Option<u32>>,
    inst_names: Vec<String>,
}

impl TableBuilder {
    /// Lower every instruction the adaptor describes and build the tables.
    ///
    /// Instructions are visited in increasing id order; offsets, constant
    /// handles, and registry ids all depend on that order, so a description
    /// always produces identical tables.
    pub fn build<'t, A: SemaAdaptor<'t>>(adaptor: &A) -> SemaResult<SemanticsTables> {
        let facts = adaptor.facts();
        let mut model = TargetModel::new(facts)?;
        let mut builder = TableBuilder {
            cells: vec![MicroOpcode::EndOfProgram.code()],
            offsets: vec![None; adaptor.inst_count() as usize],
            inst_names: Vec::with_capacity(adaptor.inst_count() as usize),
        };

        for idx in 0..adaptor.inst_count() {
            let inst_id = InstId(idx);
            let inst = adaptor.inst(inst_id);
            builder.inst_names.push(inst.name.clone());

            let trees = adaptor.semantics(inst_id);
            if trees.is_empty() {
                continue;
            }

            let mut lin = Linearizer::new(&mut model, inst);
            for &tree in trees {
                lin.flatten(tree)?;
            }
            let program = lin.finish();

            if let Err(reason) = accept::check(&program) {
                debug!("no table entry for {}: {}", inst.name, reason);
                continue;
            }

            builder.offsets[idx as usize] = Some(builder.cells.len() as u32);
            builder.pack_program(&program);
        }

        debug!(
            "packed {} cells for {} instructions ({} with programs)",
            builder.cells.len(),
            adaptor.inst_count(),
            builder.offsets.iter().filter(|o| o.is_some()).count()
        );

        Ok(SemanticsTables {
            program: builder.cells,
            offsets: builder.offsets,
            constants: model.constants.as_slice().to_vec(),
            opcode_names: facts.opcodes().map(|op| op.name.clone()).collect(),
            selector_names: model.selectors.names().to_vec(),
            predicate_names: model.predicates.names().to_vec(),
            operand_kind_names: facts.operand_kinds().map(str::to_string).collect(),
            reg_class_types: facts.bank().classes().map(|c| c.ty).collect(),
            reg_class_names: facts.bank().classes().map(|c| c.name.clone()).collect(),
            inst_names: builder.inst_names,
        })
    }

    /// Append one program's cells, the side-destination record, and the
    /// terminator.
    fn pack_program(&mut self, program: &InstProgram) {
        for op in &program.ops {
            self.push_op(op);
        }
        if let Some(&reg) = program.implicit_defs.first() {
            // The filter admits at most one, anchored to a real def.
            debug_assert_eq!(program.implicit_defs.len(), 1);
            debug_assert!(program.last_def_op.is_some());
            self.push_op(&MicroOp {
                opcode: MicroOpcode::Implicit,
                results: Vec::new(),
                operands: vec![MicroOperand::Reg(reg)],
            });
        }
        self.cells.push(MicroOpcode::EndOfProgram.code());
    }

    fn push_op(&mut self, op: &MicroOp) {
        self.cells.push(op.opcode.code());
        self.cells.push(op.header());
        for ty in &op.results {
            self.cells.push(ty.code());
        }
        for operand in &op.operands {
            self.cells.push(operand.pack());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::facts::{InstInfo, OperandInfo, OperandKind, TargetFacts};
    use crate::core::tree::{TreeArena, TreeRef};

    struct MiniDesc<'t> {
        facts: TargetFacts,
        insts: Vec<InstInfo>,
        trees: Vec<Vec<TreeRef<'t>>>,
    }

    impl<'t> SemaAdaptor<'t> for MiniDesc<'t> {
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

    fn demo_facts() -> TargetFacts {
        let mut facts = TargetFacts::new("demo");
        let r0 = facts.bank_mut().add_reg("r0");
        let r1 = facts.bank_mut().add_reg("r1");
        facts.bank_mut().add_reg("flags");
        facts
            .bank_mut()
            .add_class("gpr", ValueType::I32, &[r0, r1]);
        let add = facts.add_opcode("add", 1);
        let addf = facts.add_opcode("add_with_flags", 2);
        facts.add_equivalence(addf, add);
        facts
    }

    fn reg_operand(name: &str, slot: u16) -> OperandInfo {
        OperandInfo {
            name: name.to_string(),
            slot,
            kind: OperandKind::RegClass(crate::core::facts::RegClassId(0)),
        }
    }

    fn mov_inst(name: &str) -> InstInfo {
        InstInfo {
            name: name.to_string(),
            operands: vec![reg_operand("dst", 0), reg_operand("src", 1)],
            implicit_defs: Vec::new(),
        }
    }

    fn mov_tree<'t>(arena: &'t TreeArena) -> TreeRef<'t> {
        let gpr = crate::core::facts::RegClassId(0);
        let src = arena.named("src", arena.class_leaf(gpr, ValueType::I32));
        let dst = arena.named("dst", arena.class_leaf(gpr, ValueType::I32));
        arena.set(&[dst, src])
    }

    #[test]
    fn test_simple_move_layout() {
        let arena = TreeArena::new();
        let desc = MiniDesc {
            facts: demo_facts(),
            insts: vec![mov_inst("MOVrr")],
            trees: vec![vec![mov_tree(&arena)]],
        };

        let tables = TableBuilder::build(&desc).unwrap();

        assert_eq!(tables.offsets, vec![Some(1)]);
        assert_eq!(
            tables.program,
            vec![
                0xffff, // guard
                0xff00, 0x0101, 5, 1, // read_rc src -> v0
                0xff05, 0x0002, 0, 0, // write_rc dst <- v0
                0xffff, // terminator
            ]
        );
        assert!(tables.constants.is_empty());
        assert_eq!(tables.inst_names, vec!["MOVrr"]);
        assert_eq!(tables.reg_class_types, vec![ValueType::I32]);
        assert_eq!(tables.reg_class_names, vec!["gpr"]);
        assert_eq!(tables.opcode_names, vec!["add", "add_with_flags"]);
    }

    #[test]
    fn test_programs_are_laid_end_to_end() {
        let arena = TreeArena::new();
        let desc = MiniDesc {
            facts: demo_facts(),
            insts: vec![mov_inst("MOVrr"), mov_inst("MOVrr_2")],
            trees: vec![vec![mov_tree(&arena)], vec![mov_tree(&arena)]],
        };

        let tables = TableBuilder::build(&desc).unwrap();

        // Each move packs to nine cells; the second starts right after the
        // first's terminator.
        assert_eq!(tables.offsets, vec![Some(1), Some(10)]);
        assert_eq!(tables.program.len(), 19);
        assert_eq!(tables.program[9], 0xffff);
        assert_eq!(tables.program[1], tables.program[10]);
    }

    #[test]
    fn test_implicit_record_and_skipped_instructions() {
        let arena = TreeArena::new();
        let facts = demo_facts();
        let gpr = crate::core::facts::RegClassId(0);
        let flags = crate::core::facts::RegId(2);
        let add = facts.lookup_opcode("add").unwrap();
        let addf = facts.lookup_opcode("add_with_flags").unwrap();

        // INCr: dst = src + 1, setting flags through the equivalence.
        let src = arena.named("src", arena.class_leaf(gpr, ValueType::I32));
        let one = arena.const_leaf(1, ValueType::I32);
        let sum = arena.node(addf, &[ValueType::I32, ValueType::I32], &[src, one]);
        let dst = arena.named("dst", arena.class_leaf(gpr, ValueType::I32));
        let flags_leaf = arena.reg_leaf(flags, ValueType::I32);
        let inc_root = arena.set(&[dst, flags_leaf, sum]);

        // SELr: goes through a selection function, so no table entry.
        let sel_src = arena.named("src", arena.class_leaf(gpr, ValueType::I32));
        let sel = arena.selector("selectAddr", &[ValueType::I32], &[sel_src]);
        let sel_dst = arena.named("dst", arena.class_leaf(gpr, ValueType::I32));
        let sel_root = arena.set(&[sel_dst, sel]);

        let desc = MiniDesc {
            facts,
            insts: vec![mov_inst("INCr"), mov_inst("SELr"), mov_inst("NODESC")],
            trees: vec![vec![inc_root], vec![sel_root], Vec::new()],
        };

        let tables = TableBuilder::build(&desc).unwrap();

        assert_eq!(tables.offsets, vec![Some(1), None, None]);
        assert_eq!(
            tables.program,
            vec![
                0xffff, // guard
                0xff00, 0x0101, 5, 1, // read_rc src -> v0
                0xff03, 0x0101, 5, 0, // load_const [0] -> v1
                add.0 as u16, 0x0102, 5, 0, 1, // add v0, v1 -> v2
                0xff05, 0x0002, 0, 2, // write_rc dst <- v2
                0xff09, 0x0001, 2, // implicit flags
                0xffff, // terminator
            ]
        );
        assert_eq!(tables.constants, vec![1]);
        // The rejected selector still leaves its name in the registry.
        assert_eq!(tables.selector_names, vec!["Addr"]);
        assert_eq!(tables.inst_names, vec!["INCr", "SELr", "NODESC"]);
        assert_eq!(tables.num_accepted(), 1);
    }

    #[test]
    fn test_builds_are_deterministic() {
        let arena = TreeArena::new();
        let desc = MiniDesc {
            facts: demo_facts(),
            insts: vec![mov_inst("MOVrr")],
            trees: vec![vec![mov_tree(&arena)]],
        };

        let first = TableBuilder::build(&desc).unwrap();
        let second = TableBuilder::build(&desc).unwrap();
        assert_eq!(first, second);
    }
}
