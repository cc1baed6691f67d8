//! End-to-end tests: sample description in, packed tables out.
//!
//! These drive the whole pipeline the way the dump binary does and check
//! the packed array cell by cell, including the properties consumers rely
//! on: forward-only value references, shared constant-pool entries, and
//! silent omission of unsupported instructions.

use sematab::core::{
    InstInfo, MicroOpcode, OperandInfo, OperandKind, TargetFacts, TreeArena, ValueType,
};
use sematab::emit::{SemanticsTables, TableBuilder};
use sematab::render::render_tables;
use sematab::testdesc::TestDescription;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn build_sample(arena: &TreeArena) -> SemanticsTables {
    TableBuilder::build(&TestDescription::sample(arena)).unwrap()
}

fn offset_of(tables: &SemanticsTables, name: &str) -> Option<u32> {
    let idx = tables
        .inst_names
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("no instruction named {name}"));
    tables.offsets[idx]
}

struct PackedOp {
    opcode: MicroOpcode,
    types: Vec<u16>,
    operands: Vec<u16>,
}

/// Walk one program's cells back into ops; the array is self-describing.
fn decode_program(cells: &[u16], offset: u32) -> Vec<PackedOp> {
    let mut ops = Vec::new();
    let mut pos = offset as usize;
    loop {
        let opcode = MicroOpcode::from_code(cells[pos]).expect("invalid opcode cell");
        if opcode == MicroOpcode::EndOfProgram {
            return ops;
        }
        let ntypes = (cells[pos + 1] >> 8) as usize;
        let nops = (cells[pos + 1] & 0xff) as usize;
        ops.push(PackedOp {
            opcode,
            types: cells[pos + 2..pos + 2 + ntypes].to_vec(),
            operands: cells[pos + 2 + ntypes..pos + 2 + ntypes + nops].to_vec(),
        });
        pos += 2 + ntypes + nops;
    }
}

/// Operand positions that carry value references, per opcode.
fn value_operand_positions(opcode: MicroOpcode, num_operands: usize) -> Vec<usize> {
    match opcode {
        MicroOpcode::WriteRegClass | MicroOpcode::WriteReg => vec![1],
        MicroOpcode::CallSelector | MicroOpcode::Guarded => (1..num_operands).collect(),
        MicroOpcode::Node(_) => (0..num_operands).collect(),
        _ => Vec::new(),
    }
}

#[test]
fn test_sample_acceptance_pattern() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    for name in ["MOVrr", "ADDrr", "SUBri", "INCr", "INCm", "LDa"] {
        assert!(offset_of(&tables, name).is_some(), "{name} should have a program");
    }
    for name in ["LDsel", "SYSr", "CLC", "UDF"] {
        assert!(offset_of(&tables, name).is_none(), "{name} should be absent");
    }
    assert_eq!(tables.num_accepted(), 6);
    assert_eq!(tables.program[0], 0xffff);
}

#[test]
fn test_values_only_flow_forward() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    for offset in tables.offsets.iter().flatten() {
        let mut defined = 0u16;
        for op in decode_program(&tables.program, *offset) {
            for pos in value_operand_positions(op.opcode, op.operands.len()) {
                assert!(
                    op.operands[pos] < defined,
                    "{:?} references v{} with only {} values defined",
                    op.opcode,
                    op.operands[pos],
                    defined
                );
            }
            defined += op.types.iter().filter(|&&ty| ty != 0).count() as u16;
        }
    }
}

#[test]
fn test_simple_move_layout() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    let offset = offset_of(&tables, "MOVrr").unwrap() as usize;
    assert_eq!(
        &tables.program[offset..offset + 9],
        &[
            0xff00, 0x0101, 5, 1, // read_rc src -> v0
            0xff05, 0x0002, 0, 0, // write_rc dst <- v0
            0xffff, // terminator
        ]
    );
}

#[test]
fn test_immediate_operand_layout() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    let offset = offset_of(&tables, "SUBri").unwrap() as usize;
    assert_eq!(
        &tables.program[offset..offset + 18],
        &[
            0xff00, 0x0101, 5, 1, // read_rc a -> v0
            0xff01, 0x0101, 5, 2, // read_imm k -> v1
            1, 0x0102, 5, 0, 1, // sub v0, v1 -> v2
            0xff05, 0x0002, 0, 2, // write_rc dst <- v2
            0xffff, // terminator
        ]
    );
}

#[test]
fn test_constant_pool_is_shared_across_instructions() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    // INCr and INCm both add the constant 1; the pool holds it once and
    // both programs point at the same position.
    assert_eq!(tables.constants, vec![1]);
    for name in ["INCr", "INCm"] {
        let offset = offset_of(&tables, name).unwrap();
        let loads: Vec<_> = decode_program(&tables.program, offset)
            .into_iter()
            .filter(|op| op.opcode == MicroOpcode::LoadConstant)
            .collect();
        assert_eq!(loads.len(), 1, "{name} should load the constant once");
        assert_eq!(loads[0].operands, vec![0]);
    }
}

#[test]
fn test_custom_operand_read_once() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    let offset = offset_of(&tables, "INCm").unwrap();
    let ops = decode_program(&tables.program, offset);

    let custom_reads = ops
        .iter()
        .filter(|op| op.opcode == MicroOpcode::ReadCustomOperand)
        .count();
    assert_eq!(custom_reads, 1);

    // The store consumes the incremented value and the same address value
    // the load consumed.
    let store = ops.last().unwrap();
    assert!(matches!(store.opcode, MicroOpcode::Node(_)));
    assert_eq!(store.operands, vec![3, 0]);
}

#[test]
fn test_implicit_def_is_recorded_after_the_body() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    let offset = offset_of(&tables, "INCr").unwrap();
    let ops = decode_program(&tables.program, offset);

    let implicit = ops.last().unwrap();
    assert_eq!(implicit.opcode, MicroOpcode::Implicit);
    assert!(implicit.types.is_empty());
    assert_eq!(implicit.operands, vec![4]); // the flags register

    // The body still writes the explicit destination.
    assert!(ops
        .iter()
        .any(|op| op.opcode == MicroOpcode::WriteRegClass));
}

#[test]
fn test_guarded_load_encoding() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    let offset = offset_of(&tables, "LDa").unwrap();
    let ops = decode_program(&tables.program, offset);

    let guarded = &ops[1];
    assert_eq!(guarded.opcode, MicroOpcode::Guarded);
    // Predicate id first, then the address value.
    assert_eq!(guarded.operands, vec![0, 0]);
    assert_eq!(tables.predicate_names, vec!["aligned"]);
}

#[test]
fn test_name_tables_cover_catalogs_and_registries() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    assert_eq!(
        tables.opcode_names,
        vec!["add", "sub", "load", "store", "add_with_flags"]
    );
    assert_eq!(tables.operand_kind_names, vec!["mem", "imm32"]);
    // The selector registry keeps the name even though the only user was
    // rejected.
    assert_eq!(tables.selector_names, vec!["Addr"]);
    assert_eq!(tables.reg_class_names, vec!["gpr"]);
    assert_eq!(tables.reg_class_types, vec![ValueType::I32]);
    assert_eq!(tables.inst_names.len(), 10);
}

#[test]
fn test_rebuilt_description_produces_identical_tables() {
    init_logging();
    let arena_a = TreeArena::new();
    let arena_b = TreeArena::new();
    let first = build_sample(&arena_a);
    let second = build_sample(&arena_b);
    assert_eq!(first, second);
}

#[test]
fn test_program_content_does_not_depend_on_neighbors() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);

    // The same move lowered in a one-instruction description packs to the
    // same cells, just at a different offset.
    let mini_arena = TreeArena::new();
    let mut facts = TargetFacts::new("mini");
    let r0 = facts.bank_mut().add_reg("r0");
    let gpr = facts.bank_mut().add_class("gpr", ValueType::I32, &[r0]);
    let mut desc = TestDescription::new(facts);
    let dst = mini_arena.named("dst", mini_arena.class_leaf(gpr, ValueType::I32));
    let src = mini_arena.named("src", mini_arena.class_leaf(gpr, ValueType::I32));
    desc.add_inst(
        InstInfo {
            name: "MOVrr".to_string(),
            operands: vec![
                OperandInfo {
                    name: "dst".to_string(),
                    slot: 0,
                    kind: OperandKind::RegClass(gpr),
                },
                OperandInfo {
                    name: "src".to_string(),
                    slot: 1,
                    kind: OperandKind::RegClass(gpr),
                },
            ],
            implicit_defs: Vec::new(),
        },
        vec![mini_arena.set(&[dst, src])],
    );
    let mini = TableBuilder::build(&desc).unwrap();

    let sample_off = offset_of(&tables, "MOVrr").unwrap() as usize;
    let mini_off = offset_of(&mini, "MOVrr").unwrap() as usize;
    assert_eq!(
        tables.program[sample_off..sample_off + 9],
        mini.program[mini_off..mini_off + 9]
    );
}

#[test]
fn test_render_matches_tables() {
    init_logging();
    let arena = TreeArena::new();
    let tables = build_sample(&arena);
    let text = render_tables(&tables);

    assert!(text.contains(&format!(
        "pub static INST_SEMANTICS: [u16; {}] = [",
        tables.program.len()
    )));
    assert!(text.contains("    // INCm\n"));
    assert!(text.contains("    !0, // LDsel\n"));
    assert!(text.contains("        0 => \"Addr\",\n"));
    assert!(text.contains("    5, // gpr: i32\n"));
}
