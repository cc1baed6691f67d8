//! Renders emitted tables as Rust source text.
//!
//! The packed array is self-describing, so this walks it op by op and
//! annotates each line with the mnemonic and each program with the owning
//! instruction, the way a reader of the generated file expects. Output is a
//! pure function of the tables.

use std::fmt::Write;

use crate::core::program::MicroOpcode;
use crate::emit::SemanticsTables;

pub fn render_tables(tables: &SemanticsTables) -> String {
    let mut out = String::new();
    out.push_str("// Instruction semantics tables. Generated, do not edit.\n\n");
    render_program(&mut out, tables);
    render_offsets(&mut out, tables);
    render_constants(&mut out, tables);
    render_class_types(&mut out, tables);
    render_name_fn(&mut out, "selector_name", &tables.selector_names, "<unknown>");
    render_name_fn(&mut out, "predicate_name", &tables.predicate_names, "<unknown>");
    render_name_fn(
        &mut out,
        "operand_kind_name",
        &tables.operand_kind_names,
        "<unknown>",
    );
    render_name_fn(&mut out, "opcode_name", &tables.opcode_names, "<unknown op>");
    out
}

fn mnemonic(opcode: MicroOpcode, tables: &SemanticsTables) -> String {
    match opcode {
        MicroOpcode::Node(op) => tables
            .opcode_names
            .get(op.0 as usize)
            .cloned()
            .unwrap_or_else(|| format!("op#{}", op.0)),
        other => other.to_string(),
    }
}

fn render_program(out: &mut String, tables: &SemanticsTables) {
    let mut starts: Vec<(u32, &str)> = tables
        .offsets
        .iter()
        .zip(&tables.inst_names)
        .filter_map(|(off, name)| off.map(|o| (o, name.as_str())))
        .collect();
    starts.sort_unstable();
    let mut starts = starts.into_iter().peekable();

    let _ = writeln!(
        out,
        "pub static INST_SEMANTICS: [u16; {}] = [",
        tables.program.len()
    );
    let mut pos = 0usize;
    while pos < tables.program.len() {
        while let Some(&(off, name)) = starts.peek() {
            if off as usize != pos {
                break;
            }
            starts.next();
            let _ = writeln!(out, "    // {name}");
        }

        let code = tables.program[pos];
        match MicroOpcode::from_code(code) {
            Some(MicroOpcode::EndOfProgram) | None => {
                let _ = writeln!(out, "    0x{code:04x},");
                pos += 1;
            }
            Some(opcode) => {
                let header = tables.program.get(pos + 1).copied().unwrap_or(0);
                let ntypes = (header >> 8) as usize;
                let nops = (header & 0xff) as usize;
                let end = (pos + 2 + ntypes + nops).min(tables.program.len());

                let _ = write!(out, "    0x{code:04x}, ({ntypes} << 8) | {nops}");
                for cell in &tables.program[(pos + 2).min(end)..end] {
                    let _ = write!(out, ", {cell}");
                }
                let _ = writeln!(out, ", // {}", mnemonic(opcode, tables));
                pos = end;
            }
        }
    }
    out.push_str("];\n\n");
}

fn render_offsets(out: &mut String, tables: &SemanticsTables) {
    let _ = writeln!(
        out,
        "pub static OPCODE_TO_SEMA_IDX: [u32; {}] = [",
        tables.offsets.len()
    );
    for (offset, name) in tables.offsets.iter().zip(&tables.inst_names) {
        match offset {
            Some(o) => {
                let _ = writeln!(out, "    {o}, // {name}");
            }
            None => {
                let _ = writeln!(out, "    !0, // {name}");
            }
        }
    }
    out.push_str("];\n\n");
}

fn render_constants(out: &mut String, tables: &SemanticsTables) {
    let _ = writeln!(
        out,
        "pub static CONSTANT_POOL: [u64; {}] = [",
        tables.constants.len()
    );
    for constant in &tables.constants {
        let _ = writeln!(out, "    {constant},");
    }
    out.push_str("];\n\n");
}

fn render_class_types(out: &mut String, tables: &SemanticsTables) {
    let _ = writeln!(
        out,
        "pub static REG_CLASS_TYPES: [u16; {}] = [",
        tables.reg_class_types.len()
    );
    for (ty, name) in tables.reg_class_types.iter().zip(&tables.reg_class_names) {
        let _ = writeln!(out, "    {}, // {name}: {ty}", ty.code());
    }
    out.push_str("];\n\n");
}

fn render_name_fn(out: &mut String, fn_name: &str, names: &[String], fallback: &str) {
    let _ = writeln!(out, "pub fn {fn_name}(id: u16) -> &'static str {{");
    let _ = writeln!(out, "    match id {{");
    for (id, name) in names.iter().enumerate() {
        let _ = writeln!(out, "        {id} => {name:?},");
    }
    let _ = writeln!(out, "        _ => {fallback:?},");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::ValueType;

    fn sample_tables() -> SemanticsTables {
        SemanticsTables {
            program: vec![0xffff, 0xff00, 0x0101, 5, 1, 0xff05, 0x0002, 0, 0, 0xffff],
            offsets: vec![Some(1), None],
            constants: vec![42],
            opcode_names: vec!["add".to_string()],
            selector_names: vec!["Addr".to_string()],
            predicate_names: Vec::new(),
            operand_kind_names: vec!["mem".to_string()],
            reg_class_types: vec![ValueType::I32],
            reg_class_names: vec!["gpr".to_string()],
            inst_names: vec!["MOVrr".to_string(), "SELr".to_string()],
        }
    }

    #[test]
    fn test_program_rows_are_annotated() {
        let text = render_tables(&sample_tables());
        assert!(text.contains("pub static INST_SEMANTICS: [u16; 10] = ["));
        assert!(text.contains("    // MOVrr\n"));
        assert!(text.contains("    0xff00, (1 << 8) | 1, 5, 1, // read_rc\n"));
        assert!(text.contains("    0xff05, (0 << 8) | 2, 0, 0, // write_rc\n"));
    }

    #[test]
    fn test_missing_offsets_use_the_sentinel() {
        let text = render_tables(&sample_tables());
        assert!(text.contains("    1, // MOVrr\n"));
        assert!(text.contains("    !0, // SELr\n"));
    }

    #[test]
    fn test_lookup_functions_cover_registries() {
        let text = render_tables(&sample_tables());
        assert!(text.contains("pub fn selector_name(id: u16) -> &'static str {"));
        assert!(text.contains("        0 => \"Addr\",\n"));
        assert!(text.contains("        _ => \"<unknown>\",\n"));
        assert!(text.contains("pub fn opcode_name(id: u16) -> &'static str {"));
        assert!(text.contains("    5, // gpr: i32\n"));
    }
}
