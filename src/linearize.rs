//! Tree flattening: lowers one instruction's semantic trees into a flat
//! micro-op program.
//!
//! The walk is a straight post-order traversal. Each subtree is flattened
//! before its parent, so every operand cell written by a micro-op refers to
//! a value defined earlier in the program; def numbers grow monotonically
//! and are never revisited. Unsupported constructs do not abort the walk:
//! they raise flags on the program and the acceptance filter drops it later.
//! Errors here mean the description itself is malformed.

use hashbrown::HashMap;
use log::{debug, trace};

use crate::core::error::{SemaError, SemaResult};
use crate::core::facts::{InstInfo, OperandInfo, OperandKind};
use crate::core::model::TargetModel;
use crate::core::program::{InstProgram, MicroOp, MicroOpcode, MicroOperand, ValueSlot};
use crate::core::tree::{LeafValue, TreeOperator, TreeRef, ValueType};

/// Flattens the semantic trees of a single instruction.
///
/// One linearizer lowers one instruction: feed every top-level tree to
/// [`flatten`](Self::flatten), then take the program with
/// [`finish`](Self::finish). Constants, predicates, and selectors are
/// interned into the shared [`TargetModel`] as they are encountered.
pub struct Linearizer<'a, 't> {
    target: &'a mut TargetModel<'t>,
    inst: &'a InstInfo,
    program: InstProgram,
    /// Custom operands already read, by declared operand name. Register and
    /// immediate reads are cheap for consumers to repeat; custom reads are
    /// not, so those are emitted once per name.
    operand_defs: HashMap<&'a str, u16>,
    /// Next def number to hand out.
    cur_def: u16,
}

impl<'a, 't> Linearizer<'a, 't> {
    pub fn new(target: &'a mut TargetModel<'t>, inst: &'a InstInfo) -> Self {
        Self {
            target,
            inst,
            program: InstProgram::new(),
            operand_defs: HashMap::new(),
            cur_def: 0,
        }
    }

    fn inst_name(&self) -> String {
        self.inst.name.clone()
    }

    /// Append `op`, advancing the def counter by its non-void result count.
    /// Returns the first def number the op's results occupy.
    fn push_op(&mut self, op: MicroOp) -> u16 {
        let first_def = self.cur_def;
        let mut defines = false;
        for ty in &op.results {
            if !ty.is_void() {
                self.cur_def += 1;
                defines = true;
            }
            if ty.is_opaque() {
                self.program.has_opaque_call = true;
            }
        }
        if defines {
            self.program.last_def_no = Some(first_def);
            self.program.last_def_op = Some(self.program.num_ops());
        }
        trace!(
            "{} op {}: {}",
            self.inst.name,
            self.program.num_ops(),
            op.opcode
        );
        self.program.push(op);
        first_def
    }

    /// Value slots the next op's results will occupy, skipping voids.
    fn claim_results(&self, types: &[ValueType]) -> Vec<ValueSlot> {
        let mut slots = Vec::new();
        let mut next = self.cur_def;
        for &ty in types {
            if ty.is_void() {
                continue;
            }
            slots.push(ValueSlot { def: next, ty });
            next += 1;
        }
        slots
    }

    /// Lower one top-level tree.
    pub fn flatten(&mut self, tree: TreeRef<'_>) -> SemaResult<()> {
        match tree.op {
            // Declared side-destinations are folded in by finish(); the
            // wrapper itself carries nothing.
            TreeOperator::Implicit => Ok(()),
            TreeOperator::Set => self.flatten_set(tree),
            TreeOperator::Node(_) | TreeOperator::Selector(_) => {
                let results = self.flatten_node(tree)?;
                if results.is_empty() {
                    Ok(())
                } else {
                    Err(SemaError::TopLevelValue {
                        inst: self.inst_name(),
                    })
                }
            }
            TreeOperator::Leaf(_) => Err(SemaError::TopLevelValue {
                inst: self.inst_name(),
            }),
        }
    }

    /// Take the finished program, merging declared and discovered
    /// side-destinations.
    ///
    /// Declared registers come first, discovered ones after; anything the
    /// program writes explicitly, and any repeat, is dropped.
    pub fn finish(mut self) -> InstProgram {
        let discovered = std::mem::take(&mut self.program.implicit_defs);
        let mut implicit = Vec::new();
        for &reg in self.inst.implicit_defs.iter().chain(discovered.iter()) {
            if self.program.explicit_defs.contains(&reg) || implicit.contains(&reg) {
                continue;
            }
            implicit.push(reg);
        }
        self.program.implicit_defs = implicit;
        debug!(
            "lowered {}: {} ops, {} implicit",
            self.inst.name,
            self.program.num_ops(),
            self.program.implicit_defs.len()
        );
        self.program
    }

    /// Lower a subtree to the values it defines.
    fn flatten_subtree(&mut self, tree: TreeRef<'_>) -> SemaResult<Vec<ValueSlot>> {
        if let Some(name) = tree.name {
            let inst = self.inst;
            if let Some(op_info) = inst.operand(name) {
                return Ok(vec![self.flatten_operand(tree, op_info)?]);
            }
        }
        if tree.is_leaf() {
            return Ok(vec![self.flatten_leaf(tree)?]);
        }
        self.flatten_node(tree)
    }

    /// Read of a declared instruction operand. The declared kind decides the
    /// micro-op; the tree only contributes the binding name and the type.
    fn flatten_operand(
        &mut self,
        tree: TreeRef<'_>,
        op_info: &'a OperandInfo,
    ) -> SemaResult<ValueSlot> {
        if tree.types.len() != 1 {
            return Err(SemaError::OperandArity {
                inst: self.inst_name(),
            });
        }
        let ty = tree.types[0];

        let (opcode, operands) = match op_info.kind {
            OperandKind::RegClass(_) => (
                MicroOpcode::ReadRegClass,
                vec![MicroOperand::Literal(op_info.slot)],
            ),
            OperandKind::Immediate => (
                MicroOpcode::ReadImmediate,
                vec![MicroOperand::Literal(op_info.slot)],
            ),
            OperandKind::Custom(kind) => {
                if let Some(&def) = self.operand_defs.get(op_info.name.as_str()) {
                    return Ok(ValueSlot { def, ty });
                }
                self.operand_defs.insert(&op_info.name, self.cur_def);
                (
                    MicroOpcode::ReadCustomOperand,
                    vec![
                        MicroOperand::Kind(kind),
                        MicroOperand::Literal(op_info.slot),
                    ],
                )
            }
        };

        let def = self.push_op(MicroOp {
            opcode,
            results: vec![ty],
            operands,
        });
        Ok(ValueSlot { def, ty })
    }

    /// Read of a leaf that is not bound to a declared operand: a pooled
    /// constant or a specific register.
    fn flatten_leaf(&mut self, tree: TreeRef<'_>) -> SemaResult<ValueSlot> {
        if tree.types.len() != 1 {
            return Err(SemaError::OperandArity {
                inst: self.inst_name(),
            });
        }
        let ty = tree.types[0];
        let TreeOperator::Leaf(leaf) = tree.op else {
            unreachable!("flatten_leaf called on a non-leaf");
        };

        let (opcode, operand) = match leaf {
            LeafValue::Const(value) => {
                let handle = self.target.constants.intern(value);
                // The packed cell is the position in the pool array.
                (MicroOpcode::LoadConstant, MicroOperand::Literal(handle - 1))
            }
            LeafValue::Reg(reg) => (MicroOpcode::ReadReg, MicroOperand::Reg(reg)),
            LeafValue::RegClass(_) => {
                return Err(SemaError::UnsupportedLeaf {
                    inst: self.inst_name(),
                    what: "register class not bound to an operand".to_string(),
                })
            }
            LeafValue::OperandKind(_) => {
                return Err(SemaError::UnsupportedLeaf {
                    inst: self.inst_name(),
                    what: "operand reference not bound to an operand".to_string(),
                })
            }
        };

        let def = self.push_op(MicroOp {
            opcode,
            results: vec![ty],
            operands: vec![operand],
        });
        Ok(ValueSlot { def, ty })
    }

    /// Lower an assignment: flatten the source once, then route each of its
    /// values to the matching destination.
    ///
    /// The destination count is checked against the source's full type list,
    /// but an operator equivalence can leave fewer live values than that;
    /// trailing destinations beyond the live values must be specific
    /// registers and become discovered side-destinations.
    fn flatten_set(&mut self, tree: TreeRef<'_>) -> SemaResult<()> {
        let inst = self.inst;
        let Some((&source, dests)) = tree.children.split_last() else {
            return Err(SemaError::SetArity {
                inst: self.inst_name(),
                dests: 0,
                results: 0,
            });
        };

        if dests.len() > source.types.len() {
            return Err(SemaError::SetArity {
                inst: self.inst_name(),
                dests: dests.len(),
                results: source.types.len(),
            });
        }

        let source_results = self.flatten_subtree(source)?;
        let live = source_results.len();

        for (i, dest) in dests.iter().enumerate() {
            if i >= live {
                match dest.op {
                    TreeOperator::Leaf(LeafValue::Reg(reg)) => {
                        self.program.implicit_defs.push(reg);
                        continue;
                    }
                    _ => {
                        return Err(SemaError::DroppedSetDestination {
                            inst: self.inst_name(),
                        })
                    }
                }
            }

            let value = MicroOperand::Value(source_results[i].def);
            match dest.op {
                TreeOperator::Leaf(LeafValue::RegClass(_)) => {
                    let name = dest.name.unwrap_or_default();
                    let op_info = inst.operand(name).ok_or_else(|| SemaError::MissingOperand {
                        inst: inst.name.clone(),
                        name: name.to_string(),
                    })?;
                    self.push_op(MicroOp {
                        opcode: MicroOpcode::WriteRegClass,
                        results: tree.types.to_vec(),
                        operands: vec![MicroOperand::Literal(op_info.slot), value],
                    });
                }
                TreeOperator::Leaf(LeafValue::Reg(reg)) => {
                    self.program.explicit_defs.push(reg);
                    self.push_op(MicroOp {
                        opcode: MicroOpcode::WriteReg,
                        results: tree.types.to_vec(),
                        operands: vec![MicroOperand::Reg(reg), value],
                    });
                }
                _ => {
                    return Err(SemaError::SetDestination {
                        inst: self.inst_name(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Lower an operator node: children first, then one micro-op referencing
    /// each child's first value.
    fn flatten_node(&mut self, tree: TreeRef<'_>) -> SemaResult<Vec<ValueSlot>> {
        if tree.opaque_call {
            self.program.has_opaque_call = true;
        }

        if let TreeOperator::Selector(func) = tree.op {
            let selector = self.target.record_selector(func)?;
            self.program.has_selector = true;

            let mut operands = vec![MicroOperand::Selector(selector)];
            for child in tree.children {
                let first = self.first_child_value(child)?;
                operands.push(MicroOperand::Value(first));
            }

            let slots = self.claim_results(tree.types);
            self.push_op(MicroOp {
                opcode: MicroOpcode::CallSelector,
                results: tree.types.to_vec(),
                operands,
            });
            return Ok(slots);
        }

        let TreeOperator::Node(op) = tree.op else {
            let what = match tree.op {
                TreeOperator::Set => "nested set",
                TreeOperator::Implicit => "nested implicit",
                _ => "leaf",
            };
            return Err(SemaError::UnhandledOperator {
                inst: self.inst_name(),
                what: what.to_string(),
            });
        };

        // An equivalence swaps in the replacement operator and truncates the
        // result list to what the replacement declares.
        let mut opcode = MicroOpcode::Node(op);
        let mut kept = tree.types;
        if let Some(equiv) = self.target.equivalent_operator(op) {
            let keep = self.target.facts().opcode(equiv).results as usize;
            if tree.types.len() <= keep {
                return Err(SemaError::EquivalenceArity {
                    inst: self.inst_name(),
                });
            }
            kept = &tree.types[..keep];
            opcode = MicroOpcode::Node(equiv);
        }

        let mut operands = Vec::new();
        // Only the last guard predicate is honored; it takes over the opcode
        // and the underlying operator is left to the predicate handler.
        if let Some(&pred) = tree.predicates.last() {
            let pred = self.target.record_predicate(pred);
            opcode = MicroOpcode::Guarded;
            operands.push(MicroOperand::Predicate(pred));
        }

        for child in tree.children {
            let first = self.first_child_value(child)?;
            operands.push(MicroOperand::Value(first));
        }

        let slots = self.claim_results(kept);
        self.push_op(MicroOp {
            opcode,
            results: kept.to_vec(),
            operands,
        });
        Ok(slots)
    }

    /// Flatten a child and return its first value. Multi-result children
    /// contribute only their first value to the parent; a child defining
    /// nothing cannot be an operand.
    fn first_child_value(&mut self, child: TreeRef<'_>) -> SemaResult<u16> {
        let results = self.flatten_subtree(child)?;
        match results.first() {
            Some(slot) => Ok(slot.def),
            None => Err(SemaError::EmptySubtree {
                inst: self.inst_name(),
            }),
        }
    }
}
