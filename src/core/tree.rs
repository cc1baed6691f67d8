//! Semantic trees: the input side of the lowering.
//!
//! A [`SemanticTree`] describes one instruction's effect as a DAG of typed
//! operations over registers, operands, and constants. Trees are immutable
//! once built and are shared by reference; [`TreeArena`] owns the backing
//! storage so a whole description can be built up-front and borrowed for the
//! duration of one run. The lowering engine never mutates a tree.

use bumpalo::Bump;
use std::fmt;

use super::facts::{OpcodeId, OperandKindId, RegClassId, RegId};

/// Concrete type of one produced value.
///
/// `Void` marks a result slot that carries no value; `Opaque` marks a value
/// the downstream interpreter cannot represent (its presence taints the whole
/// program). There is deliberately no wildcard member: trees arrive fully
/// typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum ValueType {
    Void = 0,
    Opaque = 1,
    I1 = 2,
    I8 = 3,
    I16 = 4,
    I32 = 5,
    I64 = 6,
    I128 = 7,
    F32 = 8,
    F64 = 9,
}

impl ValueType {
    /// Cell value used when the type list is packed into the flat table.
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_void(self) -> bool {
        self == ValueType::Void
    }

    pub fn is_opaque(self) -> bool {
        self == ValueType::Opaque
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Void => "void",
            ValueType::Opaque => "opaque",
            ValueType::I1 => "i1",
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::I128 => "i128",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Value carried by a leaf tree.
///
/// Register-operand wrappers from the source description are resolved to
/// their underlying register class before trees are built, so the engine
/// never sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafValue {
    /// Compile-time integer constant.
    Const(u64),
    /// A specific register from the bank.
    Reg(RegId),
    /// A register class; valid as a set destination or behind an operand name.
    RegClass(RegClassId),
    /// A declared operand kind; only valid behind an operand name.
    OperandKind(OperandKindId),
}

/// Operator of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOperator<'t> {
    /// Basic semantic operation from the target's operator catalog.
    Node(OpcodeId),
    /// Opaque selection function, referenced by its declared name.
    Selector(&'t str),
    /// Assignment: the last child produces values, the leading children
    /// receive them.
    Set,
    /// Grouping wrapper for implicit side-destinations; carries no semantics.
    Implicit,
    /// Leaf carrying a value.
    Leaf(LeafValue),
}

/// One node of a semantic tree.
///
/// `types` lists the node's results in order, one entry per produced value
/// (void entries included). `name` binds the node to a declared instruction
/// operand. `predicates` are the guard predicates attached to the node; by
/// source convention only the last one is honored. `opaque_call` marks a
/// node whose computation is an opaque external call.
#[derive(Debug, Clone, Copy)]
pub struct SemanticTree<'t> {
    pub op: TreeOperator<'t>,
    pub children: &'t [TreeRef<'t>],
    pub types: &'t [ValueType],
    pub name: Option<&'t str>,
    pub predicates: &'t [&'t str],
    pub opaque_call: bool,
}

/// Shared handle to an arena-allocated tree.
pub type TreeRef<'t> = &'t SemanticTree<'t>;

impl<'t> SemanticTree<'t> {
    pub fn is_leaf(&self) -> bool {
        matches!(self.op, TreeOperator::Leaf(_))
    }
}

/// Arena-backed store for semantic trees.
///
/// All nodes, child lists, type lists, and names are allocated into one bump
/// arena and freed together when the arena is dropped. Construction helpers
/// return shared references, so subtrees can appear under several parents,
/// which is what makes the input a DAG rather than a strict tree.
#[derive(Default)]
pub struct TreeArena {
    bump: Bump,
}

impl TreeArena {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// Bytes currently allocated, for diagnostics.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    fn build<'t>(
        &'t self,
        op: TreeOperator<'t>,
        types: &[ValueType],
        children: &[TreeRef<'t>],
    ) -> TreeRef<'t> {
        self.bump.alloc(SemanticTree {
            op,
            children: self.bump.alloc_slice_copy(children),
            types: self.bump.alloc_slice_copy(types),
            name: None,
            predicates: &[],
            opaque_call: false,
        })
    }

    /// Basic operator node.
    pub fn node<'t>(
        &'t self,
        op: OpcodeId,
        types: &[ValueType],
        children: &[TreeRef<'t>],
    ) -> TreeRef<'t> {
        self.build(TreeOperator::Node(op), types, children)
    }

    /// Opaque selector node; `func` is the declared selection function name.
    pub fn selector<'t>(
        &'t self,
        func: &str,
        types: &[ValueType],
        children: &[TreeRef<'t>],
    ) -> TreeRef<'t> {
        self.build(
            TreeOperator::Selector(self.bump.alloc_str(func)),
            types,
            children,
        )
    }

    /// Assignment node: all children but the last are destinations.
    pub fn set<'t>(&'t self, children: &[TreeRef<'t>]) -> TreeRef<'t> {
        self.build(TreeOperator::Set, &[], children)
    }

    /// No-op wrapper grouping implicit side-destinations.
    pub fn implicit<'t>(&'t self, children: &[TreeRef<'t>]) -> TreeRef<'t> {
        self.build(TreeOperator::Implicit, &[], children)
    }

    /// Literal constant leaf.
    pub fn const_leaf(&self, value: u64, ty: ValueType) -> TreeRef<'_> {
        self.build(TreeOperator::Leaf(LeafValue::Const(value)), &[ty], &[])
    }

    /// Explicit register leaf.
    pub fn reg_leaf(&self, reg: RegId, ty: ValueType) -> TreeRef<'_> {
        self.build(TreeOperator::Leaf(LeafValue::Reg(reg)), &[ty], &[])
    }

    /// Register-class leaf.
    pub fn class_leaf(&self, class: RegClassId, ty: ValueType) -> TreeRef<'_> {
        self.build(TreeOperator::Leaf(LeafValue::RegClass(class)), &[ty], &[])
    }

    /// Operand-kind leaf.
    pub fn kind_leaf(&self, kind: OperandKindId, ty: ValueType) -> TreeRef<'_> {
        self.build(TreeOperator::Leaf(LeafValue::OperandKind(kind)), &[ty], &[])
    }

    /// Copy of `tree` bound to the instruction operand `name`.
    pub fn named<'t>(&'t self, name: &str, tree: TreeRef<'t>) -> TreeRef<'t> {
        self.bump.alloc(SemanticTree {
            name: Some(self.bump.alloc_str(name)),
            ..*tree
        })
    }

    /// Copy of `tree` with `predicate` appended to its guard list.
    pub fn guarded<'t>(&'t self, predicate: &str, tree: TreeRef<'t>) -> TreeRef<'t> {
        let mut predicates: Vec<&'t str> = tree.predicates.to_vec();
        predicates.push(self.bump.alloc_str(predicate));
        self.bump.alloc(SemanticTree {
            predicates: self.bump.alloc_slice_copy(&predicates),
            ..*tree
        })
    }

    /// Copy of `tree` marked as an opaque external call.
    pub fn opaque<'t>(&'t self, tree: TreeRef<'t>) -> TreeRef<'t> {
        self.bump.alloc(SemanticTree {
            opaque_call: true,
            ..*tree
        })
    }
}
