//! Error types for the semantics table generator.
//!
//! These cover the fatal failure channel only: malformed or internally
//! inconsistent target descriptions that the lowering cannot recover from.
//! Constructs that are recognized but unsupported are not errors; they are
//! tracked as flags on the produced program and handled by the acceptance
//! filter.

use thiserror::Error;

/// Fatal error raised while lowering a target description.
#[derive(Error, Debug)]
pub enum SemaError {
    #[error("unsupported leaf in semantics of {inst}: {what}")]
    UnsupportedLeaf { inst: String, what: String },

    #[error("cannot lower operator {what} in {inst}")]
    UnhandledOperator { inst: String, what: String },

    #[error("selector function name does not start with 'select': {func:?}")]
    SelectorName { func: String },

    #[error("operator equivalence {from} -> {to} does not reduce result count")]
    NonReducingEquivalence { from: String, to: String },

    #[error("equivalence on {inst} drops more results than the node produces")]
    EquivalenceArity { inst: String },

    #[error("set in {inst} names {dests} destinations but its source produces {results} results")]
    SetArity {
        inst: String,
        dests: usize,
        results: usize,
    },

    #[error("set destination in {inst} is not a register or register class")]
    SetDestination { inst: String },

    #[error("set in {inst} drops a destination that is not a specific register")]
    DroppedSetDestination { inst: String },

    #[error("set output operand {name:?} not declared by {inst}")]
    MissingOperand { inst: String, name: String },

    #[error("top-level tree of {inst} produces a value")]
    TopLevelValue { inst: String },

    #[error("subtree in {inst} produces no results but is used as an operand")]
    EmptySubtree { inst: String },

    #[error("operand leaf in {inst} must carry exactly one result type")]
    OperandArity { inst: String },
}

/// Result type alias for lowering operations.
pub type SemaResult<T> = Result<T, SemaError>;
