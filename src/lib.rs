//! Lowering of instruction semantics from trees to flat tables.
//!
//! A target description names its instructions and, for each, a small DAG of
//! typed semantic trees. This crate flattens those trees into linear
//! micro-op programs a downstream interpreter can execute in one forward
//! pass, and packs the accepted programs into `u16` tables with their side
//! data: constant pool, per-instruction offsets, name tables, and
//! register-class types.
//!
//! The pipeline: a provider implements [`core::SemaAdaptor`];
//! [`linearize::Linearizer`] flattens one instruction at a time;
//! [`accept::check`] drops programs consumers cannot run;
//! [`emit::TableBuilder`] lays the rest out as [`emit::SemanticsTables`];
//! [`render::render_tables`] formats them as Rust source.
//!
//! ```
//! use sematab::core::TreeArena;
//! use sematab::emit::TableBuilder;
//! use sematab::testdesc::TestDescription;
//!
//! let arena = TreeArena::new();
//! let desc = TestDescription::sample(&arena);
//! let tables = TableBuilder::build(&desc)?;
//! assert!(tables.num_accepted() > 0);
//! # Ok::<(), sematab::SemaError>(())
//! ```

pub mod accept;
pub mod core;
pub mod emit;
pub mod linearize;
pub mod render;
pub mod testdesc;

pub use self::accept::RejectReason;
pub use self::core::{
    InstId, InstInfo, InstProgram, SemaAdaptor, SemaError, SemaResult, TargetFacts, TreeArena,
    ValueType,
};
pub use self::emit::{SemanticsTables, TableBuilder};
pub use self::linearize::Linearizer;
