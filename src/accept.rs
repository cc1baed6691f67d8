//! Acceptance filter: decides whether a lowered program makes it into the
//! emitted tables.
//!
//! The engine lowers everything it structurally can and leaves judgment to
//! this pass. A rejection is not an error: the instruction simply gets no
//! table entry, the same as an instruction with no description at all.

use std::fmt;

use crate::core::program::InstProgram;

/// Why a lowered program was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Calls an opaque external function, or produces an opaque-typed value.
    OpaqueCall,
    /// Routes a value through an opaque selection function.
    OpaqueSelector,
    /// Writes more than one side-destination; consumers anchor at most one.
    MultipleImplicitDefs,
    /// Has a side-destination but defines no value to anchor it to.
    UnanchoredImplicitDef,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RejectReason::OpaqueCall => "opaque external call",
            RejectReason::OpaqueSelector => "opaque selection function",
            RejectReason::MultipleImplicitDefs => "multiple side-destinations",
            RejectReason::UnanchoredImplicitDef => "side-destination without an anchor value",
        };
        f.write_str(reason)
    }
}

/// Check a lowered program against the constraints table consumers rely on.
pub fn check(program: &InstProgram) -> Result<(), RejectReason> {
    if program.has_opaque_call {
        return Err(RejectReason::OpaqueCall);
    }
    if program.has_selector {
        return Err(RejectReason::OpaqueSelector);
    }
    if program.implicit_defs.len() > 1 {
        return Err(RejectReason::MultipleImplicitDefs);
    }
    if !program.implicit_defs.is_empty() && program.last_def_no.is_none() {
        return Err(RejectReason::UnanchoredImplicitDef);
    }
    Ok(())
}
