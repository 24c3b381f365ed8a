//! Internal, programmer-facing failures.
//!
//! Shaped after `cpr::parser::Error` / `cpr::frontend::expand::ExpandError`:
//! a flat `thiserror`-derived enum, one variant per condition that means
//! "the input was not what the producing stage promised," never per
//! user-facing constraint violation (those go through [`crate::diagnostics`]
//! instead).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("internal: null parent for node where the grammar forbids it")]
    MissingParent,
    #[error("internal: scope stack underflow")]
    ScopeUnderflow,
    #[error("internal: symbol {0:?} referenced before being entered into any scope")]
    UnboundSymbol(usize),
}

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("internal: air instruction {0} is missing a required operand")]
    MissingOperand(&'static str),
    #[error("internal: air operand for {0} has the wrong operand kind")]
    OperandKindMismatch(&'static str),
    #[error("internal: routine {0:?} references a symbol with no assigned storage")]
    UnassignedStorage(String),
    #[error("internal: relocation target {0:?} has no emitted label")]
    UnresolvedRelocation(String),
}
