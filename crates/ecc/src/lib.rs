//! Semantic analysis and x86-64 code generation core of a C89/C99 compiler.
//!
//! This crate plays the role the teacher's `cpr` crate plays for its own
//! pipeline: it owns everything downstream of parsing. [`analyzer`] decorates
//! an already-parsed [`ecc_ast::ast::TranslationUnit`] in place (spec 4.5);
//! [`air`] is the concrete shape of the three-address IR the (out-of-scope)
//! air builder is assumed to hand the emitter; [`emit`] lowers an
//! [`air::Program`] to x86-64 instructions (spec 4.6); [`asmwriter`] renders
//! those into GAS-syntax text (spec 4.7).

pub mod air;
pub mod analyzer;
pub mod asmwriter;
pub mod constexpr;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod symtab;

pub use analyzer::{Options, SemanticAnalyzer};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{AnalyzeError, EmitError};

use ecc_ast::ast::TranslationUnit;

/// Runs semantic analysis over `tu` in place and returns the diagnostics
/// collected along the way, plus the symbol table analysis built.
///
/// This is the analyzer half of the pipeline's entry point; the emitter half
/// (`air::Program` → assembly text) is driven separately by
/// [`emit::emit_program`] once an air program is available, per spec 5's
/// "analyzer → emitter hands off the decorated AST, symbol table, and air
/// program" ownership transfer.
pub fn analyze(tu: &mut TranslationUnit, options: Options) -> (symtab::SymbolTable, Diagnostics) {
    let mut analyzer = SemanticAnalyzer::new(options);
    analyzer.analyze(tu);
    (analyzer.symbols, analyzer.diagnostics)
}
