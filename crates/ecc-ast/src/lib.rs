//! Shared AST, type model, and traversal for the `ecc` C89/C99 semantic
//! analyzer and x86-64 emitter. No parser lives here: nodes are built and
//! decorated by `ecc`, the same split the teacher draws between `lang-c`
//! (pure syntax) and its consumer.

pub mod ast;
pub mod span;
pub mod traverse;
pub mod types;
