//! Typing for the fixed set of `__ecc_*` intrinsics a call expression may
//! name instead of an ordinary function (spec 4.5 "Intrinsics recognized
//! by the analyzer"). Dispatched by a static name → arity/return table
//! rather than a chain of string comparisons, per the spec's own
//! preference for "a small static lookup mapping intrinsic name →
//! handler".

use ecc_ast::ast::Expression;
use ecc_ast::span::{Location, Node};
use ecc_ast::types::Type;
use once_cell::sync::Lazy;

use super::expr::Typed;
use super::SemanticAnalyzer;

struct Intrinsic {
    name: &'static str,
    arity: usize,
}

static INTRINSICS: Lazy<[Intrinsic; 5]> = Lazy::new(|| {
    [
        Intrinsic { name: "__ecc_va_start", arity: 2 },
        Intrinsic { name: "__ecc_va_end", arity: 1 },
        Intrinsic { name: "__ecc_lsys_open", arity: 3 },
        Intrinsic { name: "__ecc_lsys_close", arity: 1 },
        Intrinsic { name: "__ecc_lsys_read", arity: 3 },
    ]
});

/// Returns `Some` (the call's type) if `name` names a recognized
/// intrinsic, `None` if it should be typed as an ordinary call.
///
/// `__ecc_va_arg` is the one intrinsic whose result type depends on its
/// argument list rather than a fixed signature — its second argument is
/// a type name, not an expression, so its typing lives on
/// [`ecc_ast::ast::VaArgExpression`] instead of being reached through an
/// ordinary [`ecc_ast::ast::CallExpression`]; this function only handles
/// the remaining five, which are ordinary calls syntactically.
pub fn type_intrinsic(
    analyzer: &mut SemanticAnalyzer,
    name: &str,
    arguments: &[Node<Expression>],
    loc: Location,
) -> Option<Typed> {
    let intrinsic = INTRINSICS.iter().find(|i| i.name == name)?;
    if arguments.len() != intrinsic.arity {
        analyzer.diagnostics.error(
            loc,
            format!("'{}' expects {} argument(s)", intrinsic.name, intrinsic.arity),
        );
    }
    let ty = match name {
        "__ecc_va_start" | "__ecc_va_end" => Type::void(),
        "__ecc_lsys_open" | "__ecc_lsys_close" => Type::int(),
        "__ecc_lsys_read" => Type::ptrdiff_t(),
        _ => Type::error(),
    };
    Some(Typed { ty, is_lvalue: false })
}
