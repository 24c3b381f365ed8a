//! The `register`-storage check for unary `&` (spec 4.5, Open Question 3).
//!
//! `&x` is forbidden not just when `x` is itself declared `register`, but
//! when `x` is a member-access or array-subscript chain rooted at such an
//! object — `&s.field` on a `register struct s` is exactly as invalid as
//! `&s`. The chain breaks at the first pointer dereference: `p[i]` and
//! `p->field` always name an object reached through the pointer's value,
//! never the storage `p` itself occupies, so they're always addressable
//! regardless of what storage class `p` was declared with.

use ecc_ast::ast::{BinaryOperator, Expression, ExpressionKind, MemberOperator};
use ecc_ast::span::Node;

use super::SemanticAnalyzer;

pub fn operand_uses_register_storage(analyzer: &SemanticAnalyzer, expr: &Node<Expression>) -> bool {
    match &expr.node.kind {
        ExpressionKind::Identifier(id) => id
            .node
            .symbol
            .map(|sym| analyzer.symbols.get(sym).is_register)
            .unwrap_or(false),
        ExpressionKind::Member(m) if m.node.operator == MemberOperator::Direct => {
            operand_uses_register_storage(analyzer, &m.node.expression)
        }
        ExpressionKind::BinaryOperator(b) if b.node.operator == BinaryOperator::Index => {
            let base_is_array = b
                .node
                .lhs
                .node
                .ty
                .as_ref()
                .map(|t| t.is_array())
                .unwrap_or(false);
            base_is_array && operand_uses_register_storage(analyzer, &b.node.lhs)
        }
        _ => false,
    }
}
