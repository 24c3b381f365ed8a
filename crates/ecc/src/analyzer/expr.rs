//! Expression typing (spec 4.5 "Expression typing").
//!
//! Invoked post-order (children already typed) from
//! [`super::SemanticAnalyzer`]'s `after_expression` hook. Each function
//! here computes `(Type, is_lvalue)` for one expression kind; the caller
//! writes both back onto the node.

use ecc_ast::ast::*;
use ecc_ast::span::{Location, Node};
use ecc_ast::types::*;

use super::SemanticAnalyzer;
use crate::constexpr::{self, ConstValue};
use crate::symtab::{Namespace, SymbolTable};

pub struct Typed {
    pub ty: Type,
    pub is_lvalue: bool,
}

impl Typed {
    fn rvalue(ty: Type) -> Typed {
        Typed { ty, is_lvalue: false }
    }
    fn lvalue(ty: Type) -> Typed {
        Typed { ty, is_lvalue: true }
    }
    fn error() -> Typed {
        Typed { ty: Type::error(), is_lvalue: false }
    }
}

/// An integer constant expression equal to zero, optionally cast to
/// `void*` with no qualifiers (spec 4.5 "Null-pointer constant").
pub fn is_null_pointer_constant(expr: &Node<Expression>, symtab: &SymbolTable) -> bool {
    match &expr.node.kind {
        ExpressionKind::Cast(c) => {
            let is_void_ptr = expr
                .node
                .ty
                .as_ref()
                .map(|t| t.is_pointer() && t.pointee().map(Type::is_void).unwrap_or(false) && t.qualifiers.is_empty())
                .unwrap_or(false);
            is_void_ptr && is_null_pointer_constant(&c.node.expression, symtab)
        }
        _ => expr
            .node
            .ty
            .as_ref()
            .map(Type::is_integer)
            .unwrap_or(false)
            && constexpr::evaluate(expr, symtab)
                .map(|v| v.equals_zero())
                .unwrap_or(false),
    }
}

/// `can_assign` (spec 4.5).
pub fn can_assign(lhs: &Type, rhs: &Type, rhs_expr: &Node<Expression>, symtab: &SymbolTable) -> bool {
    if lhs.is_error() || rhs.is_error() {
        return true;
    }
    if lhs.is_arithmetic() && rhs.is_arithmetic() {
        return true;
    }
    if lhs.is_struct_or_union() && rhs.is_struct_or_union() {
        return lhs.compatible(rhs, true);
    }
    if lhs.is_pointer() && rhs.is_pointer() {
        let lp = lhs.pointee().unwrap();
        let rp = rhs.pointee().unwrap();
        let qualifier_ok = lhs.qualifiers.is_superset_of(rhs.qualifiers);
        if lp.compatible(rp, true) && qualifier_ok {
            return true;
        }
        if (lp.is_void() || rp.is_void()) && qualifier_ok {
            return true;
        }
        return false;
    }
    if lhs.is_pointer() && is_null_pointer_constant(rhs_expr, symtab) {
        return true;
    }
    if matches!(lhs.kind, TypeKind::Bool) && rhs.is_pointer() {
        return true;
    }
    false
}

/// Whether `expr` names a bit-field member — `&` and `sizeof` both forbid
/// a bit-field operand (C99 6.5.3.4 §1, 6.5.3.2 §1).
fn is_bit_field_operand(expr: &Node<Expression>) -> bool {
    matches!(&expr.node.kind, ExpressionKind::Member(m) if m.node.is_bit_field)
}

pub fn type_expression(analyzer: &mut SemanticAnalyzer, expr: &mut Node<Expression>) {
    let loc = expr.location();
    let typed = match &mut expr.node.kind {
        ExpressionKind::Identifier(id) => type_identifier(analyzer, &mut **id, loc),
        ExpressionKind::Constant(c) => type_constant(&c.node),
        ExpressionKind::StringLiteral(s) => type_string_literal(analyzer, &mut **s),
        ExpressionKind::Member(m) => type_member(analyzer, &mut **m, loc),
        ExpressionKind::Call(c) => type_call(analyzer, &mut **c, loc),
        ExpressionKind::CompoundLiteral(c) => type_compound_literal(analyzer, &mut **c, loc),
        ExpressionKind::SizeOfType(t) => type_sizeof_type(analyzer, &**t, loc),
        ExpressionKind::SizeOfExpr(e) => type_sizeof_expr(analyzer, &mut **e, loc),
        ExpressionKind::UnaryOperator(u) => type_unary(analyzer, &mut **u, loc),
        ExpressionKind::Cast(c) => type_cast(analyzer, &mut **c, loc),
        ExpressionKind::BinaryOperator(b) => type_binary(analyzer, &mut **b, loc),
        ExpressionKind::Conditional(c) => type_conditional(analyzer, &mut **c, loc),
        ExpressionKind::Comma(exprs) => type_comma(&**exprs),
        ExpressionKind::VaArg(v) => type_va_arg(analyzer, &mut **v, loc),
    };
    expr.node.ty = Some(typed.ty);
    expr.node.is_lvalue = typed.is_lvalue;
}

fn type_identifier(analyzer: &mut SemanticAnalyzer, id: &mut Node<Identifier>, loc: Location) -> Typed {
    match analyzer.symbols.lookup(&id.node.name, Namespace::Ordinary) {
        Some(sym_id) => {
            id.node.symbol = Some(sym_id);
            let sym = analyzer.symbols.get(sym_id);
            let is_function = sym.ty.is_function();
            Typed { ty: sym.ty.clone(), is_lvalue: !is_function }
        }
        None => {
            analyzer
                .diagnostics
                .error(loc, format!("use of undeclared identifier '{}'", id.node.name));
            Typed::error()
        }
    }
}

fn type_constant(constant: &Constant) -> Typed {
    match constant {
        Constant::Integer(i) => {
            let rank = match i.suffix.size {
                IntegerSize::Int => IntRank::Int,
                IntegerSize::Long => IntRank::Long,
                IntegerSize::LongLong => IntRank::LongLong,
            };
            let signedness = if i.suffix.unsigned { Signedness::Unsigned } else { Signedness::Signed };
            Typed::rvalue(Type::new(TypeKind::Int(rank, signedness)))
        }
        Constant::Float(f) => Typed::rvalue(Type::new(TypeKind::Float(match f.suffix {
            FloatSuffix::Float => FloatKind::Float,
            FloatSuffix::Double => FloatKind::Double,
            FloatSuffix::LongDouble => FloatKind::LongDouble,
        }))),
        // A character constant has type `int` in C, not `char` (C11 6.4.4.4 §10).
        Constant::Character(_) => Typed::rvalue(Type::int()),
    }
}

fn type_string_literal(analyzer: &mut SemanticAnalyzer, literal: &mut Node<StringLiteral>) -> Typed {
    let mut bytes = literal.node.bytes.clone();
    bytes.push(0);
    let ty = Type::new(TypeKind::Array(ArrayType {
        element: Box::new(Type::new(TypeKind::Char(Signedness::Plain))),
        len: ArrayLen::Known(bytes.len() as u64),
    }));
    let name = analyzer.fresh_label("__sl");
    let sym = analyzer
        .symbols
        .declare_synthetic(name, ty.clone(), crate::symtab::StorageDuration::Static);
    analyzer.symbols.get_mut(sym).init_data = Some(bytes);
    literal.node.symbol = Some(sym);
    Typed::lvalue(ty)
}

fn type_member(analyzer: &mut SemanticAnalyzer, m: &mut Node<MemberExpression>, loc: Location) -> Typed {
    let aggregate_ty = match m.node.expression.node.ty.clone() {
        Some(t) => t,
        None => return Typed::error(),
    };
    let record_ty = match m.node.operator {
        MemberOperator::Direct => aggregate_ty.clone(),
        MemberOperator::Indirect => match aggregate_ty.pointee() {
            Some(p) => p.clone(),
            None => {
                analyzer.diagnostics.error(loc, "member reference type is not a pointer");
                return Typed::error();
            }
        },
    };
    let record = match &record_ty.kind {
        TypeKind::Struct(r) | TypeKind::Union(r) => r.clone(),
        _ => {
            analyzer
                .diagnostics
                .error(loc, "member reference base type is not a structure or union");
            return Typed::error();
        }
    };
    let members = match &record.members {
        Some(m) => m,
        None => {
            analyzer.diagnostics.error(loc, "incomplete type used in member reference");
            return Typed::error();
        }
    };
    match members.iter().find(|mem| mem.name == m.node.identifier.node.name) {
        Some(member) => {
            let qualifiers = Type::union_qualifiers(member.ty.qualifiers, record_ty.qualifiers);
            m.node.is_bit_field = member.bit_width.is_some();
            Typed::lvalue(member.ty.clone().with_qualifiers(qualifiers))
        }
        None => {
            analyzer
                .diagnostics
                .error(loc, format!("no member named '{}'", m.node.identifier.node.name));
            Typed::error()
        }
    }
}

fn type_call(analyzer: &mut SemanticAnalyzer, c: &mut Node<CallExpression>, loc: Location) -> Typed {
    if let ExpressionKind::Identifier(id) = &c.node.callee.node.kind {
        if let Some(result) = super::intrinsics::type_intrinsic(analyzer, &id.node.name, &c.node.arguments, loc) {
            return result;
        }
    }
    let callee_ty = match c.node.callee.node.ty.clone() {
        Some(t) => t,
        None => return Typed::error(),
    };
    let function_ty = if callee_ty.is_pointer() {
        callee_ty.pointee().cloned().unwrap_or_else(Type::error)
    } else {
        callee_ty
    };
    let func = match &function_ty.kind {
        TypeKind::Function(f) => f.clone(),
        _ => {
            analyzer.diagnostics.error(loc, "called object is not a function or function pointer");
            return Typed::error();
        }
    };
    if !func.prototyped {
        analyzer
            .diagnostics
            .warning(loc, "call through a function with no visible prototype; argument types assumed");
    } else if !func.variadic && func.params.len() != c.node.arguments.len() {
        analyzer.diagnostics.error(loc, "too few or too many arguments to function call");
    }
    Typed::rvalue((*func.return_type).clone())
}

fn type_compound_literal(analyzer: &mut SemanticAnalyzer, c: &mut Node<CompoundLiteral>, loc: Location) -> Typed {
    let ty = super::decl::resolve_type_name(&c.node.type_name.node, &mut analyzer.symbols, &mut analyzer.diagnostics, loc);
    let label = analyzer.fresh_label("__cl");
    c.node.label = Some(label.clone());
    super::init::elaborate_initializer_list(analyzer, &mut c.node.initializer_list, &ty, loc);
    Typed::lvalue(ty)
}

fn type_sizeof_type(analyzer: &mut SemanticAnalyzer, t: &Node<TypeName>, loc: Location) -> Typed {
    let ty = super::decl::resolve_type_name(&t.node, &mut analyzer.symbols, &mut analyzer.diagnostics, loc);
    if ty.is_function() || !ty.is_complete() {
        analyzer.diagnostics.error(loc, "invalid application of 'sizeof' to an incomplete or function type");
    }
    Typed::rvalue(Type::size_t())
}

fn type_sizeof_expr(analyzer: &mut SemanticAnalyzer, e: &mut Node<Expression>, loc: Location) -> Typed {
    let ty = e.node.ty.clone().unwrap_or_else(Type::error);
    if ty.is_function() || !ty.is_complete() {
        analyzer.diagnostics.error(loc, "invalid application of 'sizeof' to an incomplete or function type");
    }
    if is_bit_field_operand(e) {
        analyzer.diagnostics.error(loc, "invalid application of 'sizeof' to a bit-field");
    }
    Typed::rvalue(Type::size_t())
}

fn type_unary(analyzer: &mut SemanticAnalyzer, u: &mut Node<UnaryOperatorExpression>, loc: Location) -> Typed {
    let operand_ty = u.node.operand.node.ty.clone().unwrap_or_else(Type::error);
    let operand_is_lvalue = u.node.operand.node.is_lvalue;
    match u.node.operator {
        UnaryOperator::Address => {
            if is_bit_field_operand(&u.node.operand) {
                analyzer.diagnostics.error(loc, "cannot take the address of a bit-field");
                return Typed::error();
            }
            let allowed_non_lvalue = matches!(
                &u.node.operand.node.kind,
                ExpressionKind::UnaryOperator(inner) if inner.node.operator == UnaryOperator::Indirection
            ) || matches!(&u.node.operand.node.kind, ExpressionKind::BinaryOperator(b) if b.node.operator == BinaryOperator::Index)
                || operand_ty.is_function();
            if !operand_is_lvalue && !allowed_non_lvalue {
                analyzer.diagnostics.error(loc, "cannot take the address of an rvalue");
                return Typed::error();
            }
            if super::regcheck::operand_uses_register_storage(analyzer, &*u.node.operand) {
                analyzer.diagnostics.error(
                    loc,
                    "cannot request address of an object declared with the 'register' storage class specifier",
                );
                return Typed::error();
            }
            Typed::rvalue(Type::pointer_to(operand_ty))
        }
        UnaryOperator::Indirection => match operand_ty.pointee() {
            Some(p) => Typed::lvalue(p.clone()),
            None => {
                analyzer.diagnostics.error(loc, "indirection requires a pointer operand");
                Typed::error()
            }
        },
        UnaryOperator::PostIncrement
        | UnaryOperator::PostDecrement
        | UnaryOperator::PreIncrement
        | UnaryOperator::PreDecrement => {
            if !operand_is_lvalue {
                analyzer.diagnostics.error(loc, "expression is not assignable");
            }
            Typed::rvalue(operand_ty.unqualified())
        }
        UnaryOperator::Plus | UnaryOperator::Minus | UnaryOperator::Complement => {
            if !operand_ty.is_arithmetic() {
                analyzer.diagnostics.error(loc, "invalid argument type to unary operator");
                return Typed::error();
            }
            Typed::rvalue(operand_ty.integer_promote())
        }
        UnaryOperator::Negate => {
            if !operand_ty.is_scalar() {
                analyzer.diagnostics.error(loc, "invalid argument type to unary '!'");
            }
            Typed::rvalue(Type::int())
        }
    }
}

fn type_cast(analyzer: &mut SemanticAnalyzer, c: &mut Node<CastExpression>, loc: Location) -> Typed {
    let ty = super::decl::resolve_type_name(&c.node.type_name.node, &mut analyzer.symbols, &mut analyzer.diagnostics, loc);
    if !ty.is_scalar() && !ty.is_void() {
        analyzer.diagnostics.error(loc, "cast to a type that is neither scalar nor void");
    }
    Typed::rvalue(ty)
}

fn type_binary(analyzer: &mut SemanticAnalyzer, b: &mut Node<BinaryOperatorExpression>, loc: Location) -> Typed {
    if b.node.operator.is_assignment() {
        return type_assignment(analyzer, b, loc);
    }
    let lhs = b.node.lhs.node.ty.clone().unwrap_or_else(Type::error);
    let rhs = b.node.rhs.node.ty.clone().unwrap_or_else(Type::error);
    use BinaryOperator::*;
    match b.node.operator {
        Index => {
            let (agg, idx) = if lhs.is_array() || lhs.is_pointer() { (&lhs, &rhs) } else { (&rhs, &lhs) };
            if !(agg.is_array() || agg.is_pointer()) || !idx.is_integer() {
                analyzer.diagnostics.error(loc, "subscripted value is neither array nor pointer");
                return Typed::error();
            }
            let element = agg.array_element().or_else(|| agg.pointee()).cloned().unwrap_or_else(Type::error);
            Typed::lvalue(element)
        }
        Multiply | Divide => {
            if !lhs.is_arithmetic() || !rhs.is_arithmetic() {
                analyzer.diagnostics.error(loc, "invalid operands to binary expression");
                return Typed::error();
            }
            Typed::rvalue(lhs.usual_arithmetic_conversions(&rhs))
        }
        Modulo | ShiftLeft | ShiftRight | BitwiseAnd | BitwiseXor | BitwiseOr => {
            if !lhs.is_integer() || !rhs.is_integer() {
                analyzer.diagnostics.error(loc, "invalid operands to binary expression");
                return Typed::error();
            }
            Typed::rvalue(if matches!(b.node.operator, ShiftLeft | ShiftRight) {
                lhs.integer_promote()
            } else {
                lhs.usual_arithmetic_conversions(&rhs)
            })
        }
        Plus => {
            if lhs.is_arithmetic() && rhs.is_arithmetic() {
                Typed::rvalue(lhs.usual_arithmetic_conversions(&rhs))
            } else if lhs.is_pointer() && rhs.is_integer() {
                require_object_pointer(analyzer, &lhs, loc);
                Typed::rvalue(lhs)
            } else if rhs.is_pointer() && lhs.is_integer() {
                require_object_pointer(analyzer, &rhs, loc);
                Typed::rvalue(rhs)
            } else {
                analyzer.diagnostics.error(loc, "invalid operands to binary expression");
                Typed::error()
            }
        }
        Minus => {
            if lhs.is_arithmetic() && rhs.is_arithmetic() {
                Typed::rvalue(lhs.usual_arithmetic_conversions(&rhs))
            } else if lhs.is_pointer() && rhs.is_integer() {
                require_object_pointer(analyzer, &lhs, loc);
                Typed::rvalue(lhs)
            } else if lhs.is_pointer() && rhs.is_pointer() {
                require_object_pointer(analyzer, &lhs, loc);
                Typed::rvalue(Type::ptrdiff_t())
            } else {
                analyzer.diagnostics.error(loc, "invalid operands to binary expression");
                Typed::error()
            }
        }
        Less | Greater | LessOrEqual | GreaterOrEqual | Equals | NotEquals => {
            if !(lhs.is_arithmetic() && rhs.is_arithmetic()) && !(lhs.is_pointer() && rhs.is_pointer()) {
                analyzer.diagnostics.error(loc, "comparison of invalid operand types");
            }
            Typed::rvalue(Type::int())
        }
        LogicalAnd | LogicalOr => {
            if !lhs.is_scalar() || !rhs.is_scalar() {
                analyzer.diagnostics.error(loc, "invalid operands to logical operator");
            }
            Typed::rvalue(Type::int())
        }
        _ => unreachable!("assignment operators handled above"),
    }
}

fn require_object_pointer(analyzer: &mut SemanticAnalyzer, ty: &Type, loc: Location) {
    if let Some(pointee) = ty.pointee() {
        if !pointee.is_object() {
            analyzer
                .diagnostics
                .error(loc, "pointer arithmetic on a pointer to a non-object type");
        }
    }
}

fn type_assignment(analyzer: &mut SemanticAnalyzer, b: &mut Node<BinaryOperatorExpression>, loc: Location) -> Typed {
    let lhs_ty = b.node.lhs.node.ty.clone().unwrap_or_else(Type::error);
    if !b.node.lhs.node.is_lvalue {
        analyzer.diagnostics.error(loc, "expression is not assignable");
        return Typed::rvalue(lhs_ty.unqualified());
    }
    if lhs_ty.qualifiers.contains(Qualifiers::CONST) {
        analyzer.diagnostics.error(loc, "cannot assign to a variable with 'const'-qualified type");
    }
    if let Some(underlying) = b.node.operator.underlying() {
        let rhs_ty = b.node.rhs.node.ty.clone().unwrap_or_else(Type::error);
        let ok = match underlying {
            BinaryOperator::Plus | BinaryOperator::Minus => {
                (lhs_ty.is_arithmetic() && rhs_ty.is_arithmetic()) || (lhs_ty.is_pointer() && rhs_ty.is_integer())
            }
            BinaryOperator::Multiply | BinaryOperator::Divide => lhs_ty.is_arithmetic() && rhs_ty.is_arithmetic(),
            _ => lhs_ty.is_integer() && rhs_ty.is_integer(),
        };
        if !ok {
            analyzer.diagnostics.error(loc, "invalid operand types for compound assignment");
        }
    } else if !can_assign(&lhs_ty, &b.node.rhs.node.ty.clone().unwrap_or_else(Type::error), &b.node.rhs, &analyzer.symbols) {
        analyzer.diagnostics.error(loc, "assigning to incompatible type");
    }
    Typed::rvalue(lhs_ty.unqualified())
}

fn type_conditional(analyzer: &mut SemanticAnalyzer, c: &mut Node<ConditionalExpression>, loc: Location) -> Typed {
    let then_ty = c.node.then_expression.node.ty.clone().unwrap_or_else(Type::error);
    let else_ty = c.node.else_expression.node.ty.clone().unwrap_or_else(Type::error);

    if then_ty.is_arithmetic() && else_ty.is_arithmetic() {
        return Typed::rvalue(then_ty.usual_arithmetic_conversions(&else_ty));
    }
    if then_ty.is_struct_or_union() && else_ty.is_struct_or_union() && then_ty.compatible(&else_ty, true) {
        return Typed::rvalue(then_ty);
    }
    if then_ty.is_void() && else_ty.is_void() {
        return Typed::rvalue(Type::void());
    }
    if then_ty.is_pointer() && else_ty.is_pointer() {
        let qualifiers = Type::union_qualifiers(then_ty.qualifiers, else_ty.qualifiers);
        return Typed::rvalue(then_ty.composite(&else_ty).with_qualifiers(qualifiers));
    }
    if then_ty.is_pointer() && is_null_pointer_constant(&c.node.else_expression, &analyzer.symbols) {
        return Typed::rvalue(then_ty);
    }
    if else_ty.is_pointer() && is_null_pointer_constant(&c.node.then_expression, &analyzer.symbols) {
        return Typed::rvalue(else_ty);
    }
    if then_ty.is_pointer() && else_ty.is_pointer() {
        return Typed::rvalue(then_ty);
    }
    analyzer.diagnostics.error(loc, "incompatible operand types in conditional expression");
    Typed::error()
}

fn type_comma(exprs: &[Node<Expression>]) -> Typed {
    match exprs.last() {
        Some(last) => Typed { ty: last.node.ty.clone().unwrap_or_else(Type::error), is_lvalue: last.node.is_lvalue },
        None => Typed::error(),
    }
}

fn type_va_arg(analyzer: &mut SemanticAnalyzer, v: &mut Node<VaArgExpression>, loc: Location) -> Typed {
    let ty = super::decl::resolve_type_name(&v.node.type_name.node, &mut analyzer.symbols, &mut analyzer.diagnostics, loc);
    Typed::rvalue(ty)
}

pub fn evaluate_const(expr: &Node<Expression>, symtab: &SymbolTable) -> Option<ConstValue> {
    constexpr::evaluate(expr, symtab).ok()
}
