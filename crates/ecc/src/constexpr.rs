//! Constant-expression evaluator (spec 4.3).
//!
//! A small recursive evaluator over [`ecc_ast::ast::Expression`] trees that
//! either folds to a [`ConstValue`] or fails with a message describing why
//! (not every expression is a constant expression — this is an ordinary
//! `Result`, not a [`crate::diagnostics::Diagnostics`] entry, since the
//! analyzer decides case-by-case whether a failure here is itself a
//! diagnostic or just "not constant, fall through to runtime codegen").

use ecc_ast::ast::{self, BinaryOperator, Constant, Expression, ExpressionKind, UnaryOperator};
use ecc_ast::span::Node;
use ecc_ast::types::{Signedness, Type};

use crate::symtab::{SymbolId, SymbolTable};

/// Integer class: width in bytes plus signedness, used for the modular
/// reduction `integer` conversions require (spec 4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntClass {
    pub width: u32,
    pub unsigned: bool,
}

impl IntClass {
    pub fn from_type(ty: &Type) -> IntClass {
        IntClass {
            width: ty.size_bytes().unwrap_or(4) as u32,
            unsigned: is_unsigned_type(ty),
        }
    }
}

fn is_unsigned_type(ty: &Type) -> bool {
    matches!(
        &ty.kind,
        ecc_ast::types::TypeKind::Char(Signedness::Unsigned)
            | ecc_ast::types::TypeKind::Int(_, Signedness::Unsigned)
            | ecc_ast::types::TypeKind::Bool
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Integer { value: i128, class: IntClass },
    Arithmetic(f64),
    /// `symbol + signed offset`, e.g. `&array[3]` or a string literal.
    Address { symbol: SymbolId, offset: i64 },
    Error(String),
}

impl ConstValue {
    pub fn is_error(&self) -> bool {
        matches!(self, ConstValue::Error(_))
    }

    pub fn equals_zero(&self) -> bool {
        match self {
            ConstValue::Integer { value, .. } => *value == 0,
            ConstValue::Arithmetic(f) => *f == 0.0,
            _ => false,
        }
    }

    /// Converts an integer value to a target class, reducing modulo the
    /// target width and reinterpreting signedness (spec 4.3).
    pub fn convert_integer(&self, target: IntClass) -> ConstValue {
        match self {
            ConstValue::Integer { value, .. } => {
                ConstValue::Integer { value: reduce(*value, target), class: target }
            }
            ConstValue::Arithmetic(f) => {
                ConstValue::Integer { value: reduce(*f as i128, target), class: target }
            }
            other => other.clone(),
        }
    }

    /// Serializes into a little-endian byte buffer, per the target's
    /// width (spec 3 "Constant-expression value ... serialization").
    pub fn to_bytes(&self, width: u32) -> Vec<u8> {
        match self {
            ConstValue::Integer { value, .. } => {
                let bits = reduce(*value, IntClass { width, unsigned: true });
                (bits as u64).to_le_bytes()[..width as usize].to_vec()
            }
            ConstValue::Arithmetic(f) => {
                if width == 4 {
                    (*f as f32).to_le_bytes().to_vec()
                } else {
                    f.to_le_bytes().to_vec()
                }
            }
            ConstValue::Address { .. } | ConstValue::Error(_) => vec![0; width as usize],
        }
    }
}

fn reduce(value: i128, class: IntClass) -> i128 {
    if class.width >= 16 {
        return value;
    }
    let bits = class.width * 8;
    let modulus = 1i128 << bits;
    let mut v = value.rem_euclid(modulus);
    if !class.unsigned && v >= modulus / 2 {
        v -= modulus;
    }
    v
}

/// Evaluates an expression as a constant expression. Succeeds only when
/// every leaf is a literal, a `sizeof` of a complete type, an enumeration
/// constant, or an address constant, optionally combined with pointer
/// arithmetic by an integer constant (spec 4.3).
pub fn evaluate(expr: &Node<Expression>, symtab: &SymbolTable) -> Result<ConstValue, String> {
    match &expr.node.kind {
        ExpressionKind::Constant(c) => evaluate_literal(&c.node),
        ExpressionKind::Identifier(id) => evaluate_identifier(&id.node, symtab),
        ExpressionKind::SizeOfType(_) | ExpressionKind::SizeOfExpr(_) => {
            let ty = expr
                .node
                .ty
                .as_ref()
                .ok_or_else(|| "sizeof operand has no computed type".to_string())?;
            match ty.size_bytes() {
                Some(size) => Ok(ConstValue::Integer {
                    value: size as i128,
                    class: IntClass { width: 8, unsigned: true },
                }),
                None => Err("sizeof of an incomplete type is not a constant expression".into()),
            }
        }
        ExpressionKind::UnaryOperator(u) => evaluate_unary(&u.node, symtab),
        ExpressionKind::BinaryOperator(b) => evaluate_binary(&b.node, symtab),
        ExpressionKind::Cast(c) => evaluate_cast(&c.node, symtab),
        ExpressionKind::Conditional(c) => {
            let cond = evaluate(&c.node.condition, symtab)?;
            if cond.equals_zero() {
                evaluate(&c.node.else_expression, symtab)
            } else {
                evaluate(&c.node.then_expression, symtab)
            }
        }
        // A string literal used as a value decays to the address of its
        // first byte, same as `&literal` (spec 4.3 "address constant").
        ExpressionKind::StringLiteral(s) => s
            .node
            .symbol
            .map(|symbol| ConstValue::Address { symbol, offset: 0 })
            .ok_or_else(|| "string literal has no materialized symbol".into()),
        _ => Err("not a constant expression".into()),
    }
}

fn evaluate_literal(constant: &Constant) -> Result<ConstValue, String> {
    match constant {
        Constant::Integer(i) => {
            let radix = match i.base {
                ast::IntegerBase::Decimal => 10,
                ast::IntegerBase::Octal => 8,
                ast::IntegerBase::Hexadecimal => 16,
            };
            let value = i128::from_str_radix(&i.digits, radix)
                .map_err(|e| format!("invalid integer literal: {}", e))?;
            let width = match i.suffix.size {
                ast::IntegerSize::Int => 4,
                ast::IntegerSize::Long | ast::IntegerSize::LongLong => 8,
            };
            Ok(ConstValue::Integer {
                value,
                class: IntClass { width, unsigned: i.suffix.unsigned },
            })
        }
        Constant::Float(f) => {
            let value: f64 = f
                .digits
                .parse()
                .map_err(|e| format!("invalid floating literal: {}", e))?;
            Ok(ConstValue::Arithmetic(value))
        }
        Constant::Character(s) => {
            let byte = s.bytes().next().unwrap_or(0);
            Ok(ConstValue::Integer {
                value: byte as i128,
                class: IntClass { width: 4, unsigned: false },
            })
        }
    }
}

fn evaluate_identifier(id: &ast::Identifier, symtab: &SymbolTable) -> Result<ConstValue, String> {
    let sym = id
        .symbol
        .ok_or_else(|| "identifier is not a constant expression".to_string())?;
    match symtab.get(sym).enum_value {
        Some(value) => Ok(ConstValue::Integer {
            value: value as i128,
            class: IntClass { width: 4, unsigned: false },
        }),
        None => Err("identifier is not an enumeration constant".into()),
    }
}

fn evaluate_unary(u: &ast::UnaryOperatorExpression, symtab: &SymbolTable) -> Result<ConstValue, String> {
    match u.operator {
        UnaryOperator::Address => evaluate_address(&u.operand, symtab),
        UnaryOperator::Plus => evaluate(&u.operand, symtab),
        UnaryOperator::Minus => match evaluate(&u.operand, symtab)? {
            ConstValue::Integer { value, class } => Ok(ConstValue::Integer { value: reduce(-value, class), class }),
            ConstValue::Arithmetic(f) => Ok(ConstValue::Arithmetic(-f)),
            other => Err(format!("cannot negate {:?}", other)),
        },
        UnaryOperator::Complement => match evaluate(&u.operand, symtab)? {
            ConstValue::Integer { value, class } => Ok(ConstValue::Integer { value: reduce(!value, class), class }),
            other => Err(format!("cannot complement {:?}", other)),
        },
        UnaryOperator::Negate => match evaluate(&u.operand, symtab)? {
            v => Ok(ConstValue::Integer {
                value: if v.equals_zero() { 1 } else { 0 },
                class: IntClass { width: 4, unsigned: false },
            }),
        },
        _ => Err("operator is not valid in a constant expression".into()),
    }
}

/// Address constants: `&identifier`, `&string-literal`, `&compound-literal`,
/// with optional pointer arithmetic by an integer constant.
fn evaluate_address(expr: &Node<Expression>, symtab: &SymbolTable) -> Result<ConstValue, String> {
    match &expr.node.kind {
        ExpressionKind::Identifier(id) => id
            .node
            .symbol
            .map(|symbol| ConstValue::Address { symbol, offset: 0 })
            .ok_or_else(|| "address-of an unresolved identifier".into()),
        ExpressionKind::StringLiteral(s) => s
            .node
            .symbol
            .map(|symbol| ConstValue::Address { symbol, offset: 0 })
            .ok_or_else(|| "string literal has no materialized symbol".into()),
        ExpressionKind::BinaryOperator(b)
            if matches!(b.node.operator, BinaryOperator::Index) =>
        {
            let base = evaluate_address(&b.node.lhs, symtab)?;
            let index = evaluate(&b.node.rhs, symtab)?;
            let element_size = expr.node.ty.as_ref().and_then(Type::size_bytes).unwrap_or(1) as i64;
            match (base, index) {
                (ConstValue::Address { symbol, offset }, ConstValue::Integer { value, .. }) => {
                    Ok(ConstValue::Address { symbol, offset: offset + value as i64 * element_size })
                }
                _ => Err("non-constant array index in address constant".into()),
            }
        }
        _ => Err("operand of '&' is not an address constant".into()),
    }
}

// A pointer cast to `void *` of a null-pointer constant is still the same
// integer value; pointer-valued cast targets otherwise leave address/
// integer constants untouched here, since pointer representation
// conversion has no bit-pattern effect in this port's constant folding.
fn evaluate_cast(c: &ast::CastExpression, symtab: &SymbolTable) -> Result<ConstValue, String> {
    evaluate(&c.expression, symtab)
}

fn evaluate_binary(b: &ast::BinaryOperatorExpression, symtab: &SymbolTable) -> Result<ConstValue, String> {
    let lhs = evaluate(&b.lhs, symtab)?;
    let rhs = evaluate(&b.rhs, symtab)?;
    use BinaryOperator::*;
    match (b.operator, lhs, rhs) {
        (Plus, ConstValue::Address { symbol, offset }, ConstValue::Integer { value, .. })
        | (Plus, ConstValue::Integer { value, .. }, ConstValue::Address { symbol, offset }) => {
            Ok(ConstValue::Address { symbol, offset: offset + value as i64 })
        }
        (Minus, ConstValue::Address { symbol, offset }, ConstValue::Integer { value, .. }) => {
            Ok(ConstValue::Address { symbol, offset: offset - value as i64 })
        }
        (op, ConstValue::Integer { value: a, class: ca }, ConstValue::Integer { value: b, class: cb }) => {
            let class = if ca.width >= cb.width { ca } else { cb };
            let result = integer_binop(op, a, b)?;
            Ok(ConstValue::Integer { value: reduce(result, class), class })
        }
        (op, ConstValue::Arithmetic(a), ConstValue::Arithmetic(b)) => {
            Ok(ConstValue::Arithmetic(float_binop(op, a, b)?))
        }
        (op, ConstValue::Integer { value, .. }, ConstValue::Arithmetic(b)) => {
            Ok(ConstValue::Arithmetic(float_binop(op, value as f64, b)?))
        }
        (op, ConstValue::Arithmetic(a), ConstValue::Integer { value, .. }) => {
            Ok(ConstValue::Arithmetic(float_binop(op, a, value as f64)?))
        }
        _ => Err("operands are not constant expressions".into()),
    }
}

fn integer_binop(op: BinaryOperator, a: i128, b: i128) -> Result<i128, String> {
    use BinaryOperator::*;
    Ok(match op {
        Multiply => a * b,
        Divide => a.checked_div(b).ok_or("division by zero in constant expression")?,
        Modulo => a.checked_rem(b).ok_or("modulo by zero in constant expression")?,
        Plus => a + b,
        Minus => a - b,
        ShiftLeft => a << b,
        ShiftRight => a >> b,
        Less => (a < b) as i128,
        Greater => (a > b) as i128,
        LessOrEqual => (a <= b) as i128,
        GreaterOrEqual => (a >= b) as i128,
        Equals => (a == b) as i128,
        NotEquals => (a != b) as i128,
        BitwiseAnd => a & b,
        BitwiseXor => a ^ b,
        BitwiseOr => a | b,
        LogicalAnd => (a != 0 && b != 0) as i128,
        LogicalOr => (a != 0 || b != 0) as i128,
        _ => return Err("operator is not valid in a constant expression".into()),
    })
}

fn float_binop(op: BinaryOperator, a: f64, b: f64) -> Result<f64, String> {
    use BinaryOperator::*;
    Ok(match op {
        Multiply => a * b,
        Divide => a / b,
        Plus => a + b,
        Minus => a - b,
        Less => (a < b) as i32 as f64,
        Greater => (a > b) as i32 as f64,
        LessOrEqual => (a <= b) as i32 as f64,
        GreaterOrEqual => (a >= b) as i32 as f64,
        Equals => (a == b) as i32 as f64,
        NotEquals => (a != b) as i32 as f64,
        _ => return Err("operator is not valid for a floating constant expression".into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecc_ast::ast::*;
    use ecc_ast::span::Node;
    use pretty_assertions::assert_eq;

    fn int_literal(digits: &str) -> Node<Expression> {
        Node::synthetic(Expression::new(ExpressionKind::Constant(Box::new(Node::synthetic(
            Constant::Integer(IntegerConstant {
                base: IntegerBase::Decimal,
                digits: digits.into(),
                suffix: IntegerSuffix { size: IntegerSize::Int, unsigned: false },
            }),
        )))))
    }

    #[test]
    fn folds_integer_addition() {
        let expr = Node::synthetic(Expression::new(ExpressionKind::BinaryOperator(Box::new(
            Node::synthetic(BinaryOperatorExpression {
                operator: BinaryOperator::Plus,
                lhs: Box::new(int_literal("2")),
                rhs: Box::new(int_literal("3")),
            }),
        ))));
        let symtab = SymbolTable::new();
        let value = evaluate(&expr, &symtab).unwrap();
        assert_eq!(value, ConstValue::Integer { value: 5, class: IntClass { width: 4, unsigned: false } });
    }

    #[test]
    fn reduces_modulo_target_width() {
        let class = IntClass { width: 1, unsigned: false };
        assert_eq!(reduce(200, class), -56);
        assert_eq!(reduce(-1, IntClass { width: 1, unsigned: true }), 255);
    }

    #[test]
    fn equals_zero_on_integer_literal() {
        let symtab = SymbolTable::new();
        let value = evaluate(&int_literal("0"), &symtab).unwrap();
        assert!(value.equals_zero());
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        let expr = Node::synthetic(Expression::new(ExpressionKind::BinaryOperator(Box::new(
            Node::synthetic(BinaryOperatorExpression {
                operator: BinaryOperator::Divide,
                lhs: Box::new(int_literal("1")),
                rhs: Box::new(int_literal("0")),
            }),
        ))));
        let symtab = SymbolTable::new();
        assert!(evaluate(&expr, &symtab).is_err());
    }

    #[test]
    fn enumeration_constant_folds_to_its_stored_value() {
        let mut symtab = SymbolTable::new();
        let sym = symtab.declare("RED", crate::symtab::Namespace::Ordinary);
        symtab.get_mut(sym).enum_value = Some(2);
        let mut ident = Identifier::new("RED");
        ident.symbol = Some(sym);
        let expr = Node::synthetic(Expression::new(ExpressionKind::Identifier(Box::new(Node::synthetic(ident)))));
        let value = evaluate(&expr, &symtab).unwrap();
        assert_eq!(value, ConstValue::Integer { value: 2, class: IntClass { width: 4, unsigned: false } });
    }
}
