//! Specifier/declarator combination: turning the AST's syntax-level
//! `DeclarationSpecifier`/`Declarator` chain into a canonical
//! [`ecc_ast::types::Type`] (spec 3 invariant: "a declaring identifier's
//! symbol's type is the fully-derived type implied by its declaration
//! specifiers and declarator chain").

use ecc_ast::ast::*;
use ecc_ast::span::{Location, Node};
use ecc_ast::types::*;

use crate::diagnostics::Diagnostics;
use crate::symtab::{Namespace, SymbolTable};

/// Combines the arithmetic-type-specifier keywords (`void`, `char`,
/// `short`, `int`, `long`, `float`, `double`, `signed`, `unsigned`,
/// `_Bool`) into a base type, and resolves `struct`/`union`/`enum`/
/// typedef-name specifiers against the symbol table.
///
/// This does not validate every invalid combination the standard forbids
/// (e.g. `short double`); it takes the most specific match and otherwise
/// falls back to `int`, the way an implementation tolerant of a single
/// well-formed specifier list needs to.
pub fn resolve_specifiers(
    specs: &[Node<DeclarationSpecifier>],
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> Type {
    let type_specs: Vec<&TypeSpecifier> = specs
        .iter()
        .filter_map(|s| match &s.node {
            DeclarationSpecifier::TypeSpecifier(ts) => Some(ts),
            _ => None,
        })
        .collect();
    let qualifiers = resolve_qualifiers_from_decl(specs);
    let kind = resolve_type_specifier_kind(&type_specs, symtab, diags, loc);
    Type::qualified(kind, qualifiers)
}

pub fn resolve_specifier_qualifiers(
    specs: &[Node<SpecifierQualifier>],
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> Type {
    let type_specs: Vec<&TypeSpecifier> = specs
        .iter()
        .filter_map(|s| match &s.node {
            SpecifierQualifier::TypeSpecifier(ts) => Some(ts),
            _ => None,
        })
        .collect();
    let mut qualifiers = Qualifiers::empty();
    for s in specs {
        if let SpecifierQualifier::TypeQualifier(q) = &s.node {
            qualifiers |= qualifier_bit(*q);
        }
    }
    let kind = resolve_type_specifier_kind(&type_specs, symtab, diags, loc);
    Type::qualified(kind, qualifiers)
}

fn resolve_qualifiers_from_decl(specs: &[Node<DeclarationSpecifier>]) -> Qualifiers {
    let mut qualifiers = Qualifiers::empty();
    for s in specs {
        if let DeclarationSpecifier::TypeQualifier(q) = &s.node {
            qualifiers |= qualifier_bit(*q);
        }
    }
    qualifiers
}

fn qualifier_bit(q: TypeQualifier) -> Qualifiers {
    match q {
        TypeQualifier::Const => Qualifiers::CONST,
        TypeQualifier::Volatile => Qualifiers::VOLATILE,
        TypeQualifier::Restrict => Qualifiers::RESTRICT,
    }
}

fn resolve_type_specifier_kind(
    type_specs: &[&TypeSpecifier],
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> TypeKind {
    // A tag/typedef specifier is always the sole specifier, per grammar.
    for ts in type_specs {
        match ts {
            TypeSpecifier::Struct(s) => return resolve_struct(s, symtab, diags, loc),
            TypeSpecifier::Enum(e) => return resolve_enum(e, symtab, diags, loc),
            TypeSpecifier::TypedefName(id) => {
                if let Some(sym) = symtab.lookup(&id.node.name, Namespace::Ordinary) {
                    return symtab.get(sym).ty.kind.clone();
                }
                diags.error(loc, format!("unknown type name '{}'", id.node.name));
                return TypeKind::Error;
            }
            _ => {}
        }
    }

    let mut long_count = 0u32;
    let mut short = false;
    let mut signed = false;
    let mut unsigned = false;
    let mut base: Option<TypeSpecifier> = None;
    for ts in type_specs {
        match ts {
            TypeSpecifier::Long => long_count += 1,
            TypeSpecifier::Short => short = true,
            TypeSpecifier::Signed => signed = true,
            TypeSpecifier::Unsigned => unsigned = true,
            TypeSpecifier::Void
            | TypeSpecifier::Char
            | TypeSpecifier::Int
            | TypeSpecifier::Float
            | TypeSpecifier::Double
            | TypeSpecifier::Bool => base = Some((*ts).clone()),
            _ => {}
        }
    }

    let signedness = if unsigned {
        Signedness::Unsigned
    } else if signed {
        Signedness::Signed
    } else {
        Signedness::Plain
    };

    match base {
        Some(TypeSpecifier::Void) => TypeKind::Void,
        Some(TypeSpecifier::Bool) => TypeKind::Bool,
        Some(TypeSpecifier::Char) => TypeKind::Char(if signed {
            Signedness::Signed
        } else if unsigned {
            Signedness::Unsigned
        } else {
            Signedness::Plain
        }),
        Some(TypeSpecifier::Float) => TypeKind::Float(FloatKind::Float),
        Some(TypeSpecifier::Double) => TypeKind::Float(if long_count > 0 {
            FloatKind::LongDouble
        } else {
            FloatKind::Double
        }),
        _ => {
            let rank = if short {
                IntRank::Short
            } else if long_count >= 2 {
                IntRank::LongLong
            } else if long_count == 1 {
                IntRank::Long
            } else {
                IntRank::Int
            };
            let signedness = if signedness == Signedness::Plain {
                Signedness::Signed
            } else {
                signedness
            };
            TypeKind::Int(rank, signedness)
        }
    }
}

fn resolve_struct(
    s: &Node<StructType>,
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> TypeKind {
    let is_union = s.node.kind == StructKind::Union;
    let name = s.node.identifier.as_ref().map(|id| id.node.name.clone());

    let sym_id = name
        .as_ref()
        .map(|n| symtab.declare(n, Namespace::Tag))
        .unwrap_or_else(|| {
            symtab.declare_synthetic(
                String::new(),
                Type::error(),
                crate::symtab::StorageDuration::None,
            )
        });

    if let Some(declarations) = &s.node.declarations {
        let mut members = Vec::new();
        for sd in declarations {
            let member_ty = resolve_specifier_qualifiers(&sd.node.specifiers, symtab, diags, loc);
            for declr in &sd.node.declarators {
                let bit_width = declr
                    .node
                    .bit_width
                    .as_ref()
                    .and_then(|e| crate::constexpr::evaluate(e, symtab).ok())
                    .and_then(|v| match v {
                        crate::constexpr::ConstValue::Integer { value, .. } => Some(value as u32),
                        _ => None,
                    });
                let ty = match &declr.node.declarator {
                    Some(d) => resolve_declarator(member_ty.clone(), &d.node, symtab, diags, loc),
                    None => member_ty.clone(),
                };
                let member_name = declr
                    .node
                    .declarator
                    .as_ref()
                    .and_then(|d| d.node.get_identifier())
                    .map(|id| id.name.clone())
                    .unwrap_or_default();
                members.push(Member { name: member_name, ty, bit_width });
            }
        }
        // C99 6.7.2.1p2: an unsized array is only a flexible array member
        // when it is the struct's last member; any other occurrence, or a
        // unique or unioned one, is a constraint violation.
        for (idx, m) in members.iter().enumerate() {
            let is_unsized_array = matches!(
                &m.ty.kind,
                TypeKind::Array(ArrayType { len: ArrayLen::Unknown, .. })
            );
            if is_unsized_array && idx != members.len() - 1 {
                diags.error(
                    loc,
                    format!("flexible array member '{}' must be the last member of the struct", m.name),
                );
            }
        }
        let record = RecordType { name, is_union, members: Some(members) };
        if record.has_flexible_array_member() {
            if is_union {
                diags.error(loc, "a flexible array member is not allowed in a union");
            } else if record.members.as_ref().is_some_and(|m| m.len() == 1) {
                diags.error(loc, "a flexible array member must not be the struct's only member");
            }
        }
        symtab.get_mut(sym_id).ty = Type::new(if is_union {
            TypeKind::Union(record.clone())
        } else {
            TypeKind::Struct(record.clone())
        });
        if is_union {
            TypeKind::Union(record)
        } else {
            TypeKind::Struct(record)
        }
    } else {
        match &symtab.get(sym_id).ty.kind {
            TypeKind::Struct(r) | TypeKind::Union(r) => {
                if is_union {
                    TypeKind::Union(r.clone())
                } else {
                    TypeKind::Struct(r.clone())
                }
            }
            _ => {
                let record = RecordType { name, is_union, members: None };
                if is_union {
                    TypeKind::Union(record)
                } else {
                    TypeKind::Struct(record)
                }
            }
        }
    }
}

fn resolve_enum(
    e: &Node<EnumTypeSpec>,
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> TypeKind {
    let name = e.node.identifier.as_ref().map(|id| id.node.name.clone());
    if let Some(enumerators) = &e.node.enumerators {
        let mut values = Vec::new();
        let mut next_value: i64 = 0;
        for enumerator in enumerators {
            let value = match &enumerator.node.expression {
                Some(expr) => match crate::constexpr::evaluate(expr, symtab) {
                    Ok(crate::constexpr::ConstValue::Integer { value, .. }) => value as i64,
                    _ => {
                        diags.error(loc, "enumerator value is not an integer constant expression");
                        next_value
                    }
                },
                None => next_value,
            };
            if value < i32::MIN as i64 || value > i32::MAX as i64 {
                diags.error(loc, "enumeration constant value is not representable in 'int'");
            }
            values.push((enumerator.node.identifier.node.name.clone(), value));
            let ordinary = symtab.declare(&enumerator.node.identifier.node.name, Namespace::Ordinary);
            {
                let symbol = symtab.get_mut(ordinary);
                symbol.ty = Type::new(TypeKind::Enum(EnumType {
                    name: name.clone(),
                    enumerators: None,
                }));
                symbol.enum_value = Some(value);
                symbol.is_defined = true;
            }
            next_value = value + 1;
        }
        TypeKind::Enum(EnumType { name, enumerators: Some(values) })
    } else {
        TypeKind::Enum(EnumType { name, enumerators: None })
    }
}

/// Applies one derived-declarator entry, wrapping the type built so far.
///
/// Takes `symtab`/`diags`/`loc` because a `[N]` array bound is a constant
/// expression that may reference an enumeration constant, and a function
/// declarator's parameters need the same specifier/declarator resolution
/// an ordinary declaration gets — not a `Type::error()` stub — regardless
/// of whether this declarator turns out to introduce a definition.
fn apply_derived(
    ty: Type,
    derived: &DerivedDeclarator,
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> Type {
    match derived {
        DerivedDeclarator::Pointer(quals) => {
            let mut qualifiers = Qualifiers::empty();
            for q in quals {
                qualifiers |= qualifier_bit(q.node);
            }
            Type::qualified(TypeKind::Pointer(Box::new(ty)), qualifiers)
        }
        DerivedDeclarator::Array(a) => {
            let len = match &a.size {
                ArraySize::Unknown => ArrayLen::Unknown,
                ArraySize::VariableUnknown => ArrayLen::Variable,
                ArraySize::Expression(e) => match crate::constexpr::evaluate(e, symtab) {
                    Ok(crate::constexpr::ConstValue::Integer { value, .. }) => {
                        ArrayLen::Known(value as u64)
                    }
                    _ => ArrayLen::Variable,
                },
            };
            Type::new(TypeKind::Array(ArrayType { element: Box::new(ty), len }))
        }
        DerivedDeclarator::Function(f) => {
            let params = resolve_function_params(&f.parameters, symtab, diags, loc);
            Type::new(TypeKind::Function(FunctionType {
                return_type: Box::new(ty),
                params,
                variadic: f.ellipsis,
                prototyped: true,
            }))
        }
        DerivedDeclarator::KRFunction(_) => Type::new(TypeKind::Function(FunctionType {
            return_type: Box::new(ty),
            params: Vec::new(),
            variadic: false,
            prototyped: false,
        })),
    }
}

/// Applies a declarator's derived-type chain to a base type.
///
/// Non-obvious: a parenthesized sub-declarator (`DeclaratorKind::Declarator`,
/// e.g. the `(*a)` in `int (*a)[3]`) must have its *outer* derived chain
/// applied to `base` before recursing into the inner declarator, not after
/// — the parens make `[3]` modify the placeholder `a` stands for, and `*`
/// then wraps that. Applying in the opposite order silently turns "pointer
/// to array of int" into "array of pointer to int". A flat (unparenthesized)
/// `derived` list such as `int *a[3]`'s `[Pointer, Array(3)]` is simpler:
/// applying its entries left to right, each wrapping the type built so far,
/// reconstructs the declaration directly.
pub fn resolve_declarator(
    base: Type,
    declarator: &Declarator,
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> Type {
    match &declarator.kind {
        DeclaratorKind::Declarator(inner) => {
            let new_base = declarator
                .derived
                .iter()
                .fold(base, |ty, d| apply_derived(ty, &d.node, symtab, diags, loc));
            resolve_declarator(new_base, &inner.node, symtab, diags, loc)
        }
        DeclaratorKind::Identifier(_) | DeclaratorKind::Abstract => declarator
            .derived
            .iter()
            .fold(base, |ty, d| apply_derived(ty, &d.node, symtab, diags, loc)),
    }
}

/// Like [`resolve_declarator`] but fills parameter types in from their own
/// specifiers (needed once the parameter's own specifier list is
/// available, since `resolve_declarator` alone only knows the outer
/// declarator chain).
pub fn resolve_function_params(
    parameters: &[Node<ParameterDeclaration>],
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> Vec<Type> {
    parameters
        .iter()
        .map(|p| {
            let base = resolve_specifiers(&p.node.specifiers, symtab, diags, loc);
            match &p.node.declarator {
                Some(d) => resolve_declarator(base, &d.node, symtab, diags, loc).decay(),
                None => base.decay(),
            }
        })
        .collect()
}

pub fn resolve_type_name(
    type_name: &TypeName,
    symtab: &mut SymbolTable,
    diags: &mut Diagnostics,
    loc: Location,
) -> Type {
    let base = resolve_specifier_qualifiers(&type_name.specifiers, symtab, diags, loc);
    match &type_name.declarator {
        Some(d) => resolve_declarator(base, &d.node, symtab, diags, loc),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecc_ast::span::Span;
    use pretty_assertions::assert_eq;

    fn spec(ts: TypeSpecifier) -> Node<DeclarationSpecifier> {
        Node::synthetic(DeclarationSpecifier::TypeSpecifier(ts))
    }

    #[test]
    fn unsigned_long_int_resolves_to_long_rank() {
        let mut symtab = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let specs = vec![spec(TypeSpecifier::Unsigned), spec(TypeSpecifier::Long), spec(TypeSpecifier::Int)];
        let ty = resolve_specifiers(&specs, &mut symtab, &mut diags, Span::synthetic().start);
        assert_eq!(ty.kind, TypeKind::Int(IntRank::Long, Signedness::Unsigned));
    }

    #[test]
    fn flat_derived_chain_reads_pointer_then_array() {
        // `int *a[3]` — array of 3 pointers to int.
        let declarator = Declarator {
            kind: DeclaratorKind::Identifier(Node::synthetic(Identifier::new("a"))),
            derived: vec![
                Node::synthetic(DerivedDeclarator::Pointer(vec![])),
                Node::synthetic(DerivedDeclarator::Array(ArrayDeclarator {
                    qualifiers: vec![],
                    size: ArraySize::Expression(Box::new(int_lit(3))),
                })),
            ],
        };
        let mut symtab = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let ty = resolve_declarator(Type::int(), &declarator, &mut symtab, &mut diags, Span::synthetic().start);
        match ty.kind {
            TypeKind::Array(a) => match a.element.kind {
                TypeKind::Pointer(_) => {}
                other => panic!("expected pointer element, got {:?}", other),
            },
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn parenthesized_declarator_reads_array_then_pointer() {
        // `int (*a)[3]` — pointer to array of 3 ints.
        let inner = Declarator {
            kind: DeclaratorKind::Identifier(Node::synthetic(Identifier::new("a"))),
            derived: vec![Node::synthetic(DerivedDeclarator::Pointer(vec![]))],
        };
        let outer = Declarator {
            kind: DeclaratorKind::Declarator(Box::new(Node::synthetic(inner))),
            derived: vec![Node::synthetic(DerivedDeclarator::Array(ArrayDeclarator {
                qualifiers: vec![],
                size: ArraySize::Expression(Box::new(int_lit(3))),
            }))],
        };
        let mut symtab = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let ty = resolve_declarator(Type::int(), &outer, &mut symtab, &mut diags, Span::synthetic().start);
        match ty.kind {
            TypeKind::Pointer(inner) => match inner.kind {
                TypeKind::Array(a) => assert_eq!(a.len, ArrayLen::Known(3)),
                other => panic!("expected array, got {:?}", other),
            },
            other => panic!("expected pointer, got {:?}", other),
        }
    }

    fn int_lit(n: i64) -> Node<Expression> {
        Node::synthetic(Expression::new(ExpressionKind::Constant(Box::new(Node::synthetic(
            Constant::Integer(IntegerConstant {
                base: IntegerBase::Decimal,
                digits: n.to_string().into(),
                suffix: IntegerSuffix { size: IntegerSize::Int, unsigned: false },
            }),
        )))))
    }
}
