//! Initializer elaboration and static initializer materialization
//! (spec 4.5 "Initializer list semantics", spec 3 "Static initializer
//! materialization").
//!
//! Elaboration walks a possibly-nested, possibly-designated initializer
//! list against the type it initializes, the way C11 6.7.9 describes it:
//! a pair of cursors (current aggregate type, current member/element
//! index) that a designator can jump, and that otherwise just advances
//! by one after each item. Materialization is a second pass over an
//! already-elaborated initializer that serializes every leaf into a byte
//! buffer plus a relocation list, for objects with static storage
//! duration (spec 4.5 "static initializer").

use ecc_ast::ast::*;
use ecc_ast::span::{Location, Node};
use ecc_ast::types::*;

use super::SemanticAnalyzer;
use crate::constexpr::{self, ConstValue};
use crate::symtab::Relocation;

/// Elaborates the initializer attached to a declarator, fixing an
/// unsized array's length from the number of elements actually supplied
/// (spec 4.5 "an unsized array declarator with a brace initializer
/// takes its length from the initializer").
///
/// Called after the generic traversal has already walked (and typed)
/// every expression this initializer contains — `walk_init_declarator`
/// visits the initializer's children before `after_init_declarator`
/// fires — so this only reads `ty`/`is_lvalue` back, it never drives
/// expression typing itself.
pub fn elaborate_initializer(analyzer: &mut SemanticAnalyzer, initializer: &mut Node<Initializer>, ty: &mut Type, loc: Location) {
    match &mut initializer.node {
        Initializer::Expression(e) => {
            if !apply_string_literal_init(ty, e)
                && !super::expr::can_assign(ty, e.node.ty.as_ref().unwrap_or(&Type::error()), e, &analyzer.symbols)
            {
                analyzer.diagnostics.error(loc, "initializer type is not assignment-compatible with the declared type");
            }
        }
        Initializer::List(items) => {
            elaborate_initializer_list(analyzer, items, ty, loc);
            if let TypeKind::Array(a) = &mut ty.kind {
                if a.len == ArrayLen::Unknown {
                    let count = items
                        .iter()
                        .filter_map(|i| i.node.offset)
                        .map(|offset| offset / a.element.size_bytes().unwrap_or(1).max(1) + 1)
                        .max()
                        .unwrap_or(0);
                    a.len = ArrayLen::Known(count);
                }
            }
        }
    }
}

/// Elaborates a brace-enclosed initializer list against an aggregate
/// type, annotating each item's `offset`/`element_type` and recursing
/// into any nested list.
pub fn elaborate_initializer_list(
    analyzer: &mut SemanticAnalyzer,
    items: &mut [Node<InitializerListItem>],
    ty: &Type,
    loc: Location,
) {
    let mut cursor: u64 = 0;
    for item in items.iter_mut() {
        if let Some(designator) = item.node.designation.first() {
            cursor = resolve_designator_index(analyzer, designator, ty, loc);
        }

        let (mut element_ty, offset) = match &ty.kind {
            TypeKind::Array(a) => (
                (*a.element).clone(),
                cursor * a.element.size_bytes().unwrap_or(0),
            ),
            TypeKind::Struct(r) | TypeKind::Union(r) => match r.members.as_ref().and_then(|m| m.get(cursor as usize)) {
                Some(member) => {
                    let is_union = matches!(ty.kind, TypeKind::Union(_));
                    (member.ty.clone(), if is_union { 0 } else { member_offset(r, cursor as usize) })
                }
                None => {
                    analyzer.diagnostics.error(loc, "excess elements in initializer list");
                    (Type::error(), 0)
                }
            },
            _ => {
                analyzer.diagnostics.error(loc, "braces around scalar initializer");
                (ty.clone(), 0)
            }
        };

        match &mut item.node.initializer.node {
            Initializer::List(nested) => {
                elaborate_initializer_list(analyzer, nested, &element_ty, loc);
            }
            Initializer::Expression(e) => {
                if !apply_string_literal_init(&mut element_ty, e)
                    && !super::expr::can_assign(&element_ty, e.node.ty.as_ref().unwrap_or(&Type::error()), e, &analyzer.symbols)
                {
                    analyzer.diagnostics.error(loc, "initializer type is not assignment-compatible with the element type");
                }
            }
        }

        item.node.offset = Some(offset);
        item.node.element_type = Some(element_ty);
        cursor += 1;
    }
}

fn is_char_array(ty: &Type) -> bool {
    matches!(&ty.kind, TypeKind::Array(a) if matches!(a.element.kind, TypeKind::Char(_)))
}

/// A character array initialized directly by a string literal with no
/// braces is a special case distinct from ordinary assignment (C11 6.7.9
/// §14): an unsized array takes its length from the literal, including
/// its terminating NUL, and the literal's bytes are copied into the
/// array rather than evaluated as a single scalar constant expression.
/// Returns `true` when `e` was such a literal against a char-array `ty`,
/// in which case the caller should skip the ordinary `can_assign` check.
fn apply_string_literal_init(ty: &mut Type, e: &Node<Expression>) -> bool {
    if !is_char_array(ty) || !matches!(e.node.kind, ExpressionKind::StringLiteral(_)) {
        return false;
    }
    let literal_len = match e.node.ty.as_ref().map(|t| &t.kind) {
        Some(TypeKind::Array(a)) => match a.len {
            ArrayLen::Known(n) => n,
            _ => return false,
        },
        _ => return false,
    };
    if let TypeKind::Array(a) = &mut ty.kind {
        if a.len == ArrayLen::Unknown {
            a.len = ArrayLen::Known(literal_len);
        }
    }
    true
}

fn member_offset(record: &RecordType, index: usize) -> u64 {
    let members = match &record.members {
        Some(m) => m,
        None => return 0,
    };
    let mut offset = 0u64;
    for member in members.iter().take(index) {
        let align = member.ty.align_bytes().unwrap_or(1);
        offset = round_up(offset, align);
        offset += member.ty.size_bytes().unwrap_or(0);
    }
    if let Some(member) = members.get(index) {
        let align = member.ty.align_bytes().unwrap_or(1);
        offset = round_up(offset, align);
    }
    offset
}

fn round_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        (value + align - 1) / align * align
    }
}

fn resolve_designator_index(analyzer: &mut SemanticAnalyzer, designator: &Node<Designator>, ty: &Type, loc: Location) -> u64 {
    match &designator.node {
        Designator::Index(e) => constexpr::evaluate(e, &analyzer.symbols)
            .ok()
            .and_then(|v| match v {
                ConstValue::Integer { value, .. } => Some(value as u64),
                _ => None,
            })
            .unwrap_or(0),
        Designator::Member(id) => match &ty.kind {
            TypeKind::Struct(r) | TypeKind::Union(r) => r
                .members
                .as_ref()
                .and_then(|members| members.iter().position(|m| m.name == id.node.name))
                .map(|idx| idx as u64)
                .unwrap_or_else(|| {
                    analyzer
                        .diagnostics
                        .error(loc, format!("no member named '{}' in designated initializer", id.node.name));
                    0
                }),
            _ => {
                analyzer.diagnostics.error(loc, "field designator used for a non-aggregate type");
                0
            }
        },
    }
}

/// Serializes an already-elaborated initializer into a flat byte buffer
/// plus relocations, for a static-duration object of type `ty` (spec 3
/// "Static initializer materialization"). Bytes beyond what the
/// initializer supplies are implicitly zero, matching C11 6.7.9 §21.
pub fn materialize_static(
    initializer: &Initializer,
    ty: &Type,
    symtab: &crate::symtab::SymbolTable,
) -> (Vec<u8>, Vec<Relocation>) {
    let size = ty.size_bytes().unwrap_or(0) as usize;
    let mut bytes = vec![0u8; size];
    let mut relocations = Vec::new();
    materialize_into(initializer, ty, 0, &mut bytes, &mut relocations, symtab);
    (bytes, relocations)
}

fn materialize_into(
    initializer: &Initializer,
    ty: &Type,
    base: u64,
    bytes: &mut Vec<u8>,
    relocations: &mut Vec<Relocation>,
    symtab: &crate::symtab::SymbolTable,
) {
    match initializer {
        Initializer::Expression(e) => {
            if is_char_array(ty) {
                if let ExpressionKind::StringLiteral(s) = &e.node.kind {
                    let mut literal_bytes = s.node.bytes.clone();
                    literal_bytes.push(0);
                    let width = ty.size_bytes().unwrap_or(literal_bytes.len() as u64) as usize;
                    literal_bytes.truncate(width);
                    write_at(bytes, base, &literal_bytes);
                    return;
                }
            }
            match constexpr::evaluate(e, symtab) {
                Ok(ConstValue::Address { symbol, offset }) => {
                    relocations.push(Relocation { offset: base, target: symbol, addend: offset });
                }
                Ok(value) => {
                    let width = ty.size_bytes().unwrap_or(8) as u32;
                    write_at(bytes, base, &value.to_bytes(width));
                }
                Err(_) => {}
            }
        }
        Initializer::List(items) => {
            for item in items {
                let offset = base + item.node.offset.unwrap_or(0);
                let element_ty = item.node.element_type.clone().unwrap_or_else(|| ty.clone());
                materialize_into(&item.node.initializer.node, &element_ty, offset, bytes, relocations, symtab);
            }
        }
    }
}

fn write_at(bytes: &mut [u8], offset: u64, value: &[u8]) {
    let start = offset as usize;
    let end = (start + value.len()).min(bytes.len());
    if start < bytes.len() {
        bytes[start..end].copy_from_slice(&value[..end - start]);
    }
}
