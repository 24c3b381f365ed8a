//! Canonical C type representation.
//!
//! Ported from the shape described by the teacher's `lang_c::ast` type
//! specifiers (`TypeSpecifier`, `TypeQualifier`, `DerivedDeclarator`), but
//! resolved: where the AST records *syntax* (`unsigned`, `long`, `long`,
//! `int` as four separate specifier tokens), `Type` records the single
//! canonical value the standard says that syntax denotes.

use bitflags::bitflags;

bitflags! {
    /// `const` / `volatile` / `restrict`, C11 6.7.3.
    #[derive(Default)]
    pub struct Qualifiers: u8 {
        const CONST    = 0b0001;
        const VOLATILE = 0b0010;
        const RESTRICT = 0b0100;
    }
}

impl Qualifiers {
    /// `a ⊇ b` — used by `can_assign`'s pointer qualifier-superset rule.
    pub fn is_superset_of(&self, other: Qualifiers) -> bool {
        self.contains(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signedness {
    Signed,
    Unsigned,
    /// Plain `char`: a distinct type from both `signed char` and
    /// `unsigned char` for overload/compatibility purposes, even though its
    /// representation matches one of them.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntRank {
    Short = 0,
    Int,
    Long,
    LongLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    Float,
    Double,
    /// Recognized so that `Type` can classify every specifier the grammar
    /// accepts; the analyzer reports it as unsupported wherever it would
    /// otherwise compute a size, per the `long double` non-goal.
    LongDouble,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: String,
    pub ty: Type,
    /// `Some(width)` for a bit-field. The analyzer still validates
    /// bit-field width/position constraints (4.5); only code generation
    /// refuses them, per the bit-fields-at-codegen-time non-goal.
    pub bit_width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    pub name: Option<String>,
    pub is_union: bool,
    /// `None` until the definition's member list has been seen; a struct/
    /// union tag with no body yet is incomplete.
    pub members: Option<Vec<Member>>,
}

impl RecordType {
    pub fn is_complete(&self) -> bool {
        self.members.is_some()
    }

    /// True when the last member is an unsized array (C11 6.7.2.1 §18).
    pub fn has_flexible_array_member(&self) -> bool {
        match &self.members {
            Some(members) => match members.last() {
                Some(last) => matches!(
                    &last.ty.kind,
                    TypeKind::Array(ArrayType {
                        len: ArrayLen::Unknown,
                        ..
                    })
                ),
                None => false,
            },
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayLen {
    Known(u64),
    Unknown,
    /// `[*]` or a non-constant bound; the analyzer reports this as
    /// unsupported (no VLA support, section 1 non-goals) rather than
    /// tracking a length expression for it.
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub element: Box<Type>,
    pub len: ArrayLen,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub return_type: Box<Type>,
    pub params: Vec<Type>,
    pub variadic: bool,
    /// False for a K&R-style identifier-list declarator. Such declarators
    /// are warned and rejected (section 1 non-goals); the analyzer still
    /// needs to represent them long enough to emit that diagnostic.
    pub prototyped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub name: Option<String>,
    /// `(name, value)` in declaration order; `None` until the enum body
    /// has been seen.
    pub enumerators: Option<Vec<(String, i64)>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Bool,
    Char(Signedness),
    Int(IntRank, Signedness),
    Float(FloatKind),
    Complex(FloatKind),
    Enum(EnumType),
    Pointer(Box<Type>),
    Array(ArrayType),
    Function(FunctionType),
    Struct(RecordType),
    Union(RecordType),
    /// Type of a statement label (`goto` target). Labels are not objects
    /// and carry no qualifiers or size; this variant exists purely so a
    /// label's symbol can be typed the same way every other symbol is.
    Label,
    /// Propagating failure value: any expression or declarator that could
    /// not be typed because of an earlier constraint violation. Every
    /// operation on `Error` returns `Error` so analysis can keep walking
    /// without cascading diagnostics (spec 3 invariants, section 7).
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub kind: TypeKind,
    pub qualifiers: Qualifiers,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Type {
            kind,
            qualifiers: Qualifiers::empty(),
        }
    }

    pub fn qualified(kind: TypeKind, qualifiers: Qualifiers) -> Self {
        Type { kind, qualifiers }
    }

    pub fn error() -> Self {
        Type::new(TypeKind::Error)
    }

    pub fn void() -> Self {
        Type::new(TypeKind::Void)
    }

    pub fn bool_() -> Self {
        Type::new(TypeKind::Bool)
    }

    pub fn int() -> Self {
        Type::new(TypeKind::Int(IntRank::Int, Signedness::Signed))
    }

    pub fn unsigned_int() -> Self {
        Type::new(TypeKind::Int(IntRank::Int, Signedness::Unsigned))
    }

    /// `size_t` as used by `sizeof` results (spec 4.5).
    pub fn size_t() -> Self {
        Type::new(TypeKind::Int(IntRank::Long, Signedness::Unsigned))
    }

    /// `ptrdiff_t` as used by pointer-difference results (spec 4.5).
    pub fn ptrdiff_t() -> Self {
        Type::new(TypeKind::Int(IntRank::Long, Signedness::Signed))
    }

    pub fn pointer_to(pointee: Type) -> Self {
        Type::new(TypeKind::Pointer(Box::new(pointee)))
    }

    pub fn with_qualifiers(mut self, qualifiers: Qualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    /// Returns a copy with all qualifiers cleared — the "lvalue-in-a-
    /// non-lvalue-context yields cleared qualifiers" invariant (spec 3).
    pub fn unqualified(&self) -> Self {
        Type {
            kind: self.kind.clone(),
            qualifiers: Qualifiers::empty(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, TypeKind::Error)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bool | TypeKind::Char(_) | TypeKind::Int(..) | TypeKind::Enum(_)
        )
    }

    pub fn is_real_float(&self) -> bool {
        matches!(self.kind, TypeKind::Float(_))
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || matches!(self.kind, TypeKind::Float(_) | TypeKind::Complex(_))
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, TypeKind::Function(_))
    }

    pub fn is_struct_or_union(&self) -> bool {
        matches!(self.kind, TypeKind::Struct(_) | TypeKind::Union(_))
    }

    pub fn is_character(&self) -> bool {
        matches!(self.kind, TypeKind::Char(_))
    }

    /// SSE-floating per the System-V ABI: `float` or `double`, not
    /// `long double` (x87) — spec glossary "SSE floating".
    pub fn is_sse_float(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Float(FloatKind::Float) | TypeKind::Float(FloatKind::Double)
        )
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Float(FloatKind::LongDouble) | TypeKind::Complex(_)
        ) || matches!(&self.kind, TypeKind::Array(a) if a.len == ArrayLen::Variable)
    }

    /// "Object type": complete and not a function type (used by pointer
    /// arithmetic and `sizeof` checks).
    pub fn is_object(&self) -> bool {
        !self.is_function() && self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        match &self.kind {
            TypeKind::Void => false,
            TypeKind::Array(a) => a.len != ArrayLen::Unknown,
            TypeKind::Struct(r) | TypeKind::Union(r) => r.is_complete(),
            TypeKind::Enum(e) => e.enumerators.is_some(),
            TypeKind::Function(_) => false,
            TypeKind::Error => false,
            _ => true,
        }
    }

    pub fn pointee(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn array_element(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Array(a) => Some(&a.element),
            _ => None,
        }
    }

    /// Array-to-pointer / function-to-pointer decay (spec 3, glossary
    /// "Decay"). Any other type is returned unchanged.
    pub fn decay(&self) -> Type {
        match &self.kind {
            TypeKind::Array(a) => Type::pointer_to((*a.element).clone()),
            TypeKind::Function(_) => Type::pointer_to(self.unqualified()),
            _ => self.clone(),
        }
    }

    /// `-1` sentinel for incomplete array types, matching the C ported
    /// contract in spec 4.1 (`type_size` returns -1), expressed as
    /// `Option<u64>` in this port: `None` stands in for that sentinel.
    pub fn size_bytes(&self) -> Option<u64> {
        match &self.kind {
            TypeKind::Void | TypeKind::Error | TypeKind::Function(_) | TypeKind::Label => None,
            TypeKind::Bool | TypeKind::Char(_) => Some(1),
            TypeKind::Int(rank, _) => Some(match rank {
                IntRank::Short => 2,
                IntRank::Int => 4,
                IntRank::Long | IntRank::LongLong => 8,
            }),
            TypeKind::Float(FloatKind::Float) => Some(4),
            TypeKind::Float(FloatKind::Double) => Some(8),
            TypeKind::Float(FloatKind::LongDouble) => None,
            TypeKind::Complex(_) => None,
            TypeKind::Enum(_) => Some(4),
            TypeKind::Pointer(_) => Some(8),
            TypeKind::Array(a) => match a.len {
                ArrayLen::Known(n) => a.element.size_bytes().map(|sz| sz * n),
                ArrayLen::Unknown | ArrayLen::Variable => None,
            },
            TypeKind::Struct(r) | TypeKind::Union(r) => r.members.as_ref().map(|members| {
                let is_union = matches!(self.kind, TypeKind::Union(_));
                let align = self.align_bytes().unwrap_or(1);
                if is_union {
                    let max = members
                        .iter()
                        .filter_map(|m| m.ty.size_bytes())
                        .max()
                        .unwrap_or(0);
                    round_up(max, align)
                } else {
                    let mut offset = 0u64;
                    for m in members {
                        let a = m.ty.align_bytes().unwrap_or(1);
                        offset = round_up(offset, a);
                        offset += m.ty.size_bytes().unwrap_or(0);
                    }
                    round_up(offset, align)
                }
            }),
        }
    }

    pub fn align_bytes(&self) -> Option<u64> {
        match &self.kind {
            TypeKind::Array(a) => a.element.align_bytes(),
            TypeKind::Struct(r) | TypeKind::Union(r) => r.members.as_ref().map(|members| {
                members
                    .iter()
                    .filter_map(|m| m.ty.align_bytes())
                    .max()
                    .unwrap_or(1)
            }),
            _ => self.size_bytes().map(|s| s.max(1)),
        }
    }

    /// Integer conversion rank (C11 6.3.1.1), used by usual arithmetic
    /// conversions and integer promotions.
    pub fn integer_rank(&self) -> Option<IntRank> {
        match &self.kind {
            TypeKind::Bool | TypeKind::Char(_) => Some(IntRank::Short),
            TypeKind::Int(rank, _) => Some(*rank),
            TypeKind::Enum(_) => Some(IntRank::Int),
            _ => None,
        }
    }

    fn is_unsigned(&self) -> bool {
        matches!(
            &self.kind,
            TypeKind::Bool
                | TypeKind::Char(Signedness::Unsigned)
                | TypeKind::Int(_, Signedness::Unsigned)
        )
    }

    /// Integer promotion (C11 6.3.1.1 §2, glossary "Integer promotion"):
    /// anything narrower than `int` widens to `int`, or `unsigned int` if
    /// `int` cannot represent its whole value range (only `unsigned
    /// short`/`unsigned char` on a 32-bit-int platform need that escape,
    /// and this port's widths never do, so promotion always lands on
    /// `int` except when the operand already has rank ≥ `int`).
    pub fn integer_promote(&self) -> Type {
        match self.integer_rank() {
            Some(rank) if rank < IntRank::Int => Type::int(),
            _ => self.clone(),
        }
    }

    /// Usual arithmetic conversions (C11 6.3.1.8).
    pub fn usual_arithmetic_conversions(&self, other: &Type) -> Type {
        if self.is_error() || other.is_error() {
            return Type::error();
        }
        if self.is_real_float() || other.is_real_float() {
            return match (&self.kind, &other.kind) {
                (TypeKind::Float(a), TypeKind::Float(b)) => {
                    Type::new(TypeKind::Float(wider_float(*a, *b)))
                }
                (TypeKind::Float(k), _) | (_, TypeKind::Float(k)) => Type::new(TypeKind::Float(*k)),
                _ => unreachable!(),
            };
        }

        let a = self.integer_promote();
        let b = other.integer_promote();
        let ra = a.integer_rank().unwrap_or(IntRank::Int);
        let rb = b.integer_rank().unwrap_or(IntRank::Int);

        if a.is_unsigned() == b.is_unsigned() {
            return if ra >= rb { a } else { b };
        }
        let (unsigned, unsigned_rank, signed, signed_rank) = if a.is_unsigned() {
            (a, ra, b, rb)
        } else {
            (b, rb, a, ra)
        };
        if unsigned_rank >= signed_rank {
            unsigned
        } else {
            // Signed type can represent all unsigned values at this rank
            // on every width this port models (rank strictly increases
            // representable range on each step), so the signed type wins.
            signed
        }
    }

    /// Compatibility (C11 6.2.7), optionally ignoring qualifiers.
    pub fn compatible(&self, other: &Type, ignore_qualifiers: bool) -> bool {
        if !ignore_qualifiers && self.qualifiers != other.qualifiers {
            return false;
        }
        match (&self.kind, &other.kind) {
            (TypeKind::Error, _) | (_, TypeKind::Error) => true,
            (TypeKind::Void, TypeKind::Void) => true,
            (TypeKind::Bool, TypeKind::Bool) => true,
            (TypeKind::Char(a), TypeKind::Char(b)) => a == b,
            (TypeKind::Int(ra, sa), TypeKind::Int(rb, sb)) => ra == rb && sa == sb,
            (TypeKind::Float(a), TypeKind::Float(b)) => a == b,
            (TypeKind::Complex(a), TypeKind::Complex(b)) => a == b,
            (TypeKind::Label, TypeKind::Label) => true,
            (TypeKind::Enum(a), TypeKind::Enum(b)) => a.name.is_some() && a.name == b.name,
            (TypeKind::Pointer(a), TypeKind::Pointer(b)) => a.compatible(b, ignore_qualifiers),
            (TypeKind::Array(a), TypeKind::Array(b)) => {
                a.element.compatible(&b.element, ignore_qualifiers)
                    && match (a.len, b.len) {
                        (ArrayLen::Known(x), ArrayLen::Known(y)) => x == y,
                        _ => true,
                    }
            }
            (TypeKind::Function(a), TypeKind::Function(b)) => {
                a.return_type.compatible(&b.return_type, ignore_qualifiers)
                    && a.variadic == b.variadic
                    && (!a.prototyped
                        || !b.prototyped
                        || (a.params.len() == b.params.len()
                            && a.params
                                .iter()
                                .zip(&b.params)
                                .all(|(x, y)| x.compatible(y, ignore_qualifiers))))
            }
            (TypeKind::Struct(a), TypeKind::Union(_)) | (TypeKind::Union(a), TypeKind::Struct(_)) => {
                let _ = a;
                false
            }
            (TypeKind::Struct(a), TypeKind::Struct(b)) | (TypeKind::Union(a), TypeKind::Union(b)) => {
                a.name.is_some() && a.name == b.name
            }
            _ => false,
        }
    }

    /// Composite type (C11 6.2.7 §3): merges two compatible types, e.g. an
    /// unknown-length array composed with a known-length array yields the
    /// known length.
    pub fn composite(&self, other: &Type) -> Type {
        match (&self.kind, &other.kind) {
            (TypeKind::Array(a), TypeKind::Array(b)) => {
                let element = Box::new(a.element.composite(&b.element));
                let len = match (a.len, b.len) {
                    (ArrayLen::Known(n), _) | (_, ArrayLen::Known(n)) => ArrayLen::Known(n),
                    _ => ArrayLen::Unknown,
                };
                Type::qualified(TypeKind::Array(ArrayType { element, len }), self.qualifiers)
            }
            (TypeKind::Function(a), TypeKind::Function(b)) => {
                let (params, prototyped) = if a.prototyped {
                    (a.params.clone(), true)
                } else if b.prototyped {
                    (b.params.clone(), true)
                } else {
                    (vec![], false)
                };
                Type::qualified(
                    TypeKind::Function(FunctionType {
                        return_type: Box::new(a.return_type.composite(&b.return_type)),
                        params,
                        variadic: a.variadic || b.variadic,
                        prototyped,
                    }),
                    self.qualifiers,
                )
            }
            (TypeKind::Pointer(a), TypeKind::Pointer(b)) => Type::qualified(
                TypeKind::Pointer(Box::new(a.composite(b))),
                self.qualifiers,
            ),
            _ => self.clone(),
        }
    }

    /// Union of qualifiers — member/`->` access and conditional pointer
    /// composition both spell out this exact rule (spec 4.5); named here
    /// since three independent call sites need it (SPEC_FULL supplement).
    pub fn union_qualifiers(a: Qualifiers, b: Qualifiers) -> Qualifiers {
        a | b
    }
}

fn wider_float(a: FloatKind, b: FloatKind) -> FloatKind {
    fn rank(k: FloatKind) -> u8 {
        match k {
            FloatKind::Float => 0,
            FloatKind::Double => 1,
            FloatKind::LongDouble => 2,
        }
    }
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

fn round_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        (value + align - 1) / align * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int_member(name: &str) -> Member {
        Member {
            name: name.to_string(),
            ty: Type::int(),
            bit_width: None,
        }
    }

    #[test]
    fn struct_size_is_padded_to_max_alignment() {
        let record = RecordType {
            name: None,
            is_union: false,
            members: Some(vec![
                Member {
                    name: "a".into(),
                    ty: Type::new(TypeKind::Char(Signedness::Plain)),
                    bit_width: None,
                },
                int_member("b"),
            ]),
        };
        let ty = Type::new(TypeKind::Struct(record));
        assert_eq!(ty.align_bytes(), Some(4));
        assert_eq!(ty.size_bytes(), Some(8));
    }

    #[test]
    fn union_size_is_max_member_padded() {
        let record = RecordType {
            name: None,
            is_union: true,
            members: Some(vec![
                int_member("a"),
                Member {
                    name: "b".into(),
                    ty: Type::new(TypeKind::Char(Signedness::Plain)),
                    bit_width: None,
                },
            ]),
        };
        let ty = Type::new(TypeKind::Union(record));
        assert_eq!(ty.size_bytes(), Some(4));
    }

    #[test]
    fn incomplete_array_has_no_size() {
        let ty = Type::new(TypeKind::Array(ArrayType {
            element: Box::new(Type::int()),
            len: ArrayLen::Unknown,
        }));
        assert_eq!(ty.size_bytes(), None);
    }

    #[test]
    fn flexible_array_member_detection() {
        let record = RecordType {
            name: None,
            is_union: false,
            members: Some(vec![
                int_member("len"),
                Member {
                    name: "data".into(),
                    ty: Type::new(TypeKind::Array(ArrayType {
                        element: Box::new(Type::new(TypeKind::Char(Signedness::Plain))),
                        len: ArrayLen::Unknown,
                    })),
                    bit_width: None,
                },
            ]),
        };
        assert!(record.has_flexible_array_member());
    }

    #[test]
    fn usual_arithmetic_conversions_prefer_wider_unsigned() {
        let ulong = Type::new(TypeKind::Int(IntRank::Long, Signedness::Unsigned));
        let int = Type::int();
        let result = ulong.usual_arithmetic_conversions(&int);
        assert_eq!(result, ulong);
    }

    #[test]
    fn composite_array_picks_known_length() {
        let unknown = Type::new(TypeKind::Array(ArrayType {
            element: Box::new(Type::int()),
            len: ArrayLen::Unknown,
        }));
        let known = Type::new(TypeKind::Array(ArrayType {
            element: Box::new(Type::int()),
            len: ArrayLen::Known(4),
        }));
        let composed = unknown.composite(&known);
        match composed.kind {
            TypeKind::Array(a) => assert_eq!(a.len, ArrayLen::Known(4)),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn pointer_compatibility_ignores_qualifiers_when_asked() {
        let a = Type::pointer_to(Type::int().with_qualifiers(Qualifiers::CONST));
        let b = Type::pointer_to(Type::int());
        assert!(a.compatible(&b, true));
    }

    #[test]
    fn array_decays_to_pointer() {
        let arr = Type::new(TypeKind::Array(ArrayType {
            element: Box::new(Type::int()),
            len: ArrayLen::Known(4),
        }));
        assert_eq!(arr.decay(), Type::pointer_to(Type::int()));
    }
}
