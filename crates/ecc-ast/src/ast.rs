//! Abstract syntax tree for C89/C99.
//!
//! Shaped after `lang_c::ast` (node-per-construct, `Node<T>` span wrapping,
//! C11-clause doc comments pointing at the relevant grammar section) but
//! trimmed to the C89/C99 core this specification covers: no `_Generic`,
//! no GNU/MSVC/Clang attribute extensions, no inline assembly, no
//! `_Static_assert`. Where the analyzer needs somewhere to record a
//! decoration (a resolved type, a symbol binding, a computed offset) the
//! field is added directly on the relevant struct, following the pattern
//! of `expr_type: Option<Type>` / `symbol_id: Option<SymbolId>` fields
//! used for the same purpose elsewhere in this kind of frontend.

use crate::span::Node;
use crate::types::Type;

/// Opaque reference to a [`crate::symtab::Symbol`], filled in by the
/// analyzer on every resolved identifier occurrence.
pub type SymbolRef = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
    pub symbol: Option<SymbolRef>,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Identifier {
            name: name.into(),
            symbol: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Integer(IntegerConstant),
    Float(FloatConstant),
    Character(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntegerConstant {
    pub base: IntegerBase,
    pub digits: Box<str>,
    pub suffix: IntegerSuffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerBase {
    Decimal,
    Octal,
    Hexadecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerSuffix {
    pub size: IntegerSize,
    pub unsigned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntegerSize {
    Int = 0,
    Long,
    LongLong,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FloatConstant {
    pub digits: Box<str>,
    pub suffix: FloatSuffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatSuffix {
    /// `f` suffix
    Float,
    /// no suffix
    Double,
    /// `l` suffix — recognized, reported unsupported by the analyzer per
    /// the `long double` non-goal.
    LongDouble,
}

/// A string-literal token's raw bytes (no trailing NUL) plus the synthetic
/// static-storage symbol the analyzer materializes it under — the same
/// `symbol: Option<SymbolRef>` pattern [`Identifier`] uses, needed here so
/// `&"literal"` and `char s[] = "literal"` can recover it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringLiteral {
    pub bytes: Vec<u8>,
    pub symbol: Option<SymbolRef>,
}

impl StringLiteral {
    pub fn new(bytes: Vec<u8>) -> Self {
        StringLiteral { bytes, symbol: None }
    }
}

/// An expression node: the syntactic shape plus whatever the analyzer has
/// decorated it with. `ty` is `None` until analysis visits the node;
/// afterward it is always `Some` (spec 3 invariant: "every expression node
/// that has been analyzed carries a non-null type").
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub ty: Option<Type>,
    /// Whether this expression designates an object (C11 6.3.2.1) —
    /// computed alongside `ty` since most of the constraint checks in
    /// spec 4.5 ("must be a modifiable lvalue", "non-lvalues other than
    /// function designators / `*e` / `e[i]`") need it at the same time.
    pub is_lvalue: bool,
}

pub type ExpressionNode = Node<Expression>;

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Expression {
            kind,
            ty: None,
            is_lvalue: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Identifier(Box<Node<Identifier>>),
    Constant(Box<Node<Constant>>),
    StringLiteral(Box<Node<StringLiteral>>),
    Member(Box<Node<MemberExpression>>),
    Call(Box<Node<CallExpression>>),
    CompoundLiteral(Box<Node<CompoundLiteral>>),
    SizeOfType(Box<Node<TypeName>>),
    SizeOfExpr(Box<Node<Expression>>),
    UnaryOperator(Box<Node<UnaryOperatorExpression>>),
    Cast(Box<Node<CastExpression>>),
    BinaryOperator(Box<Node<BinaryOperatorExpression>>),
    Conditional(Box<Node<ConditionalExpression>>),
    Comma(Box<Vec<Node<Expression>>>),
    /// `__ecc_va_arg(ap, type)`.
    VaArg(Box<Node<VaArgExpression>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberOperator {
    /// `expression.identifier`
    Direct,
    /// `expression->identifier`
    Indirect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    pub operator: MemberOperator,
    pub expression: Box<Node<Expression>>,
    pub identifier: Node<Identifier>,
    /// Whether this names a bit-field member — filled in alongside the
    /// expression's type, since `&` and `sizeof` both need to reject a
    /// bit-field operand and neither keeps the resolved `Member` around.
    pub is_bit_field: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub callee: Box<Node<Expression>>,
    pub arguments: Vec<Node<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundLiteral {
    pub type_name: Node<TypeName>,
    pub initializer_list: Vec<Node<InitializerListItem>>,
    /// Synthesized label name (`__cl<n>`), assigned the first time the
    /// analyzer elaborates this literal's initializer.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    PostIncrement,
    PostDecrement,
    PreIncrement,
    PreDecrement,
    Address,
    Indirection,
    Plus,
    Minus,
    Complement,
    Negate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOperatorExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Node<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastExpression {
    pub type_name: Node<TypeName>,
    pub expression: Box<Node<Expression>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Index,
    Multiply,
    Divide,
    Modulo,
    Plus,
    Minus,
    ShiftLeft,
    ShiftRight,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Equals,
    NotEquals,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
    Assign,
    AssignMultiply,
    AssignDivide,
    AssignModulo,
    AssignPlus,
    AssignMinus,
    AssignShiftLeft,
    AssignShiftRight,
    AssignBitwiseAnd,
    AssignBitwiseXor,
    AssignBitwiseOr,
}

impl BinaryOperator {
    /// The plain arithmetic operator a compound-assignment operator
    /// expands to, e.g. `+=` → `+`. Used by the analyzer so compound
    /// assignment shares the additive/multiplicative/shift/bitwise
    /// constraint checks with their non-assigning counterparts.
    pub fn underlying(self) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        Some(match self {
            AssignMultiply => Multiply,
            AssignDivide => Divide,
            AssignModulo => Modulo,
            AssignPlus => Plus,
            AssignMinus => Minus,
            AssignShiftLeft => ShiftLeft,
            AssignShiftRight => ShiftRight,
            AssignBitwiseAnd => BitwiseAnd,
            AssignBitwiseXor => BitwiseXor,
            AssignBitwiseOr => BitwiseOr,
            _ => return None,
        })
    }

    pub fn is_assignment(self) -> bool {
        use BinaryOperator::*;
        matches!(
            self,
            Assign
                | AssignMultiply
                | AssignDivide
                | AssignModulo
                | AssignPlus
                | AssignMinus
                | AssignShiftLeft
                | AssignShiftRight
                | AssignBitwiseAnd
                | AssignBitwiseXor
                | AssignBitwiseOr
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOperatorExpression {
    pub operator: BinaryOperator,
    pub lhs: Box<Node<Expression>>,
    pub rhs: Box<Node<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    pub condition: Box<Node<Expression>>,
    pub then_expression: Box<Node<Expression>>,
    pub else_expression: Box<Node<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaArgExpression {
    pub va_list: Box<Node<Expression>>,
    pub type_name: Node<TypeName>,
}

// --- Declarations (C11 6.7, trimmed to C89/C99) ---------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub specifiers: Vec<Node<DeclarationSpecifier>>,
    pub declarators: Vec<Node<InitDeclarator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationSpecifier {
    StorageClass(StorageClassSpecifier),
    TypeSpecifier(TypeSpecifier),
    TypeQualifier(TypeQualifier),
    Function(FunctionSpecifier),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitDeclarator {
    pub declarator: Node<Declarator>,
    pub initializer: Option<Node<Initializer>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClassSpecifier {
    Typedef,
    Extern,
    Static,
    Auto,
    Register,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpecifier {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
    Bool,
    Struct(Node<StructType>),
    Enum(Node<EnumTypeSpec>),
    TypedefName(Node<Identifier>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeQualifier {
    Const,
    Volatile,
    Restrict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionSpecifier {
    Inline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub kind: StructKind,
    pub identifier: Option<Node<Identifier>>,
    pub declarations: Option<Vec<Node<StructDeclaration>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    Struct,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDeclaration {
    pub specifiers: Vec<Node<SpecifierQualifier>>,
    pub declarators: Vec<Node<StructDeclarator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpecifierQualifier {
    TypeSpecifier(TypeSpecifier),
    TypeQualifier(TypeQualifier),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDeclarator {
    pub declarator: Option<Node<Declarator>>,
    pub bit_width: Option<Box<Node<Expression>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumTypeSpec {
    pub identifier: Option<Node<Identifier>>,
    pub enumerators: Option<Vec<Node<Enumerator>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerator {
    pub identifier: Node<Identifier>,
    pub expression: Option<Box<Node<Expression>>>,
    /// Computed value (explicit constant, or previous + 1), filled by the
    /// analyzer (spec 4.5 "Identifier resolution").
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub kind: DeclaratorKind,
    pub derived: Vec<Node<DerivedDeclarator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclaratorKind {
    Abstract,
    Identifier(Node<Identifier>),
    Declarator(Box<Node<Declarator>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DerivedDeclarator {
    Pointer(Vec<Node<TypeQualifier>>),
    Array(ArrayDeclarator),
    Function(FunctionDeclarator),
    /// `f(a, b)` with no types — the rejected K&R form (section 1
    /// non-goals).
    KRFunction(Vec<Node<Identifier>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDeclarator {
    pub qualifiers: Vec<Node<TypeQualifier>>,
    pub size: ArraySize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArraySize {
    Unknown,
    VariableUnknown,
    Expression(Box<Node<Expression>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclarator {
    pub parameters: Vec<Node<ParameterDeclaration>>,
    pub ellipsis: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    pub specifiers: Vec<Node<DeclarationSpecifier>>,
    pub declarator: Option<Node<Declarator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub specifiers: Vec<Node<SpecifierQualifier>>,
    pub declarator: Option<Node<Declarator>>,
}

// --- Initializers (C11 6.7.9) ---------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Expression(Box<Node<Expression>>),
    List(Vec<Node<InitializerListItem>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitializerListItem {
    pub designation: Vec<Node<Designator>>,
    pub initializer: Box<Node<Initializer>>,
    /// Byte offset within the enclosing object, computed during
    /// elaboration (spec 3 "Initializer list semantics").
    pub offset: Option<u64>,
    /// Target element type at that offset, computed during elaboration.
    pub element_type: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Designator {
    Index(Node<Expression>),
    Member(Node<Identifier>),
}

// --- Statements (C11 6.8) --------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Labeled(LabeledStatement),
    Compound(Vec<Node<BlockItem>>),
    Expression(Option<Box<Node<Expression>>>),
    If(IfStatement),
    Switch(SwitchStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    For(ForStatement),
    Goto(Node<Identifier>),
    Continue,
    Break,
    Return(Option<Box<Node<Expression>>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStatement {
    pub label: Node<Label>,
    pub statement: Box<Node<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Box<Node<Expression>>,
    pub then_statement: Box<Node<Statement>>,
    pub else_statement: Option<Box<Node<Statement>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStatement {
    pub expression: Box<Node<Expression>>,
    pub statement: Box<Node<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub expression: Box<Node<Expression>>,
    pub statement: Box<Node<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStatement {
    pub statement: Box<Node<Statement>>,
    pub expression: Box<Node<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub initializer: Node<ForInitializer>,
    pub condition: Option<Box<Node<Expression>>>,
    pub step: Option<Box<Node<Expression>>>,
    pub statement: Box<Node<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Identifier(Node<Identifier>),
    Case(Box<Node<Expression>>),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInitializer {
    Empty,
    Expression(Box<Node<Expression>>),
    Declaration(Node<Declaration>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Declaration(Node<Declaration>),
    Statement(Node<Statement>),
}

// --- Top level (C11 6.9) ---------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit(pub Vec<Node<ExternalDeclaration>>);

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalDeclaration {
    Declaration(Node<Declaration>),
    FunctionDefinition(Node<FunctionDefinition>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub specifiers: Vec<Node<DeclarationSpecifier>>,
    pub declarator: Node<Declarator>,
    pub statement: Node<Statement>,
}

impl Declarator {
    /// Innermost identifier this declarator names, if any (abstract
    /// declarators in parameter lists and type names have none).
    pub fn get_identifier(&self) -> Option<&Identifier> {
        match &self.kind {
            DeclaratorKind::Identifier(id) => Some(&id.node),
            DeclaratorKind::Declarator(inner) => inner.node.get_identifier(),
            DeclaratorKind::Abstract => None,
        }
    }

    pub fn get_function(&self) -> Option<&FunctionDeclarator> {
        self.derived.iter().find_map(|d| match &d.node {
            DerivedDeclarator::Function(f) => Some(f),
            _ => None,
        })
    }

    /// Mutable counterpart to [`Self::get_identifier`], for stamping a
    /// resolved symbol back onto the declaring identifier.
    pub fn get_identifier_mut(&mut self) -> Option<&mut Identifier> {
        match &mut self.kind {
            DeclaratorKind::Identifier(id) => Some(&mut id.node),
            DeclaratorKind::Declarator(inner) => inner.node.get_identifier_mut(),
            DeclaratorKind::Abstract => None,
        }
    }

    pub fn is_kr_function(&self) -> bool {
        self.derived
            .iter()
            .any(|d| matches!(&d.node, DerivedDeclarator::KRFunction(_)))
    }
}

impl Declaration {
    pub fn storage_class(&self) -> Option<StorageClassSpecifier> {
        self.specifiers.iter().find_map(|s| match &s.node {
            DeclarationSpecifier::StorageClass(sc) => Some(*sc),
            _ => None,
        })
    }

    pub fn is_typedef(&self) -> bool {
        self.storage_class() == Some(StorageClassSpecifier::Typedef)
    }
}
