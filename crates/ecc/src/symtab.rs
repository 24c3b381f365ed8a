//! Scoped symbol table (spec 4.2).
//!
//! Scopes form a tree rooted at the translation unit; `SymbolTable` owns
//! both the scope tree and the symbol arena, so a [`SymbolId`] stays valid
//! for the lifetime of the table regardless of which scope is current.
//! The member namespace named in spec 3 is deliberately *not* modeled as a
//! scope here: struct/union members are resolved directly against
//! `ecc_ast::types::RecordType::members`, which already orders them the
//! way layout requires (see `analyzer::expr::member`).

use std::collections::HashMap;
use std::fmt::Write as _;

use ecc_ast::ast::SymbolRef;
use ecc_ast::types::Type;

pub type SymbolId = SymbolRef;
pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Objects, functions, typedefs, enumeration constants.
    Ordinary,
    /// `struct`/`union`/`enum` tags.
    Tag,
    /// `goto` labels — function-body scope only.
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    External,
    Internal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageDuration {
    Static,
    Automatic,
    /// Heap-allocated — reserved for a future `malloc`-backed extension;
    /// no construct in this language subset produces it, but spec 3 lists
    /// it alongside the other three so `Symbol` models the full set.
    Allocated,
    None,
}

/// `(data_offset, target_symbol, signed_addend)` (spec 4.5 "Static
/// initializer materialization").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub offset: u64,
    pub target: SymbolId,
    pub addend: i64,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub namespace: Namespace,
    pub ty: Type,
    pub storage_duration: StorageDuration,
    pub linkage: Linkage,
    pub init_data: Option<Vec<u8>>,
    pub relocations: Vec<Relocation>,
    /// Filled during emission (spec 4.6 "Symbol / indirect symbol").
    pub stack_offset: Option<i64>,
    /// A file-scope object declaration with no initializer and no
    /// `extern` (glossary "Tentative definition"); tracked so
    /// `SemanticAnalyzer::finish` can warn about ones never completed
    /// (SPEC_FULL Open Question 1).
    pub is_tentative: bool,
    pub is_defined: bool,
    /// Declared with the `register` storage-class specifier — `&x` on
    /// this symbol, or on a struct/array lvalue rooted at it, is a
    /// constraint violation (spec 4.5 "unary `&`").
    pub is_register: bool,
    /// `Some(value)` for an enumeration constant's ordinary-namespace
    /// symbol, so a later reference to it can fold in a constant
    /// expression (spec 4.3 "enumeration constant").
    pub enum_value: Option<i64>,
}

impl Symbol {
    fn placeholder(name: String, namespace: Namespace) -> Self {
        Symbol {
            name,
            namespace,
            ty: Type::error(),
            storage_duration: StorageDuration::None,
            linkage: Linkage::None,
            init_data: None,
            relocations: Vec::new(),
            stack_offset: None,
            is_tentative: false,
            is_defined: false,
            is_register: false,
            enum_value: None,
        }
    }
}

struct Scope {
    parent: Option<ScopeId>,
    ordinary: HashMap<String, SymbolId>,
    tags: HashMap<String, SymbolId>,
    labels: HashMap<String, SymbolId>,
}

impl Scope {
    fn new(parent: Option<ScopeId>) -> Self {
        Scope {
            parent,
            ordinary: HashMap::new(),
            tags: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    fn map(&self, namespace: Namespace) -> &HashMap<String, SymbolId> {
        match namespace {
            Namespace::Ordinary => &self.ordinary,
            Namespace::Tag => &self.tags,
            Namespace::Label => &self.labels,
        }
    }

    fn map_mut(&mut self, namespace: Namespace) -> &mut HashMap<String, SymbolId> {
        match namespace {
            Namespace::Ordinary => &mut self.ordinary,
            Namespace::Tag => &mut self.tags,
            Namespace::Label => &mut self.labels,
        }
    }
}

pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    current: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::new(None)],
            symbols: Vec::new(),
            current: 0,
        }
    }

    pub fn file_scope(&self) -> ScopeId {
        0
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    pub fn is_file_scope(&self) -> bool {
        self.current == 0
    }

    /// Compound statements, function bodies/parameter lists, and `for`
    /// init declarations all push one of these (spec 4.2).
    pub fn push_scope(&mut self) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope::new(Some(self.current)));
        self.current = id;
        id
    }

    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }

    /// First matching symbol walking from the innermost enclosing scope
    /// outward (spec 4.2 "Lookup").
    pub fn lookup(&self, name: &str, namespace: Namespace) -> Option<SymbolId> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            if let Some(&sym) = self.scopes[id].map(namespace).get(name) {
                return Some(sym);
            }
            scope = self.scopes[id].parent;
        }
        None
    }

    /// Like [`Self::lookup`] but restricted to the current scope only —
    /// what a declarer check needs to detect "redeclared in the same
    /// scope."
    pub fn lookup_current_scope(&self, name: &str, namespace: Namespace) -> Option<SymbolId> {
        self.scopes[self.current].map(namespace).get(name).copied()
    }

    /// All matching symbols across every enclosing scope, innermost
    /// first (spec 4.2 "Count-lookup ... for compatibility checks").
    pub fn lookup_all(&self, name: &str, namespace: Namespace) -> Vec<SymbolId> {
        let mut out = Vec::new();
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            if let Some(&sym) = self.scopes[id].map(namespace).get(name) {
                out.push(sym);
            }
            scope = self.scopes[id].parent;
        }
        out
    }

    /// Declaring occurrence: links to the pre-existing symbol in the
    /// current scope if present, otherwise allocates a new placeholder
    /// the caller fills in.
    pub fn declare(&mut self, name: &str, namespace: Namespace) -> SymbolId {
        if let Some(existing) = self.lookup_current_scope(name, namespace) {
            return existing;
        }
        let id = self.symbols.len();
        self.symbols.push(Symbol::placeholder(name.to_string(), namespace));
        self.scopes[self.current]
            .map_mut(namespace)
            .insert(name.to_string(), id);
        id
    }

    /// Inserts a symbol under a synthesized name not reachable by source
    /// lookup (compound/string/float literal labels), returning its id.
    pub fn declare_synthetic(&mut self, name: String, ty: Type, storage_duration: StorageDuration) -> SymbolId {
        let id = self.symbols.len();
        self.symbols.push(Symbol {
            ty,
            storage_duration,
            linkage: Linkage::None,
            is_defined: true,
            ..Symbol::placeholder(name, Namespace::Ordinary)
        });
        id
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate()
    }

    /// Debug pretty-printer over scopes, gated behind `iflag`-style
    /// verbose output (SPEC_FULL "SymbolTable::dump").
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (idx, scope) in self.scopes.iter().enumerate() {
            let _ = writeln!(out, "scope {} (parent={:?})", idx, scope.parent);
            for (name, &id) in &scope.ordinary {
                let sym = &self.symbols[id];
                let _ = writeln!(out, "  ordinary {} -> {:?}", name, sym.ty);
            }
            for (name, &id) in &scope.tags {
                let _ = writeln!(out, "  tag {} -> {:?}", name, self.symbols[id].ty);
            }
            for (name, &id) in &scope.labels {
                let _ = writeln!(out, "  label {} -> {:?}", name, self.symbols[id].ty);
            }
        }
        out
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecc_ast::types::Type;
    use pretty_assertions::assert_eq;

    #[test]
    fn inner_scope_shadows_outer() {
        let mut table = SymbolTable::new();
        let outer = table.declare("x", Namespace::Ordinary);
        table.get_mut(outer).ty = Type::int();

        table.push_scope();
        let inner = table.declare("x", Namespace::Ordinary);
        table.get_mut(inner).ty = Type::pointer_to(Type::int());

        assert_ne!(outer, inner);
        let found = table.lookup("x", Namespace::Ordinary).unwrap();
        assert_eq!(found, inner);

        table.pop_scope();
        let found = table.lookup("x", Namespace::Ordinary).unwrap();
        assert_eq!(found, outer);
    }

    #[test]
    fn redeclaration_in_same_scope_links_to_existing_symbol() {
        let mut table = SymbolTable::new();
        let first = table.declare("f", Namespace::Ordinary);
        let second = table.declare("f", Namespace::Ordinary);
        assert_eq!(first, second);
    }

    #[test]
    fn namespaces_are_independent() {
        let mut table = SymbolTable::new();
        let tag = table.declare("point", Namespace::Tag);
        let ordinary = table.declare("point", Namespace::Ordinary);
        assert_ne!(tag, ordinary);
    }

    #[test]
    fn lookup_all_walks_every_enclosing_scope() {
        let mut table = SymbolTable::new();
        table.declare("v", Namespace::Ordinary);
        table.push_scope();
        table.declare("v", Namespace::Ordinary);
        let all = table.lookup_all("v", Namespace::Ordinary);
        assert_eq!(all.len(), 2);
    }
}
