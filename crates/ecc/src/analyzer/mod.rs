//! Semantic analysis (spec 4.4/4.5): walks a parsed translation unit with
//! [`ecc_ast::traverse::Visitor`], building the symbol table, typing every
//! expression, and elaborating initializers as it goes. Emission (spec 4.6)
//! reads the AST's `ty`/`is_lvalue`/`offset` decorations and the symbol
//! table this module leaves behind; it does not re-derive anything here.

pub mod decl;
pub mod expr;
pub mod init;
pub mod intrinsics;
pub mod regcheck;

use ecc_ast::ast::*;
use ecc_ast::span::{Location, Node};
use ecc_ast::traverse::Visitor;
use ecc_ast::types::*;

use crate::diagnostics::Diagnostics;
use crate::symtab::{Linkage, Namespace, StorageDuration, SymbolTable};

#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Traces scope entry/exit and symbol declarations to the diagnostic
    /// stream as analysis proceeds.
    pub iflag: bool,
}

struct SwitchContext {
    seen_values: Vec<i64>,
    has_default: bool,
}

/// Drives one pass over a [`TranslationUnit`], declaring every symbol,
/// typing every expression, and elaborating every initializer.
pub struct SemanticAnalyzer {
    pub symbols: SymbolTable,
    pub diagnostics: Diagnostics,
    pub options: Options,

    label_counter: u32,

    // State threaded across `before_declaration`/`before_init_declarator`/
    // `after_init_declarator`/`after_declaration`: a `Declaration` names its
    // base type and storage class once for every declarator it lists.
    pending_base_type: Option<Type>,
    pending_is_typedef: bool,
    pending_storage_class: Option<StorageClassSpecifier>,

    current_function_return: Option<Type>,
    loop_depth: u32,
    switch_stack: Vec<SwitchContext>,
    compound_scope_pushed: Vec<bool>,
    /// Set just before visiting a function's body so the body's own
    /// `Statement::Compound` reuses the parameter scope instead of nesting
    /// a redundant one (C99 6.2.1 §4: parameters and the outermost block
    /// of a function body share one scope).
    suppress_next_compound_scope: bool,

    tentative_definitions: Vec<crate::symtab::SymbolId>,
}

impl SemanticAnalyzer {
    pub fn new(options: Options) -> Self {
        SemanticAnalyzer {
            symbols: SymbolTable::new(),
            diagnostics: Diagnostics::new(),
            options,
            label_counter: 0,
            pending_base_type: None,
            pending_is_typedef: false,
            pending_storage_class: None,
            current_function_return: None,
            loop_depth: 0,
            switch_stack: Vec::new(),
            compound_scope_pushed: Vec::new(),
            suppress_next_compound_scope: false,
            tentative_definitions: Vec::new(),
        }
    }

    /// Runs the full pass over `tu`, returning through `self.diagnostics`.
    pub fn analyze(&mut self, tu: &mut TranslationUnit) {
        ecc_ast::traverse::walk_translation_unit(self, tu);
        self.finish();
    }

    /// Called once analysis is done (SPEC_FULL Open Question 1): reports
    /// any file-scope tentative definition that was never completed by a
    /// defining declaration later in the translation unit. Does not
    /// synthesize a zero-initialized definition for them.
    fn finish(&mut self) {
        for &sym in &self.tentative_definitions {
            let symbol = self.symbols.get(sym);
            if symbol.is_tentative {
                self.diagnostics.warning(
                    Location::new(0, 0),
                    format!(
                        "tentative definition of '{}' is never completed (end-of-translation-unit promotion is not implemented)",
                        symbol.name
                    ),
                );
            }
        }
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        self.label_counter += 1;
        format!("{}{}", prefix, self.label_counter)
    }

    fn declare_object(&mut self, id: &mut Node<InitDeclarator>, ty: Type, has_initializer: bool) {
        let loc = id.location();
        let name = match id.node.declarator.node.get_identifier() {
            Some(ident) => ident.name.clone(),
            None => return,
        };

        let sym = self.symbols.declare(&name, Namespace::Ordinary);
        let file_scope = self.symbols.is_file_scope();
        let storage = self.pending_storage_class;

        let existing = self.symbols.get(sym).ty.clone();
        let ty = if matches!(existing.kind, TypeKind::Error) {
            ty
        } else if existing.compatible(&ty, false) {
            existing.composite(&ty)
        } else {
            self.diagnostics.error(loc, format!("conflicting types for '{}'", name));
            ty
        };

        {
            let symbol = self.symbols.get_mut(sym);
            symbol.ty = ty;
            symbol.is_register = storage == Some(StorageClassSpecifier::Register);
            symbol.linkage = match storage {
                Some(StorageClassSpecifier::Extern) => Linkage::External,
                Some(StorageClassSpecifier::Static) => Linkage::Internal,
                _ if file_scope => Linkage::External,
                _ => Linkage::None,
            };
            symbol.storage_duration = if file_scope || storage == Some(StorageClassSpecifier::Static) {
                StorageDuration::Static
            } else {
                StorageDuration::Automatic
            };
            if file_scope && !has_initializer && storage != Some(StorageClassSpecifier::Extern) {
                symbol.is_tentative = true;
            } else if has_initializer {
                symbol.is_defined = true;
            }
        }

        if file_scope {
            self.tentative_definitions.push(sym);
        }
        if storage == Some(StorageClassSpecifier::Register) && file_scope {
            self.diagnostics.error(loc, "file-scope declarations cannot be 'register'");
        }
        if let Some(ident) = id.node.declarator.node.get_identifier_mut() {
            ident.symbol = Some(sym);
        }
    }
}

impl Visitor for SemanticAnalyzer {
    fn before_declaration(&mut self, decl: &mut Node<Declaration>) {
        let loc = decl.location();
        let storage = decl.node.storage_class();

        let storage_class_count = decl
            .node
            .specifiers
            .iter()
            .filter(|s| matches!(s.node, DeclarationSpecifier::StorageClass(_)))
            .count();
        if storage_class_count > 1 {
            self.diagnostics.error(loc, "a declaration may name at most one storage-class specifier");
        }
        if self.symbols.is_file_scope() && matches!(storage, Some(StorageClassSpecifier::Auto) | Some(StorageClassSpecifier::Register)) {
            self.diagnostics.error(loc, "file-scope declarations cannot be 'auto' or 'register'");
        }

        self.pending_base_type = Some(decl::resolve_specifiers(&decl.node.specifiers, &mut self.symbols, &mut self.diagnostics, loc));
        self.pending_is_typedef = decl.node.is_typedef();
        self.pending_storage_class = storage;
    }

    fn after_declaration(&mut self, _decl: &mut Node<Declaration>) {
        self.pending_base_type = None;
        self.pending_is_typedef = false;
        self.pending_storage_class = None;
    }

    fn before_init_declarator(&mut self, id: &mut Node<InitDeclarator>) {
        let loc = id.location();
        let base = self.pending_base_type.clone().unwrap_or_else(Type::error);
        let ty = decl::resolve_declarator(base, &id.node.declarator.node, &mut self.symbols, &mut self.diagnostics, loc);

        if self.pending_is_typedef {
            if let Some(name) = id.node.declarator.node.get_identifier().map(|i| i.name.clone()) {
                let sym = self.symbols.declare(&name, Namespace::Ordinary);
                {
                    let symbol = self.symbols.get_mut(sym);
                    symbol.ty = ty;
                    symbol.is_defined = true;
                }
                if let Some(ident) = id.node.declarator.node.get_identifier_mut() {
                    ident.symbol = Some(sym);
                }
            }
            return;
        }

        let has_initializer = id.node.initializer.is_some();
        self.declare_object(id, ty, has_initializer);
    }

    fn after_init_declarator(&mut self, id: &mut Node<InitDeclarator>) {
        if self.pending_is_typedef {
            return;
        }
        let loc = id.location();
        let base = self.pending_base_type.clone().unwrap_or_else(Type::error);
        let mut ty = decl::resolve_declarator(base, &id.node.declarator.node, &mut self.symbols, &mut self.diagnostics, loc);

        let sym = match id.node.declarator.node.get_identifier().and_then(|i| i.symbol) {
            Some(sym) => sym,
            None => return,
        };

        if let Some(initializer) = &mut id.node.initializer {
            init::elaborate_initializer(self, initializer, &mut ty, loc);

            let symbol = self.symbols.get_mut(sym);
            symbol.ty = ty.clone();
            symbol.is_defined = true;
            symbol.is_tentative = false;

            if self.symbols.get(sym).storage_duration == StorageDuration::Static {
                let (bytes, relocations) = init::materialize_static(&initializer.node, &ty, &self.symbols);
                let symbol = self.symbols.get_mut(sym);
                symbol.init_data = Some(bytes);
                symbol.relocations = relocations;
            }
        }
    }

    fn before_function_definition(&mut self, def: &mut Node<FunctionDefinition>) {
        let loc = def.location();
        for s in &def.node.specifiers {
            if let DeclarationSpecifier::StorageClass(sc) = &s.node {
                if !matches!(sc, StorageClassSpecifier::Static | StorageClassSpecifier::Extern) {
                    self.diagnostics
                        .error(loc, "function definitions may only use 'static' or 'extern' as a storage-class specifier");
                }
            }
        }

        let base = decl::resolve_specifiers(&def.node.specifiers, &mut self.symbols, &mut self.diagnostics, loc);
        let declared = decl::resolve_declarator(base, &def.node.declarator.node, &mut self.symbols, &mut self.diagnostics, loc);
        let (return_type, variadic, prototyped) = match declared.kind {
            TypeKind::Function(f) => (*f.return_type, f.variadic, f.prototyped),
            _ => {
                self.diagnostics.error(loc, "function definition declarator does not declare a function");
                (Type::error(), false, false)
            }
        };

        let function_declarator = def.node.declarator.node.get_function().cloned();
        let params = function_declarator
            .as_ref()
            .map(|f| decl::resolve_function_params(&f.parameters, &mut self.symbols, &mut self.diagnostics, loc))
            .unwrap_or_default();

        let func_ty = Type::new(TypeKind::Function(FunctionType {
            return_type: Box::new(return_type.clone()),
            params: params.clone(),
            variadic,
            prototyped,
        }));

        let is_static = def
            .node
            .specifiers
            .iter()
            .any(|s| matches!(s.node, DeclarationSpecifier::StorageClass(StorageClassSpecifier::Static)));

        let is_inline = def
            .node
            .specifiers
            .iter()
            .any(|s| matches!(s.node, DeclarationSpecifier::Function(FunctionSpecifier::Inline)));

        if let Some(name) = def.node.declarator.node.get_identifier().map(|i| i.name.clone()) {
            if name == "main" && !return_type.compatible(&Type::int(), true) {
                self.diagnostics.warning(loc, "'main' should return 'int'");
            }
            if name == "main" && is_inline {
                self.diagnostics.error(loc, "'main' may not be declared 'inline'");
            }
            let sym = self.symbols.declare(&name, Namespace::Ordinary);

            let existing = self.symbols.get(sym).ty.clone();
            let already_defined = self.symbols.get(sym).is_defined;
            let func_ty = if matches!(existing.kind, TypeKind::Error) {
                func_ty
            } else if existing.compatible(&func_ty, false) {
                existing.composite(&func_ty)
            } else {
                self.diagnostics.error(loc, format!("conflicting types for '{}'", name));
                func_ty
            };
            if already_defined {
                self.diagnostics.error(loc, format!("redefinition of '{}'", name));
            }

            // C99 6.7.4 §3/§6: an inline definition with external linkage is
            // an additional, interchangeable translation unit for the
            // function — it still needs an ordinary external definition
            // somewhere, so it does not by itself satisfy that requirement.
            // `static inline` has no such constraint; either way `inline` is
            // advisory and never changes the declared type.
            if is_inline && !prototyped {
                self.diagnostics.error(loc, "inline function must have a prototyped parameter list");
            }

            {
                let symbol = self.symbols.get_mut(sym);
                symbol.ty = func_ty;
                symbol.is_defined = true;
                symbol.linkage = if is_static { Linkage::Internal } else { Linkage::External };
                symbol.storage_duration = StorageDuration::Static;
            }
            if let Some(ident) = def.node.declarator.node.get_identifier_mut() {
                ident.symbol = Some(sym);
            }
        }

        self.symbols.push_scope();
        self.suppress_next_compound_scope = true;
        self.current_function_return = Some(return_type);
        self.loop_depth = 0;
        self.switch_stack.clear();

        if let Some(f) = &function_declarator {
            for (param, ty) in f.parameters.iter().zip(params.iter()) {
                if let Some(name) = param.node.declarator.as_ref().and_then(|d| d.node.get_identifier()).map(|i| i.name.clone()) {
                    let sym = self.symbols.declare(&name, Namespace::Ordinary);
                    let symbol = self.symbols.get_mut(sym);
                    symbol.ty = ty.clone();
                    symbol.storage_duration = StorageDuration::Automatic;
                    symbol.linkage = Linkage::None;
                    symbol.is_defined = true;
                }
            }
        }

        collect_labels(&def.node.statement, &mut self.symbols);
    }

    fn after_function_definition(&mut self, _def: &mut Node<FunctionDefinition>) {
        self.symbols.pop_scope();
        self.current_function_return = None;
        self.suppress_next_compound_scope = false;
    }

    fn before_statement(&mut self, stmt: &mut Node<Statement>) {
        let loc = stmt.location();
        match &mut stmt.node {
            Statement::Compound(_) => {
                let pushed = if self.suppress_next_compound_scope {
                    self.suppress_next_compound_scope = false;
                    false
                } else {
                    self.symbols.push_scope();
                    true
                };
                self.compound_scope_pushed.push(pushed);
            }
            Statement::For(_) => {
                self.symbols.push_scope();
                self.loop_depth += 1;
            }
            Statement::While(_) | Statement::DoWhile(_) => {
                self.loop_depth += 1;
            }
            Statement::Switch(_) => {
                self.switch_stack.push(SwitchContext { seen_values: Vec::new(), has_default: false });
            }
            Statement::Labeled(labeled) => match &mut labeled.label.node {
                Label::Identifier(id) => {
                    if let Some(sym) = self.symbols.lookup(&id.node.name, Namespace::Label) {
                        id.node.symbol = Some(sym);
                    }
                }
                Label::Case(expr) => match self.switch_stack.last_mut() {
                    None => self.diagnostics.error(loc, "'case' label not within a switch statement"),
                    Some(ctx) => match crate::constexpr::evaluate(&**expr, &self.symbols) {
                        Ok(crate::constexpr::ConstValue::Integer { value, .. }) => {
                            let value = value as i64;
                            if ctx.seen_values.contains(&value) {
                                self.diagnostics.error(loc, format!("duplicate 'case' value {}", value));
                            } else {
                                ctx.seen_values.push(value);
                            }
                        }
                        _ => self.diagnostics.error(loc, "'case' label does not reduce to an integer constant expression"),
                    },
                },
                Label::Default => match self.switch_stack.last_mut() {
                    None => self.diagnostics.error(loc, "'default' label not within a switch statement"),
                    Some(ctx) if ctx.has_default => self.diagnostics.error(loc, "multiple 'default' labels in one switch"),
                    Some(ctx) => ctx.has_default = true,
                },
            },
            Statement::Goto(id) => match self.symbols.lookup(&id.node.name, Namespace::Label) {
                Some(sym) => id.node.symbol = Some(sym),
                None => self.diagnostics.error(loc, format!("use of undeclared label '{}'", id.node.name)),
            },
            Statement::Continue => {
                if self.loop_depth == 0 {
                    self.diagnostics.error(loc, "'continue' statement not within a loop");
                }
            }
            Statement::Break => {
                if self.loop_depth == 0 && self.switch_stack.is_empty() {
                    self.diagnostics.error(loc, "'break' statement not within a loop or switch");
                }
            }
            Statement::Return(expr) => {
                let returns_void = self.current_function_return.as_ref().map(Type::is_void).unwrap_or(true);
                match (expr.is_some(), returns_void) {
                    (true, true) => self.diagnostics.error(loc, "'return' with a value in a function returning void"),
                    (false, false) => self.diagnostics.error(loc, "'return' with no value in a function returning non-void"),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn after_statement(&mut self, _stmt: &mut Node<Statement>) {
        match &_stmt.node {
            Statement::Compound(_) => {
                if self.compound_scope_pushed.pop().unwrap_or(false) {
                    self.symbols.pop_scope();
                }
            }
            Statement::For(_) => {
                self.symbols.pop_scope();
                self.loop_depth -= 1;
            }
            Statement::While(_) | Statement::DoWhile(_) => {
                self.loop_depth -= 1;
            }
            Statement::Switch(_) => {
                self.switch_stack.pop();
            }
            _ => {}
        }
    }

    fn after_expression(&mut self, expr: &mut Node<Expression>) {
        expr::type_expression(self, expr);
    }
}

/// Pre-registers every `goto`-target label in a function body so a `goto`
/// can jump forward to a label the traversal hasn't reached yet (C99 6.2.1
/// §4: a label has function-body scope regardless of lexical position).
fn collect_labels(stmt: &Node<Statement>, symtab: &mut SymbolTable) {
    match &stmt.node {
        Statement::Labeled(labeled) => {
            if let Label::Identifier(id) = &labeled.label.node {
                let sym = symtab.declare(&id.node.name, Namespace::Label);
                let symbol = symtab.get_mut(sym);
                symbol.ty = Type::new(TypeKind::Label);
                symbol.is_defined = true;
            }
            collect_labels(&labeled.statement, symtab);
        }
        Statement::Compound(items) => {
            for item in items {
                if let BlockItem::Statement(s) = &item.node {
                    collect_labels(s, symtab);
                }
            }
        }
        Statement::If(s) => {
            collect_labels(&s.then_statement, symtab);
            if let Some(e) = &s.else_statement {
                collect_labels(e, symtab);
            }
        }
        Statement::Switch(s) => collect_labels(&s.statement, symtab),
        Statement::While(s) => collect_labels(&s.statement, symtab),
        Statement::DoWhile(s) => collect_labels(&s.statement, symtab),
        Statement::For(s) => collect_labels(&s.statement, symtab),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_label_is_unique_per_call() {
        let mut analyzer = SemanticAnalyzer::new(Options::default());
        let a = analyzer.fresh_label("__sl");
        let b = analyzer.fresh_label("__sl");
        assert_ne!(a, b);
    }

    #[test]
    fn file_scope_register_is_rejected() {
        let mut analyzer = SemanticAnalyzer::new(Options::default());
        analyzer.pending_storage_class = Some(StorageClassSpecifier::Register);
        let ident = Node::synthetic(Identifier::new("x"));
        let mut id = Node::synthetic(InitDeclarator {
            declarator: Node::synthetic(Declarator { kind: DeclaratorKind::Identifier(ident), derived: vec![] }),
            initializer: None,
        });
        analyzer.declare_object(&mut id, Type::int(), false);
        assert!(analyzer.diagnostics.error_count() > 0);
    }
}
