//! Generic pre/post-order traversal over [`crate::ast`] nodes.
//!
//! Dispatches by syntactic category rather than by concrete node type, the
//! same shape the analyzer needs for its "before"/"after" hook pairs (spec
//! 4.4): a category the caller doesn't register a hook for is simply
//! skipped, and every node is visited in source order (declarations before
//! their initializers, statements in textual sequence, etc).

use crate::ast::*;

/// The syntactic category of a node passed to a [`Visitor`] hook. One
/// variant per construct the analyzer needs to intercept; traversal of
/// anything not named here (constants, identifiers standing alone, type
/// names) proceeds without a hook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    TranslationUnit,
    ExternalDeclaration,
    FunctionDefinition,
    Declaration,
    InitDeclarator,
    Statement,
    BlockItem,
    Expression,
    Initializer,
    InitializerListItem,
}

/// Hook pair invoked around every node of a given [`Category`]. Either half
/// may be absent; a missing hook just means "don't stop here."
pub trait Visitor {
    fn before(&mut self, _category: Category) {}
    fn after(&mut self, _category: Category) {}

    fn before_expression(&mut self, _expr: &mut Node<Expression>) {}
    fn after_expression(&mut self, _expr: &mut Node<Expression>) {}

    fn before_statement(&mut self, _stmt: &mut Node<Statement>) {}
    fn after_statement(&mut self, _stmt: &mut Node<Statement>) {}

    fn before_declaration(&mut self, _decl: &mut Node<Declaration>) {}
    fn after_declaration(&mut self, _decl: &mut Node<Declaration>) {}

    fn before_init_declarator(&mut self, _id: &mut Node<InitDeclarator>) {}
    fn after_init_declarator(&mut self, _id: &mut Node<InitDeclarator>) {}

    fn before_initializer(&mut self, _init: &mut Node<Initializer>) {}
    fn after_initializer(&mut self, _init: &mut Node<Initializer>) {}

    fn before_function_definition(&mut self, _def: &mut Node<FunctionDefinition>) {}
    fn after_function_definition(&mut self, _def: &mut Node<FunctionDefinition>) {}
}

pub fn walk_translation_unit<V: Visitor>(v: &mut V, tu: &mut TranslationUnit) {
    v.before(Category::TranslationUnit);
    for ext in &mut tu.0 {
        walk_external_declaration(v, ext);
    }
    v.after(Category::TranslationUnit);
}

fn walk_external_declaration<V: Visitor>(v: &mut V, ext: &mut Node<ExternalDeclaration>) {
    v.before(Category::ExternalDeclaration);
    match &mut ext.node {
        ExternalDeclaration::Declaration(decl) => walk_declaration(v, decl),
        ExternalDeclaration::FunctionDefinition(def) => walk_function_definition(v, def),
    }
    v.after(Category::ExternalDeclaration);
}

fn walk_function_definition<V: Visitor>(v: &mut V, def: &mut Node<FunctionDefinition>) {
    v.before(Category::FunctionDefinition);
    v.before_function_definition(def);
    walk_statement(v, &mut def.node.statement);
    v.after_function_definition(def);
    v.after(Category::FunctionDefinition);
}

fn walk_declaration<V: Visitor>(v: &mut V, decl: &mut Node<Declaration>) {
    v.before(Category::Declaration);
    v.before_declaration(decl);
    for id in &mut decl.node.declarators {
        walk_init_declarator(v, id);
    }
    v.after_declaration(decl);
    v.after(Category::Declaration);
}

fn walk_init_declarator<V: Visitor>(v: &mut V, id: &mut Node<InitDeclarator>) {
    v.before(Category::InitDeclarator);
    v.before_init_declarator(id);
    if let Some(init) = &mut id.node.initializer {
        walk_initializer(v, init);
    }
    v.after_init_declarator(id);
    v.after(Category::InitDeclarator);
}

fn walk_initializer<V: Visitor>(v: &mut V, init: &mut Node<Initializer>) {
    v.before(Category::Initializer);
    v.before_initializer(init);
    match &mut init.node {
        Initializer::Expression(expr) => walk_expression(v, expr),
        Initializer::List(items) => {
            for item in items {
                v.before(Category::InitializerListItem);
                for designator in &mut item.node.designation {
                    if let Designator::Index(expr) = &mut designator.node {
                        walk_expression(v, expr);
                    }
                }
                walk_initializer(v, &mut item.node.initializer);
                v.after(Category::InitializerListItem);
            }
        }
    }
    v.after_initializer(init);
    v.after(Category::Initializer);
}

fn walk_block_item<V: Visitor>(v: &mut V, item: &mut Node<BlockItem>) {
    v.before(Category::BlockItem);
    match &mut item.node {
        BlockItem::Declaration(decl) => walk_declaration(v, decl),
        BlockItem::Statement(stmt) => walk_statement(v, stmt),
    }
    v.after(Category::BlockItem);
}

pub fn walk_statement<V: Visitor>(v: &mut V, stmt: &mut Node<Statement>) {
    v.before(Category::Statement);
    v.before_statement(stmt);
    match &mut stmt.node {
        Statement::Labeled(labeled) => {
            if let Label::Case(expr) = &mut labeled.label.node {
                walk_expression(v, expr);
            }
            walk_statement(v, &mut labeled.statement);
        }
        Statement::Compound(items) => {
            for item in items {
                walk_block_item(v, item);
            }
        }
        Statement::Expression(Some(expr)) => walk_expression(v, expr),
        Statement::Expression(None) => {}
        Statement::If(s) => {
            walk_expression(v, &mut s.condition);
            walk_statement(v, &mut s.then_statement);
            if let Some(else_stmt) = &mut s.else_statement {
                walk_statement(v, else_stmt);
            }
        }
        Statement::Switch(s) => {
            walk_expression(v, &mut s.expression);
            walk_statement(v, &mut s.statement);
        }
        Statement::While(s) => {
            walk_expression(v, &mut s.expression);
            walk_statement(v, &mut s.statement);
        }
        Statement::DoWhile(s) => {
            walk_statement(v, &mut s.statement);
            walk_expression(v, &mut s.expression);
        }
        Statement::For(s) => {
            match &mut s.initializer.node {
                ForInitializer::Empty => {}
                ForInitializer::Expression(expr) => walk_expression(v, expr),
                ForInitializer::Declaration(decl) => walk_declaration(v, decl),
            }
            if let Some(cond) = &mut s.condition {
                walk_expression(v, cond);
            }
            if let Some(step) = &mut s.step {
                walk_expression(v, step);
            }
            walk_statement(v, &mut s.statement);
        }
        Statement::Goto(_) | Statement::Continue | Statement::Break => {}
        Statement::Return(Some(expr)) => walk_expression(v, expr),
        Statement::Return(None) => {}
    }
    v.after_statement(stmt);
    v.after(Category::Statement);
}

pub fn walk_expression<V: Visitor>(v: &mut V, expr: &mut Node<Expression>) {
    v.before(Category::Expression);
    v.before_expression(expr);
    match &mut expr.node.kind {
        ExpressionKind::Identifier(_) | ExpressionKind::Constant(_) | ExpressionKind::StringLiteral(_) => {}
        ExpressionKind::Member(m) => walk_expression(v, &mut m.node.expression),
        ExpressionKind::Call(c) => {
            walk_expression(v, &mut c.node.callee);
            for arg in &mut c.node.arguments {
                walk_expression(v, arg);
            }
        }
        ExpressionKind::CompoundLiteral(c) => {
            for item in &mut c.node.initializer_list {
                for designator in &mut item.node.designation {
                    if let Designator::Index(idx) = &mut designator.node {
                        walk_expression(v, idx);
                    }
                }
                walk_initializer(v, &mut item.node.initializer);
            }
        }
        ExpressionKind::SizeOfType(_) => {}
        ExpressionKind::SizeOfExpr(inner) => walk_expression(v, inner),
        ExpressionKind::UnaryOperator(u) => walk_expression(v, &mut u.node.operand),
        ExpressionKind::Cast(c) => walk_expression(v, &mut c.node.expression),
        ExpressionKind::BinaryOperator(b) => {
            walk_expression(v, &mut b.node.lhs);
            walk_expression(v, &mut b.node.rhs);
        }
        ExpressionKind::Conditional(c) => {
            walk_expression(v, &mut c.node.condition);
            walk_expression(v, &mut c.node.then_expression);
            walk_expression(v, &mut c.node.else_expression);
        }
        ExpressionKind::Comma(exprs) => {
            for e in exprs.iter_mut() {
                walk_expression(v, e);
            }
        }
        ExpressionKind::VaArg(a) => walk_expression(v, &mut a.node.va_list),
    }
    v.after_expression(expr);
    v.after(Category::Expression);
}
