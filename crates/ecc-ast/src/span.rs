//! Source position tracking.
//!
//! Every AST node is wrapped in a [`Node`] carrying the row/column where it
//! started. The analyzer and emitter never synthesize spans for nodes that
//! came from the (external) parser; they only ever read them back out for
//! diagnostics.

/// A single source position, one-indexed to match the diagnostic format
/// `[row:col] message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub row: u32,
    pub col: u32,
}

impl Location {
    pub fn new(row: u32, col: u32) -> Self {
        Location { row, col }
    }
}

/// A span between two source positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub fn new(start: Location, end: Location) -> Self {
        Span { start, end }
    }

    /// Span used for synthesized nodes that have no source text of their
    /// own (e.g. an implicit conversion inserted by the analyzer).
    pub fn synthetic() -> Self {
        Span {
            start: Location::new(0, 0),
            end: Location::new(0, 0),
        }
    }
}

/// Wraps an AST payload together with the span of source text it came from.
///
/// Mirrors `lang_c::span::Node<T>`: the analyzer decorates the tree by
/// mutating `node` in place through `&mut Node<T>`, never by rebuilding
/// nodes, so a node's span is stable for its entire lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Node<T> {
    pub fn new(node: T, span: Span) -> Self {
        Node { node, span }
    }

    pub fn synthetic(node: T) -> Self {
        Node {
            node,
            span: Span::synthetic(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Node<U> {
        Node {
            node: f(self.node),
            span: self.span,
        }
    }

    pub fn location(&self) -> Location {
        self.span.start
    }
}
