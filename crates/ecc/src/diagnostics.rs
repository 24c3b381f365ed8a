//! User-facing compiler diagnostics.
//!
//! Per the "errors never throw" rule: a constraint violation or warning is
//! never returned as a `Result` error — it is appended here and analysis
//! keeps walking. This is deliberately not a `std::error::Error` type; see
//! [`crate::error`] for the handful of things that are.

use std::fmt;

use ecc_ast::span::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub location: Location,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}] {}",
            self.location.row, self.location.col, self.message
        )
    }
}

/// Ordered diagnostic list, preserving AST traversal order (spec section 5
/// "Ordering"). Owned by the analyzer, handed to the driver on completion.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn error(&mut self, location: Location, message: impl Into<String>) {
        self.records.push(Diagnostic {
            location,
            severity: Severity::Error,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, location: Location, message: impl Into<String>) {
        self.records.push(Diagnostic {
            location,
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// The driver's halt condition (spec 7): "counts non-warning errors and
    /// halts the pipeline if any exist."
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.records
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.records {
            writeln!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_as_row_col_message() {
        let mut diags = Diagnostics::new();
        diags.error(Location::new(3, 7), "unknown identifier 'x'");
        assert_eq!(diags.to_string(), "[3:7] unknown identifier 'x'\n");
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.warning(Location::new(1, 1), "register does not force residency");
        assert!(!diags.has_errors());
        diags.error(Location::new(2, 1), "duplicate definition");
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
    }
}
