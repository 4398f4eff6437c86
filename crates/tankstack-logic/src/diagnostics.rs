//! Non-fatal solver diagnostics.
//!
//! The solver never aborts on structural problems: a mismatched proto-stack,
//! an infeasible flex budget or a height it cannot hit are all reported and
//! the best-effort result is still produced. Each report goes to the `log`
//! facade and is also recorded here so callers (and tests) can inspect it.

use serde::{Deserialize, Serialize};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub category: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// Diagnostic categories.
pub mod categories {
    pub const CATALOG: &str = "catalog";
    pub const SELECTION: &str = "selection";
    pub const STRUCTURE: &str = "structure";
    pub const ALIGNMENT: &str = "alignment";
    pub const BUDGET: &str = "budget";
    pub const PACKING: &str = "packing";
    pub const HEIGHT: &str = "height";
    pub const MISMATCH: &str = "mismatch";
}

/// Collects diagnostics for one catalog load or one solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, category: &'static str, message: impl Into<String>) {
        let message = message.into();
        log::info!("[{}] {}", category, message);
        self.push(category, Severity::Info, message);
    }

    pub fn warn(&mut self, category: &'static str, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[{}] {}", category, message);
        self.push(category, Severity::Warning, message);
    }

    pub fn error(&mut self, category: &'static str, message: impl Into<String>) {
        let message = message.into();
        log::error!("[{}] {}", category, message);
        self.push(category, Severity::Error, message);
    }

    fn push(&mut self, category: &'static str, severity: Severity, message: String) {
        self.entries.push(Diagnostic {
            category,
            severity,
            message,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Whether any entry of `severity` was recorded under `category`.
    pub fn has(&self, category: &str, severity: Severity) -> bool {
        self.entries
            .iter()
            .any(|d| d.category == category && d.severity == severity)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_by_severity() {
        let mut diag = Diagnostics::new();
        diag.info(categories::HEIGHT, "ok");
        diag.warn(categories::CATALOG, "fixed something");
        diag.error(categories::MISMATCH, "heights differ");
        assert_eq!(diag.len(), 3);
        assert_eq!(diag.warnings().count(), 1);
        assert_eq!(diag.errors().count(), 1);
        assert!(diag.has_errors());
        assert!(diag.has(categories::MISMATCH, Severity::Error));
        assert!(!diag.has(categories::MISMATCH, Severity::Warning));
    }

    #[test]
    fn empty_has_no_errors() {
        let diag = Diagnostics::new();
        assert!(diag.is_empty());
        assert!(!diag.has_errors());
    }
}
