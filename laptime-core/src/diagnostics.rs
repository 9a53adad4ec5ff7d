//! Diagnostics reporting
//!
//! Components never print. Rejected lines, warnings about suspicious input and
//! lock takeovers are reported through a [`Diagnostics`] sink handed to each
//! component when it is built, so callers decide where the messages go.

use std::sync::{Arc, Mutex};

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The offending input was rejected
    Error,
    /// Informational; processing continued normally
    Note,
}

/// Sink for messages produced while processing race data
pub trait Diagnostics: Send + Sync {
    /// Record one message
    fn report(&self, severity: Severity, message: &str);

    fn error(&self, message: &str) {
        self.report(Severity::Error, message);
    }

    fn note(&self, message: &str) {
        self.report(Severity::Note, message);
    }
}

/// Forwards diagnostics to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl LogDiagnostics {
    /// Shared handle, ready to pass to components
    pub fn shared() -> Arc<dyn Diagnostics> {
        Arc::new(LogDiagnostics)
    }
}

impl Diagnostics for LogDiagnostics {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => log::error!("{}", message),
            Severity::Note => log::warn!("{}", message),
        }
    }
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn entries(&self) -> Vec<(Severity, String)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages reported with [`Severity::Error`]
    pub fn errors(&self) -> Vec<String> {
        self.with_severity(Severity::Error)
    }

    /// Messages reported with [`Severity::Note`]
    pub fn notes(&self) -> Vec<String> {
        self.with_severity(Severity::Note)
    }

    fn with_severity(&self, severity: Severity) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, message)| message)
            .collect()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn report(&self, severity: Severity, message: &str) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push((severity, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_diagnostics_split_by_severity() {
        let diagnostics = MemoryDiagnostics::new();
        diagnostics.error("bad line");
        diagnostics.note("empty event");
        diagnostics.error("unknown bib");

        assert_eq!(diagnostics.entries().len(), 3);
        assert_eq!(diagnostics.errors(), vec!["bad line", "unknown bib"]);
        assert_eq!(diagnostics.notes(), vec!["empty event"]);
    }
}
