//! Diagnostic events
//!
//! The device reports lifecycle events to a [`Diagnostics`] sink and never
//! waits on it or looks at the outcome.

use parking_lot::Mutex;
use std::fmt;

/// `log` target used by [`LogDiagnostics`]
pub const LOG_TARGET: &str = "simple_chardev";

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Alert,
}

/// A sink for diagnostic events
pub trait Diagnostics: Send + Sync {
    fn emit(&self, severity: Severity, message: fmt::Arguments<'_>);

    fn info(&self, message: fmt::Arguments<'_>) {
        self.emit(Severity::Info, message);
    }

    fn alert(&self, message: fmt::Arguments<'_>) {
        self.emit(Severity::Alert, message);
    }
}

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn emit(&self, severity: Severity, message: fmt::Arguments<'_>) {
        match severity {
            Severity::Info => log::info!(target: LOG_TARGET, "{}", message),
            Severity::Alert => log::error!(target: LOG_TARGET, "{}", message),
        }
    }
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn emit(&self, _severity: Severity, _message: fmt::Arguments<'_>) {}
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<(Severity, String)>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<(Severity, String)> {
        self.events.lock().clone()
    }

    /// Recorded messages of one severity
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn emit(&self, severity: Severity, message: fmt::Arguments<'_>) {
        self.events.lock().push((severity, message.to_string()));
    }
}
