use std::io::Write;

use tracing::error;

use super::{Diagnostic, Severity};

/// Anything that can accept diagnostics about the text being preprocessed.
pub trait ReportSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Prints diagnostics to stderr, mirroring the original tool's `"{progname} {type}{lines}: {msg}"`
/// layout, and terminates the process after an `Error`-severity diagnostic.
pub struct StderrSink {
    suppress_info: bool,
}

impl StderrSink {
    pub fn new() -> Self {
        Self {
            suppress_info: false,
        }
    }

    pub fn with_suppressed_info(suppress_info: bool) -> Self {
        Self { suppress_info }
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for StderrSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Info && self.suppress_info {
            return;
        }

        let positions = diagnostic.display_positions();
        let mut position_text = String::new();
        for position in &positions {
            position_text.push(' ');
            position_text.push_str(&position.to_string());
        }

        let _ = writeln!(
            std::io::stderr(),
            "macropp {}{}: {}",
            diagnostic.severity,
            position_text,
            diagnostic.message
        );

        if diagnostic.severity == Severity::Error {
            error!("fatal error reported, terminating");
            std::process::exit(1);
        }
    }
}

/// Collects diagnostics in memory instead of printing them. Used by tests that need to assert on
/// what was reported without touching stderr or aborting the process.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_severity(&self, severity: Severity) -> bool {
        self.diagnostics.iter().any(|d| d.severity == severity)
    }
}

impl ReportSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
