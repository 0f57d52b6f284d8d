//! Types for reporting problems found in the text being preprocessed.
//!
//! This is deliberately distinct from `tracing`: `tracing` narrates what this program is doing,
//! while a [`Diagnostic`] always describes a problem in the input being processed.

mod sink;

use crate::position::Position;

pub use sink::*;

/// Diagnostic severity. Ordered so a future caller could filter by a minimum severity.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A single reported problem: a severity, a message, and the source positions it concerns.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub positions: Vec<Position>,
    /// When set, `positions` is printed in the order supplied, duplicates and all, instead of
    /// being sorted and deduplicated. Used only by the expansion-depth-exceeded diagnostic,
    /// whose frames commonly share a single recurring call-site position.
    pub ordered: bool,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            positions: Vec::new(),
            ordered: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.push(position);
        self
    }

    pub fn with_positions(mut self, positions: impl IntoIterator<Item = Position>) -> Self {
        self.positions.extend(positions);
        self
    }

    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Positions as they should be printed: sorted and deduplicated, unless `ordered` is set.
    pub fn display_positions(&self) -> Vec<Position> {
        if self.ordered {
            self.positions.clone()
        } else {
            let mut positions = self.positions.clone();
            positions.sort();
            positions.dedup();
            positions
        }
    }
}
