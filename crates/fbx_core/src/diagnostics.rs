//! Non-fatal decode diagnostics.
//!
//! Everything that degrades output fidelity without aborting a decode is
//! logged through `log::warn!` and recorded here, so callers can inspect
//! what was dropped or defaulted.

use serde::Serialize;

/// Category of a non-fatal diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// An ID or sub-node lookup that resolved to nothing
    Reference,
    /// An unknown enum value, extension or binding label
    Schema,
    /// Skin influences beyond four were dropped
    Skinning,
    /// A per-frame sample or curve binding failed
    Animation,
    /// A malformed binary record was skipped
    Recovery,
}

/// A single recorded diagnostic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Per-decode diagnostic collector.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record a diagnostic.
    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{:?}: {}", kind, message);
        self.entries.push(Diagnostic { kind, message });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Number of entries of one kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
