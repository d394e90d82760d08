use std::path::PathBuf;

use log::*;
use serde::Serialize;

use super::ShaderStage;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Warning,
    Error,
}

/// a (set, binding) pair, used to report conflicting declarations
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct BindingLocation {
    pub set: u32,
    pub binding: u32,
}

impl std::fmt::Display for BindingLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "set = {}, binding = {}", self.set, self.binding)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiagnosticKind {
    #[error("failed to decode {stage} stage bytecode: {reason}")]
    Decode { stage: ShaderStage, reason: String },

    #[error("shader file not found for {stage} stage: {}", .path.display())]
    MissingSource { stage: ShaderStage, path: PathBuf },

    #[error(
        "uniform block '{resource}' does not specify a set id and will be mapped to set 0, \
         this might have unintended consequences"
    )]
    MissingSet { resource: String },

    #[error("uniform block '{resource}' does not specify a binding number, using {assigned}")]
    MissingBinding { resource: String, assigned: u32 },

    #[error(
        "vertex input '{input}' has {components} components, \
         only 3 and 4 component float vectors are mapped to a format"
    )]
    UnhandledVertexFormat { input: String, components: u32 },

    #[error("vertex input '{input}' is too large to describe and was skipped")]
    OversizedVertexInput { input: String },

    #[error("incompatible bindings between shader stages for '{resource}': ({first}) vs ({second})")]
    BindingConflict {
        resource: String,
        first: BindingLocation,
        second: BindingLocation,
    },

    #[error("'{dropped}' reuses ({location}) already taken by '{kept}'")]
    DuplicateBinding {
        location: BindingLocation,
        kept: String,
        dropped: String,
    },

    #[error("descriptor set ids in shader cannot be sparse, missing definition for set {missing_set}")]
    SparseSet { missing_set: u32 },
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingSet { .. }
            | Self::MissingBinding { .. }
            | Self::UnhandledVertexFormat { .. } => Severity::Warning,

            Self::Decode { .. }
            | Self::MissingSource { .. }
            | Self::OversizedVertexInput { .. }
            | Self::BindingConflict { .. }
            | Self::DuplicateBinding { .. }
            | Self::SparseSet { .. } => Severity::Error,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl From<DiagnosticKind> for Diagnostic {
    fn from(kind: DiagnosticKind) -> Self {
        Self {
            severity: kind.severity(),
            kind,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.kind, f)
    }
}

/// returned by [`Diagnostics::escalate`] for callers that want strict validation
#[derive(Debug, thiserror::Error)]
#[error("{count} shader diagnostic(s) at or above {threshold:?}, first: {first}")]
pub struct EscalatedDiagnostic {
    pub threshold: Severity,
    pub count: usize,
    pub first: Diagnostic,
}

/// diagnostics collected alongside a (possibly partial) reflection result
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(vec![])
    }

    /// records a diagnostic and emits it to the log
    pub fn report(&mut self, kind: DiagnosticKind) {
        let diagnostic = Diagnostic::from(kind);

        match diagnostic.severity {
            Severity::Warning => warn!("{diagnostic}"),
            Severity::Error => error!("{diagnostic}"),
        }

        self.0.push(diagnostic);
    }

    /// moves already-logged diagnostics over without logging them again
    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn escalate(&self, threshold: Severity) -> Result<(), EscalatedDiagnostic> {
        let mut failing = self.0.iter().filter(|d| d.severity >= threshold);
        let Some(first) = failing.next() else {
            return Ok(());
        };

        Err(EscalatedDiagnostic {
            threshold,
            count: failing.count() + 1,
            first: first.clone(),
        })
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
