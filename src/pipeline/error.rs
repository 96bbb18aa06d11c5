use std::path::PathBuf;

use thiserror::Error;

use crate::export::ExportError;
use crate::pipeline::report::ExportReport;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Recoverable failures. Each one skips or degrades a single unit of work;
/// none of them aborts the batch or bypasses the restore step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("nothing to export in group `{group}`: {reason}")]
    Resolution { group: String, reason: String },

    #[error("failed to duplicate `{node}`: {reason}")]
    DuplicationFailed { node: String, reason: String },

    #[error("cannot merge: {0}")]
    Merge(String),

    #[error("cannot relocate origin of `{node}`: {reason}")]
    OriginRelocation { node: String, reason: String },

    #[error("failed to write {}: {source}", .path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: ExportError,
    },

    #[error("scene state mismatch: {0}")]
    InvariantViolation(String),
}

impl PipelineError {
    pub fn resolution(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            group: group.into(),
            reason: reason.into(),
        }
    }

    pub fn duplication(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DuplicationFailed {
            node: node.into(),
            reason: reason.into(),
        }
    }

    pub fn relocation(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OriginRelocation {
            node: node.into(),
            reason: reason.into(),
        }
    }
}

/// Failures that end a session early. The scene is restored before either is returned.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("an export session is already active on this scene")]
    AlreadyActive,

    #[error("export cancelled after {} file(s)", .report.exported_count())]
    Cancelled { report: ExportReport },
}
