use std::fmt;
use std::path::PathBuf;

use crate::pipeline::error::PipelineError;
use crate::scene_graph::NodeId;

/// What a file or failure is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSubject {
    Anchor(NodeId),
    Node(NodeId),
    Group(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub subject: ExportSubject,
    /// Written, but not the way it was configured (origin or merge fallback).
    pub degraded: bool,
}

#[derive(Debug)]
pub struct Failure {
    pub subject: ExportSubject,
    pub name: String,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub exported: Vec<ExportedFile>,
    pub failures: Vec<Failure>,
    pub warnings: Vec<String>,
}

impl ExportReport {
    pub fn exported_count(&self) -> usize {
        self.exported.len()
    }

    pub fn degraded_count(&self) -> usize {
        self.exported.iter().filter(|file| file.degraded).count()
    }

    /// A batch succeeds when anything at all was written.
    pub fn is_success(&self) -> bool {
        !self.exported.is_empty()
    }

    pub(crate) fn record_file(&mut self, path: PathBuf, subject: ExportSubject, degraded: bool) {
        self.exported.push(ExportedFile {
            path,
            subject,
            degraded,
        });
    }

    pub(crate) fn record_failure(
        &mut self,
        subject: ExportSubject,
        name: impl Into<String>,
        error: PipelineError,
    ) {
        let name = name.into();
        log::error!("{}: {}", name, error);
        self.failures.push(Failure {
            subject,
            name,
            error,
        });
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Exported {} file(s), {} failure(s), {} warning(s)",
            self.exported_count(),
            self.failures.len(),
            self.warnings.len()
        )?;

        for file in &self.exported {
            let marker = if file.degraded { " (degraded)" } else { "" };
            writeln!(f, "  wrote {}{}", file.path.display(), marker)?;
        }
        for failure in &self.failures {
            writeln!(f, "  failed {}: {}", failure.name, failure.error)?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {}", warning)?;
        }

        Ok(())
    }
}
