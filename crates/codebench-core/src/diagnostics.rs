use serde::Serialize;
use std::fmt;

use crate::analyzer::{MetricFailure, MetricKind};

/// What went wrong in a recoverable way while building a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedHeader,
    MalformedSubsection { label: String },
    MalformedLine { line: usize },
    MissingField { field: String },
    MetricFailed { metric: MetricKind },
}

/// A recoverable problem; the offending field is left absent and processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq_attempt: Option<usize>,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(seq_attempt: Option<usize>, kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            seq_attempt,
            kind,
            detail: detail.into(),
        }
    }

    pub fn metric_failed(seq_attempt: Option<usize>, failure: &MetricFailure) -> Self {
        Self::new(
            seq_attempt,
            DiagnosticKind::MetricFailed {
                metric: failure.metric,
            },
            failure.reason.clone(),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(seq) = self.seq_attempt {
            write!(f, "attempt {seq}: ")?;
        }
        match &self.kind {
            DiagnosticKind::MalformedHeader => write!(f, "malformed header")?,
            DiagnosticKind::MalformedSubsection { label } => {
                write!(f, "malformed {label} subsection")?
            }
            DiagnosticKind::MalformedLine { line } => write!(f, "malformed line {line}")?,
            DiagnosticKind::MissingField { field } => write!(f, "missing {field}")?,
            DiagnosticKind::MetricFailed { metric } => write!(f, "{metric} metrics failed")?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}
