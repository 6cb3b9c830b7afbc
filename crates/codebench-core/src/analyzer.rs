use serde::Serialize;
use std::fmt;

use crate::types::CodeMetricsRecord;

/// One of the four independently computed metric families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Size,
    Complexity,
    Halstead,
    Tokens,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Size => write!(f, "size"),
            MetricKind::Complexity => write!(f, "complexity"),
            MetricKind::Halstead => write!(f, "halstead"),
            MetricKind::Tokens => write!(f, "tokens"),
        }
    }
}

/// A metric family that could not be computed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricFailure {
    pub metric: MetricKind,
    pub reason: String,
}

/// Metrics for one code sample together with the families that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsOutcome {
    pub record: CodeMetricsRecord,
    pub failures: Vec<MetricFailure>,
}

/// Trait that each language's metric implementation must provide.
pub trait CodeAnalyzer: Send + Sync {
    /// Language name (e.g., "python")
    fn language(&self) -> &'static str;

    /// File extensions of solution files this analyzer handles (e.g., &["py"])
    fn file_extensions(&self) -> &[&str];

    /// Compute every metric family for `code`, reporting the ones that failed.
    fn analyze(&self, code: &str) -> MetricsOutcome;

    /// Compute the metrics record, discarding failure details.
    fn compute_metrics(&self, code: &str) -> CodeMetricsRecord {
        self.analyze(code).record
    }
}
