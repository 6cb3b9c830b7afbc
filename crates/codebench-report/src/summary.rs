use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use codebench_core::dataset::WorkKind;
use codebench_core::pipeline::{ExtractionResult, FileFailure};

/// Records emitted per output category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub semesters: usize,
    pub courses: usize,
    pub assignments: usize,
    pub users: usize,
    pub attempts: usize,
    pub solutions: usize,
    pub logins: usize,
    pub grades: usize,
    pub codemirror: usize,
}

impl RecordCounts {
    pub fn total(&self) -> usize {
        self.semesters
            + self.courses
            + self.assignments
            + self.users
            + self.attempts
            + self.solutions
            + self.logins
            + self.grades
            + self.codemirror
    }
}

/// What one `extract` run did, for the terminal or for machines.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub dataset: PathBuf,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub files: BTreeMap<WorkKind, usize>,
    pub records: RecordCounts,
    pub diagnostics: usize,
    pub failures: Vec<FileFailure>,
    pub interrupted: bool,
    /// CSV files written, in category order.
    pub outputs: Vec<PathBuf>,
}

impl ExtractionSummary {
    pub fn new(
        dataset: impl Into<PathBuf>,
        result: &ExtractionResult,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        outputs: Vec<PathBuf>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            files: result.files.clone(),
            records: RecordCounts {
                semesters: result.semesters.len(),
                courses: result.courses.len(),
                assignments: result.assignments.len(),
                users: result.users.len(),
                attempts: result.attempts.len(),
                solutions: result.solutions.len(),
                logins: result.logins.len(),
                grades: result.grades.len(),
                codemirror: result.codemirror.len(),
            },
            diagnostics: result.diagnostics,
            failures: result.failures.clone(),
            interrupted: result.interrupted,
            outputs,
        }
    }

    pub fn files_processed(&self) -> usize {
        self.files.values().sum()
    }
}
