pub mod error;
pub mod json;
pub mod rows;
pub mod summary;
pub mod text;
pub mod writer;

use std::path::{Path, PathBuf};

use codebench_core::pipeline::ExtractionResult;

pub use error::ReportError;
pub use rows::CsvRow;
pub use summary::{ExtractionSummary, RecordCounts};
pub use writer::write_csv;

/// Which record categories to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSelection {
    /// Semester and course tables.
    pub courses: bool,
    pub assignments: bool,
    pub users: bool,
    pub attempts: bool,
    pub solutions: bool,
    pub logins: bool,
    pub grades: bool,
    pub codemirror: bool,
}

/// Write one CSV per selected category and return the paths written.
pub fn write_all(
    dir: &Path,
    result: &ExtractionResult,
    selection: OutputSelection,
) -> Result<Vec<PathBuf>, ReportError> {
    let mut written = Vec::new();
    if selection.courses {
        written.push(write_csv(dir, &result.semesters)?);
        written.push(write_csv(dir, &result.courses)?);
    }
    if selection.assignments {
        written.push(write_csv(dir, &result.assignments)?);
    }
    if selection.users {
        written.push(write_csv(dir, &result.users)?);
    }
    if selection.attempts {
        written.push(write_csv(dir, &result.attempts)?);
    }
    if selection.solutions {
        written.push(write_csv(dir, &result.solutions)?);
    }
    if selection.logins {
        written.push(write_csv(dir, &result.logins)?);
    }
    if selection.grades {
        written.push(write_csv(dir, &result.grades)?);
    }
    if selection.codemirror {
        written.push(write_csv(dir, &result.codemirror)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_all_respects_selection() {
        let dir = tempfile::tempdir().unwrap();
        let selection = OutputSelection {
            courses: false,
            assignments: false,
            users: false,
            attempts: true,
            solutions: false,
            logins: false,
            grades: true,
            codemirror: false,
        };
        let written = write_all(dir.path(), &ExtractionResult::default(), selection).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("attempts.csv"), dir.path().join("grades.csv")]
        );
        assert!(!dir.path().join("solutions.csv").exists());
    }

    #[test]
    fn test_course_selection_writes_semesters_first() {
        let dir = tempfile::tempdir().unwrap();
        let selection = OutputSelection {
            courses: true,
            assignments: false,
            users: true,
            attempts: false,
            solutions: false,
            logins: false,
            grades: false,
            codemirror: true,
        };
        let written = write_all(dir.path(), &ExtractionResult::default(), selection).unwrap();
        let names: Vec<_> = written
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(
            names,
            ["semesters.csv", "courses.csv", "users.csv", "codemirror.csv"]
        );
        let users = std::fs::read_to_string(dir.path().join("users.csv")).unwrap();
        assert!(users.starts_with("\"semester\",\"course\",\"user\",\"course_id\""));
    }
}
