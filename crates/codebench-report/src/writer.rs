use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};

use crate::error::ReportError;
use crate::rows::CsvRow;

/// Write `rows` to `<dir>/<R::FILE_NAME>` and return the written path.
///
/// Rows go to a sibling `.tmp` file that is renamed over the target only after
/// every row is flushed, so the target is either the previous file or the
/// complete new one. Every non-numeric field is quoted.
pub fn write_csv<R: CsvRow>(dir: &Path, rows: &[R]) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(R::FILE_NAME);
    let tmp_path = path.with_extension("csv.tmp");

    if let Err(e) = write_rows(&tmp_path, rows) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, &path).map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn write_rows<R: CsvRow>(tmp_path: &Path, rows: &[R]) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: tmp_path.to_path_buf(),
        source,
    };
    let csv_err = |source| ReportError::Csv {
        path: tmp_path.to_path_buf(),
        source,
    };

    let file = File::create(tmp_path).map_err(io_err)?;
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(file);

    writer.write_record(R::headers()).map_err(csv_err)?;
    for row in rows {
        writer.write_record(row.fields()).map_err(csv_err)?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| io_err(e.into_error()))?;
    file.sync_all().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebench_core::types::Login;

    fn login(event: &str) -> Login {
        Login {
            semester: "2019-1".to_string(),
            course: "cs1".to_string(),
            user: "u1".to_string(),
            date: "2019-03-04".to_string(),
            time: "10:11:12".to_string(),
            event: event.to_string(),
        }
    }

    #[test]
    fn test_write_quotes_non_numeric_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), &[login("login"), login("logout")]).unwrap();
        assert_eq!(path, dir.path().join("logins.csv"));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            r#""semester","course","user","date","time","event""#
        );
        assert_eq!(
            lines[1],
            r#""2019-1","cs1","u1","2019-03-04","10:11:12","login""#
        );
        assert!(!dir.path().join("logins.csv.tmp").exists());
    }

    #[test]
    fn test_numbers_are_unquoted_and_blanks_quoted() {
        use codebench_core::types::{Attempt, AttemptRecord, RecordContext};

        let record = AttemptRecord {
            context: RecordContext::default(),
            attempt: Attempt {
                seq_attempt: 3,
                kind: "test".to_string(),
                timestamp: "t".to_string(),
                has_error: true,
                error_message: Some("NameError: x".to_string()),
                error_type: Some("NameError".to_string()),
                exec_time: None,
                grade: None,
                test_case_results: Vec::new(),
                test_case_count: 0,
                metrics: None,
            },
        };
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), &[record]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(headers.len(), row.len());
        assert_eq!(&row[6], "3");
        assert_eq!(&row[8], "True");
        assert_eq!(&row[10], "NameError");
        assert_eq!(&row[12], "[]");

        let raw = fs::read_to_string(&path).unwrap();
        let data_line = raw.lines().nth(1).unwrap();
        assert!(data_line.contains(",3,"), "{data_line}");
        assert!(data_line.contains(r#","","#), "{data_line}");
    }

    #[test]
    fn test_empty_batch_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv::<Login>(dir.path(), &[]).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_rewrite_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), &[login("a"), login("b")]).unwrap();
        let path = write_csv(dir.path(), &[login("c")]).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"c\""));
    }

    #[test]
    fn test_creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out/csv");
        let path = write_csv(&nested, &[login("a")]).unwrap();
        assert!(path.exists());
    }
}
