use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{Config, ExtractConfig};
use crate::error::{ExtractError, ExtractResult};
use crate::types::RecordContext;

pub(crate) const ASSESSMENTS_DIR: &str = "assessments";
pub(crate) const USERS_DIR: &str = "users";
pub(crate) const DATA_EXTENSION: &str = "data";
const EXECUTIONS_DIR: &str = "executions";
const CODES_DIR: &str = "codes";
const GRADES_DIR: &str = "grades";
const CODEMIRROR_DIR: &str = "codemirror";
const LOGINS_FILE: &str = "logins.log";
const USER_DATA_FILE: &str = "user.data";

/// Record category a dataset file feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Course,
    Assignment,
    User,
    Execution,
    Solution,
    Login,
    Grade,
    CodeMirror,
}

impl WorkKind {
    pub const ALL: [WorkKind; 8] = [
        WorkKind::Course,
        WorkKind::Assignment,
        WorkKind::User,
        WorkKind::Execution,
        WorkKind::Solution,
        WorkKind::Login,
        WorkKind::Grade,
        WorkKind::CodeMirror,
    ];

    /// Categories found under each user directory.
    const PER_USER: [WorkKind; 6] = [
        WorkKind::User,
        WorkKind::Execution,
        WorkKind::Solution,
        WorkKind::Login,
        WorkKind::Grade,
        WorkKind::CodeMirror,
    ];

    fn enabled(self, extract: &ExtractConfig) -> bool {
        match self {
            WorkKind::Course => extract.courses,
            WorkKind::Assignment => extract.assignments,
            WorkKind::User => extract.users,
            WorkKind::Execution => extract.executions,
            WorkKind::Solution => extract.solutions,
            WorkKind::Login => extract.logins,
            WorkKind::Grade => extract.grades,
            WorkKind::CodeMirror => extract.codemirror,
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkKind::Course => write!(f, "course"),
            WorkKind::Assignment => write!(f, "assignment"),
            WorkKind::User => write!(f, "user"),
            WorkKind::CodeMirror => write!(f, "codemirror"),
            WorkKind::Execution => write!(f, "execution"),
            WorkKind::Solution => write!(f, "solution"),
            WorkKind::Login => write!(f, "login"),
            WorkKind::Grade => write!(f, "grade"),
        }
    }
}

/// One file to process, with the dataset coordinates taken from its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub kind: WorkKind,
    pub context: RecordContext,
    pub path: PathBuf,
}

/// Files found by a traversal, in sorted order, plus the branches that could not be read.
#[derive(Debug, Default)]
pub struct DatasetScan {
    pub items: Vec<WorkItem>,
    pub errors: Vec<ExtractError>,
}

impl DatasetScan {
    pub fn count(&self, kind: WorkKind) -> usize {
        self.items.iter().filter(|item| item.kind == kind).count()
    }
}

/// Walks `root/<period>/<course>/{assessments,users/<user>}/...` and collects the enabled categories.
pub struct DatasetWalker {
    root: PathBuf,
    extract: ExtractConfig,
    excludes: GlobSet,
}

impl DatasetWalker {
    pub fn new(root: &Path, config: &Config) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            extract: config.extract.clone(),
            excludes: build_globset(&config.dataset.exclude_patterns)?,
        })
    }

    /// Collect every work item. Only an unreadable dataset root is an error; anything
    /// missing further down is recorded in [`DatasetScan::errors`] and skipped.
    pub fn scan(&self) -> ExtractResult<DatasetScan> {
        let mut scan = DatasetScan::default();
        for period in subdirs(&self.root)? {
            let semester = file_name(&period);
            let courses = match subdirs(&period) {
                Ok(courses) => courses,
                Err(e) => {
                    scan.errors.push(e);
                    continue;
                }
            };
            for course_dir in courses {
                let course = file_name(&course_dir);
                self.scan_course(&semester, &course, &course_dir, &mut scan);
            }
        }
        Ok(scan)
    }

    fn scan_course(&self, semester: &str, course: &str, course_dir: &Path, scan: &mut DatasetScan) {
        let course_context = RecordContext {
            semester: semester.to_string(),
            course: course.to_string(),
            ..Default::default()
        };
        if self.extract.courses {
            scan.items.push(WorkItem {
                kind: WorkKind::Course,
                context: course_context.clone(),
                path: course_dir.to_path_buf(),
            });
        }
        if self.extract.assignments {
            self.scan_assessments(&course_context, course_dir, scan);
        }

        if !WorkKind::PER_USER.iter().any(|kind| kind.enabled(&self.extract)) {
            return;
        }
        let users_dir = course_dir.join(USERS_DIR);
        let users = match subdirs(&users_dir) {
            Ok(users) => users,
            Err(e) => {
                scan.errors.push(e);
                return;
            }
        };
        for user_dir in users {
            let base = RecordContext {
                semester: semester.to_string(),
                course: course.to_string(),
                user: file_name(&user_dir),
                ..Default::default()
            };
            for kind in WorkKind::PER_USER {
                if kind.enabled(&self.extract) {
                    self.scan_user(kind, &base, &user_dir, scan);
                }
            }
        }
    }

    fn scan_assessments(&self, course_context: &RecordContext, course_dir: &Path, scan: &mut DatasetScan) {
        let files =
            match files_with_extension(&course_dir.join(ASSESSMENTS_DIR), DATA_EXTENSION) {
                Ok(files) => files,
                Err(e) => {
                    scan.errors.push(e);
                    return;
                }
            };
        for path in files {
            if self.is_excluded(&path) {
                continue;
            }
            scan.items.push(WorkItem {
                kind: WorkKind::Assignment,
                context: RecordContext {
                    assignment: file_stem(&path),
                    ..course_context.clone()
                },
                path,
            });
        }
    }

    fn scan_user(&self, kind: WorkKind, base: &RecordContext, user_dir: &Path, scan: &mut DatasetScan) {
        let single_file = match kind {
            WorkKind::Login => Some((LOGINS_FILE, "login log not found")),
            WorkKind::User => Some((USER_DATA_FILE, "user questionnaire not found")),
            _ => None,
        };
        if let Some((file_name, missing)) = single_file {
            let path = user_dir.join(file_name);
            if !path.is_file() {
                scan.errors.push(ExtractError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, missing),
                ));
            } else if !self.is_excluded(&path) {
                scan.items.push(WorkItem {
                    kind,
                    context: base.clone(),
                    path,
                });
            }
            return;
        }

        let (dir_name, extension) = match kind {
            WorkKind::Execution => (EXECUTIONS_DIR, "log"),
            WorkKind::Solution => (CODES_DIR, "py"),
            WorkKind::CodeMirror => (CODEMIRROR_DIR, "log"),
            _ => (GRADES_DIR, "log"),
        };
        let files = match files_with_extension(&user_dir.join(dir_name), extension) {
            Ok(files) => files,
            Err(e) => {
                scan.errors.push(e);
                return;
            }
        };

        for path in files {
            if self.is_excluded(&path) {
                tracing::trace!(path = %path.display(), "excluded by pattern");
                continue;
            }
            let context = if kind == WorkKind::Grade {
                RecordContext {
                    assignment: file_stem(&path),
                    ..base.clone()
                }
            } else {
                match assignment_and_problem(&path) {
                    Ok((assignment, problem)) => RecordContext {
                        assignment,
                        problem,
                        ..base.clone()
                    },
                    Err(e) => {
                        scan.errors.push(e);
                        continue;
                    }
                }
            };
            scan.items.push(WorkItem {
                kind,
                context,
                path,
            });
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        self.excludes.is_match(rel)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern '{pattern}'"))?;
        builder.add(glob);
    }
    builder.build().context("failed to build exclude pattern set")
}

/// Immediate child directories of `dir`, sorted by name.
pub(crate) fn subdirs(dir: &Path) -> ExtractResult<Vec<PathBuf>> {
    children(dir, |entry| entry.file_type().is_dir())
}

/// Immediate child files of `dir` with the given extension, sorted by name.
pub(crate) fn files_with_extension(dir: &Path, extension: &str) -> ExtractResult<Vec<PathBuf>> {
    children(dir, |entry| {
        entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == extension)
    })
}

fn children(dir: &Path, keep: impl Fn(&walkdir::DirEntry) -> bool) -> ExtractResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ExtractError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ExtractError::io(dir, e.into()))?;
        if keep(&entry) {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<assignment>_<problem>.<ext>` into its two components.
pub fn assignment_and_problem(path: &Path) -> ExtractResult<(String, String)> {
    let stem = file_stem(path);
    let invalid = || ExtractError::InvalidFileName {
        path: path.to_path_buf(),
    };
    let (assignment, problem) = stem.split_once('_').ok_or_else(invalid)?;
    if assignment.is_empty() || problem.is_empty() || problem.contains('_') {
        return Err(invalid());
    }
    Ok((assignment.to_string(), problem.to_string()))
}

/// Read a dataset file as text, replacing invalid UTF-8 rather than failing.
pub fn read_text(path: &Path) -> ExtractResult<String> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn all_categories() -> Config {
        let mut config = Config::default();
        config.extract.logins = true;
        config.extract.grades = true;
        config
    }

    fn sample_dataset() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(root, "2019-1/cs1/users/u2/executions/a1_p1.log");
        touch(root, "2019-1/cs1/users/u1/executions/a1_p2.log");
        touch(root, "2019-1/cs1/users/u1/executions/a1_p1.log");
        touch(root, "2019-1/cs1/users/u1/executions/notes.txt");
        touch(root, "2019-1/cs1/users/u1/codes/a1_p1.py");
        touch(root, "2019-1/cs1/users/u1/logins.log");
        touch(root, "2019-1/cs1/users/u1/grades/a1.log");
        touch(root, "2019-1/cs1/users/u1/grades/final_grade.log");
        tmp
    }

    #[test]
    fn test_scan_collects_sorted_items_with_context() {
        let tmp = sample_dataset();
        let walker = DatasetWalker::new(tmp.path(), &Config::default()).unwrap();
        let scan = walker.scan().unwrap();

        let executions: Vec<_> = scan
            .items
            .iter()
            .filter(|i| i.kind == WorkKind::Execution)
            .map(|i| (i.context.user.as_str(), i.context.problem.as_str()))
            .collect();
        assert_eq!(executions, vec![("u1", "p1"), ("u1", "p2"), ("u2", "p1")]);

        let first = &scan.items[0];
        assert_eq!(first.context.semester, "2019-1");
        assert_eq!(first.context.course, "cs1");
        assert_eq!(first.context.assignment, "a1");
        assert_eq!(scan.count(WorkKind::Solution), 1);
        assert_eq!(scan.count(WorkKind::Login), 0, "logins are off by default");
    }

    #[test]
    fn test_scan_reports_missing_category_dirs() {
        let tmp = sample_dataset();
        let walker = DatasetWalker::new(tmp.path(), &Config::default()).unwrap();
        let scan = walker.scan().unwrap();
        // u2 has no codes/ directory
        assert_eq!(scan.errors.len(), 1);
        assert!(matches!(
            &scan.errors[0],
            ExtractError::MissingDirectory { path } if path.ends_with("u2/codes")
        ));
    }

    #[test]
    fn test_grades_exclude_final_grade() {
        let tmp = sample_dataset();
        let walker = DatasetWalker::new(tmp.path(), &all_categories()).unwrap();
        let scan = walker.scan().unwrap();
        let grades: Vec<_> = scan
            .items
            .iter()
            .filter(|i| i.kind == WorkKind::Grade)
            .collect();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].context.assignment, "a1");
        assert_eq!(grades[0].context.problem, "");
        assert_eq!(scan.count(WorkKind::Login), 1);
    }

    #[test]
    fn test_missing_users_dir_skips_course_only() {
        let tmp = sample_dataset();
        fs::create_dir_all(tmp.path().join("2019-1/cs0")).unwrap();
        let walker = DatasetWalker::new(tmp.path(), &Config::default()).unwrap();
        let scan = walker.scan().unwrap();
        assert!(scan
            .errors
            .iter()
            .any(|e| e.path().ends_with("cs0/users")));
        assert_eq!(scan.count(WorkKind::Execution), 3);
    }

    #[test]
    fn test_scan_course_level_and_user_metadata() {
        let tmp = sample_dataset();
        touch(tmp.path(), "2019-1/cs1/assessments/a1.data");
        touch(tmp.path(), "2019-1/cs1/assessments/a2.data");
        touch(tmp.path(), "2019-1/cs1/assessments/readme.txt");
        touch(tmp.path(), "2019-1/cs1/users/u1/user.data");
        touch(tmp.path(), "2019-1/cs1/users/u1/codemirror/a1_p1.log");

        let mut config = Config::default();
        config.extract.executions = false;
        config.extract.solutions = false;
        config.extract.courses = true;
        config.extract.assignments = true;
        config.extract.users = true;
        config.extract.codemirror = true;
        let scan = DatasetWalker::new(tmp.path(), &config).unwrap().scan().unwrap();

        let kinds: Vec<_> = scan.items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WorkKind::Course,
                WorkKind::Assignment,
                WorkKind::Assignment,
                WorkKind::User,
                WorkKind::CodeMirror,
            ]
        );
        assert!(scan.items[0].path.ends_with("2019-1/cs1"));
        assert_eq!(scan.items[2].context.assignment, "a2");
        assert_eq!(scan.items[4].context.problem, "p1");

        // u2 has neither user.data nor codemirror/
        assert_eq!(scan.errors.len(), 2);
        assert!(scan.errors[0].path().ends_with("u2/user.data"));
        assert!(scan.errors[1].path().ends_with("u2/codemirror"));
    }

    #[test]
    fn test_course_records_do_not_need_users() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "2019-1/cs1/assessments/a1.data");
        let mut config = Config::default();
        config.extract.executions = false;
        config.extract.solutions = false;
        config.extract.courses = true;
        let scan = DatasetWalker::new(tmp.path(), &config).unwrap().scan().unwrap();
        assert_eq!(scan.count(WorkKind::Course), 1);
        assert!(scan.errors.is_empty());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let walker = DatasetWalker::new(&tmp.path().join("nope"), &Config::default()).unwrap();
        assert!(walker.scan().is_err());
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let mut config = Config::default();
        config.dataset.exclude_patterns = vec!["[".to_string()];
        assert!(DatasetWalker::new(Path::new("."), &config).is_err());
    }

    #[test]
    fn test_assignment_and_problem() {
        assert_eq!(
            assignment_and_problem(Path::new("x/a12_p3.log")).unwrap(),
            ("a12".to_string(), "p3".to_string())
        );
        assert!(assignment_and_problem(Path::new("x/a12.log")).is_err());
        assert!(assignment_and_problem(Path::new("x/a_b_c.log")).is_err());
        assert!(assignment_and_problem(Path::new("x/_p.log")).is_err());
    }

    #[test]
    fn test_read_text_is_lossy() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.log");
        fs::write(&path, [b'o', b'k', 0xff]).unwrap();
        assert_eq!(read_text(&path).unwrap(), "ok\u{fffd}");
        assert!(read_text(&tmp.path().join("missing")).is_err());
    }
}
