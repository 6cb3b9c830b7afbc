use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::activity::{self, CodeMirrorParser};
use crate::analyzer::CodeAnalyzer;
use crate::attempt::{AttemptParser, ParseOptions};
use crate::catalog;
use crate::config::Config;
use crate::dataset::{self, DatasetWalker, WorkItem, WorkKind};
use crate::diagnostics::Diagnostic;
use crate::error::ExtractError;
use crate::types::{
    Assignment, AttemptRecord, CodeMirrorEvent, Course, Grade, Login, Semester, Solution,
    SolutionRecord, UserProfile,
};

/// A file (or traversal branch) that produced no records.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl From<&ExtractError> for FileFailure {
    fn from(err: &ExtractError) -> Self {
        Self {
            path: err.path().to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Everything an extraction run produced, merged in traversal order.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    /// Per-period tallies, filled when course records are enabled.
    pub semesters: Vec<Semester>,
    pub courses: Vec<Course>,
    pub assignments: Vec<Assignment>,
    pub users: Vec<UserProfile>,
    pub attempts: Vec<AttemptRecord>,
    pub solutions: Vec<SolutionRecord>,
    pub logins: Vec<Login>,
    pub grades: Vec<Grade>,
    pub codemirror: Vec<CodeMirrorEvent>,
    /// Files processed to completion, per category.
    pub files: BTreeMap<WorkKind, usize>,
    /// Recoverable problems (malformed sections, failed metric families).
    pub diagnostics: usize,
    pub failures: Vec<FileFailure>,
    /// Set when cancellation stopped the run before every file was processed.
    pub interrupted: bool,
}

impl ExtractionResult {
    pub fn files_processed(&self) -> usize {
        self.files.values().sum()
    }
}

/// Records extracted from a single file.
enum FileRecords {
    Course(Course),
    Assignment(Assignment),
    User(UserProfile),
    Attempts(Vec<AttemptRecord>),
    Solution(SolutionRecord),
    Logins(Vec<Login>),
    Grade(Grade),
    CodeMirror(Vec<CodeMirrorEvent>),
}

struct Parsers<'a> {
    attempts: AttemptParser<'a>,
    codemirror: CodeMirrorParser,
}

struct FileOutput {
    kind: WorkKind,
    records: FileRecords,
    diagnostics: usize,
}

/// Parallel extraction over a dataset, shared by every command that needs records.
pub struct ExtractionPipeline {
    analyzer: Box<dyn CodeAnalyzer>,
    config: Config,
    cancel: Arc<AtomicBool>,
}

impl ExtractionPipeline {
    pub fn new(analyzer: Box<dyn CodeAnalyzer>, config: Config) -> Self {
        Self {
            analyzer,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag; once it is set no new file is started.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Traverse `root` and extract every enabled record category.
    pub fn extract(&self, root: &Path) -> Result<ExtractionResult> {
        let walker = DatasetWalker::new(root, &self.config)?;
        let scan = walker
            .scan()
            .with_context(|| format!("failed to read dataset '{}'", root.display()))?;
        tracing::info!(
            root = %root.display(),
            files = scan.items.len(),
            "dataset scanned"
        );

        let mut result = self.run(&scan.items)?;
        for err in &scan.errors {
            tracing::error!(path = %err.path().display(), "{err}");
        }
        let scan_failures: Vec<FileFailure> = scan.errors.iter().map(FileFailure::from).collect();
        result.failures.splice(0..0, scan_failures);
        Ok(result)
    }

    /// Process the given work items in parallel and merge their records in item order.
    pub fn run(&self, items: &[WorkItem]) -> Result<ExtractionResult> {
        let parsers = Parsers {
            attempts: AttemptParser::new(self.analyzer.as_ref())?.with_options(ParseOptions {
                metrics_on_error: self.config.metrics.on_error,
            }),
            codemirror: CodeMirrorParser::new()?,
        };

        let outputs: Vec<Option<std::result::Result<FileOutput, ExtractError>>> =
            if self.config.runtime.jobs > 0 {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.runtime.jobs)
                    .build()
                    .context("failed to build worker pool")?;
                pool.install(|| self.process_all(&parsers, items))
            } else {
                self.process_all(&parsers, items)
            };

        let mut result = ExtractionResult::default();
        let mut semesters: BTreeMap<String, Semester> = BTreeMap::new();
        for (item, output) in items.iter().zip(outputs) {
            match output {
                None => result.interrupted = true,
                Some(Err(err)) => {
                    tracing::error!(path = %item.path.display(), "{err}");
                    result.failures.push(FileFailure::from(&err));
                }
                Some(Ok(output)) => {
                    *result.files.entry(output.kind).or_default() += 1;
                    result.diagnostics += output.diagnostics;
                    let semester = semesters
                        .entry(item.context.semester.clone())
                        .or_insert_with(|| Semester {
                            semester: item.context.semester.clone(),
                            ..Default::default()
                        });
                    tally(semester, &output.records);
                    match output.records {
                        FileRecords::Course(record) => result.courses.push(record),
                        FileRecords::Assignment(record) => result.assignments.push(record),
                        FileRecords::User(record) => result.users.push(record),
                        FileRecords::Attempts(mut records) => result.attempts.append(&mut records),
                        FileRecords::Solution(record) => result.solutions.push(record),
                        FileRecords::Logins(mut records) => result.logins.append(&mut records),
                        FileRecords::Grade(record) => result.grades.push(record),
                        FileRecords::CodeMirror(mut records) => {
                            result.codemirror.append(&mut records)
                        }
                    }
                }
            }
        }
        if self.config.extract.courses {
            result.semesters = semesters.into_values().collect();
        }

        if result.interrupted {
            tracing::warn!(
                processed = result.files_processed(),
                total = items.len(),
                "extraction interrupted"
            );
        }
        Ok(result)
    }

    fn process_all(
        &self,
        parsers: &Parsers<'_>,
        items: &[WorkItem],
    ) -> Vec<Option<std::result::Result<FileOutput, ExtractError>>> {
        items
            .par_iter()
            .map(|item| {
                if self.cancel.load(Ordering::SeqCst) {
                    return None;
                }
                Some(self.process_file(parsers, item))
            })
            .collect()
    }

    fn process_file(
        &self,
        parsers: &Parsers<'_>,
        item: &WorkItem,
    ) -> std::result::Result<FileOutput, ExtractError> {
        tracing::debug!(kind = %item.kind, path = %item.path.display(), "processing");
        let read = || dataset::read_text(&item.path);

        let (records, diagnostics) = match item.kind {
            WorkKind::Course => {
                let (course, diagnostics) = catalog::describe_course(&item.path, &item.context)?;
                (FileRecords::Course(course), diagnostics)
            }
            WorkKind::Assignment => {
                let (assignment, diagnostics) = catalog::parse_assignment(&read()?, &item.context);
                (FileRecords::Assignment(assignment), diagnostics)
            }
            WorkKind::User => {
                let (user, diagnostics) = catalog::parse_user(&read()?, &item.context);
                (FileRecords::User(user), diagnostics)
            }
            WorkKind::Execution => {
                let parsed = parsers.attempts.parse_with_diagnostics(&read()?);
                let records = parsed
                    .attempts
                    .into_iter()
                    .map(|attempt| AttemptRecord {
                        context: item.context.clone(),
                        attempt,
                    })
                    .collect();
                (FileRecords::Attempts(records), parsed.diagnostics)
            }
            WorkKind::Solution => {
                let outcome = self.analyzer.analyze(&read()?);
                let diagnostics = outcome
                    .failures
                    .iter()
                    .map(|f| Diagnostic::metric_failed(None, f))
                    .collect();
                let record = SolutionRecord {
                    context: item.context.clone(),
                    solution: Solution {
                        metrics: outcome.record,
                    },
                };
                (FileRecords::Solution(record), diagnostics)
            }
            WorkKind::Login => {
                let (logins, diagnostics) = activity::parse_logins(&read()?, &item.context);
                (FileRecords::Logins(logins), diagnostics)
            }
            WorkKind::Grade => {
                let (grade, diagnostics) = activity::parse_grade(&read()?, &item.context);
                (FileRecords::Grade(grade), diagnostics)
            }
            WorkKind::CodeMirror => {
                let (events, diagnostics) = parsers.codemirror.parse(&read()?, &item.context);
                (FileRecords::CodeMirror(events), diagnostics)
            }
        };

        for diag in &diagnostics {
            report_diagnostic(&item.path, diag);
        }

        Ok(FileOutput {
            kind: item.kind,
            records,
            diagnostics: diagnostics.len(),
        })
    }
}

/// Count a processed file towards its period.
fn tally(semester: &mut Semester, records: &FileRecords) {
    match records {
        FileRecords::Course(course) => {
            semester.n_courses += 1;
            semester.n_assignments += course.n_assignments;
            semester.n_users += course.n_users;
        }
        FileRecords::Solution(_) => semester.n_codes += 1,
        FileRecords::Attempts(_) => semester.n_executions += 1,
        FileRecords::CodeMirror(_) => semester.n_mirrors += 1,
        FileRecords::Grade(_) => semester.n_grades += 1,
        FileRecords::Assignment(_) | FileRecords::User(_) | FileRecords::Logins(_) => {}
    }
}

fn report_diagnostic(path: &Path, diag: &Diagnostic) {
    match diag.seq_attempt {
        Some(seq) => tracing::warn!(path = %path.display(), seq_attempt = seq, "{diag}"),
        None => tracing::warn!(path = %path.display(), "{diag}"),
    }
}
