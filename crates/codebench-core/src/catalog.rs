//! Course, assignment and student metadata: the `.data` files next to the logs.

use std::collections::BTreeMap;
use std::path::Path;

use crate::activity::skip_chars;
use crate::dataset::{self, ASSESSMENTS_DIR, DATA_EXTENSION, USERS_DIR};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::ExtractResult;
use crate::types::{Assignment, Course, RecordContext, UserProfile};

const CLASS_NAME_PREFIX: &str = "---- class name:";
const CLASS_NAME_WIDTH: usize = 17;

/// `(line index, label width)` of the single-value fields of an assessment file.
const TITLE_LINE: (usize, usize) = (1, 23);
const OPEN_DATE_LINE: (usize, usize) = (4, 12);
const CLOSE_DATE_LINE: (usize, usize) = (5, 10);
const LANGUAGE_LINE: (usize, usize) = (6, 15);
const TYPE_LINE: (usize, usize) = (8, 11);
const WEIGHT_LINE: (usize, usize) = (9, 13);
const N_BLOCKS_LINE: (usize, usize) = (10, 22);
const FIRST_BLOCK_LINE: usize = 12;
const BLOCK_LABEL_WIDTH: usize = 18;
const BLOCK_ALTERNATIVE: &str = " or ";

const QUESTION_PREFIX: &str = "----";
const QUESTION_LABEL_WIDTH: usize = 5;
const QUESTION_KEY_WORDS: usize = 3;

/// Questionnaire attributes written to `users.csv`, in column order.
pub const USER_ATTRIBUTES: [&str; 25] = [
    "course_id",
    "course_name",
    "institution_id",
    "institution_name",
    "high_school_name",
    "school_type",
    "shift",
    "graduation_year",
    "has_a_pc",
    "share_this_pc",
    "this_pc_has",
    "previous_experience_of",
    "worked_or_interned",
    "company_name",
    "year_started_working",
    "year_stopped_working",
    "started_other_degree",
    "degree_course",
    "institution_name_2",
    "year_started_this",
    "year_stopped_this",
    "sex",
    "year_of_birth",
    "civil_status",
    "have_kids",
];

/// Build the course record for `course_dir`.
///
/// The description is the class name of the first assessment file that carries one.
/// A course without an `assessments/` directory is a branch failure.
pub fn describe_course(
    course_dir: &Path,
    context: &RecordContext,
) -> ExtractResult<(Course, Vec<Diagnostic>)> {
    let assessments =
        dataset::files_with_extension(&course_dir.join(ASSESSMENTS_DIR), DATA_EXTENSION)?;

    let mut description = None;
    for path in &assessments {
        let text = dataset::read_text(path)?;
        if let Some(name) = class_name(&text) {
            description = Some(name);
            break;
        }
    }

    let mut diagnostics = Vec::new();
    if description.is_none() {
        diagnostics.push(Diagnostic::new(
            None,
            DiagnosticKind::MissingField {
                field: "class name".to_string(),
            },
            "no assessment file names the class",
        ));
    }

    let n_users = dataset::subdirs(&course_dir.join(USERS_DIR)).map_or(0, |users| users.len());
    let course = Course {
        semester: context.semester.clone(),
        course: context.course.clone(),
        description: description.unwrap_or_default(),
        n_assignments: assessments.len(),
        n_users,
    };
    Ok((course, diagnostics))
}

fn class_name(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.starts_with(CLASS_NAME_PREFIX))
        .map(|line| skip_chars(line.trim(), CLASS_NAME_WIDTH).to_string())
}

/// Parse an `assessments/<id>.data` file.
///
/// Fields sit on fixed lines behind fixed-width labels; a missing line or an
/// unreadable number leaves that field empty and is reported.
pub fn parse_assignment(text: &str, context: &RecordContext) -> (Assignment, Vec<Diagnostic>) {
    let lines: Vec<&str> = text.lines().collect();
    let mut diagnostics = Vec::new();

    let mut field = |(idx, width): (usize, usize), name: &str| -> String {
        match lines.get(idx) {
            Some(line) => skip_chars(line, width).trim().to_string(),
            None => {
                diagnostics.push(Diagnostic::new(
                    None,
                    DiagnosticKind::MalformedLine { line: idx + 1 },
                    format!("assessment file ended before its {name}"),
                ));
                String::new()
            }
        }
    };

    let title = field(TITLE_LINE, "title");
    let open_date = field(OPEN_DATE_LINE, "open date");
    let close_date = field(CLOSE_DATE_LINE, "close date");
    let programming_lang = field(LANGUAGE_LINE, "language");
    let assignment_type = field(TYPE_LINE, "type");
    let weight_text = field(WEIGHT_LINE, "weight");
    let n_blocks_text = field(N_BLOCKS_LINE, "block count");

    let weight = parse_number::<f64>(&weight_text, WEIGHT_LINE.0, &mut diagnostics);
    let n_blocks = parse_number::<usize>(&n_blocks_text, N_BLOCKS_LINE.0, &mut diagnostics);

    let mut blocks = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(FIRST_BLOCK_LINE) {
        let ids = skip_chars(line.trim(), BLOCK_LABEL_WIDTH);
        if ids.is_empty() {
            continue;
        }
        let parsed: Result<Vec<u64>, _> = ids
            .split(BLOCK_ALTERNATIVE)
            .map(|id| id.trim().parse::<u64>())
            .collect();
        match parsed {
            Ok(block) => blocks.push(block),
            Err(e) => diagnostics.push(Diagnostic::new(
                None,
                DiagnosticKind::MalformedLine { line: idx + 1 },
                format!("block '{ids}': {e}"),
            )),
        }
    }

    let assignment = Assignment {
        semester: context.semester.clone(),
        course: context.course.clone(),
        assignment: context.assignment.clone(),
        title,
        open_date,
        close_date,
        programming_lang,
        assignment_type,
        weight,
        n_blocks,
        blocks,
    };
    (assignment, diagnostics)
}

/// An empty value was already reported as a missing line.
fn parse_number<T>(text: &str, idx: usize, diagnostics: &mut Vec<Diagnostic>) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if text.is_empty() {
        return None;
    }
    match text.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                None,
                DiagnosticKind::MalformedLine { line: idx + 1 },
                format!("'{text}': {e}"),
            ));
            None
        }
    }
}

/// Parse a `users/<user>/user.data` questionnaire.
///
/// Each `---- question: answer` line becomes one attribute. The key is the
/// lower-cased question cut to its first three words and joined with `_`; a
/// question whose key is already taken gets a `_2` suffix.
pub fn parse_user(text: &str, context: &RecordContext) -> (UserProfile, Vec<Diagnostic>) {
    let mut attributes = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if !line.starts_with(QUESTION_PREFIX) {
            continue;
        }
        let entry = skip_chars(line, QUESTION_LABEL_WIDTH).trim().to_lowercase();
        let Some((question, answer)) = entry.split_once(':') else {
            diagnostics.push(Diagnostic::new(
                None,
                DiagnosticKind::MalformedLine { line: idx + 1 },
                "questionnaire entry has no `:`",
            ));
            continue;
        };
        let mut key = question
            .split(' ')
            .take(QUESTION_KEY_WORDS)
            .collect::<Vec<_>>()
            .join("_");
        if attributes.contains_key(&key) {
            key.push_str("_2");
        }
        attributes.insert(key, answer.trim().to_string());
    }

    let profile = UserProfile {
        semester: context.semester.clone(),
        course: context.course.clone(),
        user: context.user.clone(),
        attributes,
    };
    (profile, diagnostics)
}
