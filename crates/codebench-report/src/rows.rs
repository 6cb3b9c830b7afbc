use codebench_core::catalog::USER_ATTRIBUTES;
use codebench_core::tokens::TokenCategory;
use codebench_core::types::{
    Assignment, AttemptRecord, CodeMetricsRecord, CodeMirrorEvent, ComplexityMetrics, Course,
    Grade, HalsteadMetrics, Login, Semester, SizeMetrics, SolutionRecord, TokenProfile,
    UserProfile,
};

/// A record that can be flattened into one CSV row.
pub trait CsvRow {
    /// Output file name inside the output directory.
    const FILE_NAME: &'static str;

    fn headers() -> Vec<String>;

    /// Field values in header order; absent values are empty strings.
    fn fields(&self) -> Vec<String>;
}

const CONTEXT_HEADERS: &[&str] = &["semester", "course", "user", "assignment", "problem"];

const COMPLEXITY_HEADERS: &[&str] = &[
    "complexity",
    "n_classes",
    "n_functions",
    "functions_complexity",
    "classes_complexity",
    "total_complexity",
    "n_blocks",
];

const SIZE_HEADERS: &[&str] = &[
    "loc",
    "lloc",
    "sloc",
    "comments",
    "single_comments",
    "multi",
    "blank",
];

const HALSTEAD_HEADERS: &[&str] = &[
    "h1",
    "h2",
    "N1",
    "N2",
    "vocabulary",
    "length",
    "calculated_length",
    "volume",
    "difficulty",
    "effort",
    "bugs",
    "time",
];

const UNIQUE_HEADERS: &[&str] = &[
    "unique_keywords",
    "unique_logical",
    "unique_builtin_funcs",
    "unique_builtin_types",
    "unique_assignment",
    "unique_arithmetic",
    "unique_comparison",
    "unique_bitwise",
    "identifiers_unique_count",
    "identifiers_min_len",
    "identifiers_max_len",
    "identifiers_mean_len",
];

fn owned<'a>(names: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    names.iter().map(|n| n.to_string())
}

/// Column names of a [`CodeMetricsRecord`], in output order.
pub fn metrics_headers() -> Vec<String> {
    owned(COMPLEXITY_HEADERS)
        .chain(owned(SIZE_HEADERS))
        .chain(owned(HALSTEAD_HEADERS))
        .chain(TokenCategory::ALL.iter().map(|c| c.column().to_string()))
        .chain(owned(UNIQUE_HEADERS))
        .collect()
}

/// Values matching [`metrics_headers`]; a missing family yields empty fields.
pub fn metrics_fields(record: Option<&CodeMetricsRecord>) -> Vec<String> {
    let mut out = Vec::with_capacity(metrics_headers().len());
    complexity_fields(record.and_then(|r| r.complexity.as_ref()), &mut out);
    size_fields(record.and_then(|r| r.size.as_ref()), &mut out);
    halstead_fields(record.and_then(|r| r.halstead.as_ref()), &mut out);
    token_fields(record.and_then(|r| r.tokens.as_ref()), &mut out);
    out
}

fn blanks(n: usize, out: &mut Vec<String>) {
    out.resize(out.len() + n, String::new());
}

fn complexity_fields(c: Option<&ComplexityMetrics>, out: &mut Vec<String>) {
    let Some(c) = c else {
        return blanks(COMPLEXITY_HEADERS.len(), out);
    };
    out.extend([
        c.complexity.to_string(),
        c.n_classes.to_string(),
        c.n_functions.to_string(),
        c.functions_complexity.to_string(),
        c.classes_complexity.to_string(),
        c.total_complexity.to_string(),
        c.n_blocks.to_string(),
    ]);
}

fn size_fields(s: Option<&SizeMetrics>, out: &mut Vec<String>) {
    let Some(s) = s else {
        return blanks(SIZE_HEADERS.len(), out);
    };
    out.extend(
        [
            s.loc,
            s.lloc,
            s.sloc,
            s.comments,
            s.single_comments,
            s.multi,
            s.blank,
        ]
        .map(|v| v.to_string()),
    );
}

fn halstead_fields(h: Option<&HalsteadMetrics>, out: &mut Vec<String>) {
    let Some(h) = h else {
        return blanks(HALSTEAD_HEADERS.len(), out);
    };
    out.extend([h.h1, h.h2, h.n1, h.n2, h.vocabulary, h.length].map(|v| v.to_string()));
    out.extend(
        [
            h.calculated_length,
            h.volume,
            h.difficulty,
            h.effort,
            h.bugs,
            h.time,
        ]
        .map(|v| v.to_string()),
    );
}

fn token_fields(t: Option<&TokenProfile>, out: &mut Vec<String>) {
    let Some(t) = t else {
        return blanks(TokenCategory::COUNT + UNIQUE_HEADERS.len(), out);
    };
    out.extend(t.counts.iter().map(|(_, count)| count.to_string()));
    let u = &t.unique;
    out.extend(
        [
            u.keywords,
            u.logical,
            u.builtin_funcs,
            u.builtin_types,
            u.assignment,
            u.arithmetic,
            u.comparison,
            u.bitwise,
            t.identifiers.unique_count,
            t.identifiers.min_len,
            t.identifiers.max_len,
        ]
        .map(|v| v.to_string()),
    );
    out.push(t.identifiers.mean_len.to_string());
}

/// Booleans are written the way the downstream notebooks read them.
fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// `[True, False]`
pub fn bool_list(values: &[bool]) -> String {
    let items: Vec<&str> = values.iter().map(|v| py_bool(*v)).collect();
    format!("[{}]", items.join(", "))
}

impl CsvRow for AttemptRecord {
    const FILE_NAME: &'static str = "attempts.csv";

    fn headers() -> Vec<String> {
        let mut headers: Vec<String> = owned(CONTEXT_HEADERS).collect();
        headers.extend(owned(&[
            "seq_attempt",
            "kind",
            "timestamp",
            "has_error",
            "error_message",
            "error_type",
            "exec_time",
            "grade",
            "test_case_results",
            "test_case_count",
        ]));
        headers.extend(metrics_headers());
        headers
    }

    fn fields(&self) -> Vec<String> {
        let c = &self.context;
        let a = &self.attempt;
        let mut out = vec![
            c.semester.clone(),
            c.course.clone(),
            c.user.clone(),
            c.assignment.clone(),
            c.problem.clone(),
            a.seq_attempt.to_string(),
            a.kind.clone(),
            a.timestamp.clone(),
            py_bool(a.has_error).to_string(),
            a.error_message.clone().unwrap_or_default(),
            a.error_type.clone().unwrap_or_default(),
            a.exec_time.clone().unwrap_or_default(),
            a.grade.clone().unwrap_or_default(),
            bool_list(&a.test_case_results),
            a.test_case_count.to_string(),
        ];
        out.extend(metrics_fields(a.metrics.as_ref()));
        out
    }
}

impl CsvRow for SolutionRecord {
    const FILE_NAME: &'static str = "solutions.csv";

    fn headers() -> Vec<String> {
        owned(CONTEXT_HEADERS).chain(metrics_headers()).collect()
    }

    fn fields(&self) -> Vec<String> {
        let c = &self.context;
        let mut out = vec![
            c.semester.clone(),
            c.course.clone(),
            c.user.clone(),
            c.assignment.clone(),
            c.problem.clone(),
        ];
        out.extend(metrics_fields(Some(&self.solution.metrics)));
        out
    }
}

impl CsvRow for Login {
    const FILE_NAME: &'static str = "logins.csv";

    fn headers() -> Vec<String> {
        owned(&["semester", "course", "user", "date", "time", "event"]).collect()
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.semester.clone(),
            self.course.clone(),
            self.user.clone(),
            self.date.clone(),
            self.time.clone(),
            self.event.clone(),
        ]
    }
}

impl CsvRow for Grade {
    const FILE_NAME: &'static str = "grades.csv";

    fn headers() -> Vec<String> {
        owned(&[
            "semester",
            "course",
            "user",
            "assignment",
            "grade",
            "n_problems",
            "correct",
            "wrong",
            "blank",
        ])
        .collect()
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.context.semester.clone(),
            self.context.course.clone(),
            self.context.user.clone(),
            self.context.assignment.clone(),
            self.grade.clone(),
            self.n_problems.clone(),
            self.correct.clone(),
            self.wrong.clone(),
            self.blank.clone(),
        ]
    }
}

impl CsvRow for Semester {
    const FILE_NAME: &'static str = "semesters.csv";

    fn headers() -> Vec<String> {
        owned(&[
            "semester",
            "n_courses",
            "n_assignments",
            "n_users",
            "n_codes",
            "n_executions",
            "n_mirrors",
            "n_grades",
        ])
        .collect()
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.semester.clone(),
            self.n_courses.to_string(),
            self.n_assignments.to_string(),
            self.n_users.to_string(),
            self.n_codes.to_string(),
            self.n_executions.to_string(),
            self.n_mirrors.to_string(),
            self.n_grades.to_string(),
        ]
    }
}

impl CsvRow for Course {
    const FILE_NAME: &'static str = "courses.csv";

    fn headers() -> Vec<String> {
        owned(&["semester", "course", "description", "n_assignments", "n_users"]).collect()
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.semester.clone(),
            self.course.clone(),
            self.description.clone(),
            self.n_assignments.to_string(),
            self.n_users.to_string(),
        ]
    }
}

/// `[[11, 12], [13]]`
fn block_list(blocks: &[Vec<u64>]) -> String {
    let items: Vec<String> = blocks
        .iter()
        .map(|block| {
            let ids: Vec<String> = block.iter().map(u64::to_string).collect();
            format!("[{}]", ids.join(", "))
        })
        .collect();
    format!("[{}]", items.join(", "))
}

impl CsvRow for Assignment {
    const FILE_NAME: &'static str = "assignments.csv";

    fn headers() -> Vec<String> {
        owned(&[
            "semester",
            "course",
            "assignment",
            "title",
            "open_date",
            "close_date",
            "programming_lang",
            "assignment_type",
            "weight",
            "n_blocks",
            "blocks",
        ])
        .collect()
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.semester.clone(),
            self.course.clone(),
            self.assignment.clone(),
            self.title.clone(),
            self.open_date.clone(),
            self.close_date.clone(),
            self.programming_lang.clone(),
            self.assignment_type.clone(),
            self.weight.map(|w| format!("{w:?}")).unwrap_or_default(),
            self.n_blocks.map(|n| n.to_string()).unwrap_or_default(),
            block_list(&self.blocks),
        ]
    }
}

impl CsvRow for UserProfile {
    const FILE_NAME: &'static str = "users.csv";

    fn headers() -> Vec<String> {
        owned(&["semester", "course", "user"])
            .chain(owned(&USER_ATTRIBUTES))
            .collect()
    }

    /// Questions outside the known columns are dropped; unanswered ones are blank.
    fn fields(&self) -> Vec<String> {
        let mut out = vec![self.semester.clone(), self.course.clone(), self.user.clone()];
        out.extend(
            USER_ATTRIBUTES
                .iter()
                .map(|key| self.attributes.get(*key).cloned().unwrap_or_default()),
        );
        out
    }
}

impl CsvRow for CodeMirrorEvent {
    const FILE_NAME: &'static str = "codemirror.csv";

    fn headers() -> Vec<String> {
        owned(CONTEXT_HEADERS)
            .chain(owned(&["timestamp", "date", "time", "event", "msg"]))
            .collect()
    }

    fn fields(&self) -> Vec<String> {
        let c = &self.context;
        vec![
            c.semester.clone(),
            c.course.clone(),
            c.user.clone(),
            c.assignment.clone(),
            c.problem.clone(),
            self.timestamp.map(|t| format!("{t:?}")).unwrap_or_default(),
            self.date.clone(),
            self.time.clone(),
            self.event.clone(),
            self.msg.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebench_core::tokens::TokenCounts;
    use codebench_core::types::{
        Attempt, IdentifierStats, RecordContext, Solution, UniqueCounts,
    };
    use std::collections::BTreeMap;

    fn context() -> RecordContext {
        RecordContext {
            semester: "2019-1".to_string(),
            course: "cs1".to_string(),
            user: "u1".to_string(),
            assignment: "a1".to_string(),
            problem: "p1".to_string(),
        }
    }

    fn attempt(metrics: Option<CodeMetricsRecord>) -> AttemptRecord {
        AttemptRecord {
            context: context(),
            attempt: Attempt {
                seq_attempt: 0,
                kind: "submission".to_string(),
                timestamp: "2019-03-04 10:11:12".to_string(),
                has_error: false,
                error_message: None,
                error_type: None,
                exec_time: Some("0.01".to_string()),
                grade: Some("100".to_string()),
                test_case_results: vec![true, false],
                test_case_count: 2,
                metrics,
            },
        }
    }

    #[test]
    fn test_headers_and_fields_line_up() {
        let full = CodeMetricsRecord {
            size: Some(SizeMetrics::default()),
            complexity: Some(ComplexityMetrics::default()),
            halstead: Some(HalsteadMetrics::default()),
            tokens: Some(TokenProfile {
                counts: TokenCounts::new(),
                unique: UniqueCounts::default(),
                identifiers: IdentifierStats::default(),
            }),
        };
        assert_eq!(
            AttemptRecord::headers().len(),
            attempt(Some(full.clone())).fields().len()
        );
        assert_eq!(AttemptRecord::headers().len(), attempt(None).fields().len());

        let solution = SolutionRecord {
            context: context(),
            solution: Solution { metrics: full },
        };
        assert_eq!(SolutionRecord::headers().len(), solution.fields().len());
    }

    #[test]
    fn test_metrics_columns() {
        let headers = metrics_headers();
        assert_eq!(headers.len(), 7 + 7 + 12 + TokenCategory::COUNT + 12);
        assert_eq!(headers[0], "complexity");
        assert_eq!(headers[14], "h1");
        assert_eq!(headers[26], "endmarker");
        assert_eq!(headers.last().map(String::as_str), Some("identifiers_mean_len"));
    }

    #[test]
    fn test_attempt_headers_follow_record_fields() {
        let headers = AttemptRecord::headers();
        assert_eq!(
            &headers[..15],
            &[
                "semester",
                "course",
                "user",
                "assignment",
                "problem",
                "seq_attempt",
                "kind",
                "timestamp",
                "has_error",
                "error_message",
                "error_type",
                "exec_time",
                "grade",
                "test_case_results",
                "test_case_count",
            ]
        );
        assert!(headers.iter().any(|h| h == "functions_complexity"));
        assert!(headers.iter().any(|h| h == "multi"));
        assert!(headers.iter().any(|h| h == "blank"));
        assert!(!headers.iter().any(|h| h == "datetime"));
    }

    #[test]
    fn test_missing_family_is_blank() {
        let record = CodeMetricsRecord {
            size: Some(SizeMetrics {
                loc: 3,
                ..SizeMetrics::default()
            }),
            ..CodeMetricsRecord::default()
        };
        let fields = metrics_fields(Some(&record));
        assert!(fields[..7].iter().all(String::is_empty));
        assert_eq!(fields[7], "3");
        assert!(fields[14..].iter().all(String::is_empty));
    }

    #[test]
    fn test_attempt_fields() {
        let fields = attempt(None).fields();
        assert_eq!(fields[5], "0");
        assert_eq!(fields[6], "submission");
        assert_eq!(fields[7], "2019-03-04 10:11:12");
        assert_eq!(fields[8], "False");
        assert_eq!(fields[9], "");
        assert_eq!(fields[12], "100");
        assert_eq!(fields[13], "[True, False]");
        assert_eq!(fields[14], "2");
    }

    #[test]
    fn test_assignment_fields() {
        let assignment = Assignment {
            semester: "2019-1".to_string(),
            course: "cs1".to_string(),
            assignment: "a1".to_string(),
            title: "Warm-up".to_string(),
            open_date: "2019-03-01 08:00".to_string(),
            close_date: "2019-03-08 23:59".to_string(),
            programming_lang: "python".to_string(),
            assignment_type: "homework".to_string(),
            weight: Some(1.0),
            n_blocks: None,
            blocks: vec![vec![11, 12], vec![13]],
        };
        let fields = assignment.fields();
        assert_eq!(fields.len(), Assignment::headers().len());
        assert_eq!(fields[8], "1.0");
        assert_eq!(fields[9], "");
        assert_eq!(fields[10], "[[11, 12], [13]]");
        assert_eq!(block_list(&[]), "[]");
    }

    #[test]
    fn test_user_fields_follow_attribute_columns() {
        let mut attributes = BTreeMap::new();
        attributes.insert("sex".to_string(), "f".to_string());
        attributes.insert("course_id".to_string(), "12".to_string());
        attributes.insert("favourite_colour_is".to_string(), "blue".to_string());
        let user = UserProfile {
            semester: "2019-1".to_string(),
            course: "cs1".to_string(),
            user: "u1".to_string(),
            attributes,
        };

        let headers = UserProfile::headers();
        let fields = user.fields();
        assert_eq!(headers.len(), 3 + USER_ATTRIBUTES.len());
        assert_eq!(fields.len(), headers.len());
        assert_eq!(headers[3], "course_id");
        assert_eq!(fields[3], "12");
        let sex = headers.iter().position(|h| h == "sex").unwrap();
        assert_eq!(fields[sex], "f");
        assert_eq!(fields.iter().filter(|f| f.is_empty()).count(), USER_ATTRIBUTES.len() - 2);
    }

    #[test]
    fn test_codemirror_and_course_rows() {
        let event = CodeMirrorEvent {
            context: context(),
            timestamp: Some(1_551_694_272.5),
            date: "2019-03-04".to_string(),
            time: "10:11:12.5".to_string(),
            event: "change".to_string(),
            msg: "x".to_string(),
        };
        let fields = event.fields();
        assert_eq!(fields.len(), CodeMirrorEvent::headers().len());
        assert_eq!(fields[5], "1551694272.5");
        assert_eq!(fields[8], "change");

        let course = Course {
            semester: "2019-1".to_string(),
            course: "cs1".to_string(),
            description: "Programming I".to_string(),
            n_assignments: 2,
            n_users: 30,
        };
        assert_eq!(course.fields(), vec!["2019-1", "cs1", "Programming I", "2", "30"]);

        let semester = Semester {
            semester: "2019-1".to_string(),
            n_courses: 1,
            ..Semester::default()
        };
        assert_eq!(semester.fields().len(), Semester::headers().len());
        assert_eq!(semester.fields()[1], "1");
    }

    #[test]
    fn test_bool_list() {
        assert_eq!(bool_list(&[]), "[]");
        assert_eq!(bool_list(&[true]), "[True]");
    }
}
