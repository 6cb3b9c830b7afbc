use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::tokens::TokenCounts;

/// Dataset coordinates of a record, derived from the file's location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordContext {
    pub semester: String,
    pub course: String,
    pub user: String,
    pub assignment: String,
    pub problem: String,
}

/// One graded action (test run or submission) recovered from an execution log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub seq_attempt: usize,
    pub kind: String,
    pub timestamp: String,
    pub has_error: bool,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub exec_time: Option<String>,
    pub grade: Option<String>,
    pub test_case_results: Vec<bool>,
    pub test_case_count: usize,
    pub metrics: Option<CodeMetricsRecord>,
}

/// Metrics for one persisted solution file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub metrics: CodeMetricsRecord,
}

/// Attempt tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    #[serde(flatten)]
    pub context: RecordContext,
    #[serde(flatten)]
    pub attempt: Attempt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolutionRecord {
    #[serde(flatten)]
    pub context: RecordContext,
    #[serde(flatten)]
    pub solution: Solution,
}

/// Union of the four independently computed metric families for a code sample.
///
/// A family that could not be computed is `None`; the others are unaffected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodeMetricsRecord {
    pub size: Option<SizeMetrics>,
    pub complexity: Option<ComplexityMetrics>,
    pub halstead: Option<HalsteadMetrics>,
    pub tokens: Option<TokenProfile>,
}

impl CodeMetricsRecord {
    pub fn is_complete(&self) -> bool {
        self.size.is_some()
            && self.complexity.is_some()
            && self.halstead.is_some()
            && self.tokens.is_some()
    }
}

/// Raw line counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeMetrics {
    pub loc: usize,
    pub lloc: usize,
    pub sloc: usize,
    pub comments: usize,
    pub single_comments: usize,
    pub multi: usize,
    pub blank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Function,
    Method,
    Class,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Function => write!(f, "function"),
            UnitKind::Method => write!(f, "method"),
            UnitKind::Class => write!(f, "class"),
        }
    }
}

/// Cyclomatic complexity of one function, method or class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitComplexity {
    pub name: String,
    pub kind: UnitKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classname: Option<String>,
    pub line: usize,
    pub complexity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplexityMetrics {
    /// Module-level complexity (1 + decision points outside functions and classes).
    pub complexity: u32,
    pub functions_complexity: u32,
    pub classes_complexity: u32,
    pub total_complexity: u32,
    pub n_functions: usize,
    pub n_classes: usize,
    pub n_blocks: usize,
    /// Functions, then each class followed by its methods.
    pub units: Vec<UnitComplexity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HalsteadMetrics {
    pub h1: usize,
    pub h2: usize,
    #[serde(rename = "N1")]
    pub n1: usize,
    #[serde(rename = "N2")]
    pub n2: usize,
    pub vocabulary: usize,
    pub length: usize,
    pub calculated_length: f64,
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
    pub bugs: f64,
    pub time: f64,
}

impl HalsteadMetrics {
    /// Apply the software-science formulas to raw operator/operand counts.
    pub fn from_counts(h1: usize, h2: usize, n1: usize, n2: usize) -> Self {
        let vocabulary = h1 + h2;
        let length = n1 + n2;
        let calculated_length = if h1 > 0 && h2 > 0 {
            h1 as f64 * (h1 as f64).log2() + h2 as f64 * (h2 as f64).log2()
        } else {
            0.0
        };
        let volume = if vocabulary > 0 {
            length as f64 * (vocabulary as f64).log2()
        } else {
            0.0
        };
        let difficulty = if h2 > 0 {
            (h1 * n2) as f64 / (2 * h2) as f64
        } else {
            0.0
        };
        let effort = difficulty * volume;
        Self {
            h1,
            h2,
            n1,
            n2,
            vocabulary,
            length,
            calculated_length,
            volume,
            difficulty,
            effort,
            bugs: volume / 3000.0,
            time: effort / 18.0,
        }
    }
}

/// Distinct-member counts of the classifier's uniqueness sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UniqueCounts {
    pub keywords: usize,
    pub logical: usize,
    pub builtin_funcs: usize,
    pub builtin_types: usize,
    pub assignment: usize,
    pub arithmetic: usize,
    pub comparison: usize,
    pub bitwise: usize,
}

/// Statistics over the set of distinct identifier names. All zero when empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IdentifierStats {
    pub unique_count: usize,
    pub min_len: usize,
    pub max_len: usize,
    pub mean_len: f64,
}

impl IdentifierStats {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let lens: Vec<usize> = names.into_iter().map(|n| n.chars().count()).collect();
        if lens.is_empty() {
            return Self::default();
        }
        let total: usize = lens.iter().sum();
        Self {
            unique_count: lens.len(),
            min_len: lens.iter().copied().min().unwrap_or(0),
            max_len: lens.iter().copied().max().unwrap_or(0),
            mean_len: total as f64 / lens.len() as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenProfile {
    pub counts: TokenCounts,
    pub unique: UniqueCounts,
    pub identifiers: IdentifierStats,
}

/// A login/logout event from a user's access log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Login {
    pub semester: String,
    pub course: String,
    pub user: String,
    pub date: String,
    pub time: String,
    pub event: String,
}

/// Per-assignment grade summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grade {
    #[serde(flatten)]
    pub context: RecordContext,
    pub grade: String,
    pub n_problems: String,
    pub correct: String,
    pub wrong: String,
    pub blank: String,
}

/// Record counts of one academic period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Semester {
    pub semester: String,
    pub n_courses: usize,
    pub n_assignments: usize,
    pub n_users: usize,
    pub n_codes: usize,
    pub n_executions: usize,
    pub n_mirrors: usize,
    pub n_grades: usize,
}

/// One course (class) of a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub semester: String,
    pub course: String,
    /// Class name taken from the course's assessment files; empty when none carries one.
    pub description: String,
    pub n_assignments: usize,
    pub n_users: usize,
}

/// An assessment published to a course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub semester: String,
    pub course: String,
    pub assignment: String,
    pub title: String,
    pub open_date: String,
    pub close_date: String,
    pub programming_lang: String,
    pub assignment_type: String,
    pub weight: Option<f64>,
    pub n_blocks: Option<usize>,
    /// Problem ids per block; a student gets one problem of each block.
    pub blocks: Vec<Vec<u64>>,
}

/// Answers of a student's enrolment questionnaire, keyed by normalised question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub semester: String,
    pub course: String,
    pub user: String,
    pub attributes: BTreeMap<String, String>,
}

/// An editor event recorded while a student worked on a problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeMirrorEvent {
    #[serde(flatten)]
    pub context: RecordContext,
    /// Seconds since the Unix epoch, reading the logged time as UTC.
    pub timestamp: Option<f64>,
    pub date: String,
    pub time: String,
    pub event: String,
    pub msg: String,
}
