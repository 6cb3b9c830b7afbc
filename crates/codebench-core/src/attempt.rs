use anyhow::Result;

use crate::analyzer::CodeAnalyzer;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error_class::ErrorClassifier;
use crate::types::Attempt;

/// Line separating two attempts in an execution log: 24 repetitions of `*-`.
pub const ATTEMPT_SEPARATOR: &str = "*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-";

/// Separator without its final `-`. Older exports end the line on `*`, so the log is
/// split on this stem and a dangling `-` at the start of a piece is dropped.
const SEPARATOR_STEM: &str = "*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*-*";

/// Boundary between the subsections of one attempt.
pub const SUBSECTION_SEPARATOR: &str = "\n-- ";

/// Boundary between the parts of a test-case subsection.
pub const TEST_CASE_SEPARATOR: &str = "\n---- ";

const HEADER_PREFIX: &str = "== ";
const CODE_LABEL_LEN: usize = 5;
const ERROR_PREFIX: &str = "ERROR:";
const ERROR_BODY_OFFSET: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Also compute code metrics for attempts that ended in an error.
    pub metrics_on_error: bool,
}

/// Attempts recovered from one log, plus everything that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub attempts: Vec<Attempt>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses execution-log text into ordered [`Attempt`] records.
///
/// Parsing is a pure function of the text: a malformed subsection leaves the
/// affected field absent and is reported as a [`Diagnostic`], it never aborts the log.
pub struct AttemptParser<'a> {
    analyzer: &'a dyn CodeAnalyzer,
    classifier: ErrorClassifier,
    options: ParseOptions,
}

impl<'a> AttemptParser<'a> {
    pub fn new(analyzer: &'a dyn CodeAnalyzer) -> Result<Self> {
        Ok(Self {
            analyzer,
            classifier: ErrorClassifier::new()?,
            options: ParseOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn parse(&self, raw: &str) -> Vec<Attempt> {
        self.parse_with_diagnostics(raw).attempts
    }

    pub fn parse_with_diagnostics(&self, raw: &str) -> ParsedLog {
        let mut log = ParsedLog::default();
        for (seq, section) in split_sections(raw).into_iter().enumerate() {
            let attempt = self.parse_section(seq, section, &mut log.diagnostics);
            log.attempts.push(attempt);
        }
        log
    }

    fn parse_section(&self, seq: usize, section: &str, diags: &mut Vec<Diagnostic>) -> Attempt {
        let (header, subsections) = split_subsections(section);

        let (kind, timestamp) = match parse_header(header) {
            Some(parsed) => parsed,
            None => {
                diags.push(Diagnostic::new(
                    Some(seq),
                    DiagnosticKind::MalformedHeader,
                    format!("expected `== <type> (<timestamp>)`, found {header:?}"),
                ));
                (skip_chars(header, HEADER_PREFIX.len()).trim().to_string(), String::new())
            }
        };

        let code = match subsections.first() {
            Some(sub) => skip_chars(sub, CODE_LABEL_LEN).trim(),
            None => {
                diags.push(Diagnostic::new(
                    Some(seq),
                    DiagnosticKind::MalformedSubsection {
                        label: "code".to_string(),
                    },
                    "attempt has no code subsection",
                ));
                ""
            }
        };

        let mut attempt = Attempt {
            seq_attempt: seq,
            kind,
            timestamp,
            has_error: false,
            error_message: None,
            error_type: None,
            exec_time: None,
            grade: None,
            test_case_results: Vec::new(),
            test_case_count: 0,
            metrics: None,
        };

        for sub in subsections.iter().skip(1) {
            self.apply_subsection(&mut attempt, sub, diags);
        }
        attempt.test_case_count = attempt.test_case_results.len();

        if !attempt.has_error || self.options.metrics_on_error {
            let outcome = self.analyzer.analyze(code);
            diags.extend(
                outcome
                    .failures
                    .iter()
                    .map(|f| Diagnostic::metric_failed(Some(seq), f)),
            );
            attempt.metrics = Some(outcome.record);
        }

        attempt
    }

    fn apply_subsection(&self, attempt: &mut Attempt, sub: &str, diags: &mut Vec<Diagnostic>) {
        let seq = attempt.seq_attempt;
        let malformed = |label: &str, detail: String| {
            Diagnostic::new(
                Some(seq),
                DiagnosticKind::MalformedSubsection {
                    label: label.to_string(),
                },
                detail,
            )
        };

        if sub.starts_with("EXE") {
            match sub.split(":\n").nth(1) {
                Some(time) => attempt.exec_time = Some(time.to_string()),
                None => diags.push(malformed("EXE", "missing `:` line break".to_string())),
            }
        } else if sub.starts_with("TES") {
            let parts: Vec<&str> = sub.split(TEST_CASE_SEPARATOR).collect();
            if parts.len() < 4 {
                diags.push(malformed(
                    "TES",
                    format!("expected 4 parts, found {}", parts.len()),
                ));
            } else {
                let corrected = output_block(parts[2]);
                let user = output_block(parts[3]);
                attempt.test_case_results.push(corrected == user);
            }
        } else if sub.starts_with("GRA") {
            match sub.split(':').nth(1) {
                Some(grade) => attempt.grade = Some(grade.trim().to_string()),
                None => diags.push(malformed("GRA", "missing `:`".to_string())),
            }
        } else if sub.starts_with(ERROR_PREFIX) {
            let message = skip_chars(sub, ERROR_BODY_OFFSET);
            attempt.has_error = true;
            attempt.error_type = Some(self.classifier.classify(message));
            attempt.error_message = Some(message.to_string());
        }
    }
}

/// Cut a log into trimmed, non-empty attempt chunks in document order.
pub fn split_sections(raw: &str) -> Vec<&str> {
    raw.split(SEPARATOR_STEM)
        .enumerate()
        .map(|(idx, piece)| {
            let piece = if idx > 0 {
                piece.strip_prefix('-').unwrap_or(piece)
            } else {
                piece
            };
            piece.trim()
        })
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Split one chunk into its header and the ordered subsections that follow it.
pub fn split_subsections(section: &str) -> (&str, Vec<&str>) {
    let mut parts = section.split(SUBSECTION_SEPARATOR);
    let header = parts.next().unwrap_or_default();
    (header, parts.collect())
}

/// `== <type> (<timestamp>)` into (type, timestamp).
fn parse_header(header: &str) -> Option<(String, String)> {
    let rest = header.strip_prefix(HEADER_PREFIX)?;
    let (kind, timestamp) = rest.split_once(" (")?;
    let timestamp = timestamp.trim_end();
    let timestamp = timestamp.strip_suffix(')').unwrap_or(timestamp);
    Some((kind.trim().to_string(), timestamp.to_string()))
}

/// Text after the last `:\n` label of a test-case part (the whole part if unlabeled).
fn output_block(part: &str) -> &str {
    part.rsplit_once(":\n").map_or(part, |(_, block)| block)
}

/// `s` without its first `n` characters; empty if it is shorter.
fn skip_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{MetricFailure, MetricKind, MetricsOutcome};
    use crate::types::{CodeMetricsRecord, SizeMetrics};

    /// Reports the number of code lines as `loc` so tests can see which text was analyzed.
    struct LineCounter;

    impl CodeAnalyzer for LineCounter {
        fn language(&self) -> &'static str {
            "test"
        }

        fn file_extensions(&self) -> &[&str] {
            &["txt"]
        }

        fn analyze(&self, code: &str) -> MetricsOutcome {
            MetricsOutcome {
                record: CodeMetricsRecord {
                    size: Some(SizeMetrics {
                        loc: code.lines().count(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                failures: vec![],
            }
        }
    }

    struct BrokenHalstead;

    impl CodeAnalyzer for BrokenHalstead {
        fn language(&self) -> &'static str {
            "test"
        }

        fn file_extensions(&self) -> &[&str] {
            &[]
        }

        fn analyze(&self, _code: &str) -> MetricsOutcome {
            MetricsOutcome {
                record: CodeMetricsRecord::default(),
                failures: vec![MetricFailure {
                    metric: MetricKind::Halstead,
                    reason: "boom".to_string(),
                }],
            }
        }
    }

    const SUBMISSION: &str = "== submission (2019-03-04 10:11:12.123)
-- CODE:
x = int(input())
print(x * 2)
-- EXECUTION TIME:
0.0123
-- TEST CASE 1:
---- input:
2
---- correct output:
4
---- user output:
4
-- TEST CASE 2:
---- input:
3
---- correct output:
6
---- user output:
6
-- GRADE:
100%";

    const FAILED_TEST: &str = "== test (2019-03-04 10:05:00.001)
-- CODE:
print(1 / 0)
-- ERROR:
ZeroDivisionError: division by zero";

    fn log(chunks: &[&str]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(chunk);
            out.push('\n');
            out.push_str(ATTEMPT_SEPARATOR);
            out.push('\n');
        }
        out
    }

    fn parse(raw: &str) -> ParsedLog {
        AttemptParser::new(&LineCounter)
            .unwrap()
            .parse_with_diagnostics(raw)
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(parse("").attempts.is_empty());
        assert!(parse("   \n\t\n").attempts.is_empty());
    }

    #[test]
    fn test_submission_with_passing_cases() {
        let parsed = parse(&log(&[SUBMISSION]));
        assert_eq!(parsed.attempts.len(), 1);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

        let a = &parsed.attempts[0];
        assert_eq!(a.seq_attempt, 0);
        assert_eq!(a.kind, "submission");
        assert_eq!(a.timestamp, "2019-03-04 10:11:12.123");
        assert_eq!(a.exec_time.as_deref(), Some("0.0123"));
        assert_eq!(a.grade.as_deref(), Some("100%"));
        assert_eq!(a.test_case_results, vec![true, true]);
        assert_eq!(a.test_case_count, 2);
        assert!(!a.has_error);
        assert!(a.error_message.is_none());
        assert!(a.error_type.is_none());

        let metrics = a.metrics.as_ref().expect("metrics for error-free attempt");
        assert_eq!(metrics.size.unwrap().loc, 2, "analyzer sees only the code");
    }

    #[test]
    fn test_error_attempt_skips_metrics() {
        let parsed = parse(&log(&[FAILED_TEST]));
        let a = &parsed.attempts[0];
        assert!(a.has_error);
        assert_eq!(a.error_type.as_deref(), Some("ZeroDivisionError"));
        assert_eq!(
            a.error_message.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
        assert!(a.metrics.is_none());
    }

    #[test]
    fn test_inline_error_message() {
        let chunk = "== test (t)\n-- CODE:\nx\n-- ERROR: ZeroDivisionError: division by zero";
        let a = &parse(chunk).attempts[0];
        assert!(a.has_error);
        assert_eq!(a.error_type.as_deref(), Some("ZeroDivisionError"));
    }

    #[test]
    fn test_metrics_on_error_policy() {
        let parser = AttemptParser::new(&LineCounter)
            .unwrap()
            .with_options(ParseOptions {
                metrics_on_error: true,
            });
        let attempts = parser.parse(&log(&[FAILED_TEST]));
        assert!(attempts[0].has_error);
        assert!(attempts[0].metrics.is_some());
    }

    #[test]
    fn test_sequence_follows_document_order() {
        let raw = log(&[FAILED_TEST, SUBMISSION, FAILED_TEST]);
        let attempts = parse(&raw).attempts;
        let seqs: Vec<_> = attempts.iter().map(|a| a.seq_attempt).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        let kinds: Vec<_> = attempts.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["test", "submission", "test"]);
    }

    #[test]
    fn test_error_and_metrics_are_exclusive() {
        let raw = log(&[FAILED_TEST, SUBMISSION, FAILED_TEST, SUBMISSION]);
        for a in parse(&raw).attempts {
            assert_ne!(a.has_error, a.metrics.is_some());
        }
    }

    #[test]
    fn test_trailing_separator_adds_no_attempt() {
        let mut raw = log(&[SUBMISSION, FAILED_TEST]);
        raw.push_str(ATTEMPT_SEPARATOR);
        raw.push_str("\n\n");
        assert_eq!(parse(&raw).attempts.len(), 2);
    }

    #[test]
    fn test_short_separator_variant() {
        let raw = format!("{SUBMISSION}\n{SEPARATOR_STEM}\n{FAILED_TEST}\n{SEPARATOR_STEM}\n");
        let attempts = parse(&raw).attempts;
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].kind, "test");
    }

    #[test]
    fn test_failing_test_case() {
        let chunk = "== test (t)
-- CODE:
print(3)
-- TEST CASE 1:
---- input:

---- correct output:
4
---- user output:
3";
        let a = &parse(chunk).attempts[0];
        assert_eq!(a.test_case_results, vec![false]);
        assert_eq!(a.test_case_count, 1);
    }

    #[test]
    fn test_output_block_uses_last_label() {
        assert_eq!(output_block("correct output:\nvalue: x:\n5"), "5");
        assert_eq!(output_block("no label"), "no label");
    }

    #[test]
    fn test_malformed_test_case_is_skipped_not_fatal() {
        let chunk = "== test (t)\n-- CODE:\nx = 1\n-- TEST CASE 1:\n---- input:\n1\n-- GRADE:\n50%";
        let parsed = parse(chunk);
        let a = &parsed.attempts[0];
        assert!(a.test_case_results.is_empty());
        assert_eq!(a.test_case_count, 0);
        assert_eq!(a.grade.as_deref(), Some("50%"));
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(
            parsed.diagnostics[0].kind,
            DiagnosticKind::MalformedSubsection {
                label: "TES".to_string()
            }
        );
        assert_eq!(parsed.diagnostics[0].seq_attempt, Some(0));
    }

    #[test]
    fn test_malformed_exec_time_left_absent() {
        let chunk = "== test (t)\n-- CODE:\nx = 1\n-- EXECUTION TIME 0.1";
        let parsed = parse(chunk);
        assert!(parsed.attempts[0].exec_time.is_none());
        assert_eq!(parsed.diagnostics.len(), 1);
    }

    #[test]
    fn test_unknown_subsection_is_ignored() {
        let chunk = "== test (t)\n-- CODE:\nx = 1\n-- MEMORY:\n12MB\n-- GRADE:\n10%";
        let parsed = parse(chunk);
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.attempts[0].grade.as_deref(), Some("10%"));
    }

    #[test]
    fn test_malformed_header_keeps_parsing() {
        let raw = log(&["garbage header\n-- CODE:\nx = 1", SUBMISSION]);
        let parsed = parse(&raw);
        assert_eq!(parsed.attempts.len(), 2);
        assert_eq!(parsed.attempts[0].timestamp, "");
        assert_eq!(parsed.attempts[1].kind, "submission");
        assert!(parsed
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MalformedHeader));
    }

    #[test]
    fn test_header_drops_only_one_closing_paren() {
        let parsed = parse("== test (t))\n-- CODE:\nx = 1");
        assert_eq!(parsed.attempts[0].kind, "test");
        assert_eq!(parsed.attempts[0].timestamp, "t)");
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn test_short_code_subsection_yields_empty_code() {
        let chunk = "== test (t)\n-- COD";
        let parsed = parse(chunk);
        let metrics = parsed.attempts[0].metrics.as_ref().unwrap();
        assert_eq!(metrics.size.unwrap().loc, 0);
    }

    #[test]
    fn test_metric_failures_become_diagnostics() {
        let parser = AttemptParser::new(&BrokenHalstead).unwrap();
        let parsed = parser.parse_with_diagnostics(&log(&[FAILED_TEST, SUBMISSION]));
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].seq_attempt, Some(1));
        assert_eq!(
            parsed.diagnostics[0].kind,
            DiagnosticKind::MetricFailed {
                metric: MetricKind::Halstead
            }
        );
        assert!(parsed.attempts[1].metrics.is_some());
    }

    #[test]
    fn test_reparse_is_identical() {
        let raw = log(&[SUBMISSION, FAILED_TEST]);
        assert_eq!(parse(&raw).attempts, parse(&raw).attempts);
    }

    #[test]
    fn test_skip_chars_is_char_aware() {
        assert_eq!(skip_chars("CÓDIGO: x", 7), " x");
        assert_eq!(skip_chars("abc", 5), "");
    }
}
