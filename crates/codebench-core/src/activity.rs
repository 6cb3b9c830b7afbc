use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::types::{CodeMirrorEvent, Grade, Login, RecordContext};

const DATE_LEN: usize = 10;
const TIME_OFFSET: usize = 11;

/// Label widths of the five grade-file lines, in order: grade, problem count,
/// correct, wrong, blank.
const GRADE_LABEL_WIDTHS: [usize; 5] = [19, 26, 14, 16, 12];

const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse a `logins.log` file: one `YYYY-MM-DD HH:MM:SS#event` entry per line.
///
/// Blank lines are ignored; a line without `#` is reported and skipped.
pub fn parse_logins(text: &str, context: &RecordContext) -> (Vec<Login>, Vec<Diagnostic>) {
    let mut logins = Vec::new();
    let mut diagnostics = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split('#');
        let stamp = parts.next().unwrap_or_default();
        let Some(event) = parts.next() else {
            diagnostics.push(Diagnostic::new(
                None,
                DiagnosticKind::MalformedLine { line: idx + 1 },
                "login entry has no `#` separator",
            ));
            continue;
        };
        logins.push(Login {
            semester: context.semester.clone(),
            course: context.course.clone(),
            user: context.user.clone(),
            date: take_chars(stamp, DATE_LEN).to_string(),
            time: skip_chars(stamp, TIME_OFFSET).trim_end().to_string(),
            event: event.trim_end().to_string(),
        });
    }

    (logins, diagnostics)
}

/// Parse a per-assignment grade file. Missing lines leave their field empty and are reported.
pub fn parse_grade(text: &str, context: &RecordContext) -> (Grade, Vec<Diagnostic>) {
    let mut lines = text.lines();
    let mut fields: [String; 5] = Default::default();
    let mut diagnostics = Vec::new();

    for (idx, width) in GRADE_LABEL_WIDTHS.iter().enumerate() {
        match lines.next() {
            Some(line) => fields[idx] = skip_chars(line.trim(), *width).trim().to_string(),
            None => diagnostics.push(Diagnostic::new(
                None,
                DiagnosticKind::MalformedLine { line: idx + 1 },
                "grade file ended early",
            )),
        }
    }

    let [grade, n_problems, correct, wrong, blank] = fields;
    let grade = Grade {
        context: context.clone(),
        grade,
        n_problems,
        correct,
        wrong,
        blank,
    };
    (grade, diagnostics)
}

/// Parses editor event logs (`codemirror/<assignment>_<problem>.log`).
///
/// Only lines that start with a date are entries, each
/// `YYYY-MM-DD HH:MM:SS.ffffff#event#message`; other lines are continuation
/// noise and are skipped.
pub struct CodeMirrorParser {
    entry_start: Regex,
}

impl CodeMirrorParser {
    pub fn new() -> Result<Self> {
        let entry_start =
            Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}").context("failed to compile event line pattern")?;
        Ok(Self { entry_start })
    }

    pub fn parse(&self, text: &str, context: &RecordContext) -> (Vec<CodeMirrorEvent>, Vec<Diagnostic>) {
        let mut events = Vec::new();
        let mut diagnostics = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            if !self.entry_start.is_match(line) {
                continue;
            }
            let malformed = |detail: &str| {
                Diagnostic::new(None, DiagnosticKind::MalformedLine { line: idx + 1 }, detail)
            };
            let entry = line.trim();
            let Some((stamp, action)) = entry.split_once('#') else {
                diagnostics.push(malformed("event entry has no `#` separator"));
                continue;
            };
            let Some((date, time)) = stamp.split_once(' ') else {
                diagnostics.push(malformed("event time has no date/time separator"));
                continue;
            };
            let Some((event, msg)) = action.split_once('#') else {
                diagnostics.push(malformed("event entry has no message"));
                continue;
            };

            let timestamp = match NaiveDateTime::parse_from_str(stamp, EVENT_TIME_FORMAT) {
                Ok(at) => Some(at.and_utc().timestamp_micros() as f64 / 1_000_000.0),
                Err(e) => {
                    diagnostics.push(malformed(&format!("unreadable time '{stamp}': {e}")));
                    None
                }
            };

            events.push(CodeMirrorEvent {
                context: context.clone(),
                timestamp,
                date: date.to_string(),
                time: time.to_string(),
                event: event.to_string(),
                msg: msg.to_string(),
            });
        }

        (events, diagnostics)
    }
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub(crate) fn skip_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RecordContext {
        RecordContext {
            semester: "2019-1".to_string(),
            course: "cs1".to_string(),
            user: "u1".to_string(),
            assignment: "a1".to_string(),
            problem: String::new(),
        }
    }

    #[test]
    fn test_parse_logins() {
        let text = "2019-03-04 10:11:12#login\n\n2019-03-04 11:00:00#logout\r\n";
        let (logins, diags) = parse_logins(text, &ctx());
        assert!(diags.is_empty());
        assert_eq!(logins.len(), 2);
        assert_eq!(logins[0].date, "2019-03-04");
        assert_eq!(logins[0].time, "10:11:12");
        assert_eq!(logins[0].event, "login");
        assert_eq!(logins[1].event, "logout");
        assert_eq!(logins[1].user, "u1");
    }

    #[test]
    fn test_login_without_separator_is_reported() {
        let text = "2019-03-04 10:11:12#login\ngarbage\n";
        let (logins, diags) = parse_logins(text, &ctx());
        assert_eq!(logins.len(), 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::MalformedLine { line: 2 });
    }

    #[test]
    fn test_parse_grade() {
        let text = "\
Nota da atividade: 8.5
Número total de questões: 4
Acertos:      3
Erros:          1
Em branco:  0
";
        let (grade, diags) = parse_grade(text, &ctx());
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(grade.grade, "8.5");
        assert_eq!(grade.n_problems, "4");
        assert_eq!(grade.correct, "3");
        assert_eq!(grade.wrong, "1");
        assert_eq!(grade.blank, "0");
        assert_eq!(grade.context.assignment, "a1");
    }

    #[test]
    fn test_parse_codemirror_events() {
        let text = "\
2019-03-04 10:11:12.500000#change#{\"from\":1,\"text\":[\"x = 1#2\"]}
  continuation of the previous message
2019-03-04 10:11:13.000000#focus#
";
        let parser = CodeMirrorParser::new().unwrap();
        let (events, diags) = parser.parse(text, &ctx());
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.date, "2019-03-04");
        assert_eq!(first.time, "10:11:12.500000");
        assert_eq!(first.event, "change");
        assert_eq!(first.msg, "{\"from\":1,\"text\":[\"x = 1#2\"]}");
        assert_eq!(first.timestamp, Some(1_551_694_272.5));
        assert_eq!(first.context.assignment, "a1");

        assert_eq!(events[1].event, "focus");
        assert_eq!(events[1].msg, "");
    }

    #[test]
    fn test_malformed_codemirror_lines() {
        let text = "\
2019-03-04 10:11:12.5#blur
2019-03-04#blur#x
2019-13-04 10:11:12#blur#x
";
        let parser = CodeMirrorParser::new().unwrap();
        let (events, diags) = parser.parse(text, &ctx());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, None);
        let lines: Vec<_> = diags.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(
            lines,
            [1, 2, 3]
                .map(|line| DiagnosticKind::MalformedLine { line })
                .to_vec()
        );
    }

    #[test]
    fn test_short_grade_file() {
        let (grade, diags) = parse_grade("Nota da atividade: 10\n", &ctx());
        assert_eq!(grade.grade, "10");
        assert_eq!(grade.blank, "");
        assert_eq!(diags.len(), 4);
    }
}
