use codebench_core::types::SizeMetrics;

use crate::lexer::{Operator, Token, TokenKind};

/// Statement keywords whose header counts as a separate logical line when
/// code follows the colon on the same line.
const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "try", "except", "finally", "with", "def", "class",
    "async",
];

/// Raw line counts for `source`, using its token stream to group physical lines
/// into logical lines.
///
/// Every physical line is attributed to exactly one of sloc, multi,
/// single_comments or blank, so those four always add up to `loc`.
pub fn size_metrics(source: &str, tokens: &[Token<'_>]) -> SizeMetrics {
    let lines: Vec<&str> = source.lines().collect();
    let mut metrics = SizeMetrics {
        loc: lines.len(),
        comments: tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Comment)
            .count(),
        ..SizeMetrics::default()
    };

    let mut next_line = 1;
    let mut depth = 0usize;
    let mut group: Vec<&Token<'_>> = Vec::new();

    for token in tokens {
        match token.kind {
            TokenKind::Indent | TokenKind::Dedent | TokenKind::EndMarker => continue,
            TokenKind::Op(op) if op.opens_bracket() => depth += 1,
            TokenKind::Op(op) if op.closes_bracket() => depth = depth.saturating_sub(1),
            _ => {}
        }
        group.push(token);

        let ends_group = token.kind == TokenKind::Newline
            || (token.kind == TokenKind::Nl && depth == 0);
        if ends_group {
            let last = token.start.line.min(metrics.loc);
            count_group(&lines, next_line, last, &group, &mut metrics);
            next_line = next_line.max(last + 1);
            group.clear();
        }
    }
    if !group.is_empty() {
        count_group(&lines, next_line, metrics.loc, &group, &mut metrics);
        next_line = metrics.loc + 1;
    }

    // Trailing whitespace-only lines produce no tokens.
    metrics.blank += (metrics.loc + 1).saturating_sub(next_line);
    metrics
}

fn count_group(
    lines: &[&str],
    first: usize,
    last: usize,
    group: &[&Token<'_>],
    metrics: &mut SizeMetrics,
) {
    let code: Vec<&Token<'_>> = group
        .iter()
        .copied()
        .filter(|t| !matches!(t.kind, TokenKind::Nl | TokenKind::Newline))
        .collect();
    let range = if first >= 1 && first <= last {
        &lines[first - 1..last]
    } else {
        &[]
    };
    let numbered = (first..).zip(range.iter().map(|l| l.trim().is_empty()));

    match code.as_slice() {
        [only] if is_single_line_comment(only) => {
            metrics.single_comments += 1;
            for (line_no, empty) in numbered {
                if line_no == only.start.line {
                    continue;
                }
                if empty {
                    metrics.blank += 1;
                } else {
                    metrics.sloc += 1;
                }
            }
        }
        [only] if only.kind == TokenKind::String => {
            for (_, empty) in numbered {
                if empty {
                    metrics.blank += 1;
                } else {
                    metrics.multi += 1;
                }
            }
        }
        _ => {
            for (_, empty) in numbered {
                if empty {
                    metrics.blank += 1;
                } else {
                    metrics.sloc += 1;
                }
            }
        }
    }

    metrics.lloc += logical_lines(&code);
}

/// A lone comment, or a lone string that fits on one line (a one-line docstring).
fn is_single_line_comment(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Comment => true,
        TokenKind::String => token.start.line == token.end.line,
        _ => false,
    }
}

/// Statements in one logical line: top-level `;` separates statements.
fn logical_lines(code: &[&Token<'_>]) -> usize {
    let mut total = 0;
    let mut depth = 0usize;
    let mut segment: Vec<&Token<'_>> = Vec::new();

    for token in code.iter().copied().filter(|t| t.kind != TokenKind::Comment) {
        match token.kind {
            TokenKind::Op(Operator::Semi) if depth == 0 => {
                total += statement_weight(&segment);
                segment.clear();
                continue;
            }
            TokenKind::Op(op) if op.opens_bracket() => depth += 1,
            TokenKind::Op(op) if op.closes_bracket() => depth = depth.saturating_sub(1),
            _ => {}
        }
        segment.push(token);
    }

    total + statement_weight(&segment)
}

fn statement_weight(segment: &[&Token<'_>]) -> usize {
    let Some(first) = segment.first() else {
        return 0;
    };
    if first.kind != TokenKind::Name || !COMPOUND_KEYWORDS.contains(&first.text) {
        return 1;
    }

    let mut depth = 0usize;
    for (idx, token) in segment.iter().enumerate() {
        match token.kind {
            TokenKind::Op(op) if op.opens_bracket() => depth += 1,
            TokenKind::Op(op) if op.closes_bracket() => depth = depth.saturating_sub(1),
            TokenKind::Op(Operator::Colon) if depth == 0 => {
                return if idx + 1 < segment.len() { 2 } else { 1 };
            }
            _ => {}
        }
    }
    1
}
