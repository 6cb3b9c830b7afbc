pub mod classifier;
pub mod complexity;
pub mod error;
pub mod halstead;
pub mod lexer;
pub mod raw;

use tree_sitter::{Language, Node, Parser, Tree};

use codebench_core::analyzer::{CodeAnalyzer, MetricFailure, MetricKind, MetricsOutcome};

pub use error::{LexError, MetricError};

/// Python metrics: a `tokenize`-compatible lexer for size and token profile,
/// and a tree-sitter syntax tree for complexity and Halstead.
pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    /// Parse `code`, rejecting trees that contain syntax errors.
    pub fn parse_tree(&self, code: &str) -> Result<Tree, MetricError> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        let tree = parser.parse(code, None).ok_or(MetricError::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(root.start_position().row + 1);
            return Err(MetricError::Syntax { line });
        }
        Ok(tree)
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeAnalyzer for PythonAnalyzer {
    fn language(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&str] {
        &["py"]
    }

    fn analyze(&self, code: &str) -> MetricsOutcome {
        let mut outcome = MetricsOutcome::default();

        match lexer::tokenize(code) {
            Ok(tokens) => {
                outcome.record.size = Some(raw::size_metrics(code, &tokens));
                outcome.record.tokens = Some(classifier::profile(&tokens));
            }
            Err(e) => {
                let reason = e.to_string();
                outcome.failures.push(failure(MetricKind::Size, reason.clone()));
                outcome.failures.push(failure(MetricKind::Tokens, reason));
            }
        }

        match self.parse_tree(code) {
            Ok(tree) => {
                let root = tree.root_node();
                outcome.record.complexity = Some(complexity::analyze(root, code));
                outcome.record.halstead = Some(halstead::analyze(root, code));
            }
            Err(e) => {
                let reason = e.to_string();
                outcome
                    .failures
                    .push(failure(MetricKind::Complexity, reason.clone()));
                outcome.failures.push(failure(MetricKind::Halstead, reason));
            }
        }

        outcome
    }
}

fn failure(metric: MetricKind, reason: String) -> MetricFailure {
    MetricFailure { metric, reason }
}

fn first_error_line(node: Node<'_>) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    if !node.has_error() {
        return None;
    }
    children(node).into_iter().find_map(first_error_line)
}

pub(crate) fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}
