use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("EOF in multi-line string starting at line {line}")]
    UnterminatedString { line: usize },

    #[error("EOF in multi-line statement at line {line}")]
    UnexpectedEof { line: usize },

    #[error("unindent does not match any outer indentation level (line {line})")]
    InconsistentDedent { line: usize },
}

/// Why a syntax-tree based metric family could not be computed.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("failed to load Python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("parser returned no syntax tree")]
    NoTree,

    #[error("syntax error at line {line}")]
    Syntax { line: usize },
}
