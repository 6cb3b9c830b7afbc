use std::collections::{BTreeSet, HashSet};

use codebench_core::tokens::{TokenCategory, TokenCounts};
use codebench_core::types::{IdentifierStats, TokenProfile, UniqueCounts};

use crate::lexer::{Operator, Token, TokenKind};

/// Builtin type names. Checked before [`BUILTIN_FUNCTIONS`], so `int` or `str` is a type.
pub const BUILTIN_TYPES: &[&str] = &[
    "bool",
    "bytes",
    "bytearray",
    "complex",
    "dict",
    "float",
    "set",
    "int",
    "list",
    "range",
    "object",
    "str",
    "memoryview",
    "None",
    "frozenset",
];

pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "abs",
    "all",
    "any",
    "ascii",
    "bin",
    "bool",
    "bytearray",
    "bytes",
    "callable",
    "chr",
    "classmethod",
    "compile",
    "delattr",
    "dir",
    "divmod",
    "enumerate",
    "eval",
    "exec",
    "filter",
    "format",
    "getattr",
    "globals",
    "hasattr",
    "hash",
    "hex",
    "id",
    "input",
    "isinstance",
    "issubclass",
    "iter",
    "len",
    "locals",
    "map",
    "max",
    "min",
    "next",
    "oct",
    "open",
    "ord",
    "pow",
    "print",
    "property",
    "range",
    "repr",
    "reversed",
    "round",
    "set",
    "setattr",
    "slice",
    "sorted",
    "staticmethod",
    "str",
    "sum",
    "super",
    "tuple",
    "type",
    "vars",
    "zip",
];

/// Reserved keywords of Python 3, each with its own category.
pub fn keyword_category(name: &str) -> Option<TokenCategory> {
    use TokenCategory::*;
    Some(match name {
        "False" => KwdFalse,
        "None" => KwdNone,
        "True" => KwdTrue,
        "and" => KwdAnd,
        "as" => KwdAs,
        "assert" => KwdAssert,
        "async" => KwdAsync,
        "await" => KwdAwait,
        "break" => KwdBreak,
        "class" => KwdClass,
        "continue" => KwdContinue,
        "def" => KwdDef,
        "del" => KwdDel,
        "elif" => KwdElif,
        "else" => KwdElse,
        "except" => KwdExcept,
        "finally" => KwdFinally,
        "for" => KwdFor,
        "from" => KwdFrom,
        "global" => KwdGlobal,
        "if" => KwdIf,
        "import" => KwdImport,
        "in" => KwdIn,
        "is" => KwdIs,
        "lambda" => KwdLambda,
        "nonlocal" => KwdNonlocal,
        "not" => KwdNot,
        "or" => KwdOr,
        "pass" => KwdPass,
        "raise" => KwdRaise,
        "return" => KwdReturn,
        "try" => KwdTry,
        "while" => KwdWhile,
        "with" => KwdWith,
        "yield" => KwdYield,
        _ => return None,
    })
}

pub fn operator_category(op: Operator) -> TokenCategory {
    use Operator as O;
    use TokenCategory as C;
    match op {
        O::Lpar => C::Lpar,
        O::Rpar => C::Rpar,
        O::Lsqb => C::Lsqb,
        O::Rsqb => C::Rsqb,
        O::Colon => C::Colon,
        O::Comma => C::Comma,
        O::Semi => C::Semi,
        O::Plus => C::Plus,
        O::Minus => C::Minus,
        O::Star => C::Star,
        O::Slash => C::Slash,
        O::Vbar => C::Vbar,
        O::Amper => C::Amper,
        O::Less => C::Less,
        O::Greater => C::Greater,
        O::Equal => C::Equal,
        O::Dot => C::Dot,
        O::Percent => C::Percent,
        O::Lbrace => C::Lbrace,
        O::Rbrace => C::Rbrace,
        O::EqEqual => C::EqEqual,
        O::NotEqual => C::NotEq,
        O::LessEqual => C::LessEq,
        O::GreaterEqual => C::GreaterEq,
        O::Tilde => C::Tilde,
        O::Circumflex => C::Circumflex,
        O::LeftShift => C::LeftShift,
        O::RightShift => C::RightShift,
        O::DoubleStar => C::DoubleStar,
        O::PlusEqual => C::PlusEq,
        O::MinusEqual => C::MinusEq,
        O::StarEqual => C::StarEq,
        O::SlashEqual => C::SlashEq,
        O::PercentEqual => C::PercentEq,
        O::AmperEqual => C::AmperEq,
        O::VbarEqual => C::VbarEq,
        O::CircumflexEqual => C::CircumflexEq,
        O::LeftShiftEqual => C::LeftShiftEq,
        O::RightShiftEqual => C::RightShiftEq,
        O::DoubleStarEqual => C::DoubleStarEq,
        O::DoubleSlash => C::DoubleSlash,
        O::DoubleSlashEqual => C::DoubleSlashEq,
        O::At => C::At,
        O::AtEqual => C::AtEq,
        O::Rarrow => C::Rarrow,
        O::Ellipsis => C::Ellipsis,
        O::ColonEqual => C::ColonEq,
    }
}

fn is_arithmetic(op: Operator) -> bool {
    use Operator::*;
    matches!(
        op,
        Plus | Minus | Star | Slash | DoubleSlash | Percent | DoubleStar | At
    )
}

fn is_bitwise(op: Operator) -> bool {
    use Operator::*;
    matches!(op, Amper | Vbar | Circumflex | Tilde | LeftShift | RightShift)
}

fn is_comparison(op: Operator) -> bool {
    use Operator::*;
    matches!(
        op,
        EqEqual | NotEqual | Less | Greater | LessEqual | GreaterEqual
    )
}

/// Accumulates category counts and uniqueness sets over a token stream.
#[derive(Debug, Default)]
pub struct TokenClassifier<'a> {
    counts: TokenCounts,
    keywords: BTreeSet<&'a str>,
    logical: BTreeSet<&'a str>,
    builtin_funcs: BTreeSet<&'a str>,
    builtin_types: BTreeSet<&'a str>,
    identifiers: BTreeSet<&'a str>,
    strings: HashSet<&'a str>,
    assignment: BTreeSet<Operator>,
    arithmetic: BTreeSet<Operator>,
    comparison: BTreeSet<Operator>,
    bitwise: BTreeSet<Operator>,
}

impl<'a> TokenClassifier<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, token: &Token<'a>) {
        match token.kind {
            TokenKind::Number => {
                if token.text.contains('.') {
                    self.counts.increment(TokenCategory::NumberFloat);
                } else {
                    self.counts.increment(TokenCategory::NumberInt);
                }
            }
            TokenKind::Name => self.observe_name(token.text),
            TokenKind::String => {
                self.counts.increment(TokenCategory::String);
                self.strings.insert(token.text);
            }
            TokenKind::Op(op) => self.observe_operator(op),
            TokenKind::Comment => self.counts.increment(TokenCategory::Comment),
            TokenKind::Newline => self.counts.increment(TokenCategory::Newline),
            TokenKind::Nl => self.counts.increment(TokenCategory::Nl),
            TokenKind::Indent => self.counts.increment(TokenCategory::Indent),
            TokenKind::Dedent => self.counts.increment(TokenCategory::Dedent),
            TokenKind::ErrorToken => self.counts.increment(TokenCategory::ErrorToken),
            TokenKind::EndMarker => self.counts.increment(TokenCategory::EndMarker),
        }
    }

    fn observe_name(&mut self, name: &'a str) {
        if let Some(category) = keyword_category(name) {
            self.counts.increment(category);
            self.keywords.insert(name);
            if matches!(name, "and" | "or" | "not") {
                self.logical.insert(name);
            }
        } else if BUILTIN_TYPES.contains(&name) {
            self.counts.increment(TokenCategory::BuiltinType);
            self.builtin_types.insert(name);
        } else if BUILTIN_FUNCTIONS.contains(&name) {
            let category = match name {
                "print" => TokenCategory::KwdPrint,
                "input" => TokenCategory::KwdInput,
                _ => TokenCategory::BuiltinFunc,
            };
            self.counts.increment(category);
            self.builtin_funcs.insert(name);
        } else {
            self.counts.increment(TokenCategory::Identifier);
            self.identifiers.insert(name);
        }
    }

    fn observe_operator(&mut self, op: Operator) {
        self.counts.increment(operator_category(op));
        if op == Operator::Equal || op == Operator::ColonEqual {
            self.assignment.insert(op);
        } else if let Some(base) = op.augmented_base() {
            self.assignment.insert(op);
            self.observe_operator_group(base);
        } else {
            self.observe_operator_group(op);
        }
    }

    fn observe_operator_group(&mut self, op: Operator) {
        if is_arithmetic(op) {
            self.arithmetic.insert(op);
        } else if is_bitwise(op) {
            self.bitwise.insert(op);
        } else if is_comparison(op) {
            self.comparison.insert(op);
        }
    }

    /// Distinct string literals seen so far.
    pub fn unique_strings(&self) -> usize {
        self.strings.len()
    }

    pub fn finish(self) -> TokenProfile {
        TokenProfile {
            unique: UniqueCounts {
                keywords: self.keywords.len(),
                logical: self.logical.len(),
                builtin_funcs: self.builtin_funcs.len(),
                builtin_types: self.builtin_types.len(),
                assignment: self.assignment.len(),
                arithmetic: self.arithmetic.len(),
                comparison: self.comparison.len(),
                bitwise: self.bitwise.len(),
            },
            identifiers: IdentifierStats::from_names(self.identifiers.iter().copied()),
            counts: self.counts,
        }
    }
}

/// Classify every token of a stream into a [`TokenProfile`].
pub fn profile(tokens: &[Token<'_>]) -> TokenProfile {
    let mut classifier = TokenClassifier::new();
    for token in tokens {
        classifier.observe(token);
    }
    classifier.finish()
}
