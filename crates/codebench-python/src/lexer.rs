//! Tokenizer for Python source following the token stream of CPython's `tokenize`
//! module: exact operator types, NEWLINE vs NL, INDENT/DEDENT and ENDMARKER.

use crate::error::LexError;

const TAB_SIZE: usize = 8;

/// Operator and delimiter tokens, one variant per exact token type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Lpar,
    Rpar,
    Lsqb,
    Rsqb,
    Colon,
    Comma,
    Semi,
    Plus,
    Minus,
    Star,
    Slash,
    Vbar,
    Amper,
    Less,
    Greater,
    Equal,
    Dot,
    Percent,
    Lbrace,
    Rbrace,
    EqEqual,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Tilde,
    Circumflex,
    LeftShift,
    RightShift,
    DoubleStar,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    AmperEqual,
    VbarEqual,
    CircumflexEqual,
    LeftShiftEqual,
    RightShiftEqual,
    DoubleStarEqual,
    DoubleSlash,
    DoubleSlashEqual,
    At,
    AtEqual,
    Rarrow,
    Ellipsis,
    ColonEqual,
}

/// Lexemes grouped by length so the longest operator always wins.
const OPERATORS_3: &[(&str, Operator)] = &[
    ("**=", Operator::DoubleStarEqual),
    ("//=", Operator::DoubleSlashEqual),
    (">>=", Operator::RightShiftEqual),
    ("<<=", Operator::LeftShiftEqual),
    ("...", Operator::Ellipsis),
];

const OPERATORS_2: &[(&str, Operator)] = &[
    ("!=", Operator::NotEqual),
    ("%=", Operator::PercentEqual),
    ("&=", Operator::AmperEqual),
    ("**", Operator::DoubleStar),
    ("*=", Operator::StarEqual),
    ("+=", Operator::PlusEqual),
    ("-=", Operator::MinusEqual),
    ("->", Operator::Rarrow),
    ("//", Operator::DoubleSlash),
    ("/=", Operator::SlashEqual),
    (":=", Operator::ColonEqual),
    ("<<", Operator::LeftShift),
    ("<=", Operator::LessEqual),
    ("==", Operator::EqEqual),
    (">=", Operator::GreaterEqual),
    (">>", Operator::RightShift),
    ("@=", Operator::AtEqual),
    ("^=", Operator::CircumflexEqual),
    ("|=", Operator::VbarEqual),
];

const OPERATORS_1: &[(&str, Operator)] = &[
    ("%", Operator::Percent),
    ("&", Operator::Amper),
    ("(", Operator::Lpar),
    (")", Operator::Rpar),
    ("*", Operator::Star),
    ("+", Operator::Plus),
    (",", Operator::Comma),
    ("-", Operator::Minus),
    (".", Operator::Dot),
    ("/", Operator::Slash),
    (":", Operator::Colon),
    (";", Operator::Semi),
    ("<", Operator::Less),
    ("=", Operator::Equal),
    (">", Operator::Greater),
    ("@", Operator::At),
    ("[", Operator::Lsqb),
    ("]", Operator::Rsqb),
    ("^", Operator::Circumflex),
    ("{", Operator::Lbrace),
    ("|", Operator::Vbar),
    ("}", Operator::Rbrace),
    ("~", Operator::Tilde),
];

impl Operator {
    /// Longest operator at the start of `rest`, with its byte length.
    pub fn lex(rest: &str) -> Option<(Operator, usize)> {
        for table in [OPERATORS_3, OPERATORS_2, OPERATORS_1] {
            if let Some((text, op)) = table.iter().find(|(text, _)| rest.starts_with(text)) {
                return Some((*op, text.len()));
            }
        }
        None
    }

    /// For a compound assignment (`+=`, `<<=`, ...), the operator it applies.
    pub fn augmented_base(self) -> Option<Operator> {
        use Operator::*;
        Some(match self {
            PlusEqual => Plus,
            MinusEqual => Minus,
            StarEqual => Star,
            SlashEqual => Slash,
            PercentEqual => Percent,
            AmperEqual => Amper,
            VbarEqual => Vbar,
            CircumflexEqual => Circumflex,
            LeftShiftEqual => LeftShift,
            RightShiftEqual => RightShift,
            DoubleStarEqual => DoubleStar,
            DoubleSlashEqual => DoubleSlash,
            AtEqual => At,
            _ => return None,
        })
    }

    pub(crate) fn opens_bracket(self) -> bool {
        matches!(self, Operator::Lpar | Operator::Lsqb | Operator::Lbrace)
    }

    pub(crate) fn closes_bracket(self) -> bool {
        matches!(self, Operator::Rpar | Operator::Rsqb | Operator::Rbrace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Op(Operator),
    Comment,
    /// End of a logical line.
    Newline,
    /// Line break that does not end a statement (blank line, comment line, inside brackets).
    Nl,
    Indent,
    Dedent,
    ErrorToken,
    EndMarker,
}

/// 1-based line, 0-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: Position,
    pub end: Position,
}

/// Tokenize `source`. The empty string produces no tokens at all.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    if source.is_empty() {
        return Ok(Vec::new());
    }
    Lexer::new(source).run()
}

/// A string literal still open at the end of a line.
struct OpenString {
    start_offset: usize,
    start: Position,
    quote: &'static str,
    /// Single-quoted string continued with a trailing backslash.
    needs_continuation: bool,
}

enum SingleQuoted {
    Closed(usize),
    Continued,
    Unterminated,
}

struct Lexer<'a> {
    src: &'a str,
    tokens: Vec<Token<'a>>,
    indents: Vec<usize>,
    paren_depth: usize,
    continued: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            tokens: Vec::new(),
            indents: vec![0],
            paren_depth: 0,
            continued: false,
        }
    }

    fn push(&mut self, kind: TokenKind, text: &'a str, start: Position, end: Position) {
        self.tokens.push(Token {
            kind,
            text,
            start,
            end,
        });
    }

    fn run(mut self) -> Result<Vec<Token<'a>>, LexError> {
        let src = self.src;
        let mut offset = 0;
        let mut lnum = 0;
        let mut last_line = "";
        let mut open: Option<OpenString> = None;

        for line in src.split_inclusive('\n') {
            lnum += 1;
            let line_start = offset;
            offset += line.len();
            last_line = line;
            let bytes = line.as_bytes();
            let max = line.len();
            let mut pos = 0;
            let at = |row: usize, col: usize| Position { line: row, col };

            if let Some(string) = open.take() {
                match find_closing(bytes, 0, string.quote) {
                    Some(end) => {
                        self.push(
                            TokenKind::String,
                            &src[string.start_offset..line_start + end],
                            string.start,
                            at(lnum, end),
                        );
                        pos = end;
                    }
                    None if string.needs_continuation && !ends_with_continuation(bytes) => {
                        self.push(
                            TokenKind::ErrorToken,
                            &src[string.start_offset..line_start + max],
                            string.start,
                            at(lnum, max),
                        );
                        continue;
                    }
                    None => {
                        open = Some(string);
                        continue;
                    }
                }
            } else if self.paren_depth == 0 && !self.continued {
                let mut column = 0;
                while pos < max {
                    match bytes[pos] {
                        b' ' => column += 1,
                        b'\t' => column = (column / TAB_SIZE + 1) * TAB_SIZE,
                        b'\x0c' => column = 0,
                        _ => break,
                    }
                    pos += 1;
                }
                if pos == max {
                    break;
                }

                if matches!(bytes[pos], b'#' | b'\r' | b'\n') {
                    if bytes[pos] == b'#' {
                        let comment = line[pos..].trim_end_matches(['\r', '\n']);
                        let end = pos + comment.len();
                        self.push(TokenKind::Comment, comment, at(lnum, pos), at(lnum, end));
                        pos = end;
                    }
                    self.push(TokenKind::Nl, &line[pos..], at(lnum, pos), at(lnum, max));
                    continue;
                }

                let current = self.indents.last().copied().unwrap_or(0);
                if column > current {
                    self.indents.push(column);
                    self.push(TokenKind::Indent, &line[..pos], at(lnum, 0), at(lnum, pos));
                }
                while column < self.indents.last().copied().unwrap_or(0) {
                    if !self.indents.contains(&column) {
                        return Err(LexError::InconsistentDedent { line: lnum });
                    }
                    self.indents.pop();
                    self.push(TokenKind::Dedent, "", at(lnum, pos), at(lnum, pos));
                }
            } else {
                self.continued = false;
            }

            while pos < max {
                while pos < max && matches!(bytes[pos], b' ' | b'\t' | b'\x0c') {
                    pos += 1;
                }
                let Some(c) = line[pos..].chars().next() else {
                    break;
                };
                let start = pos;

                if c.is_ascii_digit() || (c == '.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
                    pos = scan_number(bytes, pos);
                    self.push(TokenKind::Number, &line[start..pos], at(lnum, start), at(lnum, pos));
                    continue;
                }

                if c == '\n' || (c == '\r' && bytes.get(pos + 1) == Some(&b'\n')) {
                    pos = max;
                    let kind = if self.paren_depth > 0 {
                        TokenKind::Nl
                    } else {
                        TokenKind::Newline
                    };
                    self.push(kind, &line[start..pos], at(lnum, start), at(lnum, pos));
                    continue;
                }

                if c == '#' {
                    let comment = line[pos..].trim_end_matches(['\r', '\n']);
                    pos += comment.len();
                    self.push(TokenKind::Comment, comment, at(lnum, start), at(lnum, pos));
                    continue;
                }

                if c == '\\' && ends_with_continuation(&bytes[pos..]) {
                    self.continued = true;
                    pos = max;
                    continue;
                }

                if let Some((prefix_len, quote)) = string_start(bytes, pos) {
                    let body = pos + prefix_len + quote.len();
                    if quote.len() == 3 {
                        match find_closing(bytes, body, quote) {
                            Some(end) => {
                                pos = end;
                                self.push(TokenKind::String, &line[start..pos], at(lnum, start), at(lnum, pos));
                            }
                            None => {
                                open = Some(OpenString {
                                    start_offset: line_start + start,
                                    start: at(lnum, start),
                                    quote,
                                    needs_continuation: false,
                                });
                                pos = max;
                            }
                        }
                        continue;
                    }
                    match scan_single_quoted(bytes, body, quote.as_bytes()[0]) {
                        SingleQuoted::Closed(end) => {
                            pos = end;
                            self.push(TokenKind::String, &line[start..pos], at(lnum, start), at(lnum, pos));
                            continue;
                        }
                        SingleQuoted::Continued => {
                            open = Some(OpenString {
                                start_offset: line_start + start,
                                start: at(lnum, start),
                                quote,
                                needs_continuation: true,
                            });
                            pos = max;
                            continue;
                        }
                        // The prefix (if any) becomes a name and the quote an error token.
                        SingleQuoted::Unterminated => {}
                    }
                }

                if is_identifier_start(c) {
                    pos += line[pos..]
                        .char_indices()
                        .find(|(_, ch)| !is_identifier_char(*ch))
                        .map_or(max - pos, |(idx, _)| idx);
                    self.push(TokenKind::Name, &line[start..pos], at(lnum, start), at(lnum, pos));
                    continue;
                }

                if let Some((op, len)) = Operator::lex(&line[pos..]) {
                    if op.opens_bracket() {
                        self.paren_depth += 1;
                    } else if op.closes_bracket() {
                        self.paren_depth = self.paren_depth.saturating_sub(1);
                    }
                    pos += len;
                    self.push(TokenKind::Op(op), &line[start..pos], at(lnum, start), at(lnum, pos));
                    continue;
                }

                pos += c.len_utf8();
                self.push(TokenKind::ErrorToken, &line[start..pos], at(lnum, start), at(lnum, pos));
            }
        }

        if let Some(string) = open {
            return Err(LexError::UnterminatedString {
                line: string.start.line,
            });
        }
        if self.paren_depth > 0 || self.continued {
            return Err(LexError::UnexpectedEof { line: lnum });
        }

        let end_col = last_line.len();
        if !last_line.ends_with(['\r', '\n']) && !last_line.trim().starts_with('#') {
            self.push(
                TokenKind::Newline,
                "",
                Position { line: lnum, col: end_col },
                Position { line: lnum, col: end_col + 1 },
            );
        }
        let eof = Position { line: lnum + 1, col: 0 };
        for _ in 1..self.indents.len() {
            self.push(TokenKind::Dedent, "", eof, eof);
        }
        self.push(TokenKind::EndMarker, "", eof, eof);
        Ok(self.tokens)
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_identifier_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Backslash immediately followed by the line break.
fn ends_with_continuation(bytes: &[u8]) -> bool {
    bytes.ends_with(b"\\\n") || bytes.ends_with(b"\\\r\n")
}

/// String prefix length and opening quote of a literal starting at `pos`, if any.
fn string_start(bytes: &[u8], pos: usize) -> Option<(usize, &'static str)> {
    const PREFIXES: [&[u8]; 9] = [b"br", b"rb", b"fr", b"rf", b"r", b"u", b"f", b"b", b""];
    for prefix in PREFIXES {
        let end = pos + prefix.len();
        let Some(candidate) = bytes.get(pos..end) else {
            continue;
        };
        if !candidate.eq_ignore_ascii_case(prefix) {
            continue;
        }
        let rest = &bytes[end..];
        let quote = if rest.starts_with(b"'''") {
            "'''"
        } else if rest.starts_with(b"\"\"\"") {
            "\"\"\""
        } else if rest.starts_with(b"'") {
            "'"
        } else if rest.starts_with(b"\"") {
            "\""
        } else {
            continue;
        };
        return Some((prefix.len(), quote));
    }
    None
}

/// Byte offset just past the closing `quote`, honouring backslash escapes.
fn find_closing(bytes: &[u8], from: usize, quote: &str) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
        } else if bytes[i..].starts_with(quote.as_bytes()) {
            return Some(i + quote.len());
        } else {
            i += 1;
        }
    }
    None
}

fn scan_single_quoted(bytes: &[u8], from: usize, quote: u8) -> SingleQuoted {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if ends_with_continuation(&bytes[i..]) {
                    return SingleQuoted::Continued;
                }
                i += 2;
            }
            b'\n' | b'\r' => return SingleQuoted::Unterminated,
            b if b == quote => return SingleQuoted::Closed(i + 1),
            _ => i += 1,
        }
    }
    SingleQuoted::Unterminated
}

fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

fn is_octal_digit(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

fn is_binary_digit(b: u8) -> bool {
    b == b'0' || b == b'1'
}

fn byte_at(bytes: &[u8], i: usize) -> u8 {
    bytes.get(i).copied().unwrap_or(0)
}

/// `(?:_?d)+` starting at `i`; returns `i` when no digit follows.
fn digit_run(bytes: &[u8], mut i: usize, is_digit: fn(u8) -> bool) -> usize {
    loop {
        if is_digit(byte_at(bytes, i)) {
            i += 1;
        } else if byte_at(bytes, i) == b'_' && is_digit(byte_at(bytes, i + 1)) {
            i += 2;
        } else {
            return i;
        }
    }
}

/// `[0-9](?:_?[0-9])*`
fn decimal_run(bytes: &[u8], i: usize) -> usize {
    if byte_at(bytes, i).is_ascii_digit() {
        digit_run(bytes, i + 1, |b: u8| b.is_ascii_digit())
    } else {
        i
    }
}

fn exponent(bytes: &[u8], i: usize) -> usize {
    if !matches!(byte_at(bytes, i), b'e' | b'E') {
        return i;
    }
    let mut j = i + 1;
    if matches!(byte_at(bytes, j), b'+' | b'-') {
        j += 1;
    }
    let end = decimal_run(bytes, j);
    if end == j {
        i
    } else {
        end
    }
}

/// End of the numeric literal starting at `start`.
fn scan_number(bytes: &[u8], start: usize) -> usize {
    if byte_at(bytes, start) == b'0' {
        let radix_digit: Option<fn(u8) -> bool> = match byte_at(bytes, start + 1) {
            b'x' | b'X' => Some(is_hex_digit),
            b'o' | b'O' => Some(is_octal_digit),
            b'b' | b'B' => Some(is_binary_digit),
            _ => None,
        };
        if let Some(is_digit) = radix_digit {
            let end = digit_run(bytes, start + 2, is_digit);
            if end > start + 2 {
                return end;
            }
        }
    }

    let int_end = decimal_run(bytes, start);
    let mut end = int_end;
    let mut is_float = false;
    if byte_at(bytes, end) == b'.' {
        end = decimal_run(bytes, end + 1);
        is_float = true;
    }
    let exp_end = exponent(bytes, end);
    if exp_end > end {
        end = exp_end;
        is_float = true;
    }
    if matches!(byte_at(bytes, end), b'j' | b'J') {
        return end + 1;
    }
    if is_float {
        return end;
    }
    if byte_at(bytes, start) == b'0' {
        // A decimal literal with a leading zero can only contain zeros.
        return digit_run(bytes, start + 1, |b: u8| b == b'0');
    }
    int_end
}
