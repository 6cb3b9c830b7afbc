use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

macro_rules! token_categories {
    ($($variant:ident => $column:literal,)+) => {
        /// Lexical category counted in a token profile.
        ///
        /// The declaration order is the column order of the profile in every
        /// output file, so new categories must be appended, never inserted.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum TokenCategory {
            $($variant,)+
        }

        impl TokenCategory {
            pub const ALL: &'static [TokenCategory] = &[$(TokenCategory::$variant,)+];
            pub const COUNT: usize = Self::ALL.len();

            /// Column name used for this category in CSV/JSON output.
            pub fn column(self) -> &'static str {
                match self {
                    $(TokenCategory::$variant => $column,)+
                }
            }
        }
    };
}

token_categories! {
    EndMarker => "endmarker",
    Name => "name",
    Number => "number",
    String => "string",
    Newline => "newline",
    Indent => "indent",
    Dedent => "dedent",
    Lpar => "lpar",
    Rpar => "rpar",
    Lsqb => "lsqb",
    Rsqb => "rsqb",
    Colon => "colon",
    Comma => "comma",
    Semi => "semi",
    Plus => "plus",
    Minus => "minus",
    Star => "star",
    Slash => "slash",
    Vbar => "vbar",
    Amper => "amper",
    Less => "less",
    Greater => "greater",
    Equal => "equal",
    Dot => "dot",
    Percent => "percent",
    Lbrace => "lbrace",
    Rbrace => "rbrace",
    EqEqual => "eq_equal",
    NotEq => "not_eq",
    LessEq => "less_eq",
    GreaterEq => "greater_eq",
    Tilde => "tilde",
    Circumflex => "circumflex",
    LeftShift => "lshift",
    RightShift => "rshift",
    DoubleStar => "dbl_star",
    PlusEq => "plus_eq",
    MinusEq => "minus_eq",
    StarEq => "star_eq",
    SlashEq => "slash_eq",
    PercentEq => "percent_eq",
    AmperEq => "amper_eq",
    VbarEq => "vbar_eq",
    CircumflexEq => "circumflex_eq",
    LeftShiftEq => "lshift_eq",
    RightShiftEq => "rshift_eq",
    DoubleStarEq => "dbl_star_eq",
    DoubleSlash => "dbl_slash",
    DoubleSlashEq => "dbl_slash_eq",
    At => "at",
    AtEq => "at_eq",
    Rarrow => "rarrow",
    Ellipsis => "ellipsis",
    ColonEq => "colon_eq",
    Op => "op",
    ErrorToken => "error_token",
    Comment => "comment",
    Nl => "nl",
    Encoding => "encoding",
    NumberInt => "number_int",
    NumberFloat => "number_float",
    KwdAnd => "kwd_and",
    KwdOr => "kwd_or",
    KwdNot => "kwd_not",
    KwdNone => "kwd_none",
    KwdFalse => "kwd_false",
    KwdTrue => "kwd_true",
    KwdAs => "kwd_as",
    KwdAssert => "kwd_assert",
    KwdAsync => "kwd_async",
    KwdAwait => "kwd_await",
    KwdBreak => "kwd_break",
    KwdClass => "kwd_class",
    KwdContinue => "kwd_continue",
    KwdDef => "kwd_def",
    KwdDel => "kwd_del",
    KwdIf => "kwd_if",
    KwdElif => "kwd_elif",
    KwdElse => "kwd_else",
    KwdExcept => "kwd_except",
    KwdFinally => "kwd_finally",
    KwdFor => "kwd_for",
    KwdWhile => "kwd_while",
    KwdImport => "kwd_import",
    KwdFrom => "kwd_from",
    KwdGlobal => "kwd_global",
    KwdIn => "kwd_in",
    KwdIs => "kwd_is",
    KwdLambda => "kwd_lambda",
    KwdNonlocal => "kwd_nonlocal",
    KwdPass => "kwd_pass",
    KwdRaise => "kwd_raise",
    KwdReturn => "kwd_return",
    KwdTry => "kwd_try",
    KwdWith => "kwd_with",
    KwdYield => "kwd_yield",
    Keyword => "keyword",
    Identifier => "identifier",
    BuiltinType => "builtin_type",
    BuiltinFunc => "builtin_func",
    KwdPrint => "kwd_print",
    KwdInput => "kwd_input",
}

impl fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Dense occurrence counter indexed by [`TokenCategory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCounts([u32; TokenCategory::COUNT]);

impl Default for TokenCounts {
    fn default() -> Self {
        Self([0; TokenCategory::COUNT])
    }
}

impl TokenCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: TokenCategory) -> u32 {
        self.0[category as usize]
    }

    pub fn increment(&mut self, category: TokenCategory) {
        self.0[category as usize] += 1;
    }

    /// Sum over every category.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|&c| u64::from(c)).sum()
    }

    /// Every category with its count, in column order (unseen categories included).
    pub fn iter(&self) -> impl Iterator<Item = (TokenCategory, u32)> + '_ {
        TokenCategory::ALL.iter().map(move |&cat| (cat, self.get(cat)))
    }
}

impl Serialize for TokenCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(TokenCategory::COUNT))?;
        for (cat, count) in self.iter() {
            map.serialize_entry(cat.column(), &count)?;
        }
        map.end()
    }
}
