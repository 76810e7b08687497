use std::fmt;

/// Kinds of token produced by the lexer.
///
/// Keywords get one kind each so the parser can match on them directly;
/// the keyword table in [`keyword_kind`] maps the upper-cased identifier
/// form to its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Select,
    From,
    Where,
    And,
    Or,
    In,
    Like,
    Between,
    Join,
    Inner,
    Left,
    Right,
    Outer,
    On,
    As,
    Group,
    By,
    Having,
    Order,
    Asc,
    Desc,
    Limit,
    Offset,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Trace,
    Through,
    Describe,
    Show,
    Tables,
    Plugins,
    Sources,
    Cache,
    Clear,
    Set,
    Ttl,
    True,
    False,

    // Literals and identifiers
    Identifier,
    StringLiteral,
    NumberLiteral,

    // Operators
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,

    // Punctuation
    Comma,
    Dot,
    LParen,
    RParen,
    Star,

    Eof,
}

impl TokenKind {
    /// Whether this kind is an aggregate function keyword.
    ///
    /// Aggregate keywords double as alias names and predicate field names,
    /// so several parser paths treat them as identifier-like.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            TokenKind::Count | TokenKind::Sum | TokenKind::Avg | TokenKind::Min | TokenKind::Max
        )
    }

    /// Whether this kind can serve as a comparison operator.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Gt
                | TokenKind::Lt
                | TokenKind::GtEq
                | TokenKind::LtEq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One lexed token with its position in the source text.
///
/// Keyword tokens carry the upper-cased text; identifiers keep the
/// original case. `offset` counts characters from the start of the input,
/// `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Look up the keyword kind for an upper-cased identifier, if any.
pub fn keyword_kind(upper: &str) -> Option<TokenKind> {
    let kind = match upper {
        "SELECT" => TokenKind::Select,
        "FROM" => TokenKind::From,
        "WHERE" => TokenKind::Where,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "IN" => TokenKind::In,
        "LIKE" => TokenKind::Like,
        "BETWEEN" => TokenKind::Between,
        "JOIN" => TokenKind::Join,
        "INNER" => TokenKind::Inner,
        "LEFT" => TokenKind::Left,
        "RIGHT" => TokenKind::Right,
        "OUTER" => TokenKind::Outer,
        "ON" => TokenKind::On,
        "AS" => TokenKind::As,
        "GROUP" => TokenKind::Group,
        "BY" => TokenKind::By,
        "HAVING" => TokenKind::Having,
        "ORDER" => TokenKind::Order,
        "ASC" => TokenKind::Asc,
        "DESC" => TokenKind::Desc,
        "LIMIT" => TokenKind::Limit,
        "OFFSET" => TokenKind::Offset,
        "COUNT" => TokenKind::Count,
        "SUM" => TokenKind::Sum,
        "AVG" => TokenKind::Avg,
        "MIN" => TokenKind::Min,
        "MAX" => TokenKind::Max,
        "TRACE" => TokenKind::Trace,
        "THROUGH" => TokenKind::Through,
        "DESCRIBE" => TokenKind::Describe,
        "SHOW" => TokenKind::Show,
        "TABLES" => TokenKind::Tables,
        "PLUGINS" => TokenKind::Plugins,
        "SOURCES" => TokenKind::Sources,
        "CACHE" => TokenKind::Cache,
        "CLEAR" => TokenKind::Clear,
        "SET" => TokenKind::Set,
        "TTL" => TokenKind::Ttl,
        "TRUE" => TokenKind::True,
        "FALSE" => TokenKind::False,
        _ => return None,
    };
    Some(kind)
}
