//! FILENAME: parser/src/token.rs
//! PURPOSE: Token definitions shared by both filter dialects.
//! CONTEXT: Tokens are the atomic units produced by the lexer and consumed by the parsers.
//! Keywords (`and`, `eq`, `new`, `null`, ...) are lexed as identifiers; each
//! parser decides which words it treats as keywords.

/// Tokens recognized by the filter lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    /// OData date-time literal, kept as written: 2024-01-31T10:00:00Z
    DateTime(String),
    /// OData date literal, kept as written: 2024-01-31
    Date(String),
    /// OData bare GUID literal.
    Guid(String),

    // Operators
    EqualEqual,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    AndAnd,
    OrOr,
    Bang,
    Minus,
    /// Null-coalescing operator: ??
    Coalesce,
    /// Lambda arrow: =>
    Arrow,

    // Delimiters
    Dot,
    Slash,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // Special
    EOF,
    Illegal(char),
}

impl Token {
    /// Returns true if the token is the identifier `word`, ignoring ASCII case.
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Identifier(s) if s.eq_ignore_ascii_case(word))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::DateTime(s) | Token::Date(s) | Token::Guid(s) => write!(f, "{}", s),
            Token::EqualEqual => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::LessThan => write!(f, "<"),
            Token::LessEqual => write!(f, "<="),
            Token::GreaterThan => write!(f, ">"),
            Token::GreaterEqual => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::Minus => write!(f, "-"),
            Token::Coalesce => write!(f, "??"),
            Token::Arrow => write!(f, "=>"),
            Token::Dot => write!(f, "."),
            Token::Slash => write!(f, "/"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::EOF => write!(f, "EOF"),
            Token::Illegal(c) => write!(f, "ILLEGAL({})", c),
        }
    }
}
