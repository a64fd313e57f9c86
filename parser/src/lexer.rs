//! FILENAME: parser/src/lexer.rs
//! PURPOSE: Scans a raw filter string and produces a stream of Tokens.
//! CONTEXT: First stage of the parsing pipeline. Both dialects share one
//! lexer; the dialect only changes how quotes are read and whether OData
//! date and GUID literals are recognized.
//!
//! SUPPORTED OPERATORS:
//! - Single char: ( ) [ ] { } , : . / - ! < >
//! - Multi char: == != <> <= >= && || ?? =>
//! - Expression dialect strings: "text" with backslash escapes
//! - OData strings: 'text' with '' as an escaped quote

use crate::token::Token;

/// The textual query language being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Dynamic-LINQ style expression language evaluated in process.
    Expression,
    /// OData `$filter` syntax sent to remote services.
    OData,
}

pub struct Lexer {
    input: Vec<char>,
    /// Byte offset of each character, plus the input length.
    offsets: Vec<usize>,
    pos: usize,
    dialect: Dialect,
}

impl Lexer {
    pub fn new(input: &str, dialect: Dialect) -> Self {
        let offsets = input
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(input.len()))
            .collect();
        Lexer {
            input: input.chars().collect(),
            offsets,
            pos: 0,
            dialect,
        }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        let last = self.offsets.len() - 1;
        self.offsets[self.pos.min(last)]
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        if self.dialect == Dialect::OData {
            if let Some(token) = self.read_odata_special_literal() {
                return token;
            }
        }

        let Some(ch) = self.bump() else {
            return Token::EOF;
        };

        match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '/' => Token::Slash,
            '-' => Token::Minus,

            // = is accepted as equality, => opens a lambda body
            '=' => {
                if self.eat('>') {
                    Token::Arrow
                } else {
                    self.eat('=');
                    Token::EqualEqual
                }
            }
            '!' => {
                if self.eat('=') {
                    Token::NotEqual
                } else {
                    Token::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::LessEqual
                } else if self.eat('>') {
                    Token::NotEqual
                } else {
                    Token::LessThan
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::GreaterEqual
                } else {
                    Token::GreaterThan
                }
            }
            '&' => {
                if self.eat('&') {
                    Token::AndAnd
                } else {
                    Token::Illegal('&')
                }
            }
            '|' => {
                if self.eat('|') {
                    Token::OrOr
                } else {
                    Token::Illegal('|')
                }
            }
            '?' => {
                if self.eat('?') {
                    Token::Coalesce
                } else {
                    Token::Illegal('?')
                }
            }

            '"' if self.dialect == Dialect::Expression => self.read_escaped_string('"'),
            '\'' if self.dialect == Dialect::Expression => self.read_escaped_string('\''),
            '\'' => self.read_doubled_quote_string(),

            ch if ch.is_ascii_digit() => self.read_number(ch),
            ch if is_identifier_start(ch) => self.read_identifier(ch),

            ch => Token::Illegal(ch),
        }
    }

    /// Collects every token up to and including EOF, paired with its start byte offset.
    pub fn tokenize(mut self) -> Vec<(Token, usize)> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.position();
            let token = self.next_token();
            let done = token == Token::EOF;
            tokens.push((token, start));
            if done {
                return tokens;
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    /// Reads a string terminated by `quote`, honoring backslash escapes.
    fn read_escaped_string(&mut self, quote: char) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.bump() {
            if ch == quote {
                return Token::String(result);
            }
            if ch == '\\' {
                match self.bump() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some('0') => result.push('\0'),
                    Some(other) => result.push(other),
                    None => break,
                }
            } else {
                result.push(ch);
            }
        }
        // Unterminated string
        Token::Illegal(quote)
    }

    /// Reads an OData string literal: 'O''Brien' -> O'Brien
    fn read_doubled_quote_string(&mut self) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.bump() {
            if ch == '\'' {
                if self.eat('\'') {
                    result.push('\'');
                } else {
                    return Token::String(result);
                }
            } else {
                result.push(ch);
            }
        }
        Token::Illegal('\'')
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut is_float = false;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.pos += 1;
            } else if ch == '.'
                && !is_float
                && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number_str.push(ch);
                self.pos += 1;
            } else if (ch == 'e' || ch == 'E') && self.exponent_follows() {
                is_float = true;
                number_str.push(ch);
                self.pos += 1;
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    number_str.push(sign);
                    self.pos += 1;
                }
            } else {
                break;
            }
        }

        if !is_float {
            if let Ok(n) = number_str.parse::<i64>() {
                return Token::Integer(n);
            }
        }
        match number_str.parse::<f64>() {
            Ok(n) => Token::Float(n),
            Err(_) => Token::Illegal(first_char),
        }
    }

    fn exponent_follows(&self) -> bool {
        match self.peek_at(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);
        while let Some(ch) = self.peek() {
            if is_identifier_part(ch) {
                ident.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        Token::Identifier(ident)
    }

    /// OData writes GUIDs and dates without quotes. They must be recognized
    /// before the generic number/identifier rules split them at '-'.
    fn read_odata_special_literal(&mut self) -> Option<Token> {
        let start = self.pos;
        if self.matches_guid(start) {
            let text: String = self.input[start..start + 36].iter().collect();
            self.pos += 36;
            return Some(Token::Guid(text));
        }
        if !self.matches_date(start) {
            return None;
        }

        self.pos += 10;
        let is_time = self.peek() == Some('T') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());
        if !is_time {
            let text: String = self.input[start..self.pos].iter().collect();
            return Some(Token::Date(text));
        }

        self.pos += 1;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == ':' || ch == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        match self.peek() {
            Some('Z') => self.pos += 1,
            Some('+' | '-') => {
                self.pos += 1;
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_digit() || ch == ':' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
            }
            _ => {}
        }
        let text: String = self.input[start..self.pos].iter().collect();
        Some(Token::DateTime(text))
    }

    fn matches_guid(&self, start: usize) -> bool {
        if start + 36 > self.input.len() {
            return false;
        }
        let shape_ok = self.input[start..start + 36].iter().enumerate().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => *c == '-',
            _ => c.is_ascii_hexdigit(),
        });
        shape_ok && !self.input.get(start + 36).is_some_and(|c| is_identifier_part(*c))
    }

    fn matches_date(&self, start: usize) -> bool {
        if start + 10 > self.input.len() {
            return false;
        }
        let shape_ok = self.input[start..start + 10].iter().enumerate().all(|(i, c)| match i {
            4 | 7 => *c == '-',
            _ => c.is_ascii_digit(),
        });
        shape_ok && !self.input.get(start + 10).is_some_and(|c| c.is_ascii_digit())
    }
}

/// Returns true if `ch` can start an identifier.
/// `$` and `@` allow OData system names such as `$it`.
fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$' || ch == '@'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
