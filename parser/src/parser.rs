//! FILENAME: parser/src/parser.rs
//! PURPOSE: Recursive descent parser for the Expression dialect.
//! CONTEXT: Second stage of the parsing pipeline. It takes tokens from the
//! Lexer and builds the shared Expression tree. The OData dialect lives in
//! `odata.rs` and reuses the token cursor defined here.
//!
//! GRAMMAR (Expression dialect):
//!   expression --> or
//!   or         --> and ( ("||" | "or") and )*
//!   and        --> comparison ( ("&&" | "and") comparison )*
//!   comparison --> coalesce ( ("==" | "!=" | "<" | "<=" | ">" | ">=") coalesce )*
//!   coalesce   --> unary ( "??" unary )*
//!   unary      --> ("!" | "not") unary | "-" unary | postfix
//!   postfix    --> primary ( "." IDENT [ "(" arguments? ")" ] | "[" expression "]" )*
//!   primary    --> literal | array | lambda | IDENT [ "(" arguments? ")" ] | "(" expression ")"
//!   array      --> "new" "[" "]" "{" arguments? "}"
//!   lambda     --> IDENT "=>" expression

use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};
use crate::lexer::{Dialect, Lexer};
use crate::token::Token;

/// Parser errors with descriptive messages and the byte offset they refer to.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error at {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

// ============================================================================
// TOKEN CURSOR
// ============================================================================

/// Deepest nesting of sub-expressions and prefix operators a parser accepts.
pub const MAX_NESTING: usize = 64;

/// Buffered token stream with arbitrary lookahead (lambdas need two tokens).
pub(crate) struct Cursor {
    tokens: Vec<(Token, usize)>,
    index: usize,
    depth: usize,
}

impl Cursor {
    pub(crate) fn new(input: &str, dialect: Dialect) -> Self {
        Cursor {
            tokens: Lexer::new(input, dialect).tokenize(),
            index: 0,
            depth: 0,
        }
    }

    /// Enters one nesting level; fails past `MAX_NESTING`.
    pub(crate) fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("Expression is nested deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn current(&self) -> &Token {
        self.peek(0)
    }

    /// Token `offset` positions ahead; EOF once past the end.
    pub(crate) fn peek(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)].0
    }

    pub(crate) fn position(&self) -> usize {
        let last = self.tokens.len() - 1;
        self.tokens[self.index.min(last)].1
    }

    pub(crate) fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.position())
    }

    /// If the current token matches, advances and returns Ok. Otherwise returns an error.
    pub(crate) fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if *self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("Expected {}, found {}", expected, self.current())))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("Expected identifier, found {}", other))),
        }
    }

    /// Fails unless every token has been consumed.
    pub(crate) fn finish(&self) -> ParseResult<()> {
        match self.current() {
            Token::EOF => Ok(()),
            Token::Illegal(_) => Err(self.unexpected()),
            _ => Err(self.error(format!(
                "Unexpected token after expression: {}",
                self.current()
            ))),
        }
    }

    /// Converts an unexpected token into the matching error message.
    pub(crate) fn unexpected(&self) -> ParseError {
        match self.current() {
            Token::EOF => self.error("Unexpected end of expression"),
            Token::Illegal(ch) => self.error(format!("Illegal character: {}", ch)),
            token => self.error(format!("Unexpected token: {}", token)),
        }
    }
}

/// Maps `null`/`true`/`false` (any case) to literals.
pub(crate) fn keyword_literal(name: &str) -> Option<Literal> {
    if name.eq_ignore_ascii_case("null") {
        Some(Literal::Null)
    } else if name.eq_ignore_ascii_case("true") {
        Some(Literal::Boolean(true))
    } else if name.eq_ignore_ascii_case("false") {
        Some(Literal::Boolean(false))
    } else {
        None
    }
}

// ============================================================================
// EXPRESSION DIALECT PARSER
// ============================================================================

pub struct Parser {
    cursor: Cursor,
}

impl Parser {
    /// Creates a new parser from an input string.
    pub fn new(input: &str) -> Self {
        Parser {
            cursor: Cursor::new(input, Dialect::Expression),
        }
    }

    /// Parses the entire input and returns the AST.
    pub fn parse(&mut self) -> ParseResult<Expression> {
        if *self.cursor.current() == Token::EOF {
            return Err(self.cursor.error("Empty expression"));
        }
        let expr = self.parse_expression()?;
        self.cursor.finish()?;
        Ok(expr)
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.cursor.descend()?;
        let expr = self.parse_or();
        self.cursor.ascend();
        expr
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_and()?;
        while *self.cursor.current() == Token::OrOr || self.cursor.current().is_keyword("or") {
            self.cursor.advance();
            let right = self.parse_and()?;
            left = Expression::binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_comparison()?;
        while *self.cursor.current() == Token::AndAnd || self.cursor.current().is_keyword("and") {
            self.cursor.advance();
            let right = self.parse_comparison()?;
            left = Expression::binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    /// Parses comparison expressions (==, !=, <, >, <=, >=).
    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_coalesce()?;

        loop {
            let op = match self.cursor.current() {
                Token::EqualEqual => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.cursor.advance();
            let right = self.parse_coalesce()?;
            left = Expression::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_coalesce(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;
        while *self.cursor.current() == Token::Coalesce {
            self.cursor.advance();
            let right = self.parse_unary()?;
            left = Expression::binary(left, BinaryOperator::Coalesce, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let op = if *self.cursor.current() == Token::Bang || self.is_prefix_not() {
            UnaryOperator::Not
        } else if *self.cursor.current() == Token::Minus {
            UnaryOperator::Negate
        } else {
            return self.parse_postfix();
        };
        self.cursor.advance();
        self.cursor.descend()?;
        let operand = self.parse_unary();
        self.cursor.ascend();
        Ok(Expression::unary(op, operand?))
    }

    /// `not` is a keyword only when something that can start an operand follows it.
    fn is_prefix_not(&self) -> bool {
        self.cursor.current().is_keyword("not")
            && !matches!(
                self.cursor.peek(1),
                Token::Dot | Token::EOF | Token::RParen | Token::EqualEqual | Token::NotEqual
            )
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.cursor.current() {
                Token::Dot => {
                    self.cursor.advance();
                    let name = self.cursor.expect_identifier()?;
                    if *self.cursor.current() == Token::LParen {
                        self.cursor.advance();
                        let args = self.parse_arguments(Token::RParen)?;
                        expr = Expression::Call {
                            target: Some(Box::new(expr)),
                            name,
                            args,
                        };
                    } else {
                        expr = Expression::Member {
                            target: Box::new(expr),
                            name,
                        };
                    }
                }
                Token::LBracket => {
                    self.cursor.advance();
                    let index = self.parse_expression()?;
                    self.cursor.expect(Token::RBracket)?;
                    expr = Expression::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.cursor.current().clone() {
            Token::Integer(n) => {
                self.cursor.advance();
                Ok(Expression::Literal(Literal::Integer(n)))
            }
            Token::Float(n) => {
                self.cursor.advance();
                Ok(Expression::Literal(Literal::Float(n)))
            }
            Token::String(s) => {
                self.cursor.advance();
                Ok(Expression::Literal(Literal::String(s)))
            }

            Token::Identifier(name) => {
                if let Some(literal) = keyword_literal(&name) {
                    self.cursor.advance();
                    return Ok(Expression::Literal(literal));
                }
                if name == "new" && *self.cursor.peek(1) == Token::LBracket {
                    return self.parse_array();
                }
                if *self.cursor.peek(1) == Token::Arrow {
                    self.cursor.advance();
                    self.cursor.advance();
                    let body = self.parse_expression()?;
                    return Ok(Expression::Lambda {
                        param: name,
                        body: Box::new(body),
                    });
                }

                self.cursor.advance();
                if *self.cursor.current() == Token::LParen {
                    self.cursor.advance();
                    let args = self.parse_arguments(Token::RParen)?;
                    return Ok(Expression::Call {
                        target: None,
                        name,
                        args,
                    });
                }
                Ok(Expression::Identifier(name))
            }

            Token::LParen => {
                self.cursor.advance();
                let expr = self.parse_expression()?;
                self.cursor.expect(Token::RParen)?;
                Ok(expr)
            }

            _ => Err(self.cursor.unexpected()),
        }
    }

    /// Parses `new[] { a, b, c }`.
    fn parse_array(&mut self) -> ParseResult<Expression> {
        self.cursor.advance();
        self.cursor.expect(Token::LBracket)?;
        self.cursor.expect(Token::RBracket)?;
        self.cursor.expect(Token::LBrace)?;
        let items = self.parse_arguments(Token::RBrace)?;
        Ok(Expression::Array(items))
    }

    /// Parses a comma-separated list up to and including `close`.
    fn parse_arguments(&mut self, close: Token) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();
        if *self.cursor.current() == close {
            self.cursor.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if *self.cursor.current() == Token::Comma {
                self.cursor.advance();
                continue;
            }
            self.cursor.expect(close.clone())?;
            return Ok(args);
        }
    }
}

/// Parses `input` written in `dialect`.
pub fn parse(input: &str, dialect: Dialect) -> ParseResult<Expression> {
    match dialect {
        Dialect::Expression => Parser::new(input).parse(),
        Dialect::OData => crate::odata::ODataParser::new(input).parse(),
    }
}
