//! FILENAME: parser/src/odata.rs
//! PURPOSE: Recursive descent parser for OData `$filter` text.
//! CONTEXT: Produces the same Expression tree as the Expression dialect so
//! that the engine can evaluate remote filter text in process.
//!
//! GRAMMAR:
//!   filter     --> or
//!   or         --> and ( "or" and )*
//!   and        --> not ( "and" not )*
//!   not        --> "not" not | comparison
//!   comparison --> operand ( ("eq"|"ne"|"lt"|"le"|"gt"|"ge") operand | "in" "(" list ")" )?
//!   operand    --> literal | "-" NUMBER | "(" or ")" | IDENT "(" list? ")" | path
//!   path       --> IDENT ( "/" IDENT )* [ "/" ("any"|"all") "(" [ IDENT ":" or ] ")" ]

use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};
use crate::lexer::Dialect;
use crate::parser::{keyword_literal, Cursor, ParseResult};
use crate::token::Token;

pub struct ODataParser {
    cursor: Cursor,
}

impl ODataParser {
    pub fn new(input: &str) -> Self {
        ODataParser {
            cursor: Cursor::new(input, Dialect::OData),
        }
    }

    pub fn parse(&mut self) -> ParseResult<Expression> {
        if *self.cursor.current() == Token::EOF {
            return Err(self.cursor.error("Empty expression"));
        }
        let expr = self.parse_or()?;
        self.cursor.finish()?;
        Ok(expr)
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        self.cursor.descend()?;
        let expr = self.parse_disjunction();
        self.cursor.ascend();
        expr
    }

    fn parse_disjunction(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_and()?;
        while self.cursor.current().is_keyword("or") {
            self.cursor.advance();
            let right = self.parse_and()?;
            left = Expression::binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_not()?;
        while self.cursor.current().is_keyword("and") {
            self.cursor.advance();
            let right = self.parse_not()?;
            left = Expression::binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Expression> {
        if self.cursor.current().is_keyword("not") {
            self.cursor.advance();
            self.cursor.descend()?;
            let operand = self.parse_not();
            self.cursor.ascend();
            return Ok(Expression::unary(UnaryOperator::Not, operand?));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let left = self.parse_operand()?;

        let op = match self.cursor.current() {
            t if t.is_keyword("eq") => BinaryOperator::Equal,
            t if t.is_keyword("ne") => BinaryOperator::NotEqual,
            t if t.is_keyword("lt") => BinaryOperator::LessThan,
            t if t.is_keyword("le") => BinaryOperator::LessEqual,
            t if t.is_keyword("gt") => BinaryOperator::GreaterThan,
            t if t.is_keyword("ge") => BinaryOperator::GreaterEqual,
            t if t.is_keyword("in") => {
                self.cursor.advance();
                self.cursor.expect(Token::LParen)?;
                let items = self.parse_list()?;
                return Ok(Expression::binary(
                    left,
                    BinaryOperator::In,
                    Expression::Array(items),
                ));
            }
            _ => return Ok(left),
        };

        self.cursor.advance();
        let right = self.parse_operand()?;
        Ok(Expression::binary(left, op, right))
    }

    fn parse_operand(&mut self) -> ParseResult<Expression> {
        let literal = match self.cursor.current().clone() {
            Token::Integer(n) => Some(Literal::Integer(n)),
            Token::Float(n) => Some(Literal::Float(n)),
            Token::String(s) => Some(Literal::String(s)),
            Token::DateTime(s) => Some(Literal::DateTime(s)),
            Token::Date(s) => Some(Literal::Date(s)),
            Token::Guid(s) => Some(Literal::Guid(s)),
            _ => None,
        };
        if let Some(literal) = literal {
            self.cursor.advance();
            return Ok(Expression::Literal(literal));
        }

        match self.cursor.current().clone() {
            Token::Minus => {
                self.cursor.advance();
                match self.cursor.current().clone() {
                    Token::Integer(n) => {
                        self.cursor.advance();
                        Ok(Expression::Literal(Literal::Integer(-n)))
                    }
                    Token::Float(n) => {
                        self.cursor.advance();
                        Ok(Expression::Literal(Literal::Float(-n)))
                    }
                    _ => Err(self.cursor.error("Expected number after '-'")),
                }
            }

            Token::LParen => {
                self.cursor.advance();
                let expr = self.parse_or()?;
                self.cursor.expect(Token::RParen)?;
                Ok(expr)
            }

            Token::Identifier(name) => {
                if let Some(literal) = keyword_literal(&name) {
                    self.cursor.advance();
                    return Ok(Expression::Literal(literal));
                }
                self.cursor.advance();
                if *self.cursor.current() == Token::LParen {
                    self.cursor.advance();
                    let args = self.parse_list()?;
                    return Ok(Expression::Call {
                        target: None,
                        name,
                        args,
                    });
                }
                self.parse_path(Expression::Identifier(name))
            }

            _ => Err(self.cursor.unexpected()),
        }
    }

    /// Parses the `/Segment` tail of a path, including a trailing lambda operator.
    fn parse_path(&mut self, root: Expression) -> ParseResult<Expression> {
        let mut expr = root;
        while *self.cursor.current() == Token::Slash {
            self.cursor.advance();
            let name = self.cursor.expect_identifier()?;

            let is_lambda_operator =
                name.eq_ignore_ascii_case("any") || name.eq_ignore_ascii_case("all");
            if is_lambda_operator && *self.cursor.current() == Token::LParen {
                self.cursor.advance();
                let args = if *self.cursor.current() == Token::RParen {
                    self.cursor.advance();
                    Vec::new()
                } else {
                    let param = self.cursor.expect_identifier()?;
                    self.cursor.expect(Token::Colon)?;
                    let body = self.parse_or()?;
                    self.cursor.expect(Token::RParen)?;
                    vec![Expression::Lambda {
                        param,
                        body: Box::new(body),
                    }]
                };
                return Ok(Expression::Call {
                    target: Some(Box::new(expr)),
                    name,
                    args,
                });
            }

            expr = Expression::Member {
                target: Box::new(expr),
                name,
            };
        }
        Ok(expr)
    }

    /// Parses `a, b, c)`; the opening parenthesis is already consumed.
    fn parse_list(&mut self) -> ParseResult<Vec<Expression>> {
        let mut items = Vec::new();
        if *self.cursor.current() == Token::RParen {
            self.cursor.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if *self.cursor.current() == Token::Comma {
                self.cursor.advance();
                continue;
            }
            self.cursor.expect(Token::RParen)?;
            return Ok(items);
        }
    }
}
