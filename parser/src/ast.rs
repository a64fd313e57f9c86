//! FILENAME: parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) shared by both filter dialects.
//! CONTEXT: The Expression and OData parsers both produce this tree, so a
//! single lowering step in the engine can turn either one into a predicate.
//!
//! SUPPORTED EXPRESSIONS:
//! - Literals: null, booleans, integers, floats, strings, dates, GUIDs
//! - Identifiers: `it`, `$it`, lambda parameters, bare property names
//! - Member access: it.Customer.Name, Customer/Name
//! - Indexers: it.Lines[0], it["Age"]
//! - Calls: it.Name.Contains("x"), contains(Name,'x'), Int32(it["Age"])
//! - Lambdas: x => x.Total > 5, x: x/Total gt 5
//! - Arrays: new[] { 1, 2 }, (1,2) after `in`
//! - Binary operations: == != < <= > >= && || ?? in
//! - Unary operations: ! (not), - (negation)

/// A parsed filter expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A literal value.
    Literal(Literal),

    /// A bare name: the implicit item (`it`), a lambda parameter, or a
    /// property of the implicit item. Resolution happens during lowering.
    Identifier(String),

    /// Member access on a target: `target.name` or `target/name`.
    Member {
        target: Box<Expression>,
        name: String,
    },

    /// Indexer access: `target[index]`.
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },

    /// Method call (`target.name(args)`) or free function (`name(args)`).
    Call {
        target: Option<Box<Expression>>,
        name: String,
        args: Vec<Expression>,
    },

    /// Single-parameter lambda, only valid as a call argument.
    Lambda {
        param: String,
        body: Box<Expression>,
    },

    /// Array literal: `new[] { a, b }` or an OData `(a, b)` list.
    Array(Vec<Expression>),

    /// A binary operation: left op right.
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand.
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
}

/// Literal values that can appear in filters.
/// Dates and GUIDs keep their source text; the engine owns their typed form.
#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(String),
    Date(String),
    Guid(String),
}

/// Binary operators, lowest precedence first.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    /// Set membership: `x in (a, b)`
    In,
    /// Null-coalescing: `a ?? b`
    Coalesce,
}

/// Unary operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum UnaryOperator {
    Not,
    Negate,
}

impl Expression {
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Or => write!(f, "||"),
            BinaryOperator::And => write!(f, "&&"),
            BinaryOperator::Equal => write!(f, "=="),
            BinaryOperator::NotEqual => write!(f, "!="),
            BinaryOperator::LessThan => write!(f, "<"),
            BinaryOperator::LessEqual => write!(f, "<="),
            BinaryOperator::GreaterThan => write!(f, ">"),
            BinaryOperator::GreaterEqual => write!(f, ">="),
            BinaryOperator::In => write!(f, "in"),
            BinaryOperator::Coalesce => write!(f, "??"),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Not => write!(f, "!"),
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}
