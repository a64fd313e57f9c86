//! FILENAME: engine/src/text.rs
//! PURPOSE: Lowers parsed filter text into the engine's expression tree.
//! CONTEXT: Both dialects parse to the shared `query_parser::Expression`
//! AST. Lowering resolves every member against the item schema (so a
//! misspelled property fails with a path error), binds lambda parameters to
//! element types, and maps dialect functions onto `Expr` nodes that the same
//! interpreter runs as compiled descriptor filters.

use chrono::NaiveDate;
use query_parser::{parse, BinaryOperator, Dialect, Expression, Literal, UnaryOperator};
use uuid::Uuid;

use crate::error::{QueryError, Result};
use crate::expr::{CompareOp, Expr, TextOp};
use crate::log_debug;
use crate::predicate::Predicate;
use crate::resolver::member_type;
use crate::schema::ValueType;
use crate::value::{parse_date, parse_datetime, Value};

/// Parses `text` in `dialect` and compiles it against `item_type`.
pub fn parse_filter(text: &str, dialect: Dialect, item_type: &ValueType) -> Result<Predicate> {
    if text.trim().is_empty() {
        return Ok(Predicate::always());
    }
    let expr = lower_text(text, dialect, item_type)?;
    log_debug!("FILTER", "parsed {:?} filter: {}", dialect, text);
    Ok(Predicate::from_expr(expr))
}

/// Parses and lowers `text` without wrapping it in a predicate.
pub fn lower_text(text: &str, dialect: Dialect, item_type: &ValueType) -> Result<Expr> {
    let ast = parse(text, dialect).map_err(|source| QueryError::Parse {
        text: text.to_string(),
        source,
    })?;
    let mut lowering = Lowering {
        item_type,
        params: Vec::new(),
        depth: 0,
    };
    Ok(lowering.lower(&ast)?.expr)
}

/// An expression with its static type.
struct Typed {
    expr: Expr,
    ty: ValueType,
}

impl Typed {
    fn new(expr: Expr, ty: ValueType) -> Self {
        Typed { expr, ty }
    }

    fn boolean(expr: Expr) -> Self {
        Typed::new(expr, ValueType::Bool)
    }

    fn expr_text(&self) -> String {
        match &self.expr {
            Expr::Literal(value) => value.to_string(),
            other => format!("{:?}", other),
        }
    }
}

/// Deepest syntax tree `Lowering` walks. Long `and`/`or` chains parse
/// without recursion but still lower recursively.
const MAX_LOWERING_DEPTH: usize = 256;

struct Lowering<'t> {
    item_type: &'t ValueType,
    /// Lambda parameters in scope, innermost last.
    params: Vec<(String, ValueType)>,
    depth: usize,
}

impl Lowering<'_> {
    fn lower(&mut self, node: &Expression) -> Result<Typed> {
        if self.depth >= MAX_LOWERING_DEPTH {
            return Err(QueryError::Unsupported(format!(
                "filter is nested deeper than {} levels",
                MAX_LOWERING_DEPTH
            )));
        }
        self.depth += 1;
        let lowered = self.lower_node(node);
        self.depth -= 1;
        lowered
    }

    fn lower_node(&mut self, node: &Expression) -> Result<Typed> {
        match node {
            Expression::Literal(literal) => lower_literal(literal),

            Expression::Identifier(name) => self.lower_identifier(name),

            Expression::Member { target, name } => {
                let target = self.lower(target)?;
                let ty = member_type(name, &target.ty, name)?;
                Ok(Typed::new(
                    Expr::Member {
                        target: Box::new(target.expr),
                        name: name.clone(),
                    },
                    ty,
                ))
            }

            Expression::Index { target, index } => self.lower_index(target, index),

            Expression::Call { target: None, name, args } => self.lower_function(name, args),

            Expression::Call {
                target: Some(target),
                name,
                args,
            } => self.lower_method(target, name, args),

            Expression::Lambda { .. } => Err(QueryError::Unsupported(
                "a lambda is only valid as the argument of any/all".to_string(),
            )),

            Expression::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.lower(item))
                    .collect::<Result<Vec<_>>>()?;
                let element = items.first().map(|t| t.ty.clone()).unwrap_or(ValueType::Dynamic);
                Ok(Typed::new(
                    Expr::Array(items.into_iter().map(|t| t.expr).collect()),
                    ValueType::list(element),
                ))
            }

            Expression::BinaryOp { left, op, right } => self.lower_binary(left, *op, right),

            Expression::UnaryOp { op, operand } => {
                let operand = self.lower(operand)?;
                match op {
                    UnaryOperator::Not => Ok(Typed::boolean(Expr::not(operand.expr))),
                    UnaryOperator::Negate => Ok(match operand.expr {
                        Expr::Literal(Value::Int(n)) => Typed::new(Expr::literal(-n), ValueType::Int),
                        Expr::Literal(Value::Float(f)) => Typed::new(Expr::literal(-f), ValueType::Float),
                        expr => Typed::new(Expr::Negate(Box::new(expr)), operand.ty),
                    }),
                }
            }
        }
    }

    fn lower_identifier(&mut self, name: &str) -> Result<Typed> {
        if name == "it" || name == "$it" {
            return Ok(Typed::new(Expr::Item, self.item_type.clone()));
        }
        if let Some((param, ty)) = self.params.iter().rev().find(|(param, _)| param == name) {
            return Ok(Typed::new(Expr::Var(param.clone()), ty.clone()));
        }
        let ty = member_type(name, self.item_type, name)?;
        Ok(Typed::new(
            Expr::Member {
                target: Box::new(Expr::Item),
                name: name.to_string(),
            },
            ty,
        ))
    }

    fn lower_index(&mut self, target: &Expression, index: &Expression) -> Result<Typed> {
        let target = self.lower(target)?;
        let index = self.lower(index)?;
        let ty = match &index.expr {
            Expr::Literal(Value::String(key)) => member_type(key, &target.ty, key)?,
            Expr::Literal(Value::Int(_)) => {
                target
                    .ty
                    .element_type()
                    .cloned()
                    .ok_or_else(|| QueryError::InvalidIndex {
                        path: target.ty.to_string(),
                        index: index.expr_text(),
                    })?
            }
            _ => ValueType::Dynamic,
        };
        Ok(Typed::new(
            Expr::Index {
                target: Box::new(target.expr),
                index: Box::new(index.expr),
            },
            ty,
        ))
    }

    /// Free functions: OData string functions, typed reads and literal constructors.
    fn lower_function(&mut self, name: &str, args: &[Expression]) -> Result<Typed> {
        let lowered = name.to_ascii_lowercase();
        match (lowered.as_str(), args) {
            ("contains" | "startswith" | "endswith", [target, arg]) => {
                let op = text_op(&lowered).unwrap_or(TextOp::Contains);
                let target = self.lower(target)?;
                let arg = self.lower(arg)?;
                Ok(Typed::boolean(Expr::text(op, target.expr, arg.expr)))
            }
            ("tolower", [operand]) => {
                let operand = self.lower(operand)?;
                Ok(Typed::new(Expr::lower(operand.expr), ValueType::String))
            }
            ("toupper", [operand]) => {
                let operand = self.lower(operand)?;
                Ok(Typed::new(Expr::Upper(Box::new(operand.expr)), ValueType::String))
            }
            _ if name == "DateTime" && (args.len() == 3 || args.len() == 6 || args.len() == 7) => {
                datetime_constructor(args).map(|value| Typed::new(Expr::Literal(value), ValueType::DateTime))
            }
            _ if name == "DateOnly" && args.len() == 3 => {
                date_constructor(args).map(|value| Typed::new(Expr::Literal(value), ValueType::Date))
            }
            ("guid", [Expression::Literal(Literal::String(text))]) => {
                let guid = Uuid::parse_str(text.trim())
                    .map_err(|_| QueryError::Unsupported(format!("invalid GUID literal '{}'", text)))?;
                Ok(Typed::new(Expr::Literal(Value::Guid(guid)), ValueType::Guid))
            }
            (_, [operand]) => match ValueType::from_type_tag(name) {
                Some(to) => {
                    let operand = self.lower(operand)?;
                    Ok(Typed::new(
                        Expr::Convert {
                            target: Box::new(operand.expr),
                            to: to.clone(),
                        },
                        to,
                    ))
                }
                None => Err(unsupported_call(name)),
            },
            _ => Err(unsupported_call(name)),
        }
    }

    fn lower_method(&mut self, target: &Expression, name: &str, args: &[Expression]) -> Result<Typed> {
        let lowered = name.to_ascii_lowercase();
        match (lowered.as_str(), args) {
            ("any" | "all", _) => self.lower_quantifier(target, &lowered, args),
            ("contains" | "startswith" | "endswith", [arg]) => {
                let op = text_op(&lowered).unwrap_or(TextOp::Contains);
                let target = self.lower(target)?;
                let arg = self.lower(arg)?;
                Ok(Typed::boolean(Expr::text(op, target.expr, arg.expr)))
            }
            ("tolower" | "tolowerinvariant", []) => {
                let target = self.lower(target)?;
                Ok(Typed::new(Expr::lower(target.expr), ValueType::String))
            }
            ("toupper" | "toupperinvariant", []) => {
                let target = self.lower(target)?;
                Ok(Typed::new(Expr::Upper(Box::new(target.expr)), ValueType::String))
            }
            _ => Err(unsupported_call(name)),
        }
    }

    fn lower_quantifier(&mut self, target: &Expression, name: &str, args: &[Expression]) -> Result<Typed> {
        let collection = self.lower(target)?;
        let element = collection.ty.element_type().cloned().ok_or_else(|| {
            QueryError::Unsupported(format!("{}() needs a collection, found {}", name, collection.ty))
        })?;

        match args {
            [] if name == "any" => Ok(Typed::boolean(Expr::Any {
                collection: Box::new(collection.expr),
                var: String::new(),
                body: None,
            })),
            [Expression::Lambda { param, body }] => {
                self.params.push((param.clone(), element));
                let body = self.lower(body);
                self.params.pop();
                let body = Box::new(body?.expr);
                let collection = Box::new(collection.expr);
                let var = param.clone();
                Ok(Typed::boolean(if name == "any" {
                    Expr::Any {
                        collection,
                        var,
                        body: Some(body),
                    }
                } else {
                    Expr::All { collection, var, body }
                }))
            }
            _ => Err(QueryError::Unsupported(format!("{}() expects a single lambda", name))),
        }
    }

    fn lower_binary(&mut self, left: &Expression, op: BinaryOperator, right: &Expression) -> Result<Typed> {
        let left = self.lower(left)?;
        let right = self.lower(right)?;
        let compare = |op: CompareOp, left: Typed, right: Typed| {
            let (l, r) = align_literals(left, right);
            Typed::boolean(Expr::compare(l, op, r))
        };
        Ok(match op {
            BinaryOperator::And => Typed::boolean(Expr::and(left.expr, right.expr)),
            BinaryOperator::Or => Typed::boolean(Expr::or(left.expr, right.expr)),
            BinaryOperator::Equal => compare(CompareOp::Eq, left, right),
            BinaryOperator::NotEqual => compare(CompareOp::Ne, left, right),
            BinaryOperator::LessThan => compare(CompareOp::Lt, left, right),
            BinaryOperator::LessEqual => compare(CompareOp::Le, left, right),
            BinaryOperator::GreaterThan => compare(CompareOp::Gt, left, right),
            BinaryOperator::GreaterEqual => compare(CompareOp::Ge, left, right),
            BinaryOperator::In => Typed::boolean(Expr::In {
                item: Box::new(left.expr),
                set: Box::new(right.expr),
            }),
            BinaryOperator::Coalesce => {
                let ty = left.ty.underlying().clone();
                Typed::new(Expr::Coalesce(Box::new(left.expr), Box::new(right.expr)), ty)
            }
        })
    }
}

/// Coerces a literal operand to the type of the other side, so that
/// `it.Born > "2020-01-01"` compares dates rather than strings.
fn align_literals(left: Typed, right: Typed) -> (Expr, Expr) {
    fn coerce(literal: Expr, ty: &ValueType) -> Expr {
        match literal {
            Expr::Literal(value) if !ty.is_dynamic() => Expr::Literal(value.coerce_to(ty)),
            other => other,
        }
    }
    match (&left.expr, &right.expr) {
        (Expr::Literal(_), Expr::Literal(_)) => (left.expr, right.expr),
        (_, Expr::Literal(_)) => {
            let r = coerce(right.expr, &left.ty);
            (left.expr, r)
        }
        (Expr::Literal(_), _) => {
            let l = coerce(left.expr, &right.ty);
            (l, right.expr)
        }
        _ => (left.expr, right.expr),
    }
}

fn lower_literal(literal: &Literal) -> Result<Typed> {
    let typed = match literal {
        Literal::Null => Typed::new(Expr::Literal(Value::Null), ValueType::Dynamic),
        Literal::Boolean(b) => Typed::new(Expr::literal(*b), ValueType::Bool),
        Literal::Integer(n) => Typed::new(Expr::literal(*n), ValueType::Int),
        Literal::Float(f) => Typed::new(Expr::literal(*f), ValueType::Float),
        Literal::String(s) => Typed::new(Expr::literal(s.as_str()), ValueType::String),
        Literal::DateTime(text) => {
            let dt = parse_datetime(text)
                .ok_or_else(|| QueryError::Unsupported(format!("invalid date-time literal '{}'", text)))?;
            Typed::new(Expr::Literal(Value::DateTime(dt)), ValueType::DateTime)
        }
        Literal::Date(text) => {
            let date = parse_date(text)
                .ok_or_else(|| QueryError::Unsupported(format!("invalid date literal '{}'", text)))?;
            Typed::new(Expr::Literal(Value::Date(date)), ValueType::Date)
        }
        Literal::Guid(text) => {
            let guid = Uuid::parse_str(text)
                .map_err(|_| QueryError::Unsupported(format!("invalid GUID literal '{}'", text)))?;
            Typed::new(Expr::Literal(Value::Guid(guid)), ValueType::Guid)
        }
    };
    Ok(typed)
}

fn text_op(name: &str) -> Option<TextOp> {
    match name {
        "contains" => Some(TextOp::Contains),
        "startswith" => Some(TextOp::StartsWith),
        "endswith" => Some(TextOp::EndsWith),
        _ => None,
    }
}

fn unsupported_call(name: &str) -> QueryError {
    QueryError::Unsupported(format!("unknown function '{}'", name))
}

/// Integer arguments of a literal constructor. Negative literals arrive as
/// `Negate(Integer)` and are rejected.
fn int_args(args: &[Expression]) -> Result<Vec<i64>> {
    args.iter()
        .map(|arg| match arg {
            Expression::Literal(Literal::Integer(n)) => Ok(*n),
            _ => Err(QueryError::Unsupported(
                "date constructors take integer literals".to_string(),
            )),
        })
        .collect()
}

fn ymd(parts: &[i64]) -> Option<NaiveDate> {
    match parts {
        [y, m, d, ..] => NaiveDate::from_ymd_opt(i32::try_from(*y).ok()?, u32::try_from(*m).ok()?, u32::try_from(*d).ok()?),
        _ => None,
    }
}

fn date_constructor(args: &[Expression]) -> Result<Value> {
    let parts = int_args(args)?;
    ymd(&parts)
        .map(Value::Date)
        .ok_or_else(|| QueryError::Unsupported(format!("invalid date {:?}", parts)))
}

fn datetime_constructor(args: &[Expression]) -> Result<Value> {
    let parts = int_args(args)?;
    let time = |i: usize| parts.get(i).and_then(|n| u32::try_from(*n).ok()).unwrap_or(0);
    ymd(&parts)
        .and_then(|date| date.and_hms_milli_opt(time(3), time(4), time(5), time(6)))
        .map(Value::DateTime)
        .ok_or_else(|| QueryError::Unsupported(format!("invalid date-time {:?}", parts)))
}
