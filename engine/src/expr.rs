//! FILENAME: engine/src/expr.rs
//! PURPOSE: Typed expression tree and its interpreter.
//! CONTEXT: Descriptor plans and parsed filter text both compile to `Expr`.
//! Evaluation borrows from the item wherever it can; member access on a null
//! or non-record value yields null instead of failing, which gives every
//! chain null-propagating semantics.

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::schema::ValueType;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            CompareOp::Eq => left.loose_eq(right),
            CompareOp::Ne => !left.loose_eq(right),
            CompareOp::Lt => left.compare(right) == Some(Ordering::Less),
            CompareOp::Le => matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::Gt => left.compare(right) == Some(Ordering::Greater),
            CompareOp::Ge => matches!(left.compare(right), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextOp {
    /// Substring test on strings, membership test on lists.
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The item being tested.
    Item,
    /// A lambda parameter.
    Var(String),
    Literal(Value),
    Array(Vec<Expr>),
    Member {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    /// Typed read of a dynamic value.
    Convert {
        target: Box<Expr>,
        to: ValueType,
    },
    Coalesce(Box<Expr>, Box<Expr>),
    Lower(Box<Expr>),
    Upper(Box<Expr>),
    Not(Box<Expr>),
    Negate(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    Text {
        op: TextOp,
        target: Box<Expr>,
        arg: Box<Expr>,
    },
    /// `item in set`; a list item matches when any of its elements is in the set.
    In {
        item: Box<Expr>,
        set: Box<Expr>,
    },
    /// True when any element satisfies `body` (or, without a body, when the
    /// collection is non-empty).
    Any {
        collection: Box<Expr>,
        var: String,
        body: Option<Box<Expr>>,
    },
    All {
        collection: Box<Expr>,
        var: String,
        body: Box<Expr>,
    },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    pub fn lower(expr: Expr) -> Self {
        Expr::Lower(Box::new(expr))
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    pub fn compare(left: Expr, op: CompareOp, right: Expr) -> Self {
        Expr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn text(op: TextOp, target: Expr, arg: Expr) -> Self {
        Expr::Text {
            op,
            target: Box::new(target),
            arg: Box::new(arg),
        }
    }

    pub fn is_true_literal(&self) -> bool {
        matches!(self, Expr::Literal(Value::Bool(true)))
    }

    /// Evaluates against `item` as a boolean test.
    pub fn test(&self, item: &Value) -> bool {
        let mut env = Env::new(item);
        self.eval(&mut env).is_truthy()
    }

    /// Evaluates against `item`.
    pub fn evaluate(&self, item: &Value) -> Value {
        let mut env = Env::new(item);
        self.eval(&mut env).into_owned()
    }

    fn eval<'a>(&'a self, env: &mut Env<'a>) -> Cow<'a, Value> {
        match self {
            Expr::Item => Cow::Borrowed(env.item),
            Expr::Var(name) => env.lookup(name),
            Expr::Literal(value) => Cow::Borrowed(value),
            Expr::Array(items) => Cow::Owned(Value::List(
                items.iter().map(|e| e.eval(env).into_owned()).collect(),
            )),

            Expr::Member { target, name } => match target.eval(env) {
                Cow::Borrowed(value) => value.get(name).map(Cow::Borrowed).unwrap_or(NULL),
                Cow::Owned(value) => Cow::Owned(value.into_member(name)),
            },

            Expr::Index { target, index } => {
                let index = index.eval(env).into_owned();
                let target = target.eval(env);
                index_value(target, &index)
            }

            Expr::Convert { target, to } => Cow::Owned(target.eval(env).coerce_to(to)),

            Expr::Coalesce(left, right) => {
                let value = left.eval(env);
                if value.is_null() {
                    right.eval(env)
                } else {
                    value
                }
            }

            Expr::Lower(inner) => match inner.eval(env) {
                Cow::Borrowed(Value::String(s)) => Cow::Owned(Value::String(s.to_lowercase())),
                Cow::Owned(Value::String(s)) => Cow::Owned(Value::String(s.to_lowercase())),
                other => other,
            },

            Expr::Upper(inner) => match inner.eval(env) {
                Cow::Borrowed(Value::String(s)) => Cow::Owned(Value::String(s.to_uppercase())),
                Cow::Owned(Value::String(s)) => Cow::Owned(Value::String(s.to_uppercase())),
                other => other,
            },

            Expr::Not(inner) => bool_value(!inner.eval(env).is_truthy()),

            Expr::Negate(inner) => Cow::Owned(match &*inner.eval(env) {
                Value::Int(n) => Value::Int(-n),
                Value::Float(n) => Value::Float(-n),
                _ => Value::Null,
            }),

            Expr::And(left, right) => {
                bool_value(left.eval(env).is_truthy() && right.eval(env).is_truthy())
            }

            Expr::Or(left, right) => {
                bool_value(left.eval(env).is_truthy() || right.eval(env).is_truthy())
            }

            Expr::Compare { left, op, right } => {
                let l = left.eval(env);
                let r = right.eval(env);
                bool_value(op.apply(&l, &r))
            }

            Expr::Text { op, target, arg } => {
                let target = target.eval(env);
                let arg = arg.eval(env);
                bool_value(text_test(*op, &target, &arg))
            }

            Expr::In { item, set } => {
                let item = item.eval(env);
                let set = set.eval(env);
                bool_value(in_set(&item, &set))
            }

            Expr::Any {
                collection,
                var,
                body,
            } => {
                let collection = collection.eval(env);
                let result = match body {
                    None => collection.as_list().is_some_and(|items| !items.is_empty()),
                    Some(body) => {
                        for_elements(collection, var, env, |env| body.eval(env).is_truthy())
                            == Some(true)
                    }
                };
                bool_value(result)
            }

            Expr::All {
                collection,
                var,
                body,
            } => {
                let collection = collection.eval(env);
                let failed = for_elements(collection, var, env, |env| !body.eval(env).is_truthy());
                bool_value(failed == Some(false))
            }
        }
    }
}

const NULL: Cow<'static, Value> = Cow::Owned(Value::Null);

fn bool_value<'a>(b: bool) -> Cow<'a, Value> {
    Cow::Owned(Value::Bool(b))
}

fn index_value<'a>(target: Cow<'a, Value>, index: &Value) -> Cow<'a, Value> {
    match (target, index) {
        (Cow::Borrowed(value), Value::Int(i)) if *i >= 0 => {
            value.at(*i as usize).map(Cow::Borrowed).unwrap_or(NULL)
        }
        (Cow::Borrowed(value), Value::String(key)) => {
            value.get(key).map(Cow::Borrowed).unwrap_or(NULL)
        }
        (Cow::Owned(Value::List(mut items)), Value::Int(i)) if *i >= 0 && (*i as usize) < items.len() => {
            Cow::Owned(items.swap_remove(*i as usize))
        }
        (Cow::Owned(value), Value::String(key)) => Cow::Owned(value.into_member(key)),
        _ => NULL,
    }
}

/// Binds each element of `collection` to `var` and runs `visit` until it
/// returns true. `None` when the value is not a list.
fn for_elements<'a, F>(
    collection: Cow<'a, Value>,
    var: &'a str,
    env: &mut Env<'a>,
    mut visit: F,
) -> Option<bool>
where
    F: FnMut(&mut Env<'a>) -> bool,
{
    let mut found = false;
    match collection {
        Cow::Borrowed(Value::List(items)) => {
            for element in items {
                env.vars.push((var, Cow::Borrowed(element)));
                found = visit(env);
                env.vars.pop();
                if found {
                    break;
                }
            }
        }
        Cow::Owned(Value::List(items)) => {
            for element in items {
                env.vars.push((var, Cow::Owned(element)));
                found = visit(env);
                env.vars.pop();
                if found {
                    break;
                }
            }
        }
        _ => return None,
    }
    Some(found)
}

fn text_test(op: TextOp, target: &Value, arg: &Value) -> bool {
    match (op, target, arg) {
        (TextOp::Contains, Value::String(s), Value::String(part)) => s.contains(part.as_str()),
        (TextOp::StartsWith, Value::String(s), Value::String(part)) => s.starts_with(part.as_str()),
        (TextOp::EndsWith, Value::String(s), Value::String(part)) => s.ends_with(part.as_str()),
        (TextOp::Contains, Value::List(items), needle) => items.iter().any(|v| v.loose_eq(needle)),
        _ => false,
    }
}

fn in_set(item: &Value, set: &Value) -> bool {
    let Some(members) = set.as_list() else {
        return item.loose_eq(set);
    };
    match item {
        Value::List(elements) => elements
            .iter()
            .any(|e| members.iter().any(|m| m.loose_eq(e))),
        single => members.iter().any(|m| m.loose_eq(single)),
    }
}

/// Evaluation scope: the item plus bound lambda parameters, innermost last.
struct Env<'a> {
    item: &'a Value,
    vars: Vec<(&'a str, Cow<'a, Value>)>,
}

impl<'a> Env<'a> {
    fn new(item: &'a Value) -> Self {
        Env {
            item,
            vars: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Cow<'a, Value> {
        match self.vars.iter().rev().find(|(var, _)| *var == name) {
            Some((_, Cow::Borrowed(value))) => Cow::Borrowed(*value),
            Some((_, Cow::Owned(value))) => Cow::Owned(value.clone()),
            None => NULL,
        }
    }
}
