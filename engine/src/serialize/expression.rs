//! FILENAME: engine/src/serialize/expression.rs
//! PURPOSE: Expression-language (dynamic LINQ style) filter syntax.
//! CONTEXT: Output looks like `(it.Name ?? "").ToLower().Contains("an") && it.Age > 30`
//! and is read back by the Expression dialect parser.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::descriptor::LogicalFilterOperator;
use crate::expr::{CompareOp, TextOp};
use crate::resolver::{PathStep, ResolvedPath};
use crate::value::Value;

use super::Syntax;

/// The implicit item in expression text.
const ITEM: &str = "it";

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionSyntax;

impl Syntax for ExpressionSyntax {
    fn path(&self, root: Option<&str>, path: &ResolvedPath) -> Option<String> {
        let start = root.unwrap_or(ITEM).to_string();
        let text = path.steps.iter().fold(start, |target, step| match step {
            PathStep::Member(name) => format!("{}.{}", target, name),
            PathStep::Position(index) => format!("{}[{}]", target, index),
            PathStep::Key(key) => format!("{}[{}]", target, quote(key)),
            PathStep::TypedKey { key, value_type } => {
                format!("{}({}[{}])", value_type.type_tag(), target, quote(key))
            }
        });
        Some(text)
    }

    fn guard(&self, access: String, path: &ResolvedPath) -> String {
        match path.value_type.guard_default() {
            Some(default) => format!("({} ?? {})", access, self.literal(&default)),
            None => access,
        }
    }

    fn lower(&self, operand: String) -> String {
        format!("{}.ToLower()", operand)
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) if f.is_finite() => format!("{:?}", f),
            Value::Float(_) => "null".to_string(),
            Value::String(s) => quote(s),
            Value::DateTime(dt) => datetime_literal(dt),
            Value::Date(d) => format!("DateOnly({}, {}, {})", d.year(), d.month(), d.day()),
            Value::Guid(g) => format!("Guid(\"{}\")", g),
            Value::Enum(e) => e.value.to_string(),
            Value::List(items) => format!(
                "new[] {{ {} }}",
                items.iter().map(|v| self.literal(v)).collect::<Vec<_>>().join(", ")
            ),
            Value::Object(_) => "null".to_string(),
        }
    }

    fn compare(&self, left: &str, op: CompareOp, right: &str) -> String {
        let op = match op {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        format!("{} {} {}", left, op, right)
    }

    fn text(&self, op: TextOp, target: &str, arg: &str) -> String {
        let method = match op {
            TextOp::Contains => "Contains",
            TextOp::StartsWith => "StartsWith",
            TextOp::EndsWith => "EndsWith",
        };
        format!("{}.{}({})", target, method, arg)
    }

    fn not(&self, operand: String) -> String {
        format!("!({})", operand)
    }

    fn in_set(&self, item: &str, set: &Value) -> String {
        format!("{}.Contains({})", self.literal(set), item)
    }

    fn any(&self, collection: &str, var: &str, body: &str) -> String {
        format!("{}.Any({} => {})", collection, var, body)
    }

    fn is_empty(&self, _raw: &str, guarded: &str, _needs_guard: bool, negate: bool) -> String {
        let op = if negate { CompareOp::Ne } else { CompareOp::Eq };
        self.compare(guarded, op, "\"\"")
    }

    fn logical(&self, op: LogicalFilterOperator) -> &'static str {
        match op {
            LogicalFilterOperator::And => " && ",
            LogicalFilterOperator::Or => " || ",
        }
    }

    fn order_by(&self, property: &str, descending: bool) -> String {
        let direction = if descending { "desc" } else { "asc" };
        format!("{}.{} {}", ITEM, property, direction)
    }

    fn order_by_separator(&self) -> &'static str {
        ", "
    }
}

/// Double-quoted string literal with backslash escapes.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn datetime_literal(dt: &NaiveDateTime) -> String {
    let date = dt.date();
    let millis = dt.nanosecond() / 1_000_000;
    let mut parts = vec![date.year(), date.month() as i32, date.day() as i32];
    if dt.time() != chrono::NaiveTime::MIN {
        parts.extend([dt.hour() as i32, dt.minute() as i32, dt.second() as i32]);
        if millis > 0 {
            parts.push(millis as i32);
        }
    }
    format!(
        "DateTime({})",
        parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
    )
}
