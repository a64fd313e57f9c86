//! FILENAME: engine/src/serialize/odata.rs
//! PURPOSE: OData `$filter` / `$orderby` syntax.
//! CONTEXT: Paths use `/` between segments, collections are tested with
//! `any()` lambdas and set membership with `in (...)`. OData has no
//! null-coalescing operator, so guarded accesses are written raw and string
//! tests spell out the null case wherever it differs from the empty string.

use chrono::{NaiveDateTime, Timelike};

use crate::descriptor::LogicalFilterOperator;
use crate::expr::{CompareOp, TextOp};
use crate::resolver::{PathStep, ResolvedPath};
use crate::value::Value;

use super::Syntax;

#[derive(Debug, Clone, Copy, Default)]
pub struct ODataSyntax;

impl Syntax for ODataSyntax {
    fn path(&self, root: Option<&str>, path: &ResolvedPath) -> Option<String> {
        let mut segments: Vec<&str> = root.into_iter().collect();
        for step in &path.steps {
            match step {
                PathStep::Member(name) | PathStep::Key(name) => segments.push(name),
                PathStep::TypedKey { key, .. } => segments.push(key),
                PathStep::Position(_) => return None,
            }
        }
        if segments.is_empty() {
            return Some("$it".to_string());
        }
        Some(segments.join("/"))
    }

    fn guard(&self, access: String, _path: &ResolvedPath) -> String {
        access
    }

    fn coalesces(&self) -> bool {
        false
    }

    fn lower(&self, operand: String) -> String {
        format!("tolower({})", operand)
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) if f.is_finite() => format!("{:?}", f),
            Value::Float(_) => "null".to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::DateTime(dt) => datetime_literal(dt),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Guid(g) => g.to_string(),
            Value::Enum(e) => e.value.to_string(),
            Value::List(items) => format!(
                "({})",
                items.iter().map(|v| self.literal(v)).collect::<Vec<_>>().join(",")
            ),
            Value::Object(_) => "null".to_string(),
        }
    }

    fn compare(&self, left: &str, op: CompareOp, right: &str) -> String {
        let op = match op {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        };
        format!("{} {} {}", left, op, right)
    }

    fn text(&self, op: TextOp, target: &str, arg: &str) -> String {
        let function = match op {
            TextOp::Contains => "contains",
            TextOp::StartsWith => "startswith",
            TextOp::EndsWith => "endswith",
        };
        format!("{}({},{})", function, target, arg)
    }

    fn not(&self, operand: String) -> String {
        format!("not ({})", operand)
    }

    fn in_set(&self, item: &str, set: &Value) -> String {
        format!("{} in {}", item, self.literal(set))
    }

    fn any(&self, collection: &str, var: &str, body: &str) -> String {
        format!("{}/any({}: {})", collection, var, body)
    }

    fn is_empty(&self, raw: &str, _guarded: &str, needs_guard: bool, negate: bool) -> String {
        match (needs_guard, negate) {
            (true, false) => format!("({} eq null or {} eq '')", raw, raw),
            (true, true) => format!("({} ne null and {} ne '')", raw, raw),
            (false, false) => format!("{} eq ''", raw),
            (false, true) => format!("{} ne ''", raw),
        }
    }

    fn logical(&self, op: LogicalFilterOperator) -> &'static str {
        match op {
            LogicalFilterOperator::And => " and ",
            LogicalFilterOperator::Or => " or ",
        }
    }

    fn order_by(&self, property: &str, descending: bool) -> String {
        let direction = if descending { "desc" } else { "asc" };
        format!("{} {}", property.replace('.', "/"), direction)
    }

    fn order_by_separator(&self) -> &'static str {
        ","
    }
}

/// ISO 8601 in UTC: `2023-05-01T14:30:00Z`, with fractional seconds when present.
fn datetime_literal(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.fZ").to_string()
    }
}
