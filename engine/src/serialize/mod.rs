//! FILENAME: engine/src/serialize/mod.rs
//! PURPOSE: Renders filter plans and sort lists as query text.
//! CONTEXT: Both dialects walk the same `Plan`. The walk here decides the
//! shape of every condition (which side is guarded, lower-cased, negated);
//! each dialect only supplies the concrete syntax through `Syntax`. The
//! shapes follow `predicate.rs`, so text parsed back by `parse_filter`
//! evaluates like the compiled predicate.

mod expression;
mod odata;

pub use expression::ExpressionSyntax;
pub use odata::ODataSyntax;

use query_parser::Dialect;

use crate::descriptor::{
    CaseSensitivity, CompositeFilterDescriptor, FilterDescriptor, LogicalFilterOperator, SortDescriptor,
};
use crate::error::Result;
use crate::expr::{CompareOp, Expr, TextOp};
use crate::log_debug;
use crate::plan::{build_composite_plan, build_plan, Condition, Plan, Scope, Test};
use crate::predicate::scalar_test;
use crate::resolver::ResolvedPath;
use crate::schema::ValueType;
use crate::value::Value;

/// Concrete syntax of one query dialect.
pub trait Syntax {
    /// Access to `path` starting at the item (`root == None`) or at a lambda
    /// variable. `None` when the dialect cannot express the path.
    fn path(&self, root: Option<&str>, path: &ResolvedPath) -> Option<String>;

    /// Null-guarded form of `access` for paths that need a guard.
    fn guard(&self, access: String, path: &ResolvedPath) -> String;

    /// False when `guard` returns the access unchanged.
    fn coalesces(&self) -> bool {
        true
    }

    fn lower(&self, operand: String) -> String;

    fn literal(&self, value: &Value) -> String;

    fn compare(&self, left: &str, op: CompareOp, right: &str) -> String;

    fn text(&self, op: TextOp, target: &str, arg: &str) -> String;

    fn not(&self, operand: String) -> String;

    /// `item` is one of the members of the list `set`.
    fn in_set(&self, item: &str, set: &Value) -> String;

    /// Some element of `collection`, bound as `var`, satisfies `body`.
    fn any(&self, collection: &str, var: &str, body: &str) -> String;

    /// Emptiness test on a string subject.
    fn is_empty(&self, raw: &str, guarded: &str, needs_guard: bool, negate: bool) -> String;

    fn logical(&self, op: LogicalFilterOperator) -> &'static str;

    /// One order-by clause.
    fn order_by(&self, property: &str, descending: bool) -> String;

    fn order_by_separator(&self) -> &'static str;
}

/// Syntax for `dialect`.
pub fn syntax_for(dialect: Dialect) -> &'static dyn Syntax {
    match dialect {
        Dialect::Expression => &ExpressionSyntax,
        Dialect::OData => &ODataSyntax,
    }
}

// ============================================================================
// PLAN WALK
// ============================================================================

/// Renders `plan`. An empty string means "no restriction".
pub fn render(syntax: &dyn Syntax, plan: &Plan) -> String {
    render_plan(syntax, plan).unwrap_or_default()
}

pub fn to_expression(plan: &Plan) -> String {
    render(&ExpressionSyntax, plan)
}

pub fn to_odata(plan: &Plan) -> String {
    render(&ODataSyntax, plan)
}

/// `None` when the node restricts nothing.
fn render_plan(syntax: &dyn Syntax, plan: &Plan) -> Option<String> {
    match plan {
        Plan::Pass => None,

        Plan::Condition(condition) => render_condition(syntax, condition),

        Plan::Logical { op, children } => {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                match (render_plan(syntax, child), op) {
                    (Some(text), _) => {
                        let wrapped = matches!(child, Plan::Logical { .. });
                        parts.push(if wrapped { format!("({})", text) } else { text });
                    }
                    (None, LogicalFilterOperator::And) => {}
                    (None, LogicalFilterOperator::Or) => return None,
                }
            }
            match parts.len() {
                0 => None,
                1 => parts.pop(),
                _ => Some(parts.join(syntax.logical(*op))),
            }
        }

        Plan::AnyElement { collection, var, body } => {
            let Some(access) = syntax.path(None, collection) else {
                return unexpressible(collection);
            };
            let body = render_plan(syntax, body)?;
            Some(syntax.any(&access, var, &body))
        }

        Plan::Custom { text, .. } => Some(format!("({})", text)),
    }
}

fn render_condition(syntax: &dyn Syntax, condition: &Condition) -> Option<String> {
    let subject = &condition.subject;
    let root = match &subject.scope {
        Scope::Item => None,
        Scope::Element(var) => Some(var.as_str()),
    };
    let Some(raw) = syntax.path(root, &subject.path) else {
        return unexpressible(&subject.path);
    };
    let needs_guard = subject.path.needs_guard();
    let guarded = if needs_guard {
        syntax.guard(raw.clone(), &subject.path)
    } else {
        raw.clone()
    };
    let fold = |operand: String| {
        if condition.case_insensitive {
            syntax.lower(operand)
        } else {
            operand
        }
    };
    let operand = condition.operand();
    let literal = syntax.literal(&operand);
    let negate_if = |text: String, negate: bool| if negate { syntax.not(text) } else { text };

    let spell_out = needs_guard && !syntax.coalesces();
    let text = match condition.test {
        Test::Compare(op) => {
            let test = syntax.compare(&fold(guarded), op, &literal);
            if spell_out {
                spell_out_null(syntax, condition, &raw, test)
            } else {
                test
            }
        }

        Test::Text { op, negate } => {
            let test = negate_if(syntax.text(op, &fold(guarded), &literal), negate);
            if spell_out {
                spell_out_null(syntax, condition, &raw, test)
            } else {
                test
            }
        }

        Test::IsNull => syntax.compare(&raw, CompareOp::Eq, &syntax.literal(&Value::Null)),
        Test::IsNotNull => syntax.compare(&raw, CompareOp::Ne, &syntax.literal(&Value::Null)),
        Test::IsEmpty => syntax.is_empty(&raw, &guarded, needs_guard, false),
        Test::IsNotEmpty => syntax.is_empty(&raw, &guarded, needs_guard, true),

        Test::InSet { negate } => {
            let test = negate_if(syntax.in_set(&fold(guarded), &operand), negate);
            if spell_out {
                spell_out_null(syntax, condition, &raw, test)
            } else {
                test
            }
        }

        Test::Has { negate } => {
            let var = subject.lambda_var();
            let element = fold(var.to_string());
            let body = syntax.compare(&element, CompareOp::Eq, &literal);
            negate_if(syntax.any(&raw, var, &body), negate)
        }

        Test::Intersects { negate } => {
            let var = subject.lambda_var();
            let body = syntax.in_set(&fold(var.to_string()), &operand);
            negate_if(syntax.any(&raw, var, &body), negate)
        }
    };
    Some(text)
}

/// A dialect without coalescing tests a null subject raw. Where the raw
/// null and the guard default disagree on `test`, the null case is written
/// out so the text selects what the guarded predicate selects.
fn spell_out_null(syntax: &dyn Syntax, condition: &Condition, raw: &str, test: String) -> String {
    let Some(default) = condition.subject.path.value_type.guard_default() else {
        return test;
    };
    let holds = |subject: Value| {
        scalar_test(condition, Expr::Literal(subject)).map_or(false, |expr| expr.test(&Value::Null))
    };
    let null_check = |op: CompareOp| syntax.compare(raw, op, &syntax.literal(&Value::Null));
    match (holds(default), holds(Value::Null)) {
        (true, false) => format!(
            "({}{}{})",
            null_check(CompareOp::Eq),
            syntax.logical(LogicalFilterOperator::Or),
            test
        ),
        (false, true) => format!(
            "({}{}{})",
            null_check(CompareOp::Ne),
            syntax.logical(LogicalFilterOperator::And),
            test
        ),
        _ => test,
    }
}

fn unexpressible(path: &ResolvedPath) -> Option<String> {
    crate::log_warn!(
        "SERIALIZE",
        "path '{}' cannot be written in this dialect; condition omitted",
        path.path
    );
    None
}

// ============================================================================
// PUBLIC ENTRY POINTS
// ============================================================================

/// Renders a flat filter list in `dialect`.
pub fn serialize_filters(
    dialect: Dialect,
    item_type: &ValueType,
    filters: &[FilterDescriptor],
    combinator: LogicalFilterOperator,
    case: CaseSensitivity,
) -> Result<String> {
    let plan = build_plan(item_type, filters, combinator, case)?;
    let text = render(syntax_for(dialect), &plan);
    log_debug!("SERIALIZE", "{:?} filter: {}", dialect, text);
    Ok(text)
}

/// Renders a composite filter tree in `dialect`.
pub fn serialize_composite(
    dialect: Dialect,
    item_type: &ValueType,
    filter: &CompositeFilterDescriptor,
    case: CaseSensitivity,
) -> Result<String> {
    let plan = build_composite_plan(item_type, filter, case)?;
    let text = render(syntax_for(dialect), &plan);
    log_debug!("SERIALIZE", "{:?} composite filter: {}", dialect, text);
    Ok(text)
}

/// Renders an order-by clause. Unsorted descriptors are skipped.
pub fn serialize_sorts(dialect: Dialect, sorts: &[SortDescriptor]) -> String {
    let syntax = syntax_for(dialect);
    sorts
        .iter()
        .filter_map(|sort| {
            sort.sort_order
                .map(|order| syntax.order_by(&sort.property, order == crate::descriptor::SortOrder::Descending))
        })
        .collect::<Vec<_>>()
        .join(syntax.order_by_separator())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FilterOperator;
    use crate::schema::ObjectType;

    fn person() -> ValueType {
        ValueType::Object(
            ObjectType::class("Person")
                .property("Name", ValueType::String)
                .property("Age", ValueType::Int)
                .property("Lines", ValueType::list(ValueType::Int))
                .build(),
        )
    }

    fn both(filters: &[FilterDescriptor], combinator: LogicalFilterOperator) -> (String, String) {
        let case = CaseSensitivity::Default;
        (
            serialize_filters(Dialect::Expression, &person(), filters, combinator, case).unwrap(),
            serialize_filters(Dialect::OData, &person(), filters, combinator, case).unwrap(),
        )
    }

    #[test]
    fn no_filters_render_empty() {
        assert_eq!(both(&[], LogicalFilterOperator::And), (String::new(), String::new()));
    }

    #[test]
    fn two_value_filters_are_parenthesized() {
        let filters = [
            FilterDescriptor::new("Age", FilterOperator::GreaterThanOrEquals, 18)
                .with_second(FilterOperator::LessThan, 65),
            FilterDescriptor::new("Name", FilterOperator::Equals, "Bob"),
        ];
        let (expression, odata) = both(&filters, LogicalFilterOperator::Or);
        assert_eq!(expression, r#"(it.Age >= 18 && it.Age < 65) || (it.Name ?? "") == "Bob""#);
        assert_eq!(odata, "(Age ge 18 and Age lt 65) or Name eq 'Bob'");
    }

    #[test]
    fn null_case_is_spelled_out_where_the_default_differs() {
        let equals_empty = [FilterDescriptor::new("Name", FilterOperator::Equals, "")];
        let (expression, odata) = both(&equals_empty, LogicalFilterOperator::And);
        assert_eq!(expression, r#"(it.Name ?? "") == """#);
        assert_eq!(odata, "(Name eq null or Name eq '')");

        let not_empty = [FilterDescriptor::new("Name", FilterOperator::NotEquals, "")];
        assert_eq!(both(&not_empty, LogicalFilterOperator::And).1, "(Name ne null and Name ne '')");

        let not_bob = [FilterDescriptor::new("Name", FilterOperator::NotEquals, "Bob")];
        assert_eq!(both(&not_bob, LogicalFilterOperator::And).1, "Name ne 'Bob'");

        let below = [FilterDescriptor::new("Name", FilterOperator::LessThan, "b")];
        assert_eq!(both(&below, LogicalFilterOperator::And).1, "(Name eq null or Name lt 'b')");

        let prefix = [FilterDescriptor::new("Name", FilterOperator::StartsWith, "B")];
        assert_eq!(both(&prefix, LogicalFilterOperator::And).1, "startswith(Name,'B')");
    }

    #[test]
    fn custom_text_is_verbatim() {
        let filters = [FilterDescriptor::custom("Age", "it.Age > 3")];
        let (expression, odata) = both(&filters, LogicalFilterOperator::And);
        assert_eq!(expression, "(it.Age > 3)");
        assert_eq!(odata, "(it.Age > 3)");
    }

    #[test]
    fn positional_paths_are_omitted_from_odata() {
        let filters = [
            FilterDescriptor::new("Lines[0]", FilterOperator::Equals, 4),
            FilterDescriptor::new("Age", FilterOperator::Equals, 3),
        ];
        let (expression, odata) = both(&filters, LogicalFilterOperator::And);
        assert_eq!(expression, "it.Lines[0] == 4 && it.Age == 3");
        assert_eq!(odata, "Age eq 3");
    }

    #[test]
    fn order_by_per_dialect() {
        let sorts = [
            SortDescriptor::ascending("Name"),
            SortDescriptor {
                property: "Age".to_string(),
                sort_order: None,
            },
            SortDescriptor::descending("Address.City"),
        ];
        assert_eq!(
            serialize_sorts(Dialect::Expression, &sorts),
            "it.Name asc, it.Address.City desc"
        );
        assert_eq!(serialize_sorts(Dialect::OData, &sorts), "Name asc,Address/City desc");
    }
}
