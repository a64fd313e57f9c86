//! FILENAME: engine/src/predicate.rs
//! PURPOSE: Compiles filter plans into executable predicates.
//! CONTEXT: The in-memory half of the filter pipeline. The expression shapes
//! built here mirror the text the expression serializer writes, so parsing
//! that text back yields an equivalent tree.

use query_parser::Dialect;

use crate::descriptor::{CaseSensitivity, CompositeFilterDescriptor, FilterDescriptor, LogicalFilterOperator};
use crate::error::{QueryError, Result};
use crate::expr::{CompareOp, Expr, TextOp};
use crate::log_debug;
use crate::plan::{build_composite_plan, build_plan, Condition, Plan, Scope, Test};
use crate::schema::ValueType;
use crate::text::lower_text;
use crate::value::Value;

/// A compiled boolean test over one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Expr,
}

impl Predicate {
    /// The no-op filter.
    pub fn always() -> Self {
        Predicate {
            expr: Expr::Literal(Value::Bool(true)),
        }
    }

    pub fn from_expr(expr: Expr) -> Self {
        Predicate { expr }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn is_always(&self) -> bool {
        self.expr.is_true_literal()
    }

    pub fn matches(&self, item: &Value) -> bool {
        self.is_always() || self.expr.test(item)
    }

    /// Items that satisfy the predicate, in input order.
    pub fn filter<'s, 'a: 's>(&'s self, items: &'a [Value]) -> impl Iterator<Item = &'a Value> + 's {
        items.iter().filter(move |item| self.matches(item))
    }

    /// Conjunction with another predicate.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self.is_always(), other.is_always()) {
            (true, _) => other,
            (_, true) => self,
            _ => Predicate {
                expr: Expr::and(self.expr, other.expr),
            },
        }
    }
}

/// Compiles a flat filter list into one predicate.
pub fn compile(
    item_type: &ValueType,
    filters: &[FilterDescriptor],
    combinator: LogicalFilterOperator,
    case: CaseSensitivity,
) -> Result<Predicate> {
    let plan = build_plan(item_type, filters, combinator, case)?;
    compile_plan(item_type, &plan)
}

/// Compiles a composite filter tree into one predicate.
pub fn compile_composite(
    item_type: &ValueType,
    filter: &CompositeFilterDescriptor,
    case: CaseSensitivity,
) -> Result<Predicate> {
    let plan = build_composite_plan(item_type, filter, case)?;
    compile_plan(item_type, &plan)
}

pub fn compile_plan(item_type: &ValueType, plan: &Plan) -> Result<Predicate> {
    let expr = lower_plan(item_type, plan)?;
    log_debug!("FILTER", "compiled predicate over {}: {} condition(s)", item_type, plan.condition_count());
    Ok(Predicate { expr })
}

fn lower_plan(item_type: &ValueType, plan: &Plan) -> Result<Expr> {
    match plan {
        Plan::Pass => Ok(Expr::Literal(Value::Bool(true))),

        Plan::Condition(condition) => Ok(lower_condition(condition)),

        Plan::Logical { op, children } => {
            let mut lowered = children.iter().map(|child| lower_plan(item_type, child));
            let first = match lowered.next() {
                Some(first) => first?,
                None => return Ok(Expr::Literal(Value::Bool(true))),
            };
            lowered.try_fold(first, |acc, next| {
                let next = next?;
                Ok(match op {
                    LogicalFilterOperator::And => Expr::and(acc, next),
                    LogicalFilterOperator::Or => Expr::or(acc, next),
                })
            })
        }

        Plan::AnyElement { collection, var, body } => Ok(Expr::Any {
            collection: Box::new(collection.access(Expr::Item)),
            var: var.clone(),
            body: Some(Box::new(lower_plan(item_type, body)?)),
        }),

        Plan::Custom { property, text } => {
            lower_text(text, Dialect::Expression, item_type).map_err(|source| QueryError::CustomExpression {
                property: property.clone(),
                source: Box::new(source),
            })
        }
    }
}

fn lower_condition(condition: &Condition) -> Expr {
    let subject = &condition.subject;
    let root = match &subject.scope {
        Scope::Item => Expr::Item,
        Scope::Element(var) => Expr::Var(var.clone()),
    };
    let raw = subject.path.access(root.clone());
    let guarded = subject.path.guarded(root);
    let case_insensitive = condition.case_insensitive;
    let fold = |expr: Expr| {
        if case_insensitive {
            Expr::lower(expr)
        } else {
            expr
        }
    };
    let operand = Expr::Literal(condition.operand());

    match condition.test {
        Test::Compare(_) | Test::Text { .. } | Test::InSet { .. } => {
            scalar_test(condition, guarded).unwrap_or_else(|| Expr::Literal(Value::Bool(true)))
        }

        Test::IsNull => Expr::compare(raw, CompareOp::Eq, Expr::Literal(Value::Null)),
        Test::IsNotNull => Expr::compare(raw, CompareOp::Ne, Expr::Literal(Value::Null)),
        Test::IsEmpty => Expr::compare(guarded, CompareOp::Eq, Expr::literal("")),
        Test::IsNotEmpty => Expr::compare(guarded, CompareOp::Ne, Expr::literal("")),

        Test::Has { negate } => {
            let var = subject.lambda_var();
            let test = Expr::Any {
                collection: Box::new(raw),
                var: var.to_string(),
                body: Some(Box::new(Expr::compare(
                    fold(Expr::Var(var.to_string())),
                    CompareOp::Eq,
                    operand,
                ))),
            };
            negate_if(test, negate)
        }

        Test::Intersects { negate } => {
            let var = subject.lambda_var();
            let test = Expr::Any {
                collection: Box::new(raw),
                var: var.to_string(),
                body: Some(Box::new(Expr::text(
                    TextOp::Contains,
                    operand,
                    fold(Expr::Var(var.to_string())),
                ))),
            };
            negate_if(test, negate)
        }
    }
}

/// The comparison, text or set test of `condition` applied to `subject`.
/// `None` for null, emptiness and collection tests.
pub(crate) fn scalar_test(condition: &Condition, subject: Expr) -> Option<Expr> {
    let subject = if condition.case_insensitive {
        Expr::lower(subject)
    } else {
        subject
    };
    let operand = Expr::Literal(condition.operand());
    match condition.test {
        Test::Compare(op) => Some(Expr::compare(subject, op, operand)),
        Test::Text { op, negate } => Some(negate_if(Expr::text(op, subject, operand), negate)),
        Test::InSet { negate } => Some(negate_if(Expr::text(TextOp::Contains, operand, subject), negate)),
        _ => None,
    }
}

fn negate_if(expr: Expr, negate: bool) -> Expr {
    if negate {
        Expr::not(expr)
    } else {
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FilterOperator;
    use crate::schema::ObjectType;
    use crate::value::record;

    fn person_type() -> ValueType {
        let order = ObjectType::class("Order")
            .property("Total", ValueType::Float)
            .build();
        ValueType::Object(
            ObjectType::class("Person")
                .property("Name", ValueType::nullable(ValueType::String))
                .property("Age", ValueType::Int)
                .property("Tags", ValueType::list(ValueType::String))
                .property("Orders", ValueType::list(ValueType::Object(order)))
                .build(),
        )
    }

    fn people() -> Vec<Value> {
        vec![
            record([
                ("Name", Value::from("Anna")),
                ("Age", Value::Int(25)),
                ("Tags", Value::from(vec!["VIP"])),
                ("Orders", Value::List(vec![record([("Total", Value::Float(50.0))])])),
            ]),
            record([
                ("Name", Value::Null),
                ("Age", Value::Int(35)),
                ("Tags", Value::from(Vec::<String>::new())),
                ("Orders", Value::List(vec![record([("Total", Value::Float(150.0))])])),
            ]),
            record([
                ("Name", Value::from("ANDY")),
                ("Age", Value::Int(40)),
                ("Tags", Value::from(vec!["new", "vip"])),
                ("Orders", Value::List(vec![])),
            ]),
        ]
    }

    fn ages(filters: &[FilterDescriptor], case: CaseSensitivity) -> Vec<i64> {
        let predicate = compile(&person_type(), filters, LogicalFilterOperator::And, case).unwrap();
        let items = people();
        predicate
            .filter(&items)
            .filter_map(|item| match item.get("Age") {
                Some(Value::Int(n)) => Some(*n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_list_is_always_true() {
        let predicate = compile(&person_type(), &[], LogicalFilterOperator::And, CaseSensitivity::Default).unwrap();
        assert!(predicate.is_always());
    }

    #[test]
    fn null_strings_do_not_throw() {
        let filters = [FilterDescriptor::new("Name", FilterOperator::Contains, "an")];
        assert_eq!(ages(&filters, CaseSensitivity::CaseInsensitive), vec![25, 40]);
        let filters = [FilterDescriptor::new("Name", FilterOperator::DoesNotContain, "an")];
        assert_eq!(ages(&filters, CaseSensitivity::CaseInsensitive), vec![35]);
    }

    #[test]
    fn is_null_uses_unguarded_access() {
        let filters = [FilterDescriptor::new("Name", FilterOperator::IsNull, Value::Null)];
        assert_eq!(ages(&filters, CaseSensitivity::Default), vec![35]);
        let filters = [FilterDescriptor::new("Name", FilterOperator::IsEmpty, Value::Null)];
        assert_eq!(ages(&filters, CaseSensitivity::Default), vec![35]);
    }

    #[test]
    fn collection_membership_respects_case() {
        let filters = [FilterDescriptor::new("Tags", FilterOperator::Contains, "vip")];
        assert_eq!(ages(&filters, CaseSensitivity::Default), vec![40]);
        assert_eq!(ages(&filters, CaseSensitivity::CaseInsensitive), vec![25, 40]);
    }

    #[test]
    fn collection_set_intersection() {
        let filters = [FilterDescriptor::new("Tags", FilterOperator::In, vec!["new", "gold"])];
        assert_eq!(ages(&filters, CaseSensitivity::Default), vec![40]);
        let filters = [FilterDescriptor::new("Tags", FilterOperator::NotIn, vec!["new", "gold"])];
        assert_eq!(ages(&filters, CaseSensitivity::Default), vec![25, 35]);
    }

    #[test]
    fn nested_collection_property_uses_any() {
        let filters = [FilterDescriptor::new("Orders", FilterOperator::GreaterThan, 100).with_filter_property("Total")];
        assert_eq!(ages(&filters, CaseSensitivity::Default), vec![35]);
    }

    #[test]
    fn second_value_with_or() {
        let filters = [FilterDescriptor::new("Age", FilterOperator::LessThan, 30)
            .with_second(FilterOperator::GreaterThan, 38)
            .with_logic(LogicalFilterOperator::Or)];
        assert_eq!(ages(&filters, CaseSensitivity::Default), vec![25, 40]);
    }

    #[test]
    fn custom_expression_is_parsed() {
        let filters = [FilterDescriptor::custom("Age", "it.Age >= 35 && it.Age < 40")];
        assert_eq!(ages(&filters, CaseSensitivity::Default), vec![35]);
    }

    #[test]
    fn broken_custom_expression_reports_property() {
        let filters = [FilterDescriptor::custom("Age", "it.Age >")];
        let err = compile(&person_type(), &filters, LogicalFilterOperator::And, CaseSensitivity::Default).unwrap_err();
        assert!(matches!(err, QueryError::CustomExpression { ref property, .. } if property == "Age"));
    }
}
