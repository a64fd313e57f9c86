//! FILENAME: engine/src/plan.rs
//! PURPOSE: Canonical filter plan built from descriptors.
//! CONTEXT: One intermediate representation feeds the in-memory predicate
//! compiler and both text serializers, so all three agree on which filters
//! are active, how values are typed, and which combinations fail open.
//!
//! A plan leaf is a `Condition`: a subject path, a test and a typed operand.
//! The four subject/operand shapes are distinct tests:
//!   scalar subject  x scalar value -> Compare / Text
//!   scalar subject  x set value    -> InSet
//!   collection      x scalar value -> Has
//!   collection      x set value    -> Intersects

use crate::descriptor::{
    CaseSensitivity, CompositeFilterDescriptor, FilterDescriptor, FilterOperator, LogicalFilterOperator,
};
use crate::error::Result;
use crate::expr::{CompareOp, TextOp};
use crate::resolver::{resolve, ResolvedPath};
use crate::schema::ValueType;
use crate::value::Value;
use crate::{log_debug, log_warn};

/// Lambda variable bound to collection elements.
pub const ELEMENT_VAR: &str = "x";
/// Lambda variable for membership tests nested inside an element scope.
pub const INNER_VAR: &str = "y";

/// Where a subject path starts.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    Item,
    Element(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub scope: Scope,
    pub path: ResolvedPath,
}

impl Subject {
    pub fn is_collection(&self) -> bool {
        self.path.is_collection()
    }

    /// Type compared against the operand: the element type for collections.
    pub fn scalar_type(&self) -> &ValueType {
        if self.is_collection() {
            self.path.value_type.element_type().unwrap_or(&self.path.value_type)
        } else {
            &self.path.value_type
        }
    }

    /// Variable name for a lambda over this subject's elements.
    pub fn lambda_var(&self) -> &'static str {
        match self.scope {
            Scope::Item => ELEMENT_VAR,
            Scope::Element(_) => INNER_VAR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Test {
    Compare(CompareOp),
    Text { op: TextOp, negate: bool },
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
    InSet { negate: bool },
    Has { negate: bool },
    Intersects { negate: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub subject: Subject,
    pub test: Test,
    /// Operand, already coerced to the subject's type. A list for set tests.
    pub value: Value,
    /// Both sides are lower-cased before comparing.
    pub case_insensitive: bool,
}

impl Condition {
    /// The operand as it is compared: lower-cased when case-insensitive.
    pub fn operand(&self) -> Value {
        if self.case_insensitive {
            self.value.to_lowercase()
        } else {
            self.value.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Matches everything: an unsupported combination that failed open.
    Pass,
    Condition(Condition),
    Logical {
        op: LogicalFilterOperator,
        children: Vec<Plan>,
    },
    /// Some element of `collection` satisfies `body`, bound as `var`.
    AnyElement {
        collection: ResolvedPath,
        var: String,
        body: Box<Plan>,
    },
    /// Raw expression text used verbatim.
    Custom { property: String, text: String },
}

impl Plan {
    pub fn is_pass(&self) -> bool {
        matches!(self, Plan::Pass)
    }

    /// Combines plans. AND drops pass-through children; OR with any
    /// pass-through child passes everything.
    pub fn combine(op: LogicalFilterOperator, plans: Vec<Plan>) -> Plan {
        let mut children = Vec::with_capacity(plans.len());
        for plan in plans {
            match (op, plan) {
                (LogicalFilterOperator::And, Plan::Pass) => {}
                (LogicalFilterOperator::Or, Plan::Pass) => return Plan::Pass,
                (_, plan) => children.push(plan),
            }
        }
        match children.len() {
            0 => Plan::Pass,
            1 => children.pop().unwrap_or(Plan::Pass),
            _ => Plan::Logical { op, children },
        }
    }

    /// Number of conditions (including custom clauses) in the plan.
    pub fn condition_count(&self) -> usize {
        match self {
            Plan::Pass => 0,
            Plan::Condition(_) | Plan::Custom { .. } => 1,
            Plan::Logical { children, .. } => children.iter().map(Plan::condition_count).sum(),
            Plan::AnyElement { body, .. } => body.condition_count(),
        }
    }
}

/// Builds the plan for a flat descriptor list combined by `combinator`.
/// Inactive filters are skipped; an empty result is `Plan::Pass`.
pub fn build_plan(
    item_type: &ValueType,
    filters: &[FilterDescriptor],
    combinator: LogicalFilterOperator,
    case: CaseSensitivity,
) -> Result<Plan> {
    let mut plans = Vec::with_capacity(filters.len());
    for filter in filters {
        if let Some(plan) = plan_filter(item_type, filter, case)? {
            plans.push(plan);
        }
    }
    let plan = Plan::combine(combinator, plans);
    log_debug!(
        "FILTER",
        "planned {} filter(s) -> {} condition(s)",
        filters.len(),
        plan.condition_count()
    );
    Ok(plan)
}

/// Builds the plan for a composite filter tree.
pub fn build_composite_plan(
    item_type: &ValueType,
    filter: &CompositeFilterDescriptor,
    case: CaseSensitivity,
) -> Result<Plan> {
    Ok(plan_node(item_type, filter, case)?.unwrap_or(Plan::Pass))
}

/// `Ok(None)` when every leaf below `filter` is inactive.
fn plan_node(
    item_type: &ValueType,
    filter: &CompositeFilterDescriptor,
    case: CaseSensitivity,
) -> Result<Option<Plan>> {
    match filter {
        CompositeFilterDescriptor::Leaf(leaf) => plan_filter(item_type, leaf, case),
        CompositeFilterDescriptor::Group {
            logical_filter_operator,
            filters,
        } => {
            let mut plans = Vec::with_capacity(filters.len());
            for child in filters {
                if let Some(plan) = plan_node(item_type, child, case)? {
                    plans.push(plan);
                }
            }
            if plans.is_empty() {
                return Ok(None);
            }
            Ok(Some(Plan::combine(*logical_filter_operator, plans)))
        }
    }
}

/// Plans one descriptor. `Ok(None)` when the filter is inactive.
pub fn plan_filter(
    item_type: &ValueType,
    filter: &FilterDescriptor,
    case: CaseSensitivity,
) -> Result<Option<Plan>> {
    if filter.filter_operator == FilterOperator::Custom {
        return Ok(filter.custom_text().map(|text| Plan::Custom {
            property: filter.property.clone(),
            text: text.to_string(),
        }));
    }

    let path = resolve(item_type, &filter.property)?;

    if let Some(element_property) = filter.element_property() {
        if let Some(element_type) = path.value_type.element_type().filter(|_| path.is_collection()) {
            let element_path = resolve(element_type, element_property)?;
            let subject = Subject {
                scope: Scope::Element(ELEMENT_VAR.to_string()),
                path: element_path,
            };
            return Ok(plan_pair(&subject, filter, case).map(|body| Plan::AnyElement {
                collection: path,
                var: ELEMENT_VAR.to_string(),
                body: Box::new(body),
            }));
        }
    }

    let subject = Subject {
        scope: Scope::Item,
        path,
    };
    Ok(plan_pair(&subject, filter, case))
}

/// Primary and optional second condition, joined by the filter's own operator.
fn plan_pair(subject: &Subject, filter: &FilterDescriptor, case: CaseSensitivity) -> Option<Plan> {
    let first = plan_condition(subject, filter.filter_operator, &filter.filter_value, case);
    let second = filter
        .second_filter_operator
        .and_then(|op| plan_condition(subject, op, &filter.second_filter_value, case));

    match (first, second) {
        (Some(a), Some(b)) => Some(Plan::combine(filter.logical_filter_operator, vec![a, b])),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn plan_condition(subject: &Subject, op: FilterOperator, raw: &Value, case: CaseSensitivity) -> Option<Plan> {
    if op == FilterOperator::Custom {
        return None;
    }

    let scalar_type = subject.scalar_type().clone();
    let textual = scalar_type.is_string() || scalar_type.is_dynamic();
    let condition = |test: Test, value: Value| {
        let case_insensitive = case == CaseSensitivity::CaseInsensitive && textual && has_text(&value);
        Some(Plan::Condition(Condition {
            subject: subject.clone(),
            test,
            value,
            case_insensitive,
        }))
    };

    if op.is_value_less() {
        let test = match op {
            FilterOperator::IsNull => Test::IsNull,
            FilterOperator::IsNotNull => Test::IsNotNull,
            _ if !textual || subject.is_collection() => {
                return fail_open(subject, op, "empty checks need a string property")
            }
            FilterOperator::IsEmpty => Test::IsEmpty,
            _ => Test::IsNotEmpty,
        };
        return condition(test, Value::Null);
    }

    // Filters without a value (or with an empty value set) are inactive.
    match raw {
        Value::Null => return None,
        Value::List(items) if items.is_empty() => return None,
        _ => {}
    }

    let value = raw.coerce_to(&scalar_type);
    let value = match value {
        Value::List(items) => Value::List(items.iter().map(|v| v.coerce_to(&scalar_type)).collect()),
        other => other,
    };
    let is_set = matches!(value, Value::List(_));
    let is_collection = subject.is_collection();

    let compare = |op: CompareOp| {
        if is_collection || is_set {
            return fail_open(subject, filter_op(op), "comparison needs a scalar property and value");
        }
        let relational = !matches!(op, CompareOp::Eq | CompareOp::Ne);
        if relational && !scalar_type.is_ordered() {
            return fail_open(subject, filter_op(op), "property type is not ordered");
        }
        condition(Test::Compare(op), value.clone())
    };

    match op {
        FilterOperator::Equals => compare(CompareOp::Eq),
        FilterOperator::NotEquals => compare(CompareOp::Ne),
        FilterOperator::LessThan => compare(CompareOp::Lt),
        FilterOperator::LessThanOrEquals => compare(CompareOp::Le),
        FilterOperator::GreaterThan => compare(CompareOp::Gt),
        FilterOperator::GreaterThanOrEquals => compare(CompareOp::Ge),

        FilterOperator::Contains | FilterOperator::DoesNotContain => {
            let negate = op == FilterOperator::DoesNotContain;
            match (is_collection, is_set) {
                (false, false) if textual && matches!(value, Value::String(_)) => condition(
                    Test::Text {
                        op: TextOp::Contains,
                        negate,
                    },
                    value.clone(),
                ),
                (false, false) => fail_open(subject, op, "substring test needs a string property"),
                (false, true) => condition(Test::InSet { negate }, value.clone()),
                (true, false) => condition(Test::Has { negate }, value.clone()),
                (true, true) => condition(Test::Intersects { negate }, value.clone()),
            }
        }

        FilterOperator::StartsWith | FilterOperator::EndsWith => {
            if is_collection || is_set || !textual || !matches!(value, Value::String(_)) {
                return fail_open(subject, op, "prefix/suffix test needs a string property");
            }
            let text_op = if op == FilterOperator::StartsWith {
                TextOp::StartsWith
            } else {
                TextOp::EndsWith
            };
            condition(
                Test::Text {
                    op: text_op,
                    negate: false,
                },
                value.clone(),
            )
        }

        FilterOperator::In | FilterOperator::NotIn => {
            let negate = op == FilterOperator::NotIn;
            let set = if is_set {
                value.clone()
            } else {
                Value::List(vec![value.clone()])
            };
            if is_collection {
                condition(Test::Intersects { negate }, set)
            } else {
                condition(Test::InSet { negate }, set)
            }
        }

        FilterOperator::IsNull
        | FilterOperator::IsNotNull
        | FilterOperator::IsEmpty
        | FilterOperator::IsNotEmpty
        | FilterOperator::Custom => None,
    }
}

fn has_text(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::List(items) => items.iter().any(|v| matches!(v, Value::String(_))),
        _ => false,
    }
}

fn filter_op(op: CompareOp) -> FilterOperator {
    match op {
        CompareOp::Eq => FilterOperator::Equals,
        CompareOp::Ne => FilterOperator::NotEquals,
        CompareOp::Lt => FilterOperator::LessThan,
        CompareOp::Le => FilterOperator::LessThanOrEquals,
        CompareOp::Gt => FilterOperator::GreaterThan,
        CompareOp::Ge => FilterOperator::GreaterThanOrEquals,
    }
}

fn fail_open(subject: &Subject, op: FilterOperator, reason: &str) -> Option<Plan> {
    log_warn!(
        "FILTER",
        "{:?} on '{}' ({}) matches everything: {}",
        op,
        subject.path.path,
        subject.path.value_type,
        reason
    );
    Some(Plan::Pass)
}
