//! FILENAME: pivot-engine/src/aggregate.rs
//! Aggregate functions over the value-field property of a set of items.

use std::cmp::Ordering;

use query_engine::{resolve, Expr, Value, ValueType};

use crate::definition::{AggregateFunction, ValueField};
use crate::error::Result;

/// A value field compiled against the item schema.
#[derive(Debug, Clone)]
pub struct Aggregator {
    access: Expr,
    value_type: ValueType,
    function: AggregateFunction,
}

impl Aggregator {
    pub fn compile(item_type: &ValueType, field: &ValueField) -> Result<Self> {
        let path = resolve(item_type, &field.property)?;
        Ok(Aggregator {
            access: path.access(Expr::Item),
            value_type: path.value_type,
            function: field.aggregate,
        })
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    /// Aggregates over `items`. Empty input yields `Null`, except `Count`.
    pub fn apply<'a, I>(&self, items: I) -> Value
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let values: Vec<Value> = items.into_iter().map(|item| self.access.evaluate(item)).collect();
        let function = self.effective_function(&values);
        aggregate(function, &values)
    }

    /// `Sum` and `Average` over non-numeric data count instead.
    fn effective_function(&self, values: &[Value]) -> AggregateFunction {
        if !self.function.is_numeric() {
            return self.function;
        }
        let numeric = if self.value_type.is_dynamic() {
            values.iter().filter(|v| !v.is_null()).all(Value::is_numeric)
        } else {
            self.value_type.is_numeric()
        };
        if numeric {
            self.function
        } else {
            AggregateFunction::Count
        }
    }
}

/// Applies `function` to already extracted values.
pub fn aggregate(function: AggregateFunction, values: &[Value]) -> Value {
    if function == AggregateFunction::Count {
        return Value::Int(values.len() as i64);
    }
    if values.is_empty() {
        return Value::Null;
    }

    match function {
        AggregateFunction::Sum => sum(values),
        AggregateFunction::Average => {
            let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        AggregateFunction::Min => extreme(values, Ordering::Less),
        AggregateFunction::Max => extreme(values, Ordering::Greater),
        AggregateFunction::First => values[0].clone(),
        AggregateFunction::Last => values[values.len() - 1].clone(),
        AggregateFunction::Count => Value::Int(values.len() as i64),
    }
}

/// Integer sums stay integers unless they overflow; anything else sums as floats.
fn sum(values: &[Value]) -> Value {
    let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    if present.is_empty() {
        return Value::Null;
    }
    if present.iter().all(|v| matches!(v, Value::Int(_))) {
        let total = present.iter().try_fold(0i64, |acc, v| match v {
            Value::Int(n) => acc.checked_add(*n),
            _ => Some(acc),
        });
        if let Some(total) = total {
            return Value::Int(total);
        }
    }
    Value::Float(present.iter().filter_map(|v| v.as_f64()).sum())
}

/// Smallest (`Less`) or largest (`Greater`) non-null value.
fn extreme(values: &[Value], wanted: Ordering) -> Value {
    values
        .iter()
        .filter(|v| !v.is_null())
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if v.total_cmp(b) != wanted => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}
