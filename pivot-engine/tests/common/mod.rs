//! FILENAME: tests/common/mod.rs
//! Sales fixtures shared by the pivot integration tests.

#![allow(dead_code)]

use query_engine::{record, GroupPath, ObjectType, Value, ValueType};

// ============================================================================
// SALES FIXTURE
// ============================================================================

/// Sample sales data for pivot table testing.
pub struct SalesFixture;

impl SalesFixture {
    pub fn regions() -> Vec<&'static str> {
        vec!["North", "South", "East", "West"]
    }

    pub fn products() -> Vec<&'static str> {
        vec!["Widget", "Gadget", "Gizmo"]
    }

    pub fn years() -> Vec<i64> {
        vec![2022, 2023, 2024]
    }

    pub fn item_type() -> ValueType {
        ValueType::Object(
            ObjectType::class("Sale")
                .property("Region", ValueType::String)
                .property("Product", ValueType::String)
                .property("Year", ValueType::Int)
                .property("Amount", ValueType::Float)
                .property("Units", ValueType::Int)
                .build(),
        )
    }

    /// Region, product, year, amount, units. Two rows per combination.
    pub fn data() -> Vec<(&'static str, &'static str, i64, f64, i64)> {
        let mut rows = Vec::new();
        let mut seed = 0i64;
        for region in Self::regions() {
            for product in Self::products() {
                for year in Self::years() {
                    for _ in 0..2 {
                        seed += 1;
                        let amount = 1000.0 + ((seed * 37) % 500) as f64 + 0.25;
                        rows.push((region, product, year, amount, seed % 7 + 1));
                    }
                }
            }
        }
        rows
    }

    pub fn records() -> Vec<Value> {
        Self::data()
            .into_iter()
            .map(|(region, product, year, amount, units)| {
                record([
                    ("Region", Value::from(region)),
                    ("Product", Value::from(product)),
                    ("Year", Value::Int(year)),
                    ("Amount", Value::Float(amount)),
                    ("Units", Value::Int(units)),
                ])
            })
            .collect()
    }

    /// Sum of `Amount` over the rows accepted by `keep`.
    pub fn amount_where<F>(keep: F) -> f64
    where
        F: Fn(&str, &str, i64) -> bool,
    {
        Self::data()
            .into_iter()
            .filter(|(region, product, year, _, _)| keep(region, product, *year))
            .map(|(_, _, _, amount, _)| amount)
            .sum()
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

pub fn path(keys: &[Value]) -> GroupPath {
    GroupPath::from_keys(keys.iter().cloned())
}

/// Assert that a value is a float within rounding of `expected`.
pub fn assert_amount(value: Option<&Value>, expected: f64) {
    match value {
        Some(Value::Float(actual)) => assert!(
            (actual - expected).abs() < 1e-6,
            "Expected {}, got {}",
            expected,
            actual
        ),
        other => panic!("Expected a float amount {}, got {:?}", expected, other),
    }
}
