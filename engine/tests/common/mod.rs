//! FILENAME: tests/common/mod.rs
//! Shared schema and record fixtures for query-engine integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use query_engine::{record, EnumType, ObjectType, Value, ValueType};

// ============================================================================
// CUSTOMER FIXTURE
// ============================================================================

pub struct CustomerFixture;

impl CustomerFixture {
    pub const COUNT: usize = 100;

    pub fn countries() -> Vec<(&'static str, [&'static str; 3])> {
        vec![
            ("Norway", ["Oslo", "Bergen", "Trondheim"]),
            ("Sweden", ["Stockholm", "Gothenburg", "Malmo"]),
            ("Denmark", ["Copenhagen", "Aarhus", "Odense"]),
            ("Finland", ["Helsinki", "Espoo", "Tampere"]),
        ]
    }

    pub fn item_type() -> ValueType {
        let status = EnumType::new("Status", &[("Prospect", 0), ("Active", 1), ("Churned", 2)]);
        let order = ObjectType::class("Order")
            .property("Total", ValueType::Float)
            .property("Placed", ValueType::DateTime)
            .build();
        ValueType::Object(
            ObjectType::class("Customer")
                .property("Id", ValueType::Int)
                .property("Name", ValueType::String)
                .property("Age", ValueType::Int)
                .property("Email", ValueType::nullable(ValueType::String))
                .property("Country", ValueType::String)
                .property("City", ValueType::String)
                .property("Status", ValueType::Enum(status))
                .property("Joined", ValueType::DateTime)
                .property("Tags", ValueType::list(ValueType::String))
                .property("Orders", ValueType::list(ValueType::Object(order)))
                .build(),
        )
    }

    /// Deterministic customers spread over four countries and twelve cities.
    pub fn records() -> Vec<Value> {
        let first = ["Anna", "bob", "ANDY", "Carl", "Dana", "Erik", "Frida", "Gustav", "Hanna", "Ivar"];
        let countries = Self::countries();
        (0..Self::COUNT)
            .map(|i| {
                let (country, cities) = countries[i % countries.len()];
                let city = cities[(i / countries.len() + i / 7) % cities.len()];
                let email = match i % 9 {
                    0 => Value::Null,
                    4 => Value::from(""),
                    _ => Value::from(format!("c{}@example.com", i)),
                };
                let mut tags = Vec::new();
                if i % 3 == 0 {
                    tags.push("VIP");
                }
                if i % 5 == 0 {
                    tags.push("newsletter");
                }
                let orders: Vec<Value> = (0..(i % 4))
                    .map(|n| {
                        record([
                            ("Total", Value::Float(((i * 37 + n * 11) % 250) as f64 + 0.5)),
                            ("Placed", Value::DateTime(day(2023, 1 + (n as u32 % 12), 1 + (i as u32 % 28)))),
                        ])
                    })
                    .collect();
                record([
                    ("Id", Value::from(i as i64)),
                    ("Name", Value::from(format!("{} {}", first[i % first.len()], i))),
                    ("Age", Value::from(18 + ((i * 7) % 60) as i64)),
                    ("Email", email),
                    ("Country", Value::from(country)),
                    ("City", Value::from(city)),
                    ("Status", Value::from((i % 3) as i64)),
                    ("Joined", Value::DateTime(day(2020 + (i % 5) as i32, 1 + (i % 12) as u32, 1 + (i % 28) as u32))),
                    ("Tags", Value::from(tags)),
                    ("Orders", Value::List(orders)),
                ])
                .coerce_to(&Self::item_type())
            })
            .collect()
    }
}

// ============================================================================
// PEOPLE FIXTURE
// ============================================================================

pub fn person_type() -> ValueType {
    ValueType::Object(
        ObjectType::class("Person")
            .property("Name", ValueType::String)
            .property("Age", ValueType::Int)
            .build(),
    )
}

pub fn person(name: &str, age: i64) -> Value {
    record([("Name", Value::from(name)), ("Age", Value::from(age))])
}

pub fn day(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid fixture date")
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Ids of `items`, in order.
pub fn ids<'a, I: IntoIterator<Item = &'a Value>>(items: I) -> Vec<i64> {
    items
        .into_iter()
        .filter_map(|item| match item.get("Id") {
            Some(Value::Int(id)) => Some(*id),
            _ => None,
        })
        .collect()
}

pub fn names<'a, I: IntoIterator<Item = &'a Value>>(items: I) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.get("Name").map(|v| v.to_string()).unwrap_or_default())
        .collect()
}
