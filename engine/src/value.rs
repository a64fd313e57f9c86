//! FILENAME: engine/src/value.rs
//! PURPOSE: Dynamic value model for queried items, filter operands and group keys.
//! CONTEXT: Every item flowing through the engine is a `Value` (usually an
//! `Object` record). Two notions of equality exist:
//! - structural (`PartialEq`/`Eq`/`Hash`) used for group keys and paths;
//! - loose (`loose_eq`/`compare`) used when evaluating filters, where numbers
//!   compare across Int/Float/Enum and enums also match their member name.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::schema::ValueType;

/// A string-keyed record: the dictionary-like item shape.
pub type Record = BTreeMap<String, Value>;

/// An enum member carried with its underlying number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Guid(Uuid),
    Enum(EnumValue),
    List(Vec<Value>),
    Object(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view of Int, Float and Enum values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Enum(e) => Some(e.value as f64),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Reads a member of a record; `None` when absent or not a record.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(record) => record.get(name),
            _ => None,
        }
    }

    /// Takes a member out of an owned record.
    pub fn into_member(self, name: &str) -> Value {
        match self {
            Value::Object(mut record) => record.remove(name).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Reads a list element by position.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Value::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Lower-cases strings, including strings inside lists.
    pub fn to_lowercase(&self) -> Value {
        match self {
            Value::String(s) => Value::String(s.to_lowercase()),
            Value::List(items) => Value::List(items.iter().map(Value::to_lowercase).collect()),
            other => other.clone(),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) | Value::Enum(_) => 2,
            Value::String(_) => 3,
            Value::DateTime(_) | Value::Date(_) => 4,
            Value::Guid(_) => 5,
            Value::List(_) => 6,
            Value::Object(_) => 7,
        }
    }

    fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            _ => None,
        }
    }

    /// Filter equality. Null equals only null.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Enum(e), Value::String(s)) | (Value::String(s), Value::Enum(e)) => {
                e.name.eq_ignore_ascii_case(s)
            }
            (Value::Guid(g), Value::String(s)) | (Value::String(s), Value::Guid(g)) => {
                Uuid::parse_str(s).map(|parsed| parsed == *g).unwrap_or(false)
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb))
            }
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    /// Filter ordering. `None` when either side is null or the kinds are
    /// not comparable, which makes every relational test false.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            _ => {
                if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                    return a.partial_cmp(&b);
                }
                if let (Some(a), Some(b)) = (self.as_datetime(), other.as_datetime()) {
                    return Some(a.cmp(&b));
                }
                None
            }
        }
    }

    /// Total ordering for sorting: nulls first, then by kind, then by value.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        if let Some(ordering) = self.compare(other) {
            return ordering;
        }
        let by_kind = self.kind_rank().cmp(&other.kind_rank());
        if by_kind != Ordering::Equal {
            return by_kind;
        }
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ordering = x.total_cmp(y);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Equal,
        }
    }

    /// Converts a stored or decoded value to the exact target type.
    /// Values that cannot be converted are returned unchanged.
    pub fn coerce_to(&self, target: &ValueType) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match target {
            ValueType::Nullable(inner) => self.coerce_to(inner),
            ValueType::Dynamic => self.clone(),
            ValueType::Int => match self {
                Value::Float(f) if f.fract() == 0.0 => Value::Int(*f as i64),
                Value::Enum(e) => Value::Int(e.value),
                Value::String(s) => s.trim().parse().map(Value::Int).unwrap_or_else(|_| self.clone()),
                _ => self.clone(),
            },
            ValueType::Float => match self {
                Value::Int(n) => Value::Float(*n as f64),
                Value::String(s) => s.trim().parse().map(Value::Float).unwrap_or_else(|_| self.clone()),
                _ => self.clone(),
            },
            ValueType::String => match self {
                Value::String(_) | Value::List(_) | Value::Object(_) => self.clone(),
                other => Value::String(other.to_string()),
            },
            ValueType::Bool => match self {
                Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
                _ => self.clone(),
            },
            ValueType::DateTime => match self {
                Value::Date(d) => Value::DateTime(d.and_time(NaiveTime::MIN)),
                Value::String(s) => parse_datetime(s)
                    .map(Value::DateTime)
                    .unwrap_or_else(|| self.clone()),
                _ => self.clone(),
            },
            ValueType::Date => match self {
                Value::DateTime(dt) => Value::Date(dt.date()),
                Value::String(s) => parse_date(s)
                    .or_else(|| parse_datetime(s).map(|dt| dt.date()))
                    .map(Value::Date)
                    .unwrap_or_else(|| self.clone()),
                _ => self.clone(),
            },
            ValueType::Guid => match self {
                Value::String(s) => Uuid::parse_str(s.trim())
                    .map(Value::Guid)
                    .unwrap_or_else(|_| self.clone()),
                _ => self.clone(),
            },
            ValueType::Enum(enum_type) => {
                let member = match self {
                    Value::Int(n) => enum_type.by_value(*n),
                    Value::Float(f) if f.fract() == 0.0 => enum_type.by_value(*f as i64),
                    Value::String(s) => enum_type.by_name(s).or_else(|| {
                        s.trim().parse().ok().and_then(|n| enum_type.by_value(n))
                    }),
                    Value::Enum(e) => enum_type.by_value(e.value),
                    _ => None,
                };
                match member {
                    Some((name, value)) => Value::Enum(EnumValue {
                        name: name.to_string(),
                        value,
                    }),
                    None => self.clone(),
                }
            }
            ValueType::List(element) => match self {
                Value::List(items) => Value::List(items.iter().map(|v| v.coerce_to(element)).collect()),
                _ => self.clone(),
            },
            ValueType::Object(object_type) => match self {
                Value::Object(record) => {
                    let mut coerced = record.clone();
                    for prop in object_type.all_properties() {
                        if let Some(value) = coerced.get_mut(&prop.name) {
                            *value = value.coerce_to(&prop.value_type);
                        }
                    }
                    Value::Object(coerced)
                }
                _ => self.clone(),
            },
        }
    }

    /// Builds a record from any serializable item, then coerces it to `item_type`
    /// so dates, GUIDs and enums regain their typed form.
    pub fn from_serialize<T: Serialize>(item: &T, item_type: &ValueType) -> Result<Value, serde_json::Error> {
        let json = serde_json::to_value(item)?;
        Ok(Value::from(json).coerce_to(item_type))
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::DateTime(dt) => Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::Guid(g) => Json::String(g.to_string()),
            Value::Enum(e) => Json::String(e.name.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(record) => Json::Object(
                record
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Parses ISO date-times with or without an offset. Offsets are normalized to UTC.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    parse_date(text).map(|d| d.and_time(NaiveTime::MIN))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Value::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::DateTime(dt) => {
                0u8.hash(state);
                dt.hash(state);
            }
            Value::Date(d) => {
                1u8.hash(state);
                d.hash(state);
            }
            Value::Guid(g) => g.hash(state),
            Value::Enum(e) => {
                2u8.hash(state);
                e.hash(state);
            }
            Value::List(items) => items.hash(state),
            Value::Object(record) => record.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Guid(g) => write!(f, "{}", g),
            Value::Enum(e) => write!(f, "{}", e.name),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<Uuid> for Value {
    fn from(g: Uuid) -> Self {
        Value::Guid(g)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Builds an `Object` record from `(name, value)` pairs.
pub fn record<K, V, I>(fields: I) -> Value
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    Value::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EnumType;

    #[test]
    fn numbers_compare_across_kinds() {
        assert!(Value::Int(3).loose_eq(&Value::Float(3.0)));
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_ne!(Value::Int(3), Value::Float(3.0));
    }

    #[test]
    fn null_only_equals_null() {
        assert!(Value::Null.loose_eq(&Value::Null));
        assert!(!Value::Null.loose_eq(&Value::Int(0)));
        assert_eq!(Value::Null.compare(&Value::Int(0)), None);
    }

    #[test]
    fn enums_match_numbers_and_names() {
        let active = Value::Enum(EnumValue {
            name: "Active".to_string(),
            value: 1,
        });
        assert!(active.loose_eq(&Value::Int(1)));
        assert!(active.loose_eq(&Value::from("active")));
        assert_eq!(active.compare(&Value::Int(0)), Some(Ordering::Greater));
    }

    #[test]
    fn total_cmp_sorts_nulls_first() {
        let mut values = vec![Value::from("b"), Value::Null, Value::Int(5), Value::from("a")];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![Value::Null, Value::Int(5), Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn coerces_json_numbers_to_target_type() {
        let json = Value::from(serde_json::json!(42));
        assert_eq!(json.coerce_to(&ValueType::Float), Value::Float(42.0));
        assert_eq!(Value::Float(7.0).coerce_to(&ValueType::Int), Value::Int(7));
        assert_eq!(
            Value::Float(7.5).coerce_to(&ValueType::nullable(ValueType::Int)),
            Value::Float(7.5)
        );
    }

    #[test]
    fn coerces_strings_to_dates_guids_and_enums() {
        let date = Value::from("2024-01-31").coerce_to(&ValueType::Date);
        assert_eq!(date, Value::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));

        let dt = Value::from("2024-01-31T10:30:00Z").coerce_to(&ValueType::DateTime);
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(dt, Value::DateTime(expected));

        let guid = Value::from("6f9619ff-8b86-d011-b42d-00cf4fc964ff").coerce_to(&ValueType::Guid);
        assert!(matches!(guid, Value::Guid(_)));

        let status = EnumType::new("Status", &[("Draft", 0), ("Active", 1)]);
        let coerced = Value::Int(1).coerce_to(&ValueType::Enum(status));
        assert_eq!(
            coerced,
            Value::Enum(EnumValue {
                name: "Active".to_string(),
                value: 1
            })
        );
    }

    #[test]
    fn json_round_trip_keeps_records() {
        let item = record([("Name", Value::from("Anna")), ("Age", Value::Int(30))]);
        let json = serde_json::to_string(&item).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
