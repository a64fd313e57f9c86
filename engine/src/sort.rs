//! FILENAME: engine/src/sort.rs
//! PURPOSE: Multi-key stable ordering compiled from sort descriptors.
//! CONTEXT: Keys read through the null-guarded path access, so a missing
//! string sorts as "" and a missing number sorts as null (first).

use std::cmp::Ordering;

use crate::descriptor::{SortDescriptor, SortOrder};
use crate::error::Result;
use crate::expr::Expr;
use crate::log_debug;
use crate::resolver::resolve;
use crate::schema::ValueType;
use crate::value::Value;

#[derive(Debug, Clone)]
struct SortKey {
    path: String,
    access: Expr,
    order: SortOrder,
}

/// A compiled ordering. Empty when no descriptor carries a sort order.
#[derive(Debug, Clone, Default)]
pub struct Sorter {
    keys: Vec<SortKey>,
}

impl Sorter {
    /// Compiles `sorts` left to right: the first descriptor is the primary key.
    /// Descriptors without a sort order are skipped.
    pub fn compile(item_type: &ValueType, sorts: &[SortDescriptor]) -> Result<Self> {
        let mut keys = Vec::with_capacity(sorts.len());
        for sort in sorts {
            let Some(order) = sort.sort_order else {
                continue;
            };
            let path = resolve(item_type, &sort.property)?;
            keys.push(SortKey {
                path: path.path.clone(),
                access: path.guarded(Expr::Item),
                order,
            });
        }
        log_debug!(
            "SORT",
            "compiled {} sort key(s): {}",
            keys.len(),
            keys.iter()
                .map(|k| format!("{} {:?}", k.path, k.order))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Sorter { keys })
    }

    pub fn is_identity(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sorts `items` in place. Equal keys keep their input order.
    pub fn sort(&self, items: &mut Vec<Value>) {
        if self.is_identity() || items.len() < 2 {
            return;
        }
        let mut keyed: Vec<(Vec<Value>, Value)> = items
            .drain(..)
            .map(|item| (self.key_of(&item), item))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        items.extend(keyed.into_iter().map(|(_, item)| item));
    }

    /// Returns references to `items` in sorted order.
    pub fn sorted<'a, I>(&self, items: I) -> Vec<&'a Value>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut keyed: Vec<(Vec<Value>, &'a Value)> =
            items.into_iter().map(|item| (self.key_of(item), item)).collect();
        if !self.is_identity() {
            keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        }
        keyed.into_iter().map(|(_, item)| item).collect()
    }

    /// Orders two items by the compiled keys.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        self.compare_keys(&self.key_of(a), &self.key_of(b))
    }

    fn key_of(&self, item: &Value) -> Vec<Value> {
        self.keys.iter().map(|key| key.access.evaluate(item)).collect()
    }

    fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        for ((key, x), y) in self.keys.iter().zip(a).zip(b) {
            let ordering = match key.order {
                SortOrder::Ascending => x.total_cmp(y),
                SortOrder::Descending => y.total_cmp(x),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Convenience: compile and sort in one call.
pub fn sort_items(item_type: &ValueType, sorts: &[SortDescriptor], items: &mut Vec<Value>) -> Result<()> {
    Sorter::compile(item_type, sorts)?.sort(items);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectType;
    use crate::value::record;

    fn person_type() -> ValueType {
        ValueType::Object(
            ObjectType::class("Person")
                .property("Name", ValueType::nullable(ValueType::String))
                .property("Age", ValueType::nullable(ValueType::Int))
                .property("Seq", ValueType::Int)
                .build(),
        )
    }

    fn person(seq: i64, name: Option<&str>, age: Option<i64>) -> Value {
        record([
            ("Seq", Value::Int(seq)),
            ("Name", Value::from(name)),
            ("Age", Value::from(age)),
        ])
    }

    fn seqs(items: &[Value]) -> Vec<i64> {
        items
            .iter()
            .filter_map(|item| match item.get("Seq") {
                Some(Value::Int(n)) => Some(*n),
                _ => None,
            })
            .collect()
    }

    fn sample() -> Vec<Value> {
        vec![
            person(1, Some("bob"), Some(30)),
            person(2, None, Some(25)),
            person(3, Some("anna"), Some(30)),
            person(4, Some("bob"), None),
        ]
    }

    #[test]
    fn empty_sort_list_is_identity() {
        let mut items = sample();
        sort_items(&person_type(), &[], &mut items).unwrap();
        assert_eq!(seqs(&items), vec![1, 2, 3, 4]);
    }

    #[test]
    fn null_strings_sort_as_empty() {
        let mut items = sample();
        sort_items(&person_type(), &[SortDescriptor::ascending("Name")], &mut items).unwrap();
        assert_eq!(seqs(&items), vec![2, 3, 1, 4]);
    }

    #[test]
    fn secondary_key_and_stability() {
        let mut items = sample();
        let sorts = [SortDescriptor::descending("Age"), SortDescriptor::ascending("Name")];
        sort_items(&person_type(), &sorts, &mut items).unwrap();
        assert_eq!(seqs(&items), vec![3, 1, 2, 4]);

        let mut items = sample();
        sort_items(&person_type(), &[SortDescriptor::ascending("Age")], &mut items).unwrap();
        // null first, then 25, then the two 30s in input order
        assert_eq!(seqs(&items), vec![4, 2, 1, 3]);
    }

    #[test]
    fn unsorted_descriptors_are_skipped() {
        let sorter = Sorter::compile(
            &person_type(),
            &[SortDescriptor {
                property: "Age".to_string(),
                sort_order: None,
            }],
        )
        .unwrap();
        assert!(sorter.is_identity());
    }

    #[test]
    fn unknown_sort_property_fails() {
        assert!(Sorter::compile(&person_type(), &[SortDescriptor::ascending("Height")]).is_err());
    }

    #[test]
    fn sorted_refs_leave_source_untouched() {
        let items = sample();
        let sorter = Sorter::compile(&person_type(), &[SortDescriptor::descending("Seq")]).unwrap();
        let refs = sorter.sorted(&items);
        assert_eq!(refs.first().and_then(|v| v.get("Seq")), Some(&Value::Int(4)));
        assert_eq!(seqs(&items), vec![1, 2, 3, 4]);
    }
}
