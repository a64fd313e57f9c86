//! FILENAME: engine/src/group.rs
//! PURPOSE: Recursive multi-level grouping over a sequence of items.
//! CONTEXT: Grouping never re-orders. Distinct keys appear in the order they
//! are first met, so callers that want sorted groups sort the source first
//! (see `Query::group_sorts`). The pivot engine groups each axis with this.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::descriptor::GroupDescriptor;
use crate::error::Result;
use crate::expr::Expr;
use crate::log_debug;
use crate::resolver::resolve;
use crate::schema::ValueType;
use crate::value::Value;

// ============================================================================
// GROUP PATH
// ============================================================================

/// Identity of a group node: the ordered key values from the top level down.
/// Compared structurally, so key values containing any separator character
/// never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GroupPath(SmallVec<[Value; 4]>);

impl GroupPath {
    /// The empty path above all top-level groups.
    pub fn root() -> Self {
        GroupPath(SmallVec::new())
    }

    pub fn from_keys<I: IntoIterator<Item = Value>>(keys: I) -> Self {
        GroupPath(keys.into_iter().collect())
    }

    /// This path extended by one more key.
    pub fn child(&self, key: Value) -> Self {
        let mut keys = self.0.clone();
        keys.push(key);
        GroupPath(keys)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[Value] {
        &self.0
    }

    pub fn last(&self) -> Option<&Value> {
        self.0.last()
    }

    pub fn parent(&self) -> Option<GroupPath> {
        if self.is_root() {
            return None;
        }
        Some(GroupPath(self.0[..self.0.len() - 1].iter().cloned().collect()))
    }

    /// True when `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &GroupPath) -> bool {
        self.depth() < other.depth() && other.0.starts_with(&self.0)
    }

    /// Display key: the key values joined by `separator`. Not unique when
    /// a key contains the separator; use the path itself as an identity.
    pub fn to_path_key(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(|key| key.to_string())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path_key("/"))
    }
}

// ============================================================================
// GROUP RESULT
// ============================================================================

/// One group of items sharing a key at one level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult<'a> {
    pub key: Value,
    pub path: GroupPath,
    pub count: usize,
    pub items: Vec<&'a Value>,
    /// Nested groups; `None` at the deepest level.
    pub subgroups: Option<Vec<GroupResult<'a>>>,
}

impl<'a> GroupResult<'a> {
    pub fn is_leaf(&self) -> bool {
        self.subgroups.is_none()
    }

    /// Deepest groups below (or at) this one, in order.
    pub fn leaves(&self) -> Vec<&GroupResult<'a>> {
        match &self.subgroups {
            None => vec![self],
            Some(children) => children.iter().flat_map(GroupResult::leaves).collect(),
        }
    }

    /// Finds the group at `path` in this subtree.
    pub fn find(&self, path: &GroupPath) -> Option<&GroupResult<'a>> {
        if &self.path == path {
            return Some(self);
        }
        if !self.path.is_ancestor_of(path) {
            return None;
        }
        self.subgroups.as_ref()?.iter().find_map(|child| child.find(path))
    }
}

/// Finds the group at `path` among top-level groups.
pub fn find_group<'g, 'a>(groups: &'g [GroupResult<'a>], path: &GroupPath) -> Option<&'g GroupResult<'a>> {
    groups.iter().find_map(|group| group.find(path))
}

// ============================================================================
// GROUPING
// ============================================================================

/// Compiled key accessors for a list of key paths.
#[derive(Debug, Clone)]
pub struct GroupKeys {
    accessors: Vec<Expr>,
}

impl GroupKeys {
    pub fn compile<S: AsRef<str>>(item_type: &ValueType, key_paths: &[S]) -> Result<Self> {
        let accessors = key_paths
            .iter()
            .map(|path| resolve(item_type, path.as_ref()).map(|p| p.access(Expr::Item)))
            .collect::<Result<Vec<_>>>()?;
        Ok(GroupKeys { accessors })
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    /// Key of `item` at `depth`.
    pub fn key(&self, depth: usize, item: &Value) -> Value {
        self.accessors
            .get(depth)
            .map(|access| access.evaluate(item))
            .unwrap_or(Value::Null)
    }

    /// Whether `item` lies under `path`.
    pub fn matches(&self, path: &GroupPath, item: &Value) -> bool {
        path.keys()
            .iter()
            .enumerate()
            .all(|(depth, key)| self.key(depth, item) == *key)
    }

    /// Partitions `items` recursively, starting at the top level.
    pub fn group<'a, I>(&self, items: I) -> Vec<GroupResult<'a>>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.group_level(items.into_iter().collect(), &GroupPath::root())
    }

    fn group_level<'a>(&self, items: Vec<&'a Value>, parent: &GroupPath) -> Vec<GroupResult<'a>> {
        let depth = parent.depth();
        if depth >= self.accessors.len() {
            return Vec::new();
        }

        let mut index: FxHashMap<Value, usize> = FxHashMap::default();
        let mut buckets: Vec<(Value, Vec<&'a Value>)> = Vec::new();
        for item in items {
            let key = self.key(depth, item);
            match index.get(&key) {
                Some(&slot) => buckets[slot].1.push(item),
                None => {
                    index.insert(key.clone(), buckets.len());
                    buckets.push((key, vec![item]));
                }
            }
        }

        let has_next = depth + 1 < self.accessors.len();
        buckets
            .into_iter()
            .map(|(key, members)| {
                let path = parent.child(key.clone());
                let subgroups = has_next.then(|| self.group_level(members.clone(), &path));
                GroupResult {
                    key,
                    path,
                    count: members.len(),
                    items: members,
                    subgroups,
                }
            })
            .collect()
    }
}

/// Groups `items` by `key_paths`, outermost first.
pub fn group<'a, S: AsRef<str>>(
    items: &'a [Value],
    item_type: &ValueType,
    key_paths: &[S],
) -> Result<Vec<GroupResult<'a>>> {
    let keys = GroupKeys::compile(item_type, key_paths)?;
    let groups = keys.group(items);
    log_debug!(
        "GROUP",
        "grouped {} item(s) by {} key(s) into {} top-level group(s)",
        items.len(),
        keys.len(),
        groups.len()
    );
    Ok(groups)
}

/// Groups by the properties of `groups`, in list order.
pub fn group_by_descriptors<'a>(
    items: &'a [Value],
    item_type: &ValueType,
    groups: &[GroupDescriptor],
) -> Result<Vec<GroupResult<'a>>> {
    let paths: Vec<&str> = groups.iter().map(|g| g.property.as_str()).collect();
    group(items, item_type, &paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectType;
    use crate::value::record;

    fn customer_type() -> ValueType {
        ValueType::Object(
            ObjectType::class("Customer")
                .property("Country", ValueType::String)
                .property("City", ValueType::nullable(ValueType::String))
                .build(),
        )
    }

    fn customers() -> Vec<Value> {
        [
            ("FR", Some("Paris")),
            ("DE", Some("Berlin")),
            ("FR", Some("Lyon")),
            ("FR", Some("Paris")),
            ("DE", None),
        ]
        .into_iter()
        .map(|(country, city)| record([("Country", Value::from(country)), ("City", Value::from(city))]))
        .collect()
    }

    #[test]
    fn keys_keep_first_seen_order() {
        let items = customers();
        let groups = group(&items, &customer_type(), &["Country"]).unwrap();
        let keys: Vec<_> = groups.iter().map(|g| g.key.clone()).collect();
        assert_eq!(keys, vec![Value::from("FR"), Value::from("DE")]);
        assert_eq!(groups[0].count, 3);
        assert!(groups[0].subgroups.is_none());
    }

    #[test]
    fn nested_levels_cover_every_item() {
        let items = customers();
        let groups = group(&items, &customer_type(), &["Country", "City"]).unwrap();
        let fr = &groups[0];
        let cities = fr.subgroups.as_ref().unwrap();
        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].count, 2);

        let leaf_total: usize = groups
            .iter()
            .flat_map(|g| g.leaves())
            .map(|leaf| leaf.count)
            .sum();
        assert_eq!(leaf_total, items.len());
    }

    #[test]
    fn null_keys_form_their_own_group() {
        let items = customers();
        let groups = group(&items, &customer_type(), &["Country", "City"]).unwrap();
        let de_cities = groups[1].subgroups.as_ref().unwrap();
        assert_eq!(de_cities[1].key, Value::Null);
    }

    #[test]
    fn empty_key_list_yields_no_groups() {
        let items = customers();
        let groups = group::<&str>(&items, &customer_type(), &[]).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn paths_find_nested_groups() {
        let items = customers();
        let groups = group(&items, &customer_type(), &["Country", "City"]).unwrap();
        let path = GroupPath::from_keys([Value::from("FR"), Value::from("Lyon")]);
        let found = find_group(&groups, &path).unwrap();
        assert_eq!(found.count, 1);
        assert_eq!(path.parent(), Some(GroupPath::from_keys([Value::from("FR")])));
        assert!(GroupPath::root().is_ancestor_of(&path));
    }

    #[test]
    fn path_keys_with_separator_stay_distinct() {
        let a = GroupPath::from_keys([Value::from("a/b")]);
        let b = GroupPath::from_keys([Value::from("a"), Value::from("b")]);
        assert_eq!(a.to_path_key("/"), b.to_path_key("/"));
        assert_ne!(a, b);
    }
}
