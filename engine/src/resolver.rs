//! FILENAME: engine/src/resolver.rs
//! PURPOSE: Resolves property path strings against a runtime item type.
//! CONTEXT: Every filter, sort, group key and pivot field names a property by
//! path: `Customer.Address[0].City`, `Tags["color"]`, `Int32("Age")`. The
//! resolver validates each segment against the schema and produces a
//! `ResolvedPath` that the evaluator, both serializers and the pivot engine
//! read from.
//!
//! SEGMENT FORMS:
//! - Member:            Name
//! - Indexer:           Name[0], Name["key"], Name[0][1]
//! - Typed dynamic key: Int32("Age") (dictionary records only)

use crate::error::{QueryError, Result};
use crate::expr::Expr;
use crate::schema::ValueType;
use crate::value::Value;

/// One resolved step of a property path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// Named member of a record.
    Member(String),
    /// Positional list element.
    Position(usize),
    /// Dictionary key written as an indexer: `["key"]`.
    Key(String),
    /// Dictionary key read through a type tag: `Int32("Age")`.
    TypedKey { key: String, value_type: ValueType },
}

/// A validated property path with the static type of its final member.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub path: String,
    pub steps: Vec<PathStep>,
    pub value_type: ValueType,
}

impl ResolvedPath {
    /// The empty path: the item itself.
    pub fn identity(value_type: ValueType) -> Self {
        ResolvedPath {
            path: String::new(),
            steps: Vec::new(),
            value_type,
        }
    }

    /// Raw access expression rooted at `root`. Absent members propagate as null.
    pub fn access(&self, root: Expr) -> Expr {
        self.steps.iter().fold(root, |target, step| match step {
            PathStep::Member(name) | PathStep::Key(name) => Expr::Member {
                target: Box::new(target),
                name: name.clone(),
            },
            PathStep::Position(index) => Expr::Index {
                target: Box::new(target),
                index: Box::new(Expr::Literal(Value::Int(*index as i64))),
            },
            PathStep::TypedKey { key, value_type } => Expr::Convert {
                target: Box::new(Expr::Member {
                    target: Box::new(target),
                    name: key.clone(),
                }),
                to: value_type.clone(),
            },
        })
    }

    /// Null-guarded access: strings read as "" when any link of the chain is absent.
    pub fn guarded(&self, root: Expr) -> Expr {
        let raw = self.access(root);
        match self.value_type.guard_default() {
            Some(default) => Expr::Coalesce(Box::new(raw), Box::new(Expr::Literal(default))),
            None => raw,
        }
    }

    pub fn needs_guard(&self) -> bool {
        self.value_type.guard_default().is_some()
    }

    pub fn is_collection(&self) -> bool {
        self.value_type.is_collection()
    }

    /// True when the path uses positional indexers, which OData cannot express.
    pub fn has_positional_index(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, PathStep::Position(_)))
    }
}

/// Resolves `path` against `root`.
pub fn resolve(root: &ValueType, path: &str) -> Result<ResolvedPath> {
    let path = path.trim();
    let mut steps = Vec::new();
    let mut current = root.clone();

    if path.is_empty() {
        return Ok(ResolvedPath::identity(current));
    }

    for segment in split_segments(path) {
        let (head, indexers) = split_indexers(path, segment)?;

        if let Some((tag, key)) = parse_typed_key(head) {
            let value_type = ValueType::from_type_tag(tag).ok_or_else(|| path_error(path, tag, &current))?;
            if !accepts_keys(&current) {
                return Err(path_error(path, head, &current));
            }
            steps.push(PathStep::TypedKey {
                key: key.to_string(),
                value_type: value_type.clone(),
            });
            current = value_type;
        } else if !head.is_empty() {
            current = member_type(path, &current, head)?;
            steps.push(PathStep::Member(head.to_string()));
        } else if indexers.is_empty() {
            // "Name." or "Name..Age"
            return Err(path_error(path, segment, &current));
        }

        for indexer in indexers {
            let (step, next) = index_type(path, &current, indexer)?;
            steps.push(step);
            current = next;
        }
    }

    Ok(ResolvedPath {
        path: path.to_string(),
        steps,
        value_type: current,
    })
}

/// Static type of `name` on `owner`.
pub fn member_type(path: &str, owner: &ValueType, name: &str) -> Result<ValueType> {
    match owner.underlying() {
        ValueType::Object(object_type) => object_type
            .find_property(name)
            .map(|prop| prop.value_type.clone())
            .ok_or_else(|| path_error(path, name, owner)),
        ValueType::Dynamic => Ok(ValueType::Dynamic),
        _ => Err(path_error(path, name, owner)),
    }
}

fn accepts_keys(owner: &ValueType) -> bool {
    matches!(owner.underlying(), ValueType::Object(_) | ValueType::Dynamic)
}

fn index_type(path: &str, owner: &ValueType, indexer: &str) -> Result<(PathStep, ValueType)> {
    let indexer = indexer.trim();
    if let Some(key) = unquote(indexer) {
        if !accepts_keys(owner) {
            return Err(path_error(path, indexer, owner));
        }
        let next = member_type(path, owner, key)?;
        return Ok((PathStep::Key(key.to_string()), next));
    }

    let position: usize = indexer.parse().map_err(|_| QueryError::InvalidIndex {
        path: path.to_string(),
        index: indexer.to_string(),
    })?;
    match owner.element_type() {
        Some(element) => Ok((PathStep::Position(position), element.clone())),
        None => Err(QueryError::InvalidIndex {
            path: path.to_string(),
            index: indexer.to_string(),
        }),
    }
}

fn path_error(path: &str, segment: &str, owner: &ValueType) -> QueryError {
    QueryError::PathResolution {
        path: path.to_string(),
        segment: segment.to_string(),
        type_name: owner.to_string(),
    }
}

/// Splits on '.' outside brackets, parentheses and quotes.
fn split_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in path.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, '.') if depth == 0 => {
                segments.push(path[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(path[start..].trim());
    segments
}

/// `Lines[0]["k"]` -> ("Lines", ["0", "\"k\""])
fn split_indexers<'a>(path: &str, segment: &'a str) -> Result<(&'a str, Vec<&'a str>)> {
    let Some(open) = find_indexer_start(segment) else {
        return Ok((segment, Vec::new()));
    };

    let head = segment[..open].trim();
    let mut indexers = Vec::new();
    let mut rest = &segment[open..];

    while !rest.is_empty() {
        let close = matching_bracket(rest).ok_or_else(|| QueryError::InvalidIndex {
            path: path.to_string(),
            index: rest.to_string(),
        })?;
        indexers.push(&rest[1..close]);
        rest = rest[close + 1..].trim_start();
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(QueryError::InvalidIndex {
                path: path.to_string(),
                index: rest.to_string(),
            });
        }
    }
    Ok((head, indexers))
}

/// First '[' outside quotes and parentheses.
fn find_indexer_start(segment: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, ch) in segment.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            (None, '[') if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Offset of the ']' closing the '[' at the start of `text`.
fn matching_bracket(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in text.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

/// `Int32("Age")` -> ("Int32", "Age")
fn parse_typed_key(segment: &str) -> Option<(&str, &str)> {
    let open = segment.find('(')?;
    if !segment.ends_with(')') {
        return None;
    }
    let tag = segment[..open].trim();
    let inner = segment[open + 1..segment.len() - 1].trim();
    let key = unquote(inner)?;
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((tag, key))
}

fn unquote(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
    {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectType;

    fn customer_type() -> ValueType {
        let address = ObjectType::class("Address")
            .property("City", ValueType::String)
            .build();
        let named = ObjectType::interface("INamed")
            .property("Name", ValueType::String)
            .build();
        ValueType::Object(
            ObjectType::interface("ICustomer")
                .property("Age", ValueType::nullable(ValueType::Int))
                .property("Addresses", ValueType::list(ValueType::Object(address)))
                .property("Extra", ValueType::Dynamic)
                .extending(named)
                .build(),
        )
    }

    #[test]
    fn resolves_nested_indexed_path() {
        let resolved = resolve(&customer_type(), "Addresses[0].City").unwrap();
        assert_eq!(
            resolved.steps,
            vec![
                PathStep::Member("Addresses".to_string()),
                PathStep::Position(0),
                PathStep::Member("City".to_string()),
            ]
        );
        assert_eq!(resolved.value_type, ValueType::String);
        assert!(resolved.needs_guard());
        assert!(resolved.has_positional_index());
    }

    #[test]
    fn resolves_member_from_extended_interface() {
        let resolved = resolve(&customer_type(), "Name").unwrap();
        assert_eq!(resolved.value_type, ValueType::String);
    }

    #[test]
    fn resolves_typed_dynamic_keys() {
        let resolved = resolve(&ValueType::Dynamic, "Int32(\"Age\")").unwrap();
        assert_eq!(
            resolved.steps,
            vec![PathStep::TypedKey {
                key: "Age".to_string(),
                value_type: ValueType::Int
            }]
        );

        let keyed = resolve(&customer_type(), "Extra[\"color\"]").unwrap();
        assert_eq!(keyed.steps[1], PathStep::Key("color".to_string()));
        assert_eq!(keyed.value_type, ValueType::Dynamic);
    }

    #[test]
    fn reports_missing_member_with_type() {
        let err = resolve(&customer_type(), "Addresses[0].Zip").unwrap_err();
        match err {
            QueryError::PathResolution {
                path,
                segment,
                type_name,
            } => {
                assert_eq!(path, "Addresses[0].Zip");
                assert_eq!(segment, "Zip");
                assert_eq!(type_name, "Address");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_empty_segments() {
        for path in ["Name.", "Addresses..City", ".Age", "Addresses[0]."] {
            match resolve(&customer_type(), path) {
                Err(QueryError::PathResolution { segment, .. }) => assert_eq!(segment, "", "{}", path),
                other => panic!("'{}' should not resolve: {:?}", path, other),
            }
        }
    }

    #[test]
    fn rejects_bad_indexers() {
        assert!(matches!(
            resolve(&customer_type(), "Addresses[x]"),
            Err(QueryError::InvalidIndex { .. })
        ));
        assert!(matches!(
            resolve(&customer_type(), "Age[0]"),
            Err(QueryError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn guarded_access_coalesces_strings() {
        let resolved = resolve(&customer_type(), "Name").unwrap();
        assert!(matches!(resolved.guarded(Expr::Item), Expr::Coalesce(_, _)));
        let age = resolve(&customer_type(), "Age").unwrap();
        assert!(matches!(age.guarded(Expr::Item), Expr::Member { .. }));
    }
}
