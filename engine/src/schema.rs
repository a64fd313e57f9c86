//! FILENAME: engine/src/schema.rs
//! PURPOSE: Runtime type descriptors for the items being queried.
//! CONTEXT: Items are plain `Value` records. The schema tells the resolver
//! which members exist, which are nullable or strings (and therefore need a
//! null guard), which are collections, and how stored values are coerced.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

static DYNAMIC: ValueType = ValueType::Dynamic;

/// Static type of a property or expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    DateTime,
    Date,
    Guid,
    Enum(Arc<EnumType>),
    Nullable(Box<ValueType>),
    List(Box<ValueType>),
    Object(Arc<ObjectType>),
    /// Schema unknown until runtime (dictionary-like records).
    Dynamic,
}

impl ValueType {
    pub fn nullable(inner: ValueType) -> Self {
        ValueType::Nullable(Box::new(inner))
    }

    pub fn list(element: ValueType) -> Self {
        ValueType::List(Box::new(element))
    }

    /// Strips one `Nullable` layer.
    pub fn underlying(&self) -> &ValueType {
        match self {
            ValueType::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, ValueType::Nullable(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.underlying(), ValueType::String)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.underlying(), ValueType::Dynamic)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.underlying(),
            ValueType::Int | ValueType::Float | ValueType::Enum(_)
        )
    }

    /// Types with a meaningful ordering for <, <=, >, >=.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self.underlying(),
            ValueType::Int
                | ValueType::Float
                | ValueType::Enum(_)
                | ValueType::String
                | ValueType::DateTime
                | ValueType::Date
                | ValueType::Dynamic
        )
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.underlying(), ValueType::List(_))
    }

    /// Element type of a collection; `Dynamic` for dynamic values.
    pub fn element_type(&self) -> Option<&ValueType> {
        match self.underlying() {
            ValueType::List(element) => Some(element),
            ValueType::Dynamic => Some(&DYNAMIC),
            _ => None,
        }
    }

    /// Whether a null-propagating access of this type substitutes a
    /// non-null default. Strings read as "" and everything else as null.
    pub fn guard_default(&self) -> Option<crate::value::Value> {
        if self.is_string() {
            Some(crate::value::Value::String(String::new()))
        } else {
            None
        }
    }

    /// Type produced by a typed dictionary accessor such as `Int32("Age")`.
    pub fn from_type_tag(tag: &str) -> Option<ValueType> {
        let ty = match tag {
            "Int16" | "Int32" | "Int64" | "Byte" | "SByte" | "UInt16" | "UInt32" | "UInt64" => {
                ValueType::Int
            }
            "Single" | "Double" | "Decimal" => ValueType::Float,
            "String" => ValueType::String,
            "Boolean" => ValueType::Bool,
            "DateTime" | "DateTimeOffset" => ValueType::DateTime,
            "DateOnly" => ValueType::Date,
            "Guid" => ValueType::Guid,
            "Object" => ValueType::Dynamic,
            _ => return None,
        };
        Some(ty)
    }

    /// Canonical type tag written by the expression serializer.
    pub fn type_tag(&self) -> &'static str {
        match self.underlying() {
            ValueType::Bool => "Boolean",
            ValueType::Int | ValueType::Enum(_) => "Int64",
            ValueType::Float => "Double",
            ValueType::String => "String",
            ValueType::DateTime => "DateTime",
            ValueType::Date => "DateOnly",
            ValueType::Guid => "Guid",
            _ => "Object",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "Boolean"),
            ValueType::Int => write!(f, "Int64"),
            ValueType::Float => write!(f, "Double"),
            ValueType::String => write!(f, "String"),
            ValueType::DateTime => write!(f, "DateTime"),
            ValueType::Date => write!(f, "DateOnly"),
            ValueType::Guid => write!(f, "Guid"),
            ValueType::Enum(e) => write!(f, "{}", e.name),
            ValueType::Nullable(inner) => write!(f, "{}?", inner),
            ValueType::List(element) => write!(f, "List<{}>", element),
            ValueType::Object(o) => write!(f, "{}", o.name),
            ValueType::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// An enumeration with named members backed by integers.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, members: &[(&str, i64)]) -> Arc<Self> {
        Arc::new(EnumType {
            name: name.into(),
            members: members
                .iter()
                .map(|(member, value)| (member.to_string(), *value))
                .collect(),
        })
    }

    pub fn by_name(&self, name: &str) -> Option<(&str, i64)> {
        self.members
            .iter()
            .find(|(member, _)| member.eq_ignore_ascii_case(name))
            .map(|(member, value)| (member.as_str(), *value))
    }

    pub fn by_value(&self, value: i64) -> Option<(&str, i64)> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(member, value)| (member.as_str(), *value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    /// Members may also come from the extended interfaces.
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub value_type: ValueType,
}

/// A record type: named properties plus the structurally related types
/// (base types or extended interfaces) that are searched for members.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: String,
    pub kind: TypeKind,
    pub properties: Vec<PropertyDef>,
    pub extends: Vec<Arc<ObjectType>>,
}

impl ObjectType {
    pub fn class(name: impl Into<String>) -> Self {
        ObjectType {
            name: name.into(),
            kind: TypeKind::Class,
            properties: Vec::new(),
            extends: Vec::new(),
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        ObjectType {
            kind: TypeKind::Interface,
            ..ObjectType::class(name)
        }
    }

    pub fn property(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.properties.push(PropertyDef {
            name: name.into(),
            value_type,
        });
        self
    }

    pub fn extending(mut self, parent: Arc<ObjectType>) -> Self {
        self.extends.push(parent);
        self
    }

    pub fn build(self) -> Arc<ObjectType> {
        Arc::new(self)
    }

    /// Finds a member on this type, then breadth-first through every related
    /// type. Diamonds are visited once.
    pub fn find_property(&self, name: &str) -> Option<&PropertyDef> {
        if let Some(prop) = self.properties.iter().find(|p| p.name == name) {
            return Some(prop);
        }

        let mut visited: FxHashSet<&str> = FxHashSet::default();
        visited.insert(self.name.as_str());
        let mut queue: Vec<&ObjectType> = self.extends.iter().map(|t| t.as_ref()).collect();
        let mut next = 0;

        while next < queue.len() {
            let current = queue[next];
            next += 1;
            if !visited.insert(current.name.as_str()) {
                continue;
            }
            if let Some(prop) = current.properties.iter().find(|p| p.name == name) {
                return Some(prop);
            }
            queue.extend(current.extends.iter().map(|t| t.as_ref()));
        }
        None
    }

    /// Every property reachable from this type, nearest declaration first.
    pub fn all_properties(&self) -> Vec<&PropertyDef> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut result = Vec::new();
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut queue: Vec<&ObjectType> = vec![self];
        let mut next = 0;

        while next < queue.len() {
            let current = queue[next];
            next += 1;
            if !visited.insert(current.name.as_str()) {
                continue;
            }
            for prop in &current.properties {
                if seen.insert(prop.name.as_str()) {
                    result.push(prop);
                }
            }
            queue.extend(current.extends.iter().map(|t| t.as_ref()));
        }
        result
    }
}
