//! FILENAME: engine/src/descriptor.rs
//! PURPOSE: Declarative filter, sort and group descriptors.
//! CONTEXT: Plain value records owned by the caller. They carry intent only;
//! `plan.rs` turns them into the canonical filter plan that the predicate
//! compiler and both serializers consume.

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    Contains,
    StartsWith,
    EndsWith,
    DoesNotContain,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
    /// The filter value is a raw expression used verbatim.
    Custom,
}

impl FilterOperator {
    /// Operators that test the property alone and ignore the filter value.
    pub fn is_value_less(self) -> bool {
        matches!(
            self,
            FilterOperator::IsNull
                | FilterOperator::IsNotNull
                | FilterOperator::IsEmpty
                | FilterOperator::IsNotEmpty
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogicalFilterOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaseSensitivity {
    #[default]
    Default,
    CaseInsensitive,
}

/// One filter on one property, optionally combining two conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescriptor {
    pub property: String,
    /// Sub-property of the elements when `property` is a collection.
    #[serde(default)]
    pub filter_property: Option<String>,
    #[serde(default)]
    pub filter_value: Value,
    pub filter_operator: FilterOperator,
    #[serde(default)]
    pub second_filter_value: Value,
    #[serde(default)]
    pub second_filter_operator: Option<FilterOperator>,
    /// Combines the primary and the second condition.
    #[serde(default)]
    pub logical_filter_operator: LogicalFilterOperator,
}

impl FilterDescriptor {
    pub fn new(property: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        FilterDescriptor {
            property: property.into(),
            filter_property: None,
            filter_value: value.into(),
            filter_operator: operator,
            second_filter_value: Value::Null,
            second_filter_operator: None,
            logical_filter_operator: LogicalFilterOperator::And,
        }
    }

    /// A filter whose expression text is used verbatim.
    pub fn custom(property: impl Into<String>, expression: impl Into<String>) -> Self {
        FilterDescriptor::new(property, FilterOperator::Custom, Value::String(expression.into()))
    }

    pub fn with_second(mut self, operator: FilterOperator, value: impl Into<Value>) -> Self {
        self.second_filter_operator = Some(operator);
        self.second_filter_value = value.into();
        self
    }

    pub fn with_logic(mut self, logic: LogicalFilterOperator) -> Self {
        self.logical_filter_operator = logic;
        self
    }

    pub fn with_filter_property(mut self, filter_property: impl Into<String>) -> Self {
        self.filter_property = Some(filter_property.into());
        self
    }

    /// The raw text of a `Custom` filter, if any.
    pub fn custom_text(&self) -> Option<&str> {
        if self.filter_operator != FilterOperator::Custom {
            return None;
        }
        self.filter_value.as_str().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Sub-property to filter elements by, ignoring blanks and self references.
    pub fn element_property(&self) -> Option<&str> {
        self.filter_property
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != self.property)
    }
}

/// Filter tree: a leaf filter or an AND/OR node over child filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompositeFilterDescriptor {
    Leaf(FilterDescriptor),
    #[serde(rename_all = "camelCase")]
    Group {
        logical_filter_operator: LogicalFilterOperator,
        filters: Vec<CompositeFilterDescriptor>,
    },
}

impl CompositeFilterDescriptor {
    pub fn leaf(filter: FilterDescriptor) -> Self {
        CompositeFilterDescriptor::Leaf(filter)
    }

    /// An interior node. `None` when `filters` is empty: a node is either a
    /// leaf or has at least one child.
    pub fn group(logic: LogicalFilterOperator, filters: Vec<CompositeFilterDescriptor>) -> Option<Self> {
        if filters.is_empty() {
            return None;
        }
        Some(CompositeFilterDescriptor::Group {
            logical_filter_operator: logic,
            filters,
        })
    }

    pub fn depth(&self) -> usize {
        match self {
            CompositeFilterDescriptor::Leaf(_) => 1,
            CompositeFilterDescriptor::Group { filters, .. } => {
                1 + filters.iter().map(|f| f.depth()).max().unwrap_or(0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDescriptor {
    pub property: String,
    /// `None` means "not sorted".
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
}

impl SortDescriptor {
    pub fn ascending(property: impl Into<String>) -> Self {
        SortDescriptor {
            property: property.into(),
            sort_order: Some(SortOrder::Ascending),
        }
    }

    pub fn descending(property: impl Into<String>) -> Self {
        SortDescriptor {
            property: property.into(),
            sort_order: Some(SortOrder::Descending),
        }
    }

    /// Reads an order-by clause: `Name asc, Address/City desc` or
    /// `it.Name, it.Age desc`.
    pub fn parse_order_by(text: &str) -> Vec<SortDescriptor> {
        text.split(',')
            .filter_map(|clause| {
                let mut words = clause.split_whitespace();
                let path = words.next()?;
                let order = match words.next() {
                    Some(dir) if dir.eq_ignore_ascii_case("desc") || dir.eq_ignore_ascii_case("descending") => {
                        SortOrder::Descending
                    }
                    _ => SortOrder::Ascending,
                };
                let path = path.strip_prefix("it.").unwrap_or(path).replace('/', ".");
                Some(SortDescriptor {
                    property: path,
                    sort_order: Some(order),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDescriptor {
    pub property: String,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub format_string: Option<String>,
}

impl GroupDescriptor {
    pub fn new(property: impl Into<String>) -> Self {
        GroupDescriptor {
            property: property.into(),
            sort_order: None,
            title: None,
            format_string: None,
        }
    }

    pub fn sorted(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    /// Display title, falling back to the property path.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.property)
    }

    /// Formats a group key for display. `{0}` in the format string is
    /// replaced by the key.
    pub fn format_key(&self, key: &Value) -> String {
        match &self.format_string {
            Some(format) if format.contains("{0}") => format.replace("{0}", &key.to_string()),
            _ => key.to_string(),
        }
    }
}

/// Options shared by every compile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default)]
    pub case_sensitivity: CaseSensitivity,
    #[serde(default)]
    pub logical_filter_operator: LogicalFilterOperator,
}
