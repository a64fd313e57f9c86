//! FILENAME: pivot-engine/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains the types that DESCRIBE a pivot table:
//! which property paths group the rows and columns, which properties are
//! aggregated and how, and which totals are shown. The structures are plain
//! serializable snapshots of user intent; `PivotEngine` compiles them
//! against an item schema.

use serde::{Deserialize, Serialize};

// ============================================================================
// AGGREGATION
// ============================================================================

/// Supported aggregation functions for value fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AggregateFunction {
    #[default]
    Sum,
    Average,
    Count,
    Min,
    Max,
    First,
    Last,
}

impl AggregateFunction {
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "Sum",
            AggregateFunction::Average => "Average",
            AggregateFunction::Count => "Count",
            AggregateFunction::Min => "Min",
            AggregateFunction::Max => "Max",
            AggregateFunction::First => "First",
            AggregateFunction::Last => "Last",
        }
    }

    /// Functions that only make sense over numbers.
    pub fn is_numeric(self) -> bool {
        matches!(self, AggregateFunction::Sum | AggregateFunction::Average)
    }
}

// ============================================================================
// FIELD DEFINITIONS
// ============================================================================

/// A grouping field on the row or column axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotField {
    /// Property path of the grouping key.
    pub property: String,

    /// Display name (defaults to the property path).
    #[serde(default)]
    pub title: Option<String>,
}

impl PivotField {
    pub fn new(property: impl Into<String>) -> Self {
        PivotField {
            property: property.into(),
            title: None,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.property)
    }
}

/// A value field with its aggregation function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueField {
    /// Property path of the aggregated value.
    pub property: String,

    #[serde(default)]
    pub aggregate: AggregateFunction,

    /// Display name (e.g., "Sum of Amount").
    #[serde(default)]
    pub title: Option<String>,
}

impl ValueField {
    pub fn new(property: impl Into<String>, aggregate: AggregateFunction) -> Self {
        ValueField {
            property: property.into(),
            aggregate,
            title: None,
        }
    }

    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => format!("{} of {}", self.aggregate.name(), self.property),
        }
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_separator() -> String {
    "/".to_string()
}

/// Which totals are produced and how path keys are displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotLayout {
    /// A total per body row, across all column leaves.
    #[serde(default = "default_true")]
    pub show_row_totals: bool,

    /// A total per column leaf, across all body rows.
    #[serde(default = "default_true")]
    pub show_column_totals: bool,

    /// One total per value field over every source item.
    #[serde(default = "default_true")]
    pub show_grand_totals: bool,

    /// Joins key values into the display `path_key` of header cells.
    #[serde(default = "default_separator")]
    pub path_separator: String,
}

impl Default for PivotLayout {
    fn default() -> Self {
        PivotLayout {
            show_row_totals: true,
            show_column_totals: true,
            show_grand_totals: true,
            path_separator: default_separator(),
        }
    }
}

// ============================================================================
// PIVOT DEFINITION
// ============================================================================

/// The complete description of a pivot table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotDefinition {
    /// Row grouping fields, outermost first.
    #[serde(default)]
    pub rows: Vec<PivotField>,

    /// Column grouping fields, outermost first.
    #[serde(default)]
    pub columns: Vec<PivotField>,

    /// Aggregated value fields, in display order.
    #[serde(default)]
    pub values: Vec<ValueField>,

    #[serde(default)]
    pub layout: PivotLayout,
}

impl PivotDefinition {
    pub fn new() -> Self {
        PivotDefinition::default()
    }

    pub fn row(mut self, field: PivotField) -> Self {
        self.rows.push(field);
        self
    }

    pub fn column(mut self, field: PivotField) -> Self {
        self.columns.push(field);
        self
    }

    pub fn value(mut self, field: ValueField) -> Self {
        self.values.push(field);
        self
    }

    pub fn with_layout(mut self, layout: PivotLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn row_paths(&self) -> Vec<&str> {
        self.rows.iter().map(|f| f.property.as_str()).collect()
    }

    pub fn column_paths(&self) -> Vec<&str> {
        self.columns.iter().map(|f| f.property.as_str()).collect()
    }
}
