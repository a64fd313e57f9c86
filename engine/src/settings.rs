//! FILENAME: engine/src/settings.rs
//! PURPOSE: Persisted grid state: per-column width, visibility, order, sort and filter.
//! CONTEXT: Settings are produced and consumed at the edges (save/load). Stored
//! filter values are raw JSON; they only become typed `Value`s when the
//! settings are turned back into descriptors against a schema.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::descriptor::{FilterDescriptor, FilterOperator, GroupDescriptor, LogicalFilterOperator, SortDescriptor, SortOrder};
use crate::error::Result;
use crate::resolver::resolve;
use crate::schema::ValueType;
use crate::value::Value;
use crate::{log_debug, log_info};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSettings {
    pub property: String,
    #[serde(default)]
    pub filter_property: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub order_index: Option<usize>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    #[serde(default)]
    pub sort_index: Option<usize>,
    #[serde(default)]
    pub filter_value: serde_json::Value,
    #[serde(default)]
    pub filter_operator: Option<FilterOperator>,
    #[serde(default)]
    pub second_filter_value: serde_json::Value,
    #[serde(default)]
    pub second_filter_operator: Option<FilterOperator>,
    #[serde(default)]
    pub logical_filter_operator: LogicalFilterOperator,
}

impl ColumnSettings {
    pub fn new(property: impl Into<String>) -> Self {
        ColumnSettings {
            property: property.into(),
            filter_property: None,
            width: None,
            visible: true,
            order_index: None,
            sort_order: None,
            sort_index: None,
            filter_value: serde_json::Value::Null,
            filter_operator: None,
            second_filter_value: serde_json::Value::Null,
            second_filter_operator: None,
            logical_filter_operator: LogicalFilterOperator::And,
        }
    }

    pub fn has_filter(&self) -> bool {
        self.filter_operator.is_some() || self.second_filter_operator.is_some()
    }

    /// Stores `filter` on this column, keeping its values as JSON.
    fn capture_filter(&mut self, filter: &FilterDescriptor) {
        self.filter_property = filter.filter_property.clone();
        self.filter_value = filter.filter_value.to_json();
        self.filter_operator = Some(filter.filter_operator);
        self.second_filter_value = filter.second_filter_value.to_json();
        self.second_filter_operator = filter.second_filter_operator;
        self.logical_filter_operator = filter.logical_filter_operator;
    }

    /// The typed filter for this column, or `None` when it has no filter.
    pub fn filter(&self, item_type: &ValueType) -> Result<Option<FilterDescriptor>> {
        let Some(operator) = self.filter_operator.or(self.second_filter_operator) else {
            return Ok(None);
        };
        let target = self.filter_target(item_type)?;
        let (first_operator, first_value, second) = match self.filter_operator {
            Some(first) => (first, &self.filter_value, self.second_filter_operator),
            None => (operator, &self.second_filter_value, None),
        };

        let mut filter = FilterDescriptor::new(
            self.property.clone(),
            first_operator,
            stored_value(first_value, first_operator, &target),
        )
        .with_logic(self.logical_filter_operator);
        if let Some(element_property) = &self.filter_property {
            filter = filter.with_filter_property(element_property.clone());
        }
        if let Some(second_operator) = second {
            filter = filter.with_second(
                second_operator,
                stored_value(&self.second_filter_value, second_operator, &target),
            );
        }
        Ok(Some(filter))
    }

    /// Type the stored values are coerced to: the property, or the element
    /// sub-property for collection filters.
    fn filter_target(&self, item_type: &ValueType) -> Result<ValueType> {
        let path = resolve(item_type, &self.property)?;
        match (&self.filter_property, path.value_type.element_type()) {
            (Some(element_property), Some(element_type)) if !element_property.trim().is_empty() => {
                Ok(resolve(element_type, element_property)?.value_type)
            }
            _ => Ok(path.value_type),
        }
    }
}

/// Raw JSON turned into a value of `target`'s scalar type. Custom filters
/// keep their text; lists are coerced element by element.
fn stored_value(raw: &serde_json::Value, operator: FilterOperator, target: &ValueType) -> Value {
    let value = Value::from(raw.clone());
    if operator == FilterOperator::Custom {
        return value;
    }
    let scalar = target.element_type().unwrap_or(target);
    match value {
        Value::List(items) => Value::List(items.iter().map(|v| v.coerce_to(scalar)).collect()),
        other => other.coerce_to(scalar),
    }
}

/// Everything a grid persists between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridSettings {
    pub columns: Vec<ColumnSettings>,
    pub groups: Vec<GroupDescriptor>,
    pub current_page: usize,
    pub page_size: Option<usize>,
}

impl GridSettings {
    /// Captures the current descriptors. Columns appear in first-mention order.
    pub fn from_state(
        filters: &[FilterDescriptor],
        sorts: &[SortDescriptor],
        groups: &[GroupDescriptor],
        current_page: usize,
        page_size: Option<usize>,
    ) -> Self {
        let mut settings = GridSettings {
            columns: Vec::new(),
            groups: groups.to_vec(),
            current_page,
            page_size,
        };
        for filter in filters {
            settings.column_mut(&filter.property).capture_filter(filter);
        }
        for (index, sort) in sorts.iter().enumerate() {
            if let Some(order) = sort.sort_order {
                let column = settings.column_mut(&sort.property);
                column.sort_order = Some(order);
                column.sort_index = Some(index);
            }
        }
        settings
    }

    pub fn column(&self, property: &str) -> Option<&ColumnSettings> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// The column for `property`, created on first use.
    pub fn column_mut(&mut self, property: &str) -> &mut ColumnSettings {
        let index = match self.columns.iter().position(|c| c.property == property) {
            Some(index) => index,
            None => {
                self.columns.push(ColumnSettings::new(property));
                self.columns.len() - 1
            }
        };
        &mut self.columns[index]
    }

    /// Typed filters for every filtered column.
    pub fn filters(&self, item_type: &ValueType) -> Result<Vec<FilterDescriptor>> {
        let mut filters = Vec::new();
        for column in &self.columns {
            if let Some(filter) = column.filter(item_type)? {
                filters.push(filter);
            }
        }
        Ok(filters)
    }

    /// Sorted columns ordered by their sort index.
    pub fn sorts(&self) -> Vec<SortDescriptor> {
        let mut sorted: Vec<&ColumnSettings> = self.columns.iter().filter(|c| c.sort_order.is_some()).collect();
        sorted.sort_by_key(|c| c.sort_index.unwrap_or(usize::MAX));
        sorted
            .into_iter()
            .map(|c| SortDescriptor {
                property: c.property.clone(),
                sort_order: c.sort_order,
            })
            .collect()
    }

    /// Visible columns ordered by their order index, then declaration order.
    pub fn visible_columns(&self) -> Vec<&ColumnSettings> {
        let mut visible: Vec<&ColumnSettings> = self.columns.iter().filter(|c| c.visible).collect();
        visible.sort_by_key(|c| c.order_index.unwrap_or(usize::MAX));
        visible
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        log_info!("SETTINGS", "saved {} column(s) to {}", self.columns.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log_debug!("SETTINGS", "loaded {} column(s) from {}", settings.columns.len(), path.display());
        Ok(settings)
    }
}
