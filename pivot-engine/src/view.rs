//! FILENAME: pivot-engine/src/view.rs
//! Pivot View - The renderable output.
//!
//! A `PivotView` is a fully computed snapshot: column header rows, one body
//! row per visible row leaf (or collapsed row node), and the totals enabled
//! by the layout. It owns its data and does not borrow the source items.

use query_engine::{GroupPath, Value};
use serde::Serialize;

/// What a header cell stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaderCellKind {
    /// A group node.
    Group,
    /// Covered by the span of a group cell in an earlier row.
    Spanned,
    /// Padding below a collapsed or shallow group.
    Filler,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCell {
    pub kind: HeaderCellKind,
    pub value: Value,
    pub title: String,
    pub row_span: usize,
    pub col_span: usize,
    pub is_collapsed: bool,
    /// True when the node has child groups that can be expanded.
    pub is_expandable: bool,
    pub path: GroupPath,
    /// Display key: the path's key values joined by the layout separator.
    pub path_key: String,
}

impl HeaderCell {
    pub(crate) fn placeholder(kind: HeaderCellKind, path: GroupPath, path_key: String) -> Self {
        HeaderCell {
            kind,
            value: Value::Null,
            title: String::new(),
            row_span: 1,
            col_span: 1,
            is_collapsed: false,
            is_expandable: false,
            path,
            path_key,
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == HeaderCellKind::Group
    }
}

/// One body row: its header cells and one value per column leaf × value field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotBodyRow {
    pub path: GroupPath,
    /// Exactly `row_levels` cells (at least one) on every row.
    pub header_cells: Vec<HeaderCell>,
    /// Column leaves outer, value fields inner.
    pub values: Vec<Value>,
    /// One per value field; empty when row totals are off.
    pub totals: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotView {
    /// One header row per column level. Spanned cells are omitted.
    pub column_headers: Vec<Vec<HeaderCell>>,
    /// Visible column leaves, left to right. The root path when there are no column fields.
    pub column_leaves: Vec<GroupPath>,
    /// Value-field titles, repeated for every column leaf.
    pub value_headers: Vec<String>,
    pub rows: Vec<PivotBodyRow>,
    /// One per column leaf × value field; empty when column totals are off.
    pub column_totals: Vec<Value>,
    /// One per value field; empty when grand totals are off.
    pub grand_totals: Vec<Value>,
    pub row_levels: usize,
    pub value_count: usize,
}

impl PivotView {
    /// Number of value cells every body row carries.
    pub fn value_cell_count(&self) -> usize {
        self.column_leaves.len() * self.value_count
    }

    pub fn row(&self, path: &GroupPath) -> Option<&PivotBodyRow> {
        self.rows.iter().find(|row| &row.path == path)
    }

    /// The body value at a row path, column leaf path and value-field index.
    pub fn value_at(&self, row: &GroupPath, column: &GroupPath, value_index: usize) -> Option<&Value> {
        if value_index >= self.value_count {
            return None;
        }
        let leaf = self.column_leaves.iter().position(|leaf| leaf == column)?;
        self.row(row)?.values.get(leaf * self.value_count + value_index)
    }

    pub fn grand_total(&self, value_index: usize) -> Option<&Value> {
        self.grand_totals.get(value_index)
    }

    pub fn column_total(&self, column: &GroupPath, value_index: usize) -> Option<&Value> {
        let leaf = self.column_leaves.iter().position(|leaf| leaf == column)?;
        self.column_totals.get(leaf * self.value_count + value_index)
    }
}
