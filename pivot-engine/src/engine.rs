//! FILENAME: pivot-engine/src/engine.rs
//! Pivot Engine - The calculation core that turns source items into a renderable view.
//!
//! Algorithm:
//! 1. Group the source on the column fields and on the row fields (one tree per axis)
//! 2. Stop descending at collapsed nodes; the remaining leaves are the visible leaves
//! 3. Cross-tabulate: for each visible row leaf × column leaf × value field,
//!    aggregate the row's items that also lie under the column path
//! 4. Compute row, column and grand totals directly from the matching source items,
//!    so they do not depend on what is collapsed
//!
//! `PivotEngine` owns the source, the definition and the collapse state, and
//! caches the last computed view. Collapse changes drop the cached view only.

use query_engine::{log_debug, log_info, GroupKeys, GroupPath, GroupResult, Value, ValueType};

use crate::aggregate::Aggregator;
use crate::definition::PivotDefinition;
use crate::error::{PivotError, Result};
use crate::state::{Axis, CollapseState};
use crate::view::{HeaderCell, HeaderCellKind, PivotBodyRow, PivotView};

// ============================================================================
// AXIS TREE STRUCTURES
// ============================================================================

/// A node in the row or column tree.
#[derive(Debug)]
struct AxisNode<'a> {
    key: Value,
    path: GroupPath,
    /// Source items under this node.
    items: Vec<&'a Value>,
    children: Vec<AxisNode<'a>>,
    /// Collapsed by the user and has children to hide.
    is_collapsed: bool,
}

impl<'a> AxisNode<'a> {
    fn from_group(group: GroupResult<'a>, state: &CollapseState, axis: Axis) -> Self {
        let children: Vec<AxisNode<'a>> = group
            .subgroups
            .unwrap_or_default()
            .into_iter()
            .map(|child| AxisNode::from_group(child, state, axis))
            .collect();
        let is_collapsed = !children.is_empty() && state.is_collapsed(axis, &group.path);
        AxisNode {
            key: group.key,
            path: group.path,
            items: group.items,
            children,
            is_collapsed,
        }
    }

    /// Shown as a single row/column: a real leaf or a collapsed node.
    fn is_visible_leaf(&self) -> bool {
        self.is_collapsed || self.children.is_empty()
    }

    fn visible_leaf_count(&self) -> usize {
        if self.is_visible_leaf() {
            1
        } else {
            self.children.iter().map(AxisNode::visible_leaf_count).sum()
        }
    }

    /// Visible leaves below this node, each with its ancestor chain (top first).
    fn collect_leaves<'n>(&'n self, chain: &mut Vec<&'n AxisNode<'a>>, out: &mut Vec<Vec<&'n AxisNode<'a>>>) {
        chain.push(self);
        if self.is_visible_leaf() {
            out.push(chain.clone());
        } else {
            for child in &self.children {
                child.collect_leaves(chain, out);
            }
        }
        chain.pop();
    }
}

fn build_axis<'a>(keys: &GroupKeys, items: &'a [Value], state: &CollapseState, axis: Axis) -> Vec<AxisNode<'a>> {
    keys.group(items)
        .into_iter()
        .map(|group| AxisNode::from_group(group, state, axis))
        .collect()
}

fn visible_leaves<'n, 'a>(nodes: &'n [AxisNode<'a>]) -> Vec<Vec<&'n AxisNode<'a>>> {
    let mut out = Vec::new();
    let mut chain = Vec::new();
    for node in nodes {
        node.collect_leaves(&mut chain, &mut out);
    }
    out
}

fn key_title(key: &Value) -> String {
    if key.is_null() {
        "(blank)".to_string()
    } else {
        key.to_string()
    }
}

fn group_cell(node: &AxisNode<'_>, row_span: usize, col_span: usize, separator: &str) -> HeaderCell {
    HeaderCell {
        kind: HeaderCellKind::Group,
        value: node.key.clone(),
        title: key_title(&node.key),
        row_span,
        col_span,
        is_collapsed: node.is_collapsed,
        is_expandable: !node.children.is_empty(),
        path: node.path.clone(),
        path_key: node.path.to_path_key(separator),
    }
}

/// Paths of every node with child groups, ignoring collapse state.
fn interior_paths(groups: &[GroupResult<'_>], out: &mut Vec<GroupPath>) {
    for group in groups {
        if let Some(children) = &group.subgroups {
            out.push(group.path.clone());
            interior_paths(children, out);
        }
    }
}

// ============================================================================
// PIVOT CALCULATOR
// ============================================================================

/// A definition compiled against an item schema.
#[derive(Debug, Clone)]
struct CompiledPivot {
    row_keys: GroupKeys,
    column_keys: GroupKeys,
    aggregators: Vec<Aggregator>,
}

impl CompiledPivot {
    fn compile(item_type: &ValueType, definition: &PivotDefinition) -> Result<Self> {
        Ok(CompiledPivot {
            row_keys: GroupKeys::compile(item_type, &definition.row_paths())?,
            column_keys: GroupKeys::compile(item_type, &definition.column_paths())?,
            aggregators: definition
                .values
                .iter()
                .map(|field| Aggregator::compile(item_type, field))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    fn keys(&self, axis: Axis) -> &GroupKeys {
        match axis {
            Axis::Rows => &self.row_keys,
            Axis::Columns => &self.column_keys,
        }
    }

    fn aggregate_all<'a, I>(&self, items: I) -> Vec<Value>
    where
        I: IntoIterator<Item = &'a Value> + Clone,
    {
        self.aggregators.iter().map(|agg| agg.apply(items.clone())).collect()
    }

    fn calculate(&self, items: &[Value], definition: &PivotDefinition, state: &CollapseState) -> PivotView {
        let layout = &definition.layout;
        let separator = layout.path_separator.as_str();
        let value_count = self.aggregators.len();

        // Step 1: Build axis trees
        let column_tree = build_axis(&self.column_keys, items, state, Axis::Columns);
        let row_tree = build_axis(&self.row_keys, items, state, Axis::Rows);

        // Step 2: Column headers and visible column leaves
        let column_levels = self.column_keys.len();
        let mut column_headers: Vec<Vec<HeaderCell>> = vec![Vec::new(); column_levels];
        for node in &column_tree {
            push_column_headers(node, 0, column_levels, value_count, separator, &mut column_headers);
        }

        let all_items: Vec<&Value> = items.iter().collect();
        let column_leaves: Vec<(GroupPath, &[&Value])> = if self.column_keys.is_empty() {
            vec![(GroupPath::root(), all_items.as_slice())]
        } else {
            visible_leaves(&column_tree)
                .into_iter()
                .filter_map(|chain| chain.last().copied())
                .map(|leaf| (leaf.path.clone(), leaf.items.as_slice()))
                .collect()
        };
        let value_headers: Vec<String> = column_leaves
            .iter()
            .flat_map(|_| definition.values.iter().map(|field| field.display_title()))
            .collect();

        // Step 3: Body rows
        let row_levels = self.row_keys.len().max(1);
        let row_chains = visible_leaves(&row_tree);
        let mut rows = Vec::with_capacity(row_chains.len().max(1));

        if self.row_keys.is_empty() {
            let cells = vec![HeaderCell::placeholder(HeaderCellKind::Filler, GroupPath::root(), String::new())];
            rows.push(self.body_row(GroupPath::root(), cells, &all_items, &column_leaves, layout.show_row_totals));
        }

        let mut previous: Option<&Vec<&AxisNode<'_>>> = None;
        for chain in &row_chains {
            let Some(leaf) = chain.last() else { continue };
            let mut cells = Vec::with_capacity(row_levels);
            for level in 0..row_levels {
                match chain.get(level) {
                    Some(node) => {
                        let starts_group = previous
                            .and_then(|prev| prev.get(level))
                            .map_or(true, |prev_node| prev_node.path != node.path);
                        if starts_group {
                            cells.push(group_cell(node, node.visible_leaf_count(), 1, separator));
                        } else {
                            cells.push(HeaderCell::placeholder(
                                HeaderCellKind::Spanned,
                                node.path.clone(),
                                node.path.to_path_key(separator),
                            ));
                        }
                    }
                    None => cells.push(HeaderCell::placeholder(
                        HeaderCellKind::Filler,
                        leaf.path.clone(),
                        leaf.path.to_path_key(separator),
                    )),
                }
            }
            rows.push(self.body_row(leaf.path.clone(), cells, &leaf.items, &column_leaves, layout.show_row_totals));
            previous = Some(chain);
        }

        // Step 4: Totals over the matching source items
        let column_totals = if layout.show_column_totals {
            column_leaves
                .iter()
                .flat_map(|(_, leaf_items)| self.aggregate_all(leaf_items.iter().copied()))
                .collect()
        } else {
            Vec::new()
        };
        let grand_totals = if layout.show_grand_totals {
            self.aggregate_all(items.iter())
        } else {
            Vec::new()
        };

        log_debug!(
            "PIVOT",
            "calculated {} body row(s) x {} column leaf(s) x {} value field(s)",
            rows.len(),
            column_leaves.len(),
            value_count
        );

        PivotView {
            column_headers,
            column_leaves: column_leaves.into_iter().map(|(path, _)| path).collect(),
            value_headers,
            rows,
            column_totals,
            grand_totals,
            row_levels,
            value_count,
        }
    }

    fn body_row(
        &self,
        path: GroupPath,
        header_cells: Vec<HeaderCell>,
        row_items: &[&Value],
        column_leaves: &[(GroupPath, &[&Value])],
        with_totals: bool,
    ) -> PivotBodyRow {
        let mut values = Vec::with_capacity(column_leaves.len() * self.aggregators.len());
        for (column_path, _) in column_leaves {
            let in_cell = row_items
                .iter()
                .copied()
                .filter(|item| self.column_keys.matches(column_path, item));
            values.extend(self.aggregate_all(in_cell));
        }
        let totals = if with_totals {
            self.aggregate_all(row_items.iter().copied())
        } else {
            Vec::new()
        };
        PivotBodyRow {
            path,
            header_cells,
            values,
            totals,
        }
    }
}

fn push_column_headers(
    node: &AxisNode<'_>,
    depth: usize,
    levels: usize,
    value_count: usize,
    separator: &str,
    headers: &mut [Vec<HeaderCell>],
) {
    let row_span = if node.is_visible_leaf() { levels - depth } else { 1 };
    let col_span = node.visible_leaf_count() * value_count.max(1);
    headers[depth].push(group_cell(node, row_span, col_span, separator));
    if !node.is_visible_leaf() {
        for child in &node.children {
            push_column_headers(child, depth + 1, levels, value_count, separator, headers);
        }
    }
}

/// Computes a view in one call, without caching.
pub fn calculate_pivot(
    items: &[Value],
    item_type: &ValueType,
    definition: &PivotDefinition,
    state: &CollapseState,
) -> Result<PivotView> {
    let compiled = CompiledPivot::compile(item_type, definition)?;
    Ok(compiled.calculate(items, definition, state))
}

// ============================================================================
// PIVOT ENGINE
// ============================================================================

/// Source items, definition and collapse state, with a lazily computed view.
#[derive(Debug, Clone)]
pub struct PivotEngine {
    items: Vec<Value>,
    item_type: ValueType,
    definition: PivotDefinition,
    compiled: CompiledPivot,
    collapse: CollapseState,
    view: Option<PivotView>,
}

impl PivotEngine {
    /// Compiles `definition` against `item_type`. Unknown property paths fail here.
    pub fn new(items: Vec<Value>, item_type: ValueType, definition: PivotDefinition) -> Result<Self> {
        let compiled = CompiledPivot::compile(&item_type, &definition)?;
        log_info!(
            "PIVOT",
            "pivot over {} item(s): {} row field(s), {} column field(s), {} value field(s)",
            items.len(),
            definition.rows.len(),
            definition.columns.len(),
            definition.values.len()
        );
        Ok(PivotEngine {
            items,
            item_type,
            definition,
            compiled,
            collapse: CollapseState::new(),
            view: None,
        })
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn definition(&self) -> &PivotDefinition {
        &self.definition
    }

    pub fn collapse_state(&self) -> &CollapseState {
        &self.collapse
    }

    /// True when the next `view()` call will not recompute.
    pub fn is_view_cached(&self) -> bool {
        self.view.is_some()
    }

    /// The current view, recomputed if anything changed since the last call.
    pub fn view(&mut self) -> &PivotView {
        let PivotEngine {
            items,
            definition,
            compiled,
            collapse,
            view,
            ..
        } = self;
        view.get_or_insert_with(|| compiled.calculate(&*items, &*definition, &*collapse))
    }

    fn invalidate(&mut self) {
        self.view = None;
    }

    /// Replaces the source items; collapse state is kept.
    pub fn set_items(&mut self, items: Vec<Value>) {
        self.items = items;
        self.invalidate();
    }

    /// Replaces the definition. Collapse state is cleared since paths change meaning.
    pub fn set_definition(&mut self, definition: PivotDefinition) -> Result<()> {
        self.compiled = CompiledPivot::compile(&self.item_type, &definition)?;
        self.definition = definition;
        self.collapse.expand_all();
        self.invalidate();
        Ok(())
    }

    /// Restores externally stored collapse state.
    pub fn set_collapse_state(&mut self, state: CollapseState) {
        if self.collapse != state {
            self.collapse = state;
            self.invalidate();
        }
    }

    // ------------------------------------------------------------------------
    // Collapse / expand
    // ------------------------------------------------------------------------

    /// Returns true when the row node is now collapsed.
    pub fn toggle_row(&mut self, path: &GroupPath) -> bool {
        self.toggle(Axis::Rows, path)
    }

    /// Returns true when the column node is now collapsed.
    pub fn toggle_column(&mut self, path: &GroupPath) -> bool {
        self.toggle(Axis::Columns, path)
    }

    fn toggle(&mut self, axis: Axis, path: &GroupPath) -> bool {
        let collapsed = self.collapse.toggle(axis, path);
        log_debug!(
            "PIVOT",
            "{} {} '{}'",
            if collapsed { "collapsed" } else { "expanded" },
            axis.name(),
            path.to_path_key(&self.definition.layout.path_separator)
        );
        self.invalidate();
        collapsed
    }

    pub fn set_row_collapsed(&mut self, path: &GroupPath, collapsed: bool) {
        if self.collapse.set_collapsed(Axis::Rows, path, collapsed) {
            self.invalidate();
        }
    }

    pub fn set_column_collapsed(&mut self, path: &GroupPath, collapsed: bool) {
        if self.collapse.set_collapsed(Axis::Columns, path, collapsed) {
            self.invalidate();
        }
    }

    pub fn expand_all(&mut self) {
        if !self.collapse.is_empty() {
            self.collapse.expand_all();
            self.invalidate();
        }
    }

    /// Collapses every node that has child groups, on both axes.
    pub fn collapse_all(&mut self) {
        for axis in [Axis::Rows, Axis::Columns] {
            let groups = self.compiled.keys(axis).group(&self.items);
            let mut paths = Vec::new();
            interior_paths(&groups, &mut paths);
            for path in &paths {
                self.collapse.set_collapsed(axis, path, true);
            }
        }
        log_debug!(
            "PIVOT",
            "collapsed {} row and {} column node(s)",
            self.collapse.rows.len(),
            self.collapse.columns.len()
        );
        self.invalidate();
    }

    // ------------------------------------------------------------------------
    // Drill-down
    // ------------------------------------------------------------------------

    /// Source items behind a body cell: those under both `row` and `column`.
    /// Root paths select the whole axis, so `(root, root)` returns every item.
    pub fn drill_down(&self, row: &GroupPath, column: &GroupPath) -> Result<Vec<&Value>> {
        for (axis, path) in [(Axis::Rows, row), (Axis::Columns, column)] {
            let levels = self.compiled.keys(axis).len();
            if path.depth() > levels {
                return Err(PivotError::PathTooDeep {
                    axis: axis.name(),
                    path: path.clone(),
                    levels,
                });
            }
        }
        Ok(self
            .items
            .iter()
            .filter(|item| self.compiled.row_keys.matches(row, item) && self.compiled.column_keys.matches(column, item))
            .collect())
    }
}
