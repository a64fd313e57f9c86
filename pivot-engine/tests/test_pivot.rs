//! FILENAME: tests/test_pivot.rs
//! Integration tests for pivot calculation, collapse state and drill-down.

mod common;

use common::{assert_amount, path, SalesFixture};
use pivot_engine::{
    AggregateFunction, HeaderCellKind, PivotDefinition, PivotEngine, PivotField, PivotLayout, ValueField,
};
use query_engine::{GroupPath, Value};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn engine_for(definition: PivotDefinition) -> PivotEngine {
    PivotEngine::new(SalesFixture::records(), SalesFixture::item_type(), definition).unwrap()
}

fn region_by_year() -> PivotDefinition {
    PivotDefinition::new()
        .row(PivotField::new("Region"))
        .column(PivotField::new("Year"))
        .value(ValueField::new("Amount", AggregateFunction::Sum))
}

fn region_product_by_year() -> PivotDefinition {
    PivotDefinition::new()
        .row(PivotField::new("Region"))
        .row(PivotField::new("Product"))
        .column(PivotField::new("Year"))
        .value(ValueField::new("Amount", AggregateFunction::Sum))
        .value(ValueField::new("Units", AggregateFunction::Count))
}

fn region_by_product_year() -> PivotDefinition {
    PivotDefinition::new()
        .row(PivotField::new("Region"))
        .column(PivotField::new("Product"))
        .column(PivotField::new("Year"))
        .value(ValueField::new("Amount", AggregateFunction::Sum))
}

fn west() -> GroupPath {
    path(&[Value::from("West")])
}

// ============================================================================
// CELL VALUES
// ============================================================================

#[test]
fn test_cell_equals_filtered_sum() {
    let mut engine = engine_for(region_by_year());
    let view = engine.view();

    let expected = SalesFixture::amount_where(|region, _, year| region == "West" && year == 2023);
    assert_amount(view.value_at(&west(), &path(&[Value::Int(2023)]), 0), expected);
}

#[test]
fn test_every_cell_matches_its_source_rows() {
    let mut engine = engine_for(region_by_year());
    let view = engine.view().clone();

    for region in SalesFixture::regions() {
        for year in SalesFixture::years() {
            let expected = SalesFixture::amount_where(|r, _, y| r == region && y == year);
            assert_amount(
                view.value_at(&path(&[Value::from(region)]), &path(&[Value::Int(year)]), 0),
                expected,
            );
        }
    }
}

#[test]
fn test_totals() {
    let mut engine = engine_for(region_by_year());
    let view = engine.view();

    assert_amount(view.grand_total(0), SalesFixture::amount_where(|_, _, _| true));
    assert_amount(
        view.column_total(&path(&[Value::Int(2024)]), 0),
        SalesFixture::amount_where(|_, _, year| year == 2024),
    );
    assert_amount(
        view.row(&west()).and_then(|row| row.totals.first()),
        SalesFixture::amount_where(|region, _, _| region == "West"),
    );
}

#[test]
fn test_layout_can_hide_totals() {
    let layout = PivotLayout {
        show_row_totals: false,
        show_column_totals: false,
        show_grand_totals: false,
        ..PivotLayout::default()
    };
    let mut engine = engine_for(region_by_year().with_layout(layout));
    let view = engine.view();

    assert!(view.grand_totals.is_empty());
    assert!(view.column_totals.is_empty());
    assert!(view.rows.iter().all(|row| row.totals.is_empty()));
}

#[test]
fn test_value_cell_count_is_leaves_times_values() {
    let mut engine = engine_for(region_product_by_year());
    let view = engine.view();

    assert_eq!(view.column_leaves.len(), 3);
    assert_eq!(view.value_count, 2);
    assert_eq!(view.value_cell_count(), 6);
    assert_eq!(view.value_headers.len(), 6);
    assert_eq!(view.value_headers[1], "Count of Units");
    for row in &view.rows {
        assert_eq!(row.values.len(), view.value_cell_count());
    }
}

// ============================================================================
// COLLAPSE / EXPAND
// ============================================================================

#[test]
fn test_collapsing_a_row_keeps_the_grand_total() {
    let mut engine = engine_for(region_product_by_year());
    let expanded_total = engine.view().grand_total(0).cloned();
    let expanded_rows = engine.view().rows.len();

    assert!(engine.toggle_row(&west()));
    let view = engine.view();

    assert_eq!(view.grand_total(0).cloned(), expanded_total);
    assert_eq!(view.rows.len(), expanded_rows - 2);
    let west_row = view.row(&west()).unwrap();
    assert!(west_row.header_cells[0].is_collapsed);
    assert_eq!(west_row.header_cells[1].kind, HeaderCellKind::Filler);
    assert_amount(
        west_row.totals.first(),
        SalesFixture::amount_where(|region, _, _| region == "West"),
    );
}

#[test]
fn test_collapsing_a_column_keeps_its_total() {
    let mut engine = engine_for(region_by_product_year());
    let grand_total = engine.view().grand_total(0).cloned();
    let widget = path(&[Value::from("Widget")]);

    assert!(engine.toggle_column(&widget));
    let view = engine.view();

    assert_eq!(view.column_leaves.len(), 7);
    assert_eq!(view.column_leaves[0], widget);
    assert_eq!(view.grand_total(0).cloned(), grand_total);
    assert_amount(
        view.column_total(&widget, 0),
        SalesFixture::amount_where(|_, product, _| product == "Widget"),
    );
    assert_amount(
        view.value_at(&west(), &widget, 0),
        SalesFixture::amount_where(|region, product, _| region == "West" && product == "Widget"),
    );

    let collapsed = &view.column_headers[0][0];
    assert!(collapsed.is_collapsed);
    assert_eq!(collapsed.row_span, 2);
    assert_eq!(collapsed.col_span, 1);
    assert_eq!(view.column_headers[1].len(), 6);
}

#[test]
fn test_column_header_spans() {
    let mut engine = engine_for(region_by_product_year());
    let view = engine.view();

    assert_eq!(view.column_headers.len(), 2);
    let top: usize = view.column_headers[0].iter().map(|cell| cell.col_span).sum();
    assert_eq!(top, view.value_cell_count());
    assert!(view.column_headers[0].iter().all(|cell| cell.col_span == 3));
    assert_eq!(view.column_headers[1][0].path_key, "Widget/2022");
}

#[test]
fn test_row_headers_stay_rectangular() {
    let mut engine = engine_for(region_product_by_year());
    engine.toggle_row(&west());
    let view = engine.view();

    for row in &view.rows {
        assert_eq!(row.header_cells.len(), view.row_levels);
    }
    for level in 0..view.row_levels {
        let covered: usize = view
            .rows
            .iter()
            .map(|row| &row.header_cells[level])
            .map(|cell| match cell.kind {
                HeaderCellKind::Group => cell.row_span,
                HeaderCellKind::Filler => 1,
                HeaderCellKind::Spanned => 0,
            })
            .sum();
        assert_eq!(covered, view.rows.len(), "level {} is not fully covered", level);
    }
}

#[test]
fn test_collapse_all_and_expand_all() {
    let mut engine = engine_for(region_product_by_year());
    engine.collapse_all();
    assert_eq!(engine.view().rows.len(), SalesFixture::regions().len());

    engine.expand_all();
    assert!(engine.collapse_state().is_empty());
    assert_eq!(engine.view().rows.len(), 12);
}

#[test]
fn test_new_definition_clears_collapse_state() {
    let mut engine = engine_for(region_product_by_year());
    engine.toggle_row(&west());
    engine.set_definition(region_by_year()).unwrap();
    assert!(engine.collapse_state().is_empty());
    assert_eq!(engine.view().rows.len(), 4);
}

#[test]
fn test_blank_keys_get_a_title() {
    let mut items = SalesFixture::records();
    items.push(query_engine::record([
        ("Region", Value::Null),
        ("Product", Value::from("Widget")),
        ("Year", Value::Int(2023)),
        ("Amount", Value::Float(5.0)),
        ("Units", Value::Int(1)),
    ]));
    let mut engine = PivotEngine::new(items, SalesFixture::item_type(), region_by_year()).unwrap();
    let view = engine.view();

    let blank = view.row(&path(&[Value::Null])).unwrap();
    assert_eq!(blank.header_cells[0].title, "(blank)");
    assert_amount(blank.totals.first(), 5.0);
}

// ============================================================================
// DRILL-DOWN
// ============================================================================

#[test]
fn test_drill_down_returns_cell_items() {
    let engine = engine_for(region_by_year());
    let items = engine.drill_down(&west(), &path(&[Value::Int(2023)])).unwrap();

    assert_eq!(items.len(), SalesFixture::products().len() * 2);
    let total: f64 = items.iter().filter_map(|item| item.get("Amount")).filter_map(Value::as_f64).sum();
    assert!((total - SalesFixture::amount_where(|r, _, y| r == "West" && y == 2023)).abs() < 1e-6);
}

#[test]
fn test_drill_down_rejects_deep_paths() {
    let engine = engine_for(region_by_year());
    let too_deep = path(&[Value::from("West"), Value::from("Widget")]);
    assert!(engine.drill_down(&too_deep, &GroupPath::root()).is_err());
}
