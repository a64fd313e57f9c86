//! FILENAME: tests/test_round_trip.rs
//! Serialized filter text, parsed back in its own dialect, selects the same
//! rows as the compiled in-memory predicate.

mod common;

use common::{day, ids, CustomerFixture};
use query_engine::{
    compile, compile_composite, parse_filter, serialize_composite, serialize_filters, CaseSensitivity,
    CompositeFilterDescriptor, Dialect, FilterDescriptor, FilterOperator, LogicalFilterOperator, Value,
};

const DIALECTS: [Dialect; 2] = [Dialect::Expression, Dialect::OData];

fn assert_round_trip(filters: &[FilterDescriptor], combinator: LogicalFilterOperator, case: CaseSensitivity) {
    let item_type = CustomerFixture::item_type();
    let items = CustomerFixture::records();
    let expected = ids(compile(&item_type, filters, combinator, case).unwrap().filter(&items));

    for dialect in DIALECTS {
        let text = serialize_filters(dialect, &item_type, filters, combinator, case).unwrap();
        let parsed = parse_filter(&text, dialect, &item_type)
            .unwrap_or_else(|e| panic!("{:?} text did not parse: {}\n{}", dialect, text, e));
        assert_eq!(
            ids(parsed.filter(&items)),
            expected,
            "{:?} text selected different rows: {}",
            dialect,
            text
        );
    }
}

fn single(filter: FilterDescriptor) {
    assert_round_trip(&[filter], LogicalFilterOperator::And, CaseSensitivity::Default);
}

#[test]
fn test_scalar_comparisons() {
    single(FilterDescriptor::new("Age", FilterOperator::GreaterThan, 30));
    single(FilterDescriptor::new("Age", FilterOperator::LessThanOrEquals, 30));
    single(FilterDescriptor::new("Age", FilterOperator::NotEquals, 46));
    single(FilterDescriptor::new("Country", FilterOperator::Equals, "Finland"));
    single(FilterDescriptor::new("Joined", FilterOperator::GreaterThanOrEquals, day(2022, 6, 1)));
}

#[test]
fn test_string_functions() {
    single(FilterDescriptor::new("Name", FilterOperator::StartsWith, "Anna"));
    single(FilterDescriptor::new("City", FilterOperator::EndsWith, "o"));
    single(FilterDescriptor::new("Email", FilterOperator::Contains, "1@"));
    single(FilterDescriptor::new("Email", FilterOperator::DoesNotContain, "7"));
}

#[test]
fn test_case_insensitive_text() {
    let filters = [
        FilterDescriptor::new("Name", FilterOperator::Contains, "AN"),
        FilterDescriptor::new("Country", FilterOperator::Equals, "norway"),
    ];
    assert_round_trip(&filters, LogicalFilterOperator::Or, CaseSensitivity::CaseInsensitive);
}

#[test]
fn test_null_and_empty_checks() {
    single(FilterDescriptor::new("Email", FilterOperator::IsNull, Value::Null));
    single(FilterDescriptor::new("Email", FilterOperator::IsNotNull, Value::Null));
    single(FilterDescriptor::new("Email", FilterOperator::IsEmpty, Value::Null));
    single(FilterDescriptor::new("Email", FilterOperator::IsNotEmpty, Value::Null));
}

#[test]
fn test_null_strings_read_as_empty() {
    for case in [CaseSensitivity::Default, CaseSensitivity::CaseInsensitive] {
        let filters = [
            FilterDescriptor::new("Email", FilterOperator::Equals, ""),
            FilterDescriptor::new("Email", FilterOperator::NotEquals, ""),
            FilterDescriptor::new("Email", FilterOperator::LessThan, "b"),
            FilterDescriptor::new("Email", FilterOperator::LessThanOrEquals, ""),
            FilterDescriptor::new("Email", FilterOperator::GreaterThan, ""),
            FilterDescriptor::new("Email", FilterOperator::GreaterThanOrEquals, "B"),
            FilterDescriptor::new("Email", FilterOperator::In, vec!["", "c3@example.com"]),
            FilterDescriptor::new("Email", FilterOperator::NotIn, vec![""]),
            FilterDescriptor::new("Email", FilterOperator::StartsWith, ""),
            FilterDescriptor::new("Email", FilterOperator::EndsWith, ""),
            FilterDescriptor::new("Email", FilterOperator::Contains, ""),
            FilterDescriptor::new("Email", FilterOperator::DoesNotContain, ""),
        ];
        for filter in filters {
            assert_round_trip(&[filter], LogicalFilterOperator::And, case);
        }
    }
}

#[test]
fn test_null_strings_inside_combinations() {
    let filters = [
        FilterDescriptor::new("Email", FilterOperator::LessThan, "c")
            .with_second(FilterOperator::NotEquals, "")
            .with_logic(LogicalFilterOperator::And),
        FilterDescriptor::new("Age", FilterOperator::GreaterThan, 40),
    ];
    assert_round_trip(&filters, LogicalFilterOperator::Or, CaseSensitivity::Default);
    assert_round_trip(&filters, LogicalFilterOperator::And, CaseSensitivity::CaseInsensitive);
}

#[test]
fn test_set_membership() {
    single(FilterDescriptor::new("Country", FilterOperator::In, vec!["Norway", "Sweden"]));
    single(FilterDescriptor::new("City", FilterOperator::NotIn, vec!["Oslo", "Espoo", "Malmo"]));
    single(FilterDescriptor::new("Status", FilterOperator::In, vec!["Active", "Churned"]));
    single(FilterDescriptor::new("Age", FilterOperator::In, 18));
}

#[test]
fn test_collection_properties() {
    single(FilterDescriptor::new("Tags", FilterOperator::Contains, "VIP"));
    single(FilterDescriptor::new("Tags", FilterOperator::DoesNotContain, "newsletter"));
    single(FilterDescriptor::new("Tags", FilterOperator::In, vec!["VIP", "newsletter"]));
    single(FilterDescriptor::new("Orders", FilterOperator::GreaterThan, 120).with_filter_property("Total"));
    assert_round_trip(
        &[FilterDescriptor::new("Tags", FilterOperator::Contains, "vip")],
        LogicalFilterOperator::And,
        CaseSensitivity::CaseInsensitive,
    );
}

#[test]
fn test_two_value_filters_and_outer_combinator() {
    let filters = [
        FilterDescriptor::new("Age", FilterOperator::LessThan, 25)
            .with_second(FilterOperator::GreaterThan, 70)
            .with_logic(LogicalFilterOperator::Or),
        FilterDescriptor::new("Country", FilterOperator::NotEquals, "Denmark"),
    ];
    assert_round_trip(&filters, LogicalFilterOperator::And, CaseSensitivity::Default);
    assert_round_trip(&filters, LogicalFilterOperator::Or, CaseSensitivity::Default);
}

#[test]
fn test_composite_tree() {
    let tree = CompositeFilterDescriptor::group(
        LogicalFilterOperator::And,
        vec![
            CompositeFilterDescriptor::group(
                LogicalFilterOperator::Or,
                vec![
                    CompositeFilterDescriptor::leaf(FilterDescriptor::new("Country", FilterOperator::Equals, "Sweden")),
                    CompositeFilterDescriptor::leaf(FilterDescriptor::new("Tags", FilterOperator::Contains, "VIP")),
                ],
            )
            .unwrap(),
            CompositeFilterDescriptor::leaf(FilterDescriptor::new("Age", FilterOperator::GreaterThanOrEquals, 30)),
        ],
    )
    .unwrap();

    let item_type = CustomerFixture::item_type();
    let items = CustomerFixture::records();
    let case = CaseSensitivity::Default;
    let expected = ids(compile_composite(&item_type, &tree, case).unwrap().filter(&items));
    assert!(!expected.is_empty());

    for dialect in DIALECTS {
        let text = serialize_composite(dialect, &item_type, &tree, case).unwrap();
        let parsed = parse_filter(&text, dialect, &item_type).unwrap();
        assert_eq!(ids(parsed.filter(&items)), expected, "{:?}: {}", dialect, text);
    }
}
