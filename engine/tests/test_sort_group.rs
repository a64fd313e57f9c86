//! FILENAME: tests/test_sort_group.rs
//! Integration tests for multi-key sorting, grouping and the query pipeline.

mod common;

use std::collections::BTreeSet;

use common::{ids, CustomerFixture};
use query_engine::{
    group, sort_items, Dialect, FetchRequest, FilterDescriptor, FilterOperator, GroupDescriptor, GroupPath, Page,
    Query, QueryResult, SortDescriptor, SortOrder, Sorter, Value,
};

fn text_of(item: &Value, property: &str) -> String {
    item.get(property).map(|v| v.to_string()).unwrap_or_default()
}

// ============================================================================
// SORTING
// ============================================================================

#[test]
fn test_sort_is_idempotent() {
    let sorts = [SortDescriptor::ascending("Country"), SortDescriptor::descending("Age")];
    let mut items = CustomerFixture::records();
    sort_items(&CustomerFixture::item_type(), &sorts, &mut items).unwrap();
    let once = ids(&items);
    sort_items(&CustomerFixture::item_type(), &sorts, &mut items).unwrap();
    assert_eq!(ids(&items), once);
}

#[test]
fn test_sort_is_stable_and_keyed_left_to_right() {
    let sorts = [SortDescriptor::descending("Country"), SortDescriptor::ascending("Age")];
    let items = CustomerFixture::records();
    let sorter = Sorter::compile(&CustomerFixture::item_type(), &sorts).unwrap();
    let sorted = sorter.sorted(&items);

    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (ca, cb) = (text_of(a, "Country"), text_of(b, "Country"));
        assert!(ca >= cb);
        if ca == cb {
            let (aa, ab) = (a.get("Age").and_then(Value::as_f64), b.get("Age").and_then(Value::as_f64));
            assert!(aa <= ab);
            if aa == ab {
                assert!(ids([a]) < ids([b]), "equal keys must keep input order");
            }
        }
    }
}

#[test]
fn test_null_strings_sort_as_empty() {
    let items = CustomerFixture::records();
    let sorter = Sorter::compile(&CustomerFixture::item_type(), &[SortDescriptor::ascending("Email")]).unwrap();
    let sorted = sorter.sorted(&items);
    let blanks: Vec<i64> = (0..CustomerFixture::COUNT as i64).filter(|id| id % 9 == 0 || id % 9 == 4).collect();
    assert_eq!(ids(sorted[..blanks.len()].iter().copied()), blanks);
}

#[test]
fn test_empty_sort_list_is_identity() {
    let mut items = CustomerFixture::records();
    let before = ids(&items);
    sort_items(&CustomerFixture::item_type(), &[], &mut items).unwrap();
    assert_eq!(ids(&items), before);
}

// ============================================================================
// GROUPING
// ============================================================================

#[test]
fn test_country_city_grouping() {
    let items = CustomerFixture::records();
    let groups = group(&items, &CustomerFixture::item_type(), &["Country", "City"]).unwrap();

    let top_keys: Vec<String> = groups.iter().map(|g| g.key.to_string()).collect();
    assert_eq!(top_keys, vec!["Norway", "Sweden", "Denmark", "Finland"]);

    for country in &groups {
        let cities: BTreeSet<String> = country.items.iter().map(|item| text_of(item, "City")).collect();
        let subgroups = country.subgroups.as_ref().expect("a second level");
        assert_eq!(subgroups.len(), cities.len());
        for city in subgroups {
            assert!(city.is_leaf());
            assert_eq!(city.count, city.items.len());
            assert_eq!(city.path, GroupPath::from_keys([country.key.clone(), city.key.clone()]));
        }
    }
}

#[test]
fn test_leaves_cover_every_item_once() {
    let items = CustomerFixture::records();
    let groups = group(&items, &CustomerFixture::item_type(), &["Country", "Status", "City"]).unwrap();
    let leaf_ids: Vec<i64> = groups
        .iter()
        .flat_map(|g| g.leaves())
        .flat_map(|leaf| ids(leaf.items.iter().copied()))
        .collect();
    assert_eq!(leaf_ids.len(), items.len());
    assert_eq!(leaf_ids.iter().collect::<BTreeSet<_>>().len(), items.len());
}

// ============================================================================
// QUERY PIPELINE
// ============================================================================

#[test]
fn test_query_pages_after_counting() {
    let query = Query {
        filters: vec![FilterDescriptor::new("Country", FilterOperator::Equals, "Denmark")],
        sorts: vec![SortDescriptor::descending("Id")],
        skip: Some(5),
        top: Some(10),
        ..Query::default()
    };
    let items = CustomerFixture::records();
    let result: QueryResult<'_> = query.execute(&items, &CustomerFixture::item_type()).unwrap();
    assert_eq!(result.total_count, 25);
    let expected: Vec<i64> = (0..100).rev().filter(|id| id % 4 == 2).skip(5).take(10).collect();
    assert_eq!(ids(result.items.iter().copied()), expected);
}

#[test]
fn test_sorted_groups_come_out_ordered() {
    let query = Query {
        groups: vec![GroupDescriptor::new("Country").sorted(SortOrder::Ascending)],
        ..Query::default()
    };
    let items = CustomerFixture::records();
    let result = query.execute(&items, &CustomerFixture::item_type()).unwrap();
    let groups = result.group(&CustomerFixture::item_type(), &query.groups).unwrap();
    let keys: Vec<String> = groups.iter().map(|g| g.key.to_string()).collect();
    assert_eq!(keys, vec!["Denmark", "Finland", "Norway", "Sweden"]);
}

#[test]
fn test_remote_fetch_receives_odata_text() {
    let query = Query {
        filters: vec![
            FilterDescriptor::new("Tags", FilterOperator::Contains, "VIP"),
            FilterDescriptor::new("Age", FilterOperator::LessThan, 30),
        ],
        sorts: vec![SortDescriptor::ascending("Name")],
        skip: Some(0),
        top: Some(20),
        select: Some("Id,Name".to_string()),
        ..Query::default()
    };

    let mut requests: Vec<FetchRequest> = Vec::new();
    let records = CustomerFixture::records();
    let mut source = |request: &FetchRequest| -> query_engine::Result<Page> {
        requests.push(request.clone());
        Ok(Page {
            items: records.iter().take(2).cloned().collect(),
            total_count: records.len(),
        })
    };
    let page = query.fetch(&mut source, Dialect::OData, &CustomerFixture::item_type()).unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_count, 100);

    let request = &requests[0];
    assert_eq!(request.filter.as_deref(), Some("Tags/any(x: x eq 'VIP') and Age lt 30"));
    assert_eq!(request.order_by.as_deref(), Some("Name asc"));
    let query_string = request.to_odata_query();
    assert!(query_string.contains("%24top=20"));
    assert!(query_string.contains("%24select=Id%2CName"));
}
