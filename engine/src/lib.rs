//! FILENAME: engine/src/lib.rs
//! PURPOSE: Main library entry point for the query engine.
//! CONTEXT: Turns declarative filter, sort and group descriptors into
//! in-memory predicates, comparators and group trees, or into query text in
//! the Expression and OData dialects. Re-exports the public types for the
//! pivot crate and other consumers.

pub mod logging;

pub mod descriptor;
pub mod error;
pub mod expr;
pub mod group;
pub mod plan;
pub mod predicate;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod serialize;
pub mod settings;
pub mod sort;
pub mod text;
pub mod value;

// Re-export commonly used types at the crate root
pub use descriptor::{
    CaseSensitivity, CompositeFilterDescriptor, FilterDescriptor, FilterOperator, GroupDescriptor,
    LogicalFilterOperator, QueryOptions, SortDescriptor, SortOrder,
};
pub use error::{QueryError, Result};
pub use expr::{CompareOp, Expr, TextOp};
pub use group::{find_group, group, group_by_descriptors, GroupKeys, GroupPath, GroupResult};
pub use plan::{build_composite_plan, build_plan, Plan};
pub use predicate::{compile, compile_composite, compile_plan, Predicate};
pub use query::{DataSource, FetchRequest, Page, Query, QueryResult};
pub use query_parser::Dialect;
pub use resolver::{resolve, PathStep, ResolvedPath};
pub use schema::{EnumType, ObjectType, ValueType};
pub use serialize::{serialize_composite, serialize_filters, serialize_sorts};
pub use settings::{ColumnSettings, GridSettings};
pub use sort::{sort_items, Sorter};
pub use text::{lower_text, parse_filter};
pub use value::{record, EnumValue, Record, Value};

#[cfg(test)]
mod tests {
    use super::*;

    fn person_type() -> ValueType {
        ValueType::Object(
            ObjectType::class("Person")
                .property("Name", ValueType::String)
                .property("Age", ValueType::Int)
                .build(),
        )
    }

    #[test]
    fn it_filters_and_renders_the_same_descriptors() {
        let filters = [FilterDescriptor::new("Age", FilterOperator::GreaterThan, 30)];
        let items = vec![
            record([("Name", Value::from("Ann")), ("Age", Value::from(41))]),
            record([("Name", Value::from("Bob")), ("Age", Value::from(19))]),
        ];

        let predicate = compile(&person_type(), &filters, LogicalFilterOperator::And, CaseSensitivity::Default).unwrap();
        assert_eq!(predicate.filter(&items).count(), 1);

        let odata = serialize_filters(
            Dialect::OData,
            &person_type(),
            &filters,
            LogicalFilterOperator::And,
            CaseSensitivity::Default,
        )
        .unwrap();
        assert_eq!(odata, "Age gt 30");
    }
}
