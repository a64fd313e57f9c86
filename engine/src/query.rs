//! FILENAME: engine/src/query.rs
//! PURPOSE: The aggregate query record and its two execution paths.
//! CONTEXT: In memory, a query compiles to a predicate and a sorter and is
//! applied to a slice of items. Remotely, the same descriptors are rendered
//! by a serializer into a `FetchRequest` handed to a caller-supplied
//! `DataSource`, which answers with one page and the total count.

use query_parser::Dialect;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::descriptor::{
    CaseSensitivity, FilterDescriptor, GroupDescriptor, LogicalFilterOperator, QueryOptions, SortDescriptor,
};
use crate::error::Result;
use crate::group::{GroupKeys, GroupResult};
use crate::predicate::{compile, Predicate};
use crate::schema::ValueType;
use crate::serialize::{serialize_filters, serialize_sorts};
use crate::sort::Sorter;
use crate::text::parse_filter;
use crate::value::Value;
use crate::{log_debug, log_info};

/// A declarative query: filters, sort keys, grouping and paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    /// Raw filter text, AND-ed with `filters`.
    pub filter: Option<String>,
    pub filters: Vec<FilterDescriptor>,
    pub sorts: Vec<SortDescriptor>,
    pub groups: Vec<GroupDescriptor>,
    pub skip: Option<usize>,
    pub top: Option<usize>,
    /// Raw order-by text, used when `sorts` is empty.
    pub order_by: Option<String>,
    pub expand: Option<String>,
    pub select: Option<String>,
    /// Combines `filters`.
    pub logical_filter_operator: LogicalFilterOperator,
    pub case_sensitivity: CaseSensitivity,
}

/// One page of in-memory results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<'a> {
    pub items: Vec<&'a Value>,
    /// Matching items before paging.
    pub total_count: usize,
}

impl<'a> QueryResult<'a> {
    /// Groups the page items by the given descriptors.
    pub fn group(&self, item_type: &ValueType, groups: &[GroupDescriptor]) -> Result<Vec<GroupResult<'a>>> {
        let paths: Vec<&str> = groups.iter().map(|g| g.property.as_str()).collect();
        let keys = GroupKeys::compile(item_type, &paths)?;
        Ok(keys.group(self.items.iter().copied()))
    }
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn with_options(options: QueryOptions) -> Self {
        Query {
            logical_filter_operator: options.logical_filter_operator,
            case_sensitivity: options.case_sensitivity,
            ..Query::default()
        }
    }

    pub fn options(&self) -> QueryOptions {
        QueryOptions {
            case_sensitivity: self.case_sensitivity,
            logical_filter_operator: self.logical_filter_operator,
        }
    }

    /// Sort keys contributed by sorted group descriptors, in group order.
    pub fn group_sorts(&self) -> Vec<SortDescriptor> {
        self.groups
            .iter()
            .filter_map(|g| {
                g.sort_order.map(|order| SortDescriptor {
                    property: g.property.clone(),
                    sort_order: Some(order),
                })
            })
            .collect()
    }

    /// Group sorts first, then `sorts` (or the parsed `order_by` text).
    pub fn effective_sorts(&self) -> Vec<SortDescriptor> {
        let mut sorts = self.group_sorts();
        if !self.sorts.is_empty() {
            sorts.extend(self.sorts.iter().cloned());
        } else if let Some(order_by) = self.order_by.as_deref() {
            sorts.extend(SortDescriptor::parse_order_by(order_by));
        }
        sorts
    }

    /// The combined in-memory predicate: `filters` AND `filter` text.
    pub fn predicate(&self, item_type: &ValueType) -> Result<Predicate> {
        let compiled = compile(item_type, &self.filters, self.logical_filter_operator, self.case_sensitivity)?;
        match self.filter.as_deref() {
            Some(text) => Ok(compiled.and(parse_filter(text, Dialect::Expression, item_type)?)),
            None => Ok(compiled),
        }
    }

    /// Filters, sorts and pages `items`.
    pub fn execute<'a>(&self, items: &'a [Value], item_type: &ValueType) -> Result<QueryResult<'a>> {
        let predicate = self.predicate(item_type)?;
        let sorter = Sorter::compile(item_type, &self.effective_sorts())?;

        let matching = sorter.sorted(predicate.filter(items));
        let total_count = matching.len();
        let page: Vec<&Value> = matching
            .into_iter()
            .skip(self.skip.unwrap_or(0))
            .take(self.top.unwrap_or(usize::MAX))
            .collect();

        log_debug!(
            "QUERY",
            "executed over {} item(s): {} matched, page of {}",
            items.len(),
            total_count,
            page.len()
        );
        Ok(QueryResult {
            items: page,
            total_count,
        })
    }

    /// Renders the query for a remote source speaking `dialect`.
    pub fn to_request(&self, dialect: Dialect, item_type: &ValueType) -> Result<FetchRequest> {
        let rendered = serialize_filters(
            dialect,
            item_type,
            &self.filters,
            self.logical_filter_operator,
            self.case_sensitivity,
        )?;
        let raw = self.filter.as_deref().map(str::trim).unwrap_or("");
        let filter = match (rendered.is_empty(), raw.is_empty()) {
            (true, true) => None,
            (false, true) => Some(rendered),
            (true, false) => Some(raw.to_string()),
            (false, false) => {
                let and = match dialect {
                    Dialect::Expression => "&&",
                    Dialect::OData => "and",
                };
                Some(format!("({}) {} ({})", rendered, and, raw))
            }
        };

        let sorts = self.effective_sorts();
        let order_by = if sorts.is_empty() {
            None
        } else {
            Some(serialize_sorts(dialect, &sorts)).filter(|s| !s.is_empty())
        };

        Ok(FetchRequest {
            skip: self.skip,
            top: self.top,
            order_by,
            filter,
            expand: self.expand.clone(),
            select: self.select.clone(),
        })
    }

    /// Renders the query and asks `source` for the page.
    pub fn fetch<S: DataSource + ?Sized>(
        &self,
        source: &mut S,
        dialect: Dialect,
        item_type: &ValueType,
    ) -> Result<Page> {
        let request = self.to_request(dialect, item_type)?;
        log_info!(
            "QUERY",
            "fetching skip={:?} top={:?} filter={:?}",
            request.skip,
            request.top,
            request.filter
        );
        let page = source.fetch(&request)?;
        log_debug!("QUERY", "fetched {} of {} item(s)", page.items.len(), page.total_count);
        Ok(page)
    }
}

// ============================================================================
// REMOTE FETCH
// ============================================================================

/// What a remote source needs to produce one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub skip: Option<usize>,
    pub top: Option<usize>,
    pub order_by: Option<String>,
    pub filter: Option<String>,
    pub expand: Option<String>,
    pub select: Option<String>,
}

impl FetchRequest {
    /// OData system query options as a URL query string (without the `?`).
    pub fn to_odata_query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(filter) = &self.filter {
            query.append_pair("$filter", filter);
        }
        if let Some(order_by) = &self.order_by {
            query.append_pair("$orderby", order_by);
        }
        if let Some(skip) = self.skip {
            query.append_pair("$skip", &skip.to_string());
        }
        if let Some(top) = self.top {
            query.append_pair("$top", &top.to_string());
        }
        if let Some(expand) = &self.expand {
            query.append_pair("$expand", expand);
        }
        if let Some(select) = &self.select {
            query.append_pair("$select", select);
        }
        query.append_pair("$count", "true");
        query.finish()
    }
}

/// One page returned by a remote source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<Value>,
    pub total_count: usize,
}

/// A remote source of pages. Any `FnMut(&FetchRequest) -> Result<Page>` is one.
pub trait DataSource {
    fn fetch(&mut self, request: &FetchRequest) -> Result<Page>;
}

impl<F> DataSource for F
where
    F: FnMut(&FetchRequest) -> Result<Page>,
{
    fn fetch(&mut self, request: &FetchRequest) -> Result<Page> {
        self(request)
    }
}
