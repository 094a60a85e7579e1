/// Query builder and response types
///
/// A [`Filter`] maps field names, optionally suffixed with an operator tag
/// such as `?lt`, to comparison values. Conditions within one filter are
/// ANDed; the filters of a [`Query`] are ORed by the service.
use crate::Keyed;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Comparison operators understood by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Prefix,
    Range,
    Contains,
    NotContains,
}

impl Operator {
    /// Suffix appended to the field name, `None` for equality
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Operator::Equal => None,
            Operator::NotEqual => Some("ne"),
            Operator::LessThan => Some("lt"),
            Operator::GreaterThan => Some("gt"),
            Operator::LessThanOrEqual => Some("lte"),
            Operator::GreaterThanOrEqual => Some("gte"),
            Operator::Prefix => Some("pfx"),
            Operator::Range => Some("r"),
            Operator::Contains => Some("contains"),
            Operator::NotContains => Some("not_contains"),
        }
    }
}

/// One AND-group of conditions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Map<String, Value>);

impl Filter {
    /// Create an empty filter (matches every item)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on `field`
    pub fn condition(mut self, field: &str, op: Operator, value: impl Into<Value>) -> Self {
        let key = match op.suffix() {
            Some(suffix) => format!("{}?{}", field, suffix),
            None => field.to_string(),
        };
        self.0.insert(key, value.into());
        self
    }

    pub fn equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::Equal, value)
    }

    pub fn not_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::NotEqual, value)
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::LessThan, value)
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::GreaterThan, value)
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::LessThanOrEqual, value)
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::GreaterThanOrEqual, value)
    }

    /// String field starts with `prefix`
    pub fn prefix(self, field: &str, prefix: impl Into<String>) -> Self {
        self.condition(field, Operator::Prefix, Value::String(prefix.into()))
    }

    /// Inclusive range `[lower, upper]`
    pub fn range(self, field: &str, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        self.condition(field, Operator::Range, Value::Array(vec![lower.into(), upper.into()]))
    }

    /// String field contains a substring, or list field contains an element
    pub fn contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::Contains, value)
    }

    pub fn not_contains(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, Operator::NotContains, value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(conditions: Map<String, Value>) -> Self {
        Self(conditions)
    }
}

/// A list of OR-ed filters. An empty query matches every item.
///
/// Built from a single [`Filter`] or a list of them; always sent as a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(Vec<Filter>);

impl Query {
    /// Query matching every item
    pub fn all() -> Self {
        Self::default()
    }

    /// Add another alternative
    pub fn or(mut self, filter: Filter) -> Self {
        self.0.push(filter);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.0
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Self(vec![filter])
    }
}

impl From<Vec<Filter>> for Query {
    fn from(filters: Vec<Filter>) -> Self {
        Self(filters)
    }
}

impl<const N: usize> From<[Filter; N]> for Query {
    fn from(filters: [Filter; N]) -> Self {
        Self(filters.into())
    }
}

/// Body of `POST /query`. Absent `limit`/`last` are omitted, never defaulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub query: Query,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<Query>, limit: Option<usize>, last: Option<&str>) -> Self {
        Self {
            query: query.into(),
            limit,
            last: last.map(str::to_string),
        }
    }
}

/// Page metadata returned with query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paging {
    /// Number of items in this page
    pub size: usize,
    /// Cursor for the next page; `None` on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Query response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct QueryResponse<T> {
    pub paging: Paging,
    #[serde(default = "Vec::new")]
    pub items: Vec<Keyed<T>>,
}

impl<T> QueryResponse<T> {
    /// Cursor to pass as `last` for the next page
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging.last.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.paging.last.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_operators() {
        let filter = Filter::new()
            .equal("name", "alice")
            .not_equal("role", "admin")
            .lt("age", 40)
            .gte("score", 10)
            .prefix("email", "alice@")
            .range("height", 150, 190)
            .contains("tags", "rust")
            .not_contains("bio", "spam");

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({
                "name": "alice",
                "role?ne": "admin",
                "age?lt": 40,
                "score?gte": 10,
                "email?pfx": "alice@",
                "height?r": [150, 190],
                "tags?contains": "rust",
                "bio?not_contains": "spam"
            })
        );
    }

    #[test]
    fn test_single_filter_normalized_to_list() {
        let filter = Filter::new().equal("name", "alice");
        let single = QueryRequest::new(filter.clone(), None, None);
        let list = QueryRequest::new(vec![filter], None, None);

        assert_eq!(single, list);
        assert_eq!(
            serde_json::to_value(&single).unwrap(),
            json!({ "query": [{ "name": "alice" }] })
        );
    }

    #[test]
    fn test_or_query() {
        let query = Query::from([Filter::new().equal("a", 1), Filter::new().equal("b", 2)]);
        let chained = Query::all()
            .or(Filter::new().equal("a", 1))
            .or(Filter::new().equal("b", 2));

        assert_eq!(query, chained);
        assert_eq!(query.filters().len(), 2);
    }

    #[test]
    fn test_limit_and_last_omitted_when_absent() {
        let body = serde_json::to_value(QueryRequest::new(Query::all(), None, None)).unwrap();
        assert_eq!(body, json!({ "query": [] }));

        let body = serde_json::to_value(QueryRequest::new(Query::all(), Some(5), Some("k9"))).unwrap();
        assert_eq!(body, json!({ "query": [], "limit": 5, "last": "k9" }));
    }

    #[test]
    fn test_filter_from_raw_map() {
        let raw = json!({ "age?gt": 18 }).as_object().cloned().unwrap();
        let filter = Filter::from(raw);
        assert_eq!(filter, Filter::new().gt("age", 18));
    }

    #[test]
    fn test_response_paging() {
        let response: QueryResponse<Map<String, Value>> = serde_json::from_value(json!({
            "paging": { "size": 1, "last": "k1" },
            "items": [{ "key": "k1", "name": "alice" }]
        }))
        .unwrap();

        assert!(response.has_more());
        assert_eq!(response.next_cursor(), Some("k1"));
        assert_eq!(response.items[0].key, "k1");
        assert_eq!(response.items[0].item.get("name"), Some(&json!("alice")));

        let last_page: QueryResponse<Map<String, Value>> =
            serde_json::from_value(json!({ "paging": { "size": 0 }, "items": [] })).unwrap();
        assert!(!last_page.has_more());
    }
}
