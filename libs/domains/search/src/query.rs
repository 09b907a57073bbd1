//! Elasticsearch query DSL for a [`SearchRequest`].

use serde_json::{Map, Value, json};

use crate::models::SearchRequest;

/// Builds the `_search` body:
///
/// ```json
/// { "query": { "bool": { "must": [ {"match": {...}}, {"range": {"price": {...}}} ] } },
///   "sort": [ { "price": { "order": "desc" } } ],
///   "from": 0, "size": 10 }
/// ```
///
/// One `match` per filter in key order, then a single `range` on price when
/// either bound is positive. `sort` is omitted unless requested.
pub fn build_query(request: &SearchRequest) -> Value {
    let mut must: Vec<Value> = request
        .filters
        .iter()
        .map(|(field, value)| json!({ "match": { field: value } }))
        .collect();

    let mut price = Map::new();
    if request.min_price > 0.0 {
        price.insert("gte".into(), json!(request.min_price));
    }
    if request.max_price > 0.0 {
        price.insert("lte".into(), json!(request.max_price));
    }
    if !price.is_empty() {
        must.push(json!({ "range": { "price": price } }));
    }

    let mut body = json!({
        "query": { "bool": { "must": must } },
        "from": request.from(),
        "size": request.limit,
    });

    if let Some(sort) = &request.sort {
        body["sort"] = json!([{ &sort.field: { "order": sort.order.as_ref() } }]);
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sort, SortOrder};

    #[test]
    fn test_empty_request() {
        let body = build_query(&SearchRequest::new());
        assert_eq!(
            body,
            json!({
                "query": { "bool": { "must": [] } },
                "from": 0,
                "size": 10
            })
        );
    }

    #[test]
    fn test_filters_are_in_key_order() {
        let request = SearchRequest::new()
            .filter("name", "widget")
            .filter("category", "tools")
            .filter("attributes.color", "red");
        let body = build_query(&request);

        assert_eq!(
            body["query"]["bool"]["must"],
            json!([
                { "match": { "attributes.color": "red" } },
                { "match": { "category": "tools" } },
                { "match": { "name": "widget" } }
            ])
        );
    }

    #[test]
    fn test_price_range_only_carries_positive_bounds() {
        let body = build_query(&SearchRequest::new().price_range(10.0, 0.0));
        assert_eq!(
            body["query"]["bool"]["must"],
            json!([{ "range": { "price": { "gte": 10.0 } } }])
        );

        let body = build_query(&SearchRequest::new().price_range(10.0, 50.0));
        assert_eq!(
            body["query"]["bool"]["must"],
            json!([{ "range": { "price": { "gte": 10.0, "lte": 50.0 } } }])
        );

        let body = build_query(&SearchRequest::new().price_range(0.0, -1.0));
        assert_eq!(body["query"]["bool"]["must"], json!([]));
    }

    #[test]
    fn test_sort_and_pagination() {
        let request = SearchRequest::new()
            .sorted(Sort::by_price(SortOrder::Desc))
            .paged(3, 20);
        let body = build_query(&request);

        assert_eq!(body["sort"], json!([{ "price": { "order": "desc" } }]));
        assert_eq!(body["from"], 40);
        assert_eq!(body["size"], 20);
    }

    #[test]
    fn test_same_request_same_query() {
        let build = || {
            build_query(
                &SearchRequest::new()
                    .filter("b", "2")
                    .filter("a", "1")
                    .price_range(1.0, 2.0),
            )
        };
        assert_eq!(build().to_string(), build().to_string());
    }
}
