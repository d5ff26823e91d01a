//! Simple-REST routing over a [`Dataset`]
//!
//! Transport-independent: takes the method, path, raw query and body of a
//! request and produces a status, an optional `Content-Range` and a JSON body.

use crate::core::{Filter, ProviderError, ProviderResult, Record, RecordId, Sort, SortOrder};
use crate::data::{Dataset, Window};
use hyper::{Method, StatusCode};
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct RestReply {
    pub status: StatusCode,
    pub content_range: Option<String>,
    pub body: Value,
}

impl RestReply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            content_range: None,
            body,
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            content_range: None,
            body: json!({ "error": message.into() }),
        }
    }
}

/// List parameters decoded from `sort`, `range` and `filter`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub sort: Option<Sort>,
    pub range: Option<(usize, usize)>,
    pub filter: Filter,
}

impl ListQuery {
    pub fn parse(query: Option<&str>) -> ProviderResult<Self> {
        let pairs = query_pairs(query)?;
        let mut parsed = ListQuery::default();

        if let Some(sort) = pairs.get("sort") {
            let (field, order): (String, String) = decode("sort", sort)?;
            let order = SortOrder::parse(&order).ok_or_else(|| {
                ProviderError::InvalidParams(format!("unknown sort order '{}'", order))
            })?;
            parsed.sort = Some(Sort::new(field, order));
        }
        if let Some(range) = pairs.get("range") {
            let (start, end): (usize, usize) = decode("range", range)?;
            if end < start {
                return Err(ProviderError::InvalidParams(format!(
                    "range end {} before start {}",
                    end, start
                )));
            }
            parsed.range = Some((start, end));
        }
        if let Some(filter) = pairs.get("filter") {
            parsed.filter = decode("filter", filter)?;
        }
        Ok(parsed)
    }
}

fn query_pairs(query: Option<&str>) -> ProviderResult<HashMap<String, String>> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Ok(HashMap::new());
    };
    let mut url = Url::parse("http://backend/")
        .map_err(|e| ProviderError::InvalidParams(e.to_string()))?;
    url.set_query(Some(query));
    Ok(url.query_pairs().into_owned().collect())
}

fn decode<T: serde::de::DeserializeOwned>(name: &str, raw: &str) -> ProviderResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| ProviderError::InvalidParams(format!("malformed {} '{}': {}", name, raw, e)))
}

fn status_for(error: &ProviderError) -> StatusCode {
    match error {
        ProviderError::NotFound { .. } | ProviderError::UnknownResource(_) => StatusCode::NOT_FOUND,
        ProviderError::InvalidParams(_) | ProviderError::Decode(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Route one request against the dataset
pub fn route(
    dataset: &Dataset,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &[u8],
) -> RestReply {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    debug!("Fake backend {} {}", method, path);

    let result = match (method, segments.as_slice()) {
        (&Method::GET, []) => Ok(RestReply::ok(json!({ "resources": dataset.resources() }))),
        (&Method::GET, [resource]) => list(dataset, resource, query),
        (&Method::POST, [resource]) => {
            read_record(body).and_then(|data| dataset.create(resource, data)).map(|created| {
                RestReply {
                    status: StatusCode::CREATED,
                    ..RestReply::ok(created.into_value())
                }
            })
        }
        (&Method::GET, [resource, id]) => dataset
            .get(resource, &RecordId::parse(id))
            .map(|record| RestReply::ok(record.into_value())),
        (&Method::PUT, [resource, id]) => read_record(body)
            .and_then(|data| dataset.update(resource, &RecordId::parse(id), &data))
            .map(|record| RestReply::ok(record.into_value())),
        (&Method::DELETE, [resource, id]) => dataset
            .delete(resource, &RecordId::parse(id))
            .map(|record| RestReply::ok(record.into_value())),
        (_, [] | [_] | [_, _]) => {
            return RestReply::error(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("{} not allowed", method),
            )
        }
        _ => return RestReply::error(StatusCode::NOT_FOUND, format!("no route for {}", path)),
    };

    result.unwrap_or_else(|e| RestReply::error(status_for(&e), e.to_string()))
}

fn list(dataset: &Dataset, resource: &str, query: Option<&str>) -> ProviderResult<RestReply> {
    let params = ListQuery::parse(query)?;
    let window = params.range.map(|(start, end)| Window::from_range(start, end));
    let (page, total) = dataset.query(resource, &params.filter, params.sort.as_ref(), window)?;

    let start = window.map_or(0, |w| w.offset);
    let end = if page.is_empty() {
        start
    } else {
        start.saturating_add(page.len() - 1)
    };
    let body = Value::Array(page.into_iter().map(Record::into_value).collect());

    Ok(RestReply {
        status: StatusCode::OK,
        content_range: Some(format!("{} {}-{}/{}", resource, start, end, total)),
        body,
    })
}

fn read_record(body: &[u8]) -> ProviderResult<Record> {
    serde_json::from_slice(body)
        .map_err(|e| ProviderError::InvalidParams(format!("malformed record body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GeneratorOptions;

    fn dataset() -> Dataset {
        Dataset::generate(&GeneratorOptions::small())
    }

    fn encode(raw: &str) -> String {
        let mut url = Url::parse("http://backend/").unwrap();
        url.query_pairs_mut().append_pair("x", raw);
        url.query().unwrap().trim_start_matches("x=").to_string()
    }

    #[test]
    fn test_list_with_range_sets_content_range() {
        let data = dataset();
        let query = format!("range={}", encode("[0,2]"));
        let reply = route(&data, &Method::GET, "/customers", Some(&query), b"");

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body.as_array().map(Vec::len), Some(3));
        let expected = format!("customers 0-2/{}", data.len("customers"));
        assert_eq!(reply.content_range.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_list_filter_by_ids() {
        let data = dataset();
        let query = format!("filter={}", encode(r#"{"id":[1,"2"]}"#));
        let reply = route(&data, &Method::GET, "/products", Some(&query), b"");
        assert_eq!(reply.body.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_sorted_list() {
        let data = dataset();
        let query = format!("sort={}", encode(r#"["id","DESC"]"#));
        let reply = route(&data, &Method::GET, "/categories", Some(&query), b"");
        let ids: Vec<i64> = reply
            .body
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_crud_round() {
        let data = dataset();
        let created = route(
            &data,
            &Method::POST,
            "/reviews",
            None,
            br#"{"status":"pending","rating":5}"#,
        );
        assert_eq!(created.status, StatusCode::CREATED);
        let id = created.body["id"].as_i64().unwrap();

        let path = format!("/reviews/{}", id);
        let updated = route(&data, &Method::PUT, &path, None, br#"{"status":"accepted"}"#);
        assert_eq!(updated.body["status"], json!("accepted"));
        assert_eq!(updated.body["rating"], json!(5));

        let deleted = route(&data, &Method::DELETE, &path, None, b"");
        assert_eq!(deleted.status, StatusCode::OK);
        let missing = route(&data, &Method::GET, &path, None, b"");
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unbounded_ranges_do_not_overflow() {
        let data = dataset();
        let total = data.len("orders");

        let query = format!("range={}", encode(&format!("[0,{}]", usize::MAX)));
        let reply = route(&data, &Method::GET, "/orders", Some(&query), b"");
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body.as_array().map(Vec::len), Some(total));

        let query = format!("range={}", encode(&format!("[{0},{0}]", usize::MAX)));
        let reply = route(&data, &Method::GET, "/orders", Some(&query), b"");
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!([]));
    }

    #[test]
    fn test_error_statuses() {
        let data = dataset();
        assert_eq!(
            route(&data, &Method::GET, "/invoices", None, b"").status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            route(&data, &Method::GET, "/orders", Some("range=oops"), b"").status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            route(&data, &Method::POST, "/orders", None, b"not json").status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            route(&data, &Method::PATCH, "/orders/1", None, b"").status,
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            route(&data, &Method::GET, "/orders/1/basket", None, b"").status,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_parse_list_query() {
        let query = format!(
            "sort={}&range={}&filter={}",
            encode(r#"["date","ASC"]"#),
            encode("[5,9]"),
            encode(r#"{"status":"ordered"}"#)
        );
        let parsed = ListQuery::parse(Some(&query)).unwrap();
        assert_eq!(parsed.sort, Some(Sort::asc("date")));
        assert_eq!(parsed.range, Some((5, 9)));
        assert_eq!(parsed.filter.get("status"), Some(&json!("ordered")));

        assert!(ListQuery::parse(Some(&format!("range={}", encode("[9,5]")))).is_err());
        assert_eq!(ListQuery::parse(None).unwrap(), ListQuery::default());
    }
}
