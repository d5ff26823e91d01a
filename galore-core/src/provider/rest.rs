//! Simple-REST dialect over an [`HttpClient`]
//!
//! | method             | request                                              |
//! |--------------------|------------------------------------------------------|
//! | `get_list`         | `GET /res?sort=["f","ASC"]&range=[s,e]&filter={..}`  |
//! | `get_one`          | `GET /res/:id`                                       |
//! | `get_many`         | `GET /res?filter={"id":[..]}`                        |
//! | `get_many_reference` | `GET /res?filter={"target":id,..}&sort&range`      |
//! | `create`           | `POST /res`                                          |
//! | `update`           | `PUT /res/:id`                                       |
//! | `update_many`      | one `PUT /res/:id` per id                            |
//! | `delete`           | `DELETE /res/:id`                                    |
//! | `delete_many`      | one `DELETE /res/:id` per id                         |
//!
//! List totals come from the `Content-Range: res start-end/total` header.

use super::DataProvider;
use crate::core::{
    CreateParams, DeleteManyParams, DeleteParams, Filter, GetManyParams, GetOneParams, IdsResult,
    ListParams, ListResult, ManyResult, Pagination, ProviderError, ProviderResult, Record,
    RecordId, RecordResult, ReferenceParams, Sort, UpdateManyParams, UpdateParams,
};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};

pub struct RestProvider<C> {
    base_url: Url,
    client: C,
}

impl<C: HttpClient> RestProvider<C> {
    pub fn new(base_url: Url, client: C) -> Self {
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn endpoint(&self, resource: &str, id: Option<&RecordId>) -> ProviderResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProviderError::InvalidParams(format!("{} cannot be a base URL", self.base_url))
            })?;
            segments.pop_if_empty().push(resource);
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }
        Ok(url)
    }

    fn list_url(
        &self,
        resource: &str,
        pagination: &Pagination,
        sort: &Sort,
        filter: &Filter,
    ) -> ProviderResult<Url> {
        let (start, end) = pagination.range();
        let mut url = self.endpoint(resource, None)?;
        url.query_pairs_mut()
            .append_pair("sort", &json!([sort.field, sort.order.as_str()]).to_string())
            .append_pair("range", &json!([start, end]).to_string())
            .append_pair("filter", &Value::Object(filter.clone()).to_string());
        Ok(url)
    }

    async fn fetch_list(&self, url: Url) -> ProviderResult<ListResult> {
        let response = self.client.fetch_json(HttpRequest::get(url)).await?;
        let total = content_range_total(&response)?;
        let data = records(response.json)?;
        Ok(ListResult { data, total })
    }
}

/// Total from `Content-Range: <unit> <start>-<end>/<total>`
fn content_range_total(response: &HttpResponse) -> ProviderResult<usize> {
    let header = response.header("content-range").ok_or_else(|| {
        ProviderError::Decode(
            "missing Content-Range header; expose it with Access-Control-Expose-Headers".into(),
        )
    })?;
    header
        .rsplit('/')
        .next()
        .and_then(|total| total.trim().parse().ok())
        .ok_or_else(|| ProviderError::Decode(format!("malformed Content-Range '{}'", header)))
}

fn record(value: Value) -> ProviderResult<Record> {
    serde_json::from_value(value).map_err(|e| ProviderError::Decode(format!("record: {}", e)))
}

/// Single-record bodies; an array answer (synthesized fallback) yields its first element
fn single_record(value: Value, id: &RecordId) -> ProviderResult<Record> {
    match value {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => record(first),
            None => Ok(Record::with_id(id.clone())),
        },
        Value::Null => Ok(Record::with_id(id.clone())),
        other => record(other),
    }
}

fn records(value: Value) -> ProviderResult<Vec<Record>> {
    match value {
        Value::Array(items) => items.into_iter().map(record).collect(),
        other => Err(ProviderError::Decode(format!(
            "expected a JSON array, got {}",
            other
        ))),
    }
}

fn returned_id(json: &Value, requested: &RecordId) -> RecordId {
    json.get("id")
        .and_then(RecordId::from_value)
        .unwrap_or_else(|| requested.clone())
}

#[async_trait]
impl<C: HttpClient> DataProvider for RestProvider<C> {
    async fn get_list(&self, resource: &str, params: ListParams) -> ProviderResult<ListResult> {
        let url = self.list_url(resource, &params.pagination, &params.sort, &params.filter)?;
        self.fetch_list(url).await
    }

    async fn get_one(&self, resource: &str, params: GetOneParams) -> ProviderResult<RecordResult> {
        let url = self.endpoint(resource, Some(&params.id))?;
        let response = self.client.fetch_json(HttpRequest::get(url)).await?;
        let data = single_record(response.json, &params.id)?;
        Ok(RecordResult { data })
    }

    async fn get_many(&self, resource: &str, params: GetManyParams) -> ProviderResult<ManyResult> {
        let ids: Vec<Value> = params.ids.iter().map(RecordId::to_value).collect();
        let mut url = self.endpoint(resource, None)?;
        url.query_pairs_mut()
            .append_pair("filter", &json!({ "id": ids }).to_string());
        let response = self.client.fetch_json(HttpRequest::get(url)).await?;
        let data = records(response.json)?;
        Ok(ManyResult { data })
    }

    async fn get_many_reference(
        &self,
        resource: &str,
        params: ReferenceParams,
    ) -> ProviderResult<ListResult> {
        let mut filter = params.filter;
        filter.insert(params.target, params.id.to_value());
        let url = self.list_url(resource, &params.pagination, &params.sort, &filter)?;
        self.fetch_list(url).await
    }

    async fn create(&self, resource: &str, params: CreateParams) -> ProviderResult<RecordResult> {
        let url = self.endpoint(resource, None)?;
        let body = params.data.clone().into_value();
        let response = self.client.fetch_json(HttpRequest::post(url, body)).await?;

        let mut data = params.data;
        match response.json.get("id").and_then(RecordId::from_value) {
            Some(id) => data.set_id(id),
            None => {
                return Err(ProviderError::Decode(
                    "create response carries no id".into(),
                ))
            }
        }
        Ok(RecordResult { data })
    }

    async fn update(&self, resource: &str, params: UpdateParams) -> ProviderResult<RecordResult> {
        let url = self.endpoint(resource, Some(&params.id))?;
        let body = params.data.into_value();
        let response = self.client.fetch_json(HttpRequest::put(url, body)).await?;
        let data = single_record(response.json, &params.id)?;
        Ok(RecordResult { data })
    }

    async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> ProviderResult<IdsResult> {
        let body = params.data.into_value();
        let mut updated = Vec::with_capacity(params.ids.len());
        for id in &params.ids {
            let url = self.endpoint(resource, Some(id))?;
            let response = self
                .client
                .fetch_json(HttpRequest::put(url, body.clone()))
                .await?;
            updated.push(returned_id(&response.json, id));
        }
        Ok(IdsResult { data: updated })
    }

    async fn delete(&self, resource: &str, params: DeleteParams) -> ProviderResult<RecordResult> {
        let url = self.endpoint(resource, Some(&params.id))?;
        let response = self.client.fetch_json(HttpRequest::delete(url)).await?;
        let data = single_record(response.json, &params.id)?;
        Ok(RecordResult { data })
    }

    async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> ProviderResult<IdsResult> {
        let mut deleted = Vec::with_capacity(params.ids.len());
        for id in &params.ids {
            let url = self.endpoint(resource, Some(id))?;
            let response = self.client.fetch_json(HttpRequest::delete(url)).await?;
            deleted.push(returned_id(&response.json, id));
        }
        Ok(IdsResult { data: deleted })
    }
}
