//! Provider backed directly by an in-memory [`Dataset`]

use super::DataProvider;
use crate::core::{
    CreateParams, DeleteManyParams, DeleteParams, GetManyParams, GetOneParams, IdsResult,
    ListParams, ListResult, ManyResult, ProviderResult, RecordResult, ReferenceParams,
    UpdateManyParams, UpdateParams,
};
use crate::data::{Dataset, Window};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    dataset: Arc<Dataset>,
}

impl InMemoryProvider {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }
}

fn window(pagination: &crate::core::Pagination) -> Window {
    Window {
        offset: pagination.offset(),
        limit: pagination.per_page,
    }
}

#[async_trait]
impl DataProvider for InMemoryProvider {
    async fn get_list(&self, resource: &str, params: ListParams) -> ProviderResult<ListResult> {
        let (data, total) = self.dataset.query(
            resource,
            &params.filter,
            Some(&params.sort),
            Some(window(&params.pagination)),
        )?;
        Ok(ListResult { data, total })
    }

    async fn get_one(&self, resource: &str, params: GetOneParams) -> ProviderResult<RecordResult> {
        let data = self.dataset.get(resource, &params.id)?;
        Ok(RecordResult { data })
    }

    async fn get_many(&self, resource: &str, params: GetManyParams) -> ProviderResult<ManyResult> {
        let data = self.dataset.get_many(resource, &params.ids)?;
        Ok(ManyResult { data })
    }

    async fn get_many_reference(
        &self,
        resource: &str,
        params: ReferenceParams,
    ) -> ProviderResult<ListResult> {
        let mut filter = params.filter;
        filter.insert(params.target, params.id.to_value());
        let (data, total) = self.dataset.query(
            resource,
            &filter,
            Some(&params.sort),
            Some(window(&params.pagination)),
        )?;
        Ok(ListResult { data, total })
    }

    async fn create(&self, resource: &str, params: CreateParams) -> ProviderResult<RecordResult> {
        let data = self.dataset.create(resource, params.data)?;
        Ok(RecordResult { data })
    }

    async fn update(&self, resource: &str, params: UpdateParams) -> ProviderResult<RecordResult> {
        let data = self.dataset.update(resource, &params.id, &params.data)?;
        Ok(RecordResult { data })
    }

    async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> ProviderResult<IdsResult> {
        let mut updated = Vec::with_capacity(params.ids.len());
        for id in params.ids {
            self.dataset.update(resource, &id, &params.data)?;
            updated.push(id);
        }
        Ok(IdsResult { data: updated })
    }

    async fn delete(&self, resource: &str, params: DeleteParams) -> ProviderResult<RecordResult> {
        let data = self.dataset.delete(resource, &params.id)?;
        Ok(RecordResult { data })
    }

    async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> ProviderResult<IdsResult> {
        let mut deleted = Vec::with_capacity(params.ids.len());
        for id in params.ids {
            self.dataset.delete(resource, &id)?;
            deleted.push(id);
        }
        Ok(IdsResult { data: deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProviderError, Record, RecordId, Sort};
    use crate::data::GeneratorOptions;
    use serde_json::json;

    fn provider() -> InMemoryProvider {
        InMemoryProvider::new(Arc::new(Dataset::generate(&GeneratorOptions::small())))
    }

    #[tokio::test]
    async fn test_get_list_paginates() {
        let provider = provider();
        let result = provider
            .get_list("customers", ListParams::default().page(2, 3).sort(Sort::asc("id")))
            .await
            .unwrap();
        assert_eq!(result.total, 8);
        let ids: Vec<_> = result.data.iter().filter_map(Record::id).collect();
        assert_eq!(ids, vec![RecordId::Int(4), RecordId::Int(5), RecordId::Int(6)]);
    }

    #[tokio::test]
    async fn test_get_one_seeded_customer() {
        let provider = provider();
        let expected = provider.dataset().get("customers", &RecordId::Int(3)).unwrap();
        let result = provider
            .get_one("customers", GetOneParams::new(3))
            .await
            .unwrap();
        assert_eq!(result.data, expected);
    }

    #[tokio::test]
    async fn test_get_many_reference_filters_by_target() {
        let provider = provider();
        let orders = provider
            .get_many_reference("orders", ReferenceParams::new("customer_id", 1))
            .await
            .unwrap();
        assert!(orders
            .data
            .iter()
            .all(|order| order.get("customer_id") == Some(&json!(1))));
    }

    #[tokio::test]
    async fn test_write_operations() {
        let provider = provider();
        let created = provider
            .create(
                "categories",
                CreateParams {
                    data: Record::new().field("name", "maps"),
                },
            )
            .await
            .unwrap();
        let id = created.data.id().unwrap();

        let updated = provider
            .update_many(
                "categories",
                UpdateManyParams {
                    ids: vec![id.clone()],
                    data: Record::new().field("name", "old maps"),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.data, vec![id.clone()]);

        provider
            .delete(
                "categories",
                DeleteParams {
                    id: id.clone(),
                    previous_data: None,
                },
            )
            .await
            .unwrap();
        let err = provider
            .get_one("categories", GetOneParams { id })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }
}
