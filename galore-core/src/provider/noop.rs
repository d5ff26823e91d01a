//! Provider that answers every call with an empty or zeroed result

use super::DataProvider;
use crate::core::{
    CreateParams, DeleteManyParams, DeleteParams, GetManyParams, GetOneParams, IdsResult,
    ListParams, ListResult, ManyResult, ProviderResult, Record, RecordId, RecordResult,
    ReferenceParams, UpdateManyParams, UpdateParams,
};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvider;

fn zero_record() -> RecordResult {
    RecordResult {
        data: Record::with_id(RecordId::Int(0)),
    }
}

#[async_trait]
impl DataProvider for NoopProvider {
    async fn get_list(&self, _resource: &str, _params: ListParams) -> ProviderResult<ListResult> {
        Ok(ListResult::default())
    }

    async fn get_one(&self, _resource: &str, _params: GetOneParams) -> ProviderResult<RecordResult> {
        Ok(zero_record())
    }

    async fn get_many(&self, _resource: &str, _params: GetManyParams) -> ProviderResult<ManyResult> {
        Ok(ManyResult::default())
    }

    async fn get_many_reference(
        &self,
        _resource: &str,
        _params: ReferenceParams,
    ) -> ProviderResult<ListResult> {
        Ok(ListResult::default())
    }

    async fn create(&self, _resource: &str, _params: CreateParams) -> ProviderResult<RecordResult> {
        Ok(zero_record())
    }

    async fn update(&self, _resource: &str, _params: UpdateParams) -> ProviderResult<RecordResult> {
        Ok(zero_record())
    }

    async fn update_many(
        &self,
        _resource: &str,
        _params: UpdateManyParams,
    ) -> ProviderResult<IdsResult> {
        Ok(IdsResult::default())
    }

    async fn delete(&self, _resource: &str, _params: DeleteParams) -> ProviderResult<RecordResult> {
        Ok(zero_record())
    }

    async fn delete_many(
        &self,
        _resource: &str,
        _params: DeleteManyParams,
    ) -> ProviderResult<IdsResult> {
        Ok(IdsResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_results_are_empty() {
        let provider = NoopProvider;
        let list = provider
            .get_list("orders", ListParams::default())
            .await
            .unwrap();
        assert!(list.data.is_empty());
        assert_eq!(list.total, 0);

        let one = provider
            .get_one("orders", GetOneParams::new(12))
            .await
            .unwrap();
        assert_eq!(one.data.id(), Some(RecordId::Int(0)));

        let ids = provider
            .delete_many("orders", DeleteManyParams { ids: vec![RecordId::Int(1)] })
            .await
            .unwrap();
        assert!(ids.data.is_empty());
    }
}
