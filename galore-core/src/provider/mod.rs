//! The data-access contract and its implementations
//!
//! [`DataProvider`] is the uniform interface the admin screens read and write
//! through. The method set is closed: [`Call`] enumerates one request per
//! method and [`dispatch`] is the table that routes a call to its method, so
//! layers that wrap a provider handle every operation in one place.
//!
//! ## Implementations
//!
//! - [`memory::InMemoryProvider`]: serves a seeded [`Dataset`](crate::data::Dataset)
//! - [`rest::RestProvider`]: simple-REST dialect over an [`HttpClient`](crate::http::HttpClient)
//! - [`noop::NoopProvider`]: empty results, used when setup fails

pub mod memory;
pub mod noop;
pub mod rest;

pub use memory::InMemoryProvider;
pub use noop::NoopProvider;
pub use rest::RestProvider;

use crate::core::{
    CreateParams, DeleteManyParams, DeleteParams, GetManyParams, GetOneParams, IdsResult,
    ListParams, ListResult, ManyResult, Method, ProviderError, ProviderResult, RecordResult,
    ReferenceParams, UpdateManyParams, UpdateParams,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Whether this build declares abort-signal support to callers
pub fn abort_signal_supported() -> bool {
    cfg!(feature = "production")
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn get_list(&self, resource: &str, params: ListParams) -> ProviderResult<ListResult>;

    async fn get_one(&self, resource: &str, params: GetOneParams) -> ProviderResult<RecordResult>;

    async fn get_many(&self, resource: &str, params: GetManyParams) -> ProviderResult<ManyResult>;

    async fn get_many_reference(
        &self,
        resource: &str,
        params: ReferenceParams,
    ) -> ProviderResult<ListResult>;

    async fn create(&self, resource: &str, params: CreateParams) -> ProviderResult<RecordResult>;

    async fn update(&self, resource: &str, params: UpdateParams) -> ProviderResult<RecordResult>;

    async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> ProviderResult<IdsResult>;

    async fn delete(&self, resource: &str, params: DeleteParams) -> ProviderResult<RecordResult>;

    async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> ProviderResult<IdsResult>;

    /// Completes once the provider can serve calls
    ///
    /// Providers built lazily wait for their setup here; deadlines applied by
    /// wrapping layers start after it returns.
    async fn wait_until_ready(&self) {}

    /// Capability advertisement, driven by the build mode
    fn supports_abort_signal(&self) -> bool {
        abort_signal_supported()
    }
}

#[async_trait]
impl<P: DataProvider + ?Sized> DataProvider for Arc<P> {
    async fn get_list(&self, resource: &str, params: ListParams) -> ProviderResult<ListResult> {
        (**self).get_list(resource, params).await
    }

    async fn get_one(&self, resource: &str, params: GetOneParams) -> ProviderResult<RecordResult> {
        (**self).get_one(resource, params).await
    }

    async fn get_many(&self, resource: &str, params: GetManyParams) -> ProviderResult<ManyResult> {
        (**self).get_many(resource, params).await
    }

    async fn get_many_reference(
        &self,
        resource: &str,
        params: ReferenceParams,
    ) -> ProviderResult<ListResult> {
        (**self).get_many_reference(resource, params).await
    }

    async fn create(&self, resource: &str, params: CreateParams) -> ProviderResult<RecordResult> {
        (**self).create(resource, params).await
    }

    async fn update(&self, resource: &str, params: UpdateParams) -> ProviderResult<RecordResult> {
        (**self).update(resource, params).await
    }

    async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> ProviderResult<IdsResult> {
        (**self).update_many(resource, params).await
    }

    async fn delete(&self, resource: &str, params: DeleteParams) -> ProviderResult<RecordResult> {
        (**self).delete(resource, params).await
    }

    async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> ProviderResult<IdsResult> {
        (**self).delete_many(resource, params).await
    }

    async fn wait_until_ready(&self) {
        (**self).wait_until_ready().await
    }

    fn supports_abort_signal(&self) -> bool {
        (**self).supports_abort_signal()
    }
}

/// One request of the data-access contract
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetList(ListParams),
    GetOne(GetOneParams),
    GetMany(GetManyParams),
    GetManyReference(ReferenceParams),
    Create(CreateParams),
    Update(UpdateParams),
    UpdateMany(UpdateManyParams),
    Delete(DeleteParams),
    DeleteMany(DeleteManyParams),
}

impl Call {
    pub fn method(&self) -> Method {
        match self {
            Call::GetList(_) => Method::GetList,
            Call::GetOne(_) => Method::GetOne,
            Call::GetMany(_) => Method::GetMany,
            Call::GetManyReference(_) => Method::GetManyReference,
            Call::Create(_) => Method::Create,
            Call::Update(_) => Method::Update,
            Call::UpdateMany(_) => Method::UpdateMany,
            Call::Delete(_) => Method::Delete,
            Call::DeleteMany(_) => Method::DeleteMany,
        }
    }
}

/// Result shape of a [`Call`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    List(ListResult),
    Record(RecordResult),
    Many(ManyResult),
    Ids(IdsResult),
}

impl Reply {
    pub fn into_list(self, method: Method) -> ProviderResult<ListResult> {
        match self {
            Reply::List(result) => Ok(result),
            _ => Err(ProviderError::UnexpectedReply { method }),
        }
    }

    pub fn into_record(self, method: Method) -> ProviderResult<RecordResult> {
        match self {
            Reply::Record(result) => Ok(result),
            _ => Err(ProviderError::UnexpectedReply { method }),
        }
    }

    pub fn into_many(self, method: Method) -> ProviderResult<ManyResult> {
        match self {
            Reply::Many(result) => Ok(result),
            _ => Err(ProviderError::UnexpectedReply { method }),
        }
    }

    pub fn into_ids(self, method: Method) -> ProviderResult<IdsResult> {
        match self {
            Reply::Ids(result) => Ok(result),
            _ => Err(ProviderError::UnexpectedReply { method }),
        }
    }
}

/// Route `call` to the matching method of `provider`
pub async fn dispatch<P>(provider: &P, resource: &str, call: Call) -> ProviderResult<Reply>
where
    P: DataProvider + ?Sized,
{
    match call {
        Call::GetList(params) => provider.get_list(resource, params).await.map(Reply::List),
        Call::GetOne(params) => provider.get_one(resource, params).await.map(Reply::Record),
        Call::GetMany(params) => provider.get_many(resource, params).await.map(Reply::Many),
        Call::GetManyReference(params) => provider
            .get_many_reference(resource, params)
            .await
            .map(Reply::List),
        Call::Create(params) => provider.create(resource, params).await.map(Reply::Record),
        Call::Update(params) => provider.update(resource, params).await.map(Reply::Record),
        Call::UpdateMany(params) => provider.update_many(resource, params).await.map(Reply::Ids),
        Call::Delete(params) => provider.delete(resource, params).await.map(Reply::Record),
        Call::DeleteMany(params) => provider.delete_many(resource, params).await.map(Reply::Ids),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordId;

    #[test]
    fn test_call_method_mapping() {
        assert_eq!(Call::GetList(ListParams::default()).method(), Method::GetList);
        assert_eq!(
            Call::GetOne(GetOneParams::new(1)).method(),
            Method::GetOne
        );
        assert_eq!(
            Call::DeleteMany(DeleteManyParams { ids: vec![RecordId::Int(1)] }).method(),
            Method::DeleteMany
        );
    }

    #[test]
    fn test_reply_shape_mismatch() {
        let reply = Reply::Ids(IdsResult::default());
        assert_eq!(
            reply.into_list(Method::GetList),
            Err(ProviderError::UnexpectedReply {
                method: Method::GetList
            })
        );
    }

    #[tokio::test]
    async fn test_dispatch_through_arc_dyn() {
        let provider: Arc<dyn DataProvider> = Arc::new(NoopProvider);
        let reply = dispatch(&provider, "customers", Call::GetList(ListParams::default()))
            .await
            .unwrap();
        assert_eq!(reply, Reply::List(ListResult::default()));
        assert_eq!(provider.supports_abort_signal(), abort_signal_supported());
    }
}
