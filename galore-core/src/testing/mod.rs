//! Test doubles for the data-access layers
//!
//! [`ScriptedProvider`] serves a real [`Dataset`] but can be told to fail,
//! hang or slow down, per method or for the next few calls, and counts every
//! call it receives.

use crate::core::{
    CreateParams, DeleteManyParams, DeleteParams, GetManyParams, GetOneParams, IdsResult,
    ListParams, ListResult, ManyResult, Method, ProviderError, ProviderResult, RecordResult,
    ReferenceParams, UpdateManyParams, UpdateParams,
};
use crate::data::Dataset;
use crate::provider::{DataProvider, InMemoryProvider};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a scripted call does before (or instead of) reaching the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Pass,
    /// Return a transport error
    Fail,
    /// Never complete
    Hang,
    /// Panic inside the call
    Panic,
}

pub struct ScriptedProvider {
    inner: InMemoryProvider,
    default: Mutex<Behavior>,
    per_method: Mutex<HashMap<Method, Behavior>>,
    script: Mutex<VecDeque<Behavior>>,
    delay: Mutex<Duration>,
    calls: DashMap<Method, usize>,
    total: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self {
            inner: InMemoryProvider::new(dataset),
            default: Mutex::new(Behavior::Pass),
            per_method: Mutex::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            delay: Mutex::new(Duration::ZERO),
            calls: DashMap::new(),
            total: AtomicUsize::new(0),
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        self.inner.dataset()
    }

    /// Behavior of every call not covered by a script entry or a method override
    pub fn set_behavior(&self, behavior: Behavior) {
        *self.default.lock() = behavior;
    }

    pub fn set_method_behavior(&self, method: Method, behavior: Behavior) {
        self.per_method.lock().insert(method, behavior);
    }

    /// One-shot behaviors consumed by the next calls, in order
    pub fn push_script(&self, behaviors: impl IntoIterator<Item = Behavior>) {
        self.script.lock().extend(behaviors);
    }

    /// Delay applied before every call settles
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls_for(&self, method: Method) -> usize {
        self.calls.get(&method).map_or(0, |count| *count)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn next_behavior(&self, method: Method) -> Behavior {
        if let Some(behavior) = self.script.lock().pop_front() {
            return behavior;
        }
        if let Some(behavior) = self.per_method.lock().get(&method) {
            return *behavior;
        }
        *self.default.lock()
    }

    async fn enter(&self, method: Method, resource: &str) -> ProviderResult<()> {
        *self.calls.entry(method).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        let behavior = self.next_behavior(method);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match behavior {
            Behavior::Pass => Ok(()),
            Behavior::Fail => Err(ProviderError::Transport {
                url: format!("scripted://{}/{}", resource, method),
                message: "scripted failure".to_string(),
            }),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Behavior::Panic => panic!("scripted panic in {} on {}", method, resource),
        }
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn get_list(&self, resource: &str, params: ListParams) -> ProviderResult<ListResult> {
        self.enter(Method::GetList, resource).await?;
        self.inner.get_list(resource, params).await
    }

    async fn get_one(&self, resource: &str, params: GetOneParams) -> ProviderResult<RecordResult> {
        self.enter(Method::GetOne, resource).await?;
        self.inner.get_one(resource, params).await
    }

    async fn get_many(&self, resource: &str, params: GetManyParams) -> ProviderResult<ManyResult> {
        self.enter(Method::GetMany, resource).await?;
        self.inner.get_many(resource, params).await
    }

    async fn get_many_reference(
        &self,
        resource: &str,
        params: ReferenceParams,
    ) -> ProviderResult<ListResult> {
        self.enter(Method::GetManyReference, resource).await?;
        self.inner.get_many_reference(resource, params).await
    }

    async fn create(&self, resource: &str, params: CreateParams) -> ProviderResult<RecordResult> {
        self.enter(Method::Create, resource).await?;
        self.inner.create(resource, params).await
    }

    async fn update(&self, resource: &str, params: UpdateParams) -> ProviderResult<RecordResult> {
        self.enter(Method::Update, resource).await?;
        self.inner.update(resource, params).await
    }

    async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> ProviderResult<IdsResult> {
        self.enter(Method::UpdateMany, resource).await?;
        self.inner.update_many(resource, params).await
    }

    async fn delete(&self, resource: &str, params: DeleteParams) -> ProviderResult<RecordResult> {
        self.enter(Method::Delete, resource).await?;
        self.inner.delete(resource, params).await
    }

    async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> ProviderResult<IdsResult> {
        self.enter(Method::DeleteMany, resource).await?;
        self.inner.delete_many(resource, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GeneratorOptions;

    fn scripted() -> ScriptedProvider {
        ScriptedProvider::new(Arc::new(Dataset::generate(&GeneratorOptions::small())))
    }

    #[tokio::test]
    async fn test_script_takes_precedence() {
        let provider = scripted();
        provider.set_method_behavior(Method::GetOne, Behavior::Fail);
        provider.push_script([Behavior::Pass]);

        assert!(provider.get_one("customers", GetOneParams::new(1)).await.is_ok());
        assert!(provider.get_one("customers", GetOneParams::new(1)).await.is_err());
        assert!(provider.get_list("customers", ListParams::default()).await.is_ok());

        assert_eq!(provider.calls_for(Method::GetOne), 2);
        assert_eq!(provider.calls_for(Method::GetList), 1);
        assert_eq!(provider.total_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_applied() {
        let provider = scripted();
        provider.set_delay(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        provider.get_list("orders", ListParams::default()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
