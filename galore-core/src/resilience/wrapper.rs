//! Resilient call wrapper around any [`DataProvider`]
//!
//! Every method goes through [`ResilientProvider::call`]:
//! 1. Skip to fallback data if the `<method>-<resource>` key is permanently failed
//! 2. Wait until the underlying provider is ready (lazy setup is not timed)
//! 3. Race the underlying call against `call_timeout`
//! 4. Success clears the key and passes the result through untouched
//! 5. Failure (an error, a timeout or a panic) counts against the key,
//!    notifies observers and, under [`FailurePolicy::Mask`], answers with
//!    fallback data
//!
//! Fallback shapes:
//! - `getList` / `getManyReference` / `getMany`: the resource's fallback records
//! - `getOne`: the fallback record with that id, else `{id}`
//! - `create`: the submitted fields plus a fresh id
//! - `update`: the submitted fields
//! - `delete`: `{id}`
//! - `updateMany` / `deleteMany`: the submitted ids

use super::events::{FailureEvent, FailureKind, FailureObserver, FailurePolicy};
use super::state::ResilienceState;
use crate::core::{
    CreateParams, DeleteManyParams, DeleteParams, GetManyParams, GetOneParams, IdsResult,
    ListParams, ListResult, ManyResult, Method, ProviderError, ProviderResult, Record, RecordId,
    RecordResult, ReferenceParams, UpdateManyParams, UpdateParams,
};
use crate::data::FallbackData;
use crate::provider::{dispatch, Call, DataProvider, Reply};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceConfig {
    /// Deadline for one forwarded call; provider setup is awaited first
    pub call_timeout: Duration,
    /// Failures tolerated per key before it is permanently failed
    pub max_retries: u32,
    pub policy: FailurePolicy,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(3),
            max_retries: ResilienceState::DEFAULT_MAX_RETRIES,
            policy: FailurePolicy::Mask,
        }
    }
}

/// Millisecond-clock ids, strictly increasing within the process
#[derive(Debug, Default)]
struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    fn next(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let mut previous = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.max(previous + 1);
            match self.last.compare_exchange_weak(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(actual) => previous = actual,
            }
        }
    }
}

pub struct ResilientProvider<P> {
    inner: P,
    config: ResilienceConfig,
    state: Arc<ResilienceState>,
    fallback: Arc<FallbackData>,
    observers: Vec<Arc<dyn FailureObserver>>,
    ids: IdGenerator,
}

impl<P: DataProvider> ResilientProvider<P> {
    pub fn new(inner: P, config: ResilienceConfig) -> Self {
        Self {
            state: Arc::new(ResilienceState::new(config.max_retries)),
            inner,
            config,
            fallback: FallbackData::shared(),
            observers: Vec::new(),
            ids: IdGenerator::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<FallbackData>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Share a tracker with another layer or keep a handle for `reset()`
    pub fn with_state(mut self, state: Arc<ResilienceState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn FailureObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<ResilienceState> {
        &self.state
    }

    /// Start a new session: every key becomes fresh again
    pub fn reset(&self) {
        self.state.reset();
    }

    pub fn request_key(method: Method, resource: &str) -> String {
        format!("{}-{}", method.name(), resource)
    }

    /// Run one call through the timeout, tracking and fallback steps
    pub async fn call(&self, resource: &str, call: Call) -> ProviderResult<Reply> {
        let method = call.method();
        let key = Self::request_key(method, resource);

        if self.state.should_bypass(&key) {
            debug!("Using fallback data for {} without a live attempt", key);
            let error = ProviderError::PermanentlyFailed(key.clone());
            return self.recover(resource, &key, &call, FailureKind::Bypassed, error);
        }

        self.inner.wait_until_ready().await;

        debug!("Calling {} on resource {}", method, resource);
        let attempt = tokio::time::timeout(
            self.config.call_timeout,
            AssertUnwindSafe(dispatch(&self.inner, resource, call.clone())).catch_unwind(),
        )
        .await;

        match attempt {
            Ok(Ok(Ok(reply))) => {
                self.state.record_success(&key);
                Ok(reply)
            }
            Ok(Ok(Err(error))) => {
                self.state.record_failure(&key);
                self.recover(resource, &key, &call, FailureKind::Upstream, error)
            }
            Ok(Err(payload)) => {
                self.state.record_failure(&key);
                let error = ProviderError::Panicked(panic_message(payload.as_ref()));
                self.recover(resource, &key, &call, FailureKind::Upstream, error)
            }
            Err(_) => {
                self.state.record_failure(&key);
                let error = ProviderError::Timeout {
                    operation: format!("{} on {}", method, resource),
                    elapsed: self.config.call_timeout,
                };
                self.recover(resource, &key, &call, FailureKind::Timeout, error)
            }
        }
    }

    fn recover(
        &self,
        resource: &str,
        key: &str,
        call: &Call,
        kind: FailureKind,
        error: ProviderError,
    ) -> ProviderResult<Reply> {
        let masked = self.config.policy == FailurePolicy::Mask;
        let event = FailureEvent::new(kind, resource, key, &error)
            .with_method(call.method())
            .masked(masked);

        if kind != FailureKind::Bypassed {
            warn!(
                "Error in {} for {} ({}): {}",
                call.method(),
                resource,
                kind.as_str(),
                error
            );
        }
        for observer in &self.observers {
            observer.on_failure(&event);
        }

        if masked {
            Ok(self.fallback_reply(resource, call))
        } else {
            Err(error)
        }
    }

    fn fallback_reply(&self, resource: &str, call: &Call) -> Reply {
        match call {
            Call::GetList(_) | Call::GetManyReference(_) => Reply::List(self.fallback.list(resource)),
            Call::GetMany(_) => Reply::Many(ManyResult {
                data: self.fallback.records(resource).to_vec(),
            }),
            Call::GetOne(params) => Reply::Record(RecordResult {
                data: self.fallback.find(resource, &params.id),
            }),
            Call::Create(params) => {
                let mut data = params.data.clone();
                data.set_id(RecordId::Int(self.ids.next()));
                Reply::Record(RecordResult { data })
            }
            Call::Update(params) => {
                let mut data = params.data.clone();
                if data.id().is_none() {
                    data.set_id(params.id.clone());
                }
                Reply::Record(RecordResult { data })
            }
            Call::Delete(params) => Reply::Record(RecordResult {
                data: Record::with_id(params.id.clone()),
            }),
            Call::UpdateMany(UpdateManyParams { ids, .. }) | Call::DeleteMany(DeleteManyParams { ids }) => {
                Reply::Ids(IdsResult { data: ids.clone() })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[async_trait]
impl<P: DataProvider> DataProvider for ResilientProvider<P> {
    async fn get_list(&self, resource: &str, params: ListParams) -> ProviderResult<ListResult> {
        self.call(resource, Call::GetList(params))
            .await?
            .into_list(Method::GetList)
    }

    async fn get_one(&self, resource: &str, params: GetOneParams) -> ProviderResult<RecordResult> {
        self.call(resource, Call::GetOne(params))
            .await?
            .into_record(Method::GetOne)
    }

    async fn get_many(&self, resource: &str, params: GetManyParams) -> ProviderResult<ManyResult> {
        self.call(resource, Call::GetMany(params))
            .await?
            .into_many(Method::GetMany)
    }

    async fn get_many_reference(
        &self,
        resource: &str,
        params: ReferenceParams,
    ) -> ProviderResult<ListResult> {
        self.call(resource, Call::GetManyReference(params))
            .await?
            .into_list(Method::GetManyReference)
    }

    async fn create(&self, resource: &str, params: CreateParams) -> ProviderResult<RecordResult> {
        self.call(resource, Call::Create(params))
            .await?
            .into_record(Method::Create)
    }

    async fn update(&self, resource: &str, params: UpdateParams) -> ProviderResult<RecordResult> {
        self.call(resource, Call::Update(params))
            .await?
            .into_record(Method::Update)
    }

    async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> ProviderResult<IdsResult> {
        self.call(resource, Call::UpdateMany(params))
            .await?
            .into_ids(Method::UpdateMany)
    }

    async fn delete(&self, resource: &str, params: DeleteParams) -> ProviderResult<RecordResult> {
        self.call(resource, Call::Delete(params))
            .await?
            .into_record(Method::Delete)
    }

    async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> ProviderResult<IdsResult> {
        self.call(resource, Call::DeleteMany(params))
            .await?
            .into_ids(Method::DeleteMany)
    }

    async fn wait_until_ready(&self) {
        self.inner.wait_until_ready().await
    }

    fn supports_abort_signal(&self) -> bool {
        self.inner.supports_abort_signal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, GeneratorOptions};
    use crate::resilience::events::FailureLog;
    use crate::testing::{Behavior, ScriptedProvider};
    use serde_json::json;
    use std::collections::HashSet;

    fn seeded() -> Arc<Dataset> {
        Arc::new(Dataset::generate(&GeneratorOptions::small()))
    }

    fn failing() -> ResilientProvider<Arc<ScriptedProvider>> {
        let scripted = Arc::new(ScriptedProvider::new(seeded()));
        scripted.set_behavior(Behavior::Fail);
        ResilientProvider::new(scripted, ResilienceConfig::default())
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let dataset = seeded();
        let direct = crate::provider::InMemoryProvider::new(dataset.clone());
        let wrapped = ResilientProvider::new(
            crate::provider::InMemoryProvider::new(dataset),
            ResilienceConfig::default(),
        );

        let params = ListParams::default().page(1, 5);
        assert_eq!(
            wrapped.get_list("orders", params.clone()).await.unwrap(),
            direct.get_list("orders", params).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_list_for_unknown_resource_is_empty() {
        let wrapped = failing();
        let result = wrapped
            .get_list("categories", ListParams::default())
            .await
            .unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn test_failed_list_total_matches_fallback() {
        let wrapped = failing();
        let result = wrapped
            .get_list("customers", ListParams::default())
            .await
            .unwrap();
        assert_eq!(result.data.len(), 10);
        assert_eq!(result.total, 10);
    }

    #[tokio::test]
    async fn test_failed_get_one_uses_fallback_or_stub() {
        let wrapped = failing();
        let known = wrapped
            .get_one("customers", GetOneParams::new(3))
            .await
            .unwrap();
        assert_eq!(known.data.get("first_name"), Some(&json!("Customer 3")));

        let unknown = wrapped
            .get_one("categories", GetOneParams::new(3))
            .await
            .unwrap();
        assert_eq!(unknown.data, Record::with_id(RecordId::Int(3)));
    }

    #[tokio::test]
    async fn test_failed_create_returns_fields_and_fresh_ids() {
        let wrapped = failing();
        let mut seen = HashSet::new();
        for i in 0..5 {
            let data = Record::new()
                .field("reference", format!("Poster {}", i))
                .field("price", 12.5);
            let created = wrapped
                .create("products", CreateParams { data })
                .await
                .unwrap()
                .data;
            assert_eq!(created.get("reference"), Some(&json!(format!("Poster {}", i))));
            assert_eq!(created.get("price"), Some(&json!(12.5)));
            let id = created.id().expect("synthesized id");
            assert!(seen.insert(id.to_string()), "id {} returned twice", id);
        }
    }

    #[tokio::test]
    async fn test_failed_writes_are_invisible() {
        let wrapped = failing();
        let id = RecordId::Int(7);

        let updated = wrapped
            .update(
                "reviews",
                UpdateParams {
                    id: id.clone(),
                    data: Record::new().field("status", "accepted"),
                    previous_data: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.data.get("status"), Some(&json!("accepted")));
        assert_eq!(updated.data.id(), Some(id.clone()));

        let deleted = wrapped
            .delete("reviews", DeleteParams { id: id.clone(), previous_data: None })
            .await
            .unwrap();
        assert_eq!(deleted.data, Record::with_id(id.clone()));

        let ids = vec![RecordId::Int(1), RecordId::Int(2)];
        let many = wrapped
            .delete_many("reviews", DeleteManyParams { ids: ids.clone() })
            .await
            .unwrap();
        assert_eq!(many.data, ids);
    }

    #[tokio::test]
    async fn test_exhausted_key_skips_underlying_call() {
        let scripted = Arc::new(ScriptedProvider::new(seeded()));
        scripted.set_behavior(Behavior::Fail);
        let wrapped = ResilientProvider::new(scripted.clone(), ResilienceConfig::default());

        // max_retries = 1: two failures exhaust the budget
        for _ in 0..2 {
            wrapped.get_list("orders", ListParams::default()).await.unwrap();
        }
        assert_eq!(scripted.calls_for(Method::GetList), 2);

        scripted.set_behavior(Behavior::Pass);
        let result = wrapped
            .get_list("orders", ListParams::default())
            .await
            .unwrap();
        assert_eq!(scripted.calls_for(Method::GetList), 2);
        assert_eq!(result, FallbackData::shared().list("orders"));

        // Other keys are unaffected
        wrapped.get_list("customers", ListParams::default()).await.unwrap();
        assert_eq!(scripted.calls_for(Method::GetList), 3);
    }

    #[tokio::test]
    async fn test_reset_allows_live_attempts_again() {
        let scripted = Arc::new(ScriptedProvider::new(seeded()));
        scripted.set_behavior(Behavior::Fail);
        let wrapped = ResilientProvider::new(
            scripted.clone(),
            ResilienceConfig {
                max_retries: 0,
                ..Default::default()
            },
        );

        wrapped.get_one("orders", GetOneParams::new(1)).await.unwrap();
        wrapped.get_one("orders", GetOneParams::new(1)).await.unwrap();
        assert_eq!(scripted.calls_for(Method::GetOne), 1);

        wrapped.reset();
        scripted.set_behavior(Behavior::Pass);
        wrapped.get_one("orders", GetOneParams::new(1)).await.unwrap();
        assert_eq!(scripted.calls_for(Method::GetOne), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let scripted = Arc::new(ScriptedProvider::new(seeded()));
        scripted.set_behavior(Behavior::Hang);
        let log = Arc::new(FailureLog::new());
        let wrapped = ResilientProvider::new(scripted, ResilienceConfig::default())
            .with_observer(log.clone());

        let result = wrapped
            .get_list("reviews", ListParams::default())
            .await
            .unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(log.count(FailureKind::Timeout), 1);
    }

    #[tokio::test]
    async fn test_panicking_provider_falls_back() {
        let scripted = Arc::new(ScriptedProvider::new(seeded()));
        scripted.set_behavior(Behavior::Panic);
        let log = Arc::new(FailureLog::new());
        let wrapped = ResilientProvider::new(scripted.clone(), ResilienceConfig::default())
            .with_observer(log.clone());

        let result = wrapped
            .get_list("customers", ListParams::default())
            .await
            .unwrap();
        assert_eq!(result, FallbackData::shared().list("customers"));

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FailureKind::Upstream);
        assert!(events[0].message.contains("scripted panic"));

        // A panic counts against the key like any other failure
        wrapped.get_list("customers", ListParams::default()).await.unwrap();
        assert!(wrapped.state().is_permanently_failed("getList-customers"));
        assert_eq!(scripted.calls_for(Method::GetList), 2);
    }

    #[tokio::test]
    async fn test_propagate_policy_surfaces_errors() {
        let scripted = Arc::new(ScriptedProvider::new(seeded()));
        scripted.set_behavior(Behavior::Fail);
        let log = Arc::new(FailureLog::new());
        let wrapped = ResilientProvider::new(
            scripted,
            ResilienceConfig {
                policy: FailurePolicy::Propagate,
                ..Default::default()
            },
        )
        .with_observer(log.clone());

        let err = wrapped
            .get_list("orders", ListParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport { .. }));

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].masked);
        assert_eq!(events[0].method, Some(Method::GetList));
        assert_eq!(events[0].key, "getList-orders");
    }

    #[test]
    fn test_id_generator_strictly_increases() {
        let ids = IdGenerator::default();
        let mut last = ids.next();
        for _ in 0..1000 {
            let next = ids.next();
            assert!(next > last);
            last = next;
        }
    }
}
