//! Lazily resolved data provider
//!
//! Building the real provider means seeding a dataset and, for the REST path,
//! starting the fake backend. [`ProviderResolver::spawn`] kicks that off on the
//! runtime and returns at once; every call made before setup finishes waits
//! for it, then forwards unchanged. Setup runs exactly once. If it fails or
//! its task dies, calls are served by [`NoopProvider`] instead.

pub mod throttle;

pub use throttle::LogThrottle;

use crate::core::{
    CreateParams, DeleteManyParams, DeleteParams, GetManyParams, GetOneParams, IdsResult,
    ListParams, ListResult, ManyResult, Method, ProviderError, ProviderResult, RecordResult,
    ReferenceParams, UpdateManyParams, UpdateParams,
};
use crate::provider::{DataProvider, NoopProvider};
use crate::resilience::{FailureEvent, FailureKind, FailureObserver};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverStatus {
    /// Setup still running
    Pending,
    /// Calls go to the provider built by setup
    Ready,
    /// Setup failed; calls go to the noop provider
    Degraded,
}

#[derive(Clone)]
struct Resolved {
    provider: Arc<dyn DataProvider>,
    degraded: bool,
}

#[derive(Clone)]
pub struct ResolverOptions {
    pub throttle_window: Duration,
    pub observers: Vec<Arc<dyn FailureObserver>>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            throttle_window: LogThrottle::DEFAULT_WINDOW,
            observers: Vec::new(),
        }
    }
}

pub struct ProviderResolver {
    slot: watch::Receiver<Option<Resolved>>,
    setup: JoinHandle<()>,
    throttle: LogThrottle,
    noop: Arc<dyn DataProvider>,
}

impl ProviderResolver {
    /// Start `setup` in the background and return immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(setup: F) -> Self
    where
        F: Future<Output = anyhow::Result<Arc<dyn DataProvider>>> + Send + 'static,
    {
        Self::spawn_with(setup, ResolverOptions::default())
    }

    pub fn spawn_with<F>(setup: F, options: ResolverOptions) -> Self
    where
        F: Future<Output = anyhow::Result<Arc<dyn DataProvider>>> + Send + 'static,
    {
        let (tx, slot) = watch::channel(None);
        let noop: Arc<dyn DataProvider> = Arc::new(NoopProvider);
        let fallback = noop.clone();
        let observers = options.observers;

        info!("Starting data provider setup");
        let setup = tokio::spawn(async move {
            let resolved = match setup.await {
                Ok(provider) => {
                    info!("Data provider ready");
                    Resolved {
                        provider,
                        degraded: false,
                    }
                }
                Err(e) => {
                    error!("Data provider setup failed, serving empty results: {:#}", e);
                    let error = ProviderError::Setup(format!("{:#}", e));
                    let event = FailureEvent::new(FailureKind::SetupFailed, "*", "setup", &error);
                    for observer in &observers {
                        observer.on_failure(&event);
                    }
                    Resolved {
                        provider: fallback,
                        degraded: true,
                    }
                }
            };
            // Receivers may all be gone already
            let _ = tx.send(Some(resolved));
        });

        Self {
            slot,
            setup,
            throttle: LogThrottle::new(options.throttle_window),
            noop,
        }
    }

    /// Resolver whose provider is available from the start
    pub fn ready(provider: Arc<dyn DataProvider>) -> Self {
        Self::spawn(async move { Ok(provider) })
    }

    pub fn status(&self) -> ResolverStatus {
        match &*self.slot.borrow() {
            Some(resolved) if resolved.degraded => ResolverStatus::Degraded,
            Some(_) => ResolverStatus::Ready,
            None if self.setup.is_finished() || self.slot.has_changed().is_err() => {
                ResolverStatus::Degraded
            }
            None => ResolverStatus::Pending,
        }
    }

    /// Wait for setup to finish and report the outcome
    pub async fn wait_ready(&self) -> ResolverStatus {
        self.resolve().await;
        self.status()
    }

    /// The provider calls are forwarded to, once setup has finished
    pub async fn resolve(&self) -> Arc<dyn DataProvider> {
        let mut slot = self.slot.clone();
        let resolved = slot
            .wait_for(Option::is_some)
            .await
            .map(|resolved| (*resolved).clone());

        match resolved {
            Ok(Some(resolved)) => resolved.provider,
            _ => {
                error!("Data provider setup task ended without a provider, serving empty results");
                self.noop.clone()
            }
        }
    }

    pub fn throttle(&self) -> &LogThrottle {
        &self.throttle
    }

    fn trace_call(&self, method: Method, resource: &str) {
        let key = format!("{}-{}", method.name(), resource);
        if self.throttle.should_log(&key) {
            info!("Data provider call: {} {}", method, resource);
        }
    }
}

impl Drop for ProviderResolver {
    fn drop(&mut self) {
        if !self.setup.is_finished() {
            self.setup.abort();
        }
    }
}

#[async_trait]
impl DataProvider for ProviderResolver {
    async fn get_list(&self, resource: &str, params: ListParams) -> ProviderResult<ListResult> {
        self.trace_call(Method::GetList, resource);
        self.resolve().await.get_list(resource, params).await
    }

    async fn get_one(&self, resource: &str, params: GetOneParams) -> ProviderResult<RecordResult> {
        self.trace_call(Method::GetOne, resource);
        self.resolve().await.get_one(resource, params).await
    }

    async fn get_many(&self, resource: &str, params: GetManyParams) -> ProviderResult<ManyResult> {
        self.trace_call(Method::GetMany, resource);
        self.resolve().await.get_many(resource, params).await
    }

    async fn get_many_reference(
        &self,
        resource: &str,
        params: ReferenceParams,
    ) -> ProviderResult<ListResult> {
        self.trace_call(Method::GetManyReference, resource);
        self.resolve()
            .await
            .get_many_reference(resource, params)
            .await
    }

    async fn create(&self, resource: &str, params: CreateParams) -> ProviderResult<RecordResult> {
        self.trace_call(Method::Create, resource);
        self.resolve().await.create(resource, params).await
    }

    async fn update(&self, resource: &str, params: UpdateParams) -> ProviderResult<RecordResult> {
        self.trace_call(Method::Update, resource);
        self.resolve().await.update(resource, params).await
    }

    async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> ProviderResult<IdsResult> {
        self.trace_call(Method::UpdateMany, resource);
        self.resolve().await.update_many(resource, params).await
    }

    async fn delete(&self, resource: &str, params: DeleteParams) -> ProviderResult<RecordResult> {
        self.trace_call(Method::Delete, resource);
        self.resolve().await.delete(resource, params).await
    }

    async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> ProviderResult<IdsResult> {
        self.trace_call(Method::DeleteMany, resource);
        self.resolve().await.delete_many(resource, params).await
    }

    async fn wait_until_ready(&self) {
        self.resolve().await;
    }
}
