//! Wiring of the full data-access stack
//!
//! ```text
//! caller ─► ResilientProvider ─► ProviderResolver ─► RestProvider ─► ResilientHttpClient ─► fake server
//!                                                  └► InMemoryProvider
//! ```

use crate::config::Config;
use crate::data::Dataset;
use crate::http::{ReqwestClient, ResilientHttpClient};
use crate::provider::{DataProvider, InMemoryProvider, RestProvider};
use crate::resilience::{FailureObserver, ResilienceState, ResilientProvider};
use crate::resolver::{ProviderResolver, ResolverOptions};
use crate::server::{FakeRestServer, RunningServer};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Which provider the resolver builds once setup completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// REST provider talking to the fake server over HTTP
    #[default]
    Rest,
    /// The seeded dataset, served in-process
    Memory,
}

/// Seed the dataset and start the fake server; the setup step of the REST backend
pub async fn start_rest_backend(
    config: &Config,
    http_state: Arc<ResilienceState>,
) -> Result<(Arc<dyn DataProvider>, RunningServer)> {
    let dataset = Arc::new(Dataset::generate(&config.generator_options()));
    let server = FakeRestServer::new(config.server_config()?, dataset)
        .start()
        .await?;
    let base_url = config.base_url(server.local_addr())?;

    let client = ResilientHttpClient::new(ReqwestClient::new())
        .with_timeout(config.request_timeout())
        .with_state(http_state);
    info!("REST provider using {}", base_url);

    let provider: Arc<dyn DataProvider> = Arc::new(RestProvider::new(base_url, client));
    Ok((provider, server))
}

async fn setup_backend(
    config: Config,
    kind: BackendKind,
    http_state: Arc<ResilienceState>,
    server_slot: Arc<Mutex<Option<RunningServer>>>,
) -> Result<Arc<dyn DataProvider>> {
    match kind {
        BackendKind::Rest => {
            let (provider, server) = start_rest_backend(&config, http_state).await?;
            *server_slot.lock() = Some(server);
            Ok(provider)
        }
        BackendKind::Memory => {
            let dataset = Dataset::generate(&config.generator_options());
            Ok(Arc::new(InMemoryProvider::new(Arc::new(dataset))))
        }
    }
}

/// The resilient provider plus handles for the pieces behind it
pub struct DataAccess {
    provider: ResilientProvider<ProviderResolver>,
    http_state: Arc<ResilienceState>,
    server: Arc<Mutex<Option<RunningServer>>>,
}

impl DataAccess {
    /// Start setup in the background and return the ready-to-call stack
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &Config,
        kind: BackendKind,
        observers: Vec<Arc<dyn FailureObserver>>,
    ) -> Self {
        let http_state = Arc::new(ResilienceState::new(config.client.max_retries));
        let server = Arc::new(Mutex::new(None));

        let setup = setup_backend(config.clone(), kind, http_state.clone(), server.clone());
        let resolver = ProviderResolver::spawn_with(
            setup,
            ResolverOptions {
                throttle_window: config.throttle_window(),
                observers: observers.clone(),
            },
        );

        let provider = observers.into_iter().fold(
            ResilientProvider::new(resolver, config.resilience_config()),
            ResilientProvider::with_observer,
        );

        Self {
            provider,
            http_state,
            server,
        }
    }

    pub fn provider(&self) -> &ResilientProvider<ProviderResolver> {
        &self.provider
    }

    pub fn resolver(&self) -> &ProviderResolver {
        self.provider.inner()
    }

    /// Address of the fake server, once setup has started it
    pub fn server_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.lock().as_ref().map(RunningServer::local_addr)
    }

    pub fn requests_served(&self) -> u64 {
        self.server
            .lock()
            .as_ref()
            .map_or(0, RunningServer::requests_served)
    }

    /// Start a new session: forget every failure in both resilient layers
    /// and reopen the call-log windows
    pub fn reset(&self) {
        self.provider.reset();
        self.http_state.reset();
        self.resolver().throttle().reset();
    }

    pub fn shutdown(&self) {
        if let Some(server) = self.server.lock().take() {
            server.shutdown();
        }
    }
}
