//! Galore Core - resilient data access for the Posters Galore back office
//!
//! The back office reads and writes customers, orders, products, reviews and
//! categories through a [`DataProvider`]. This crate makes that path survive a
//! slow, broken or not-yet-started backend.
//!
//! ## Architecture
//! - **Provider resolver**: builds the real provider in the background; early
//!   calls wait for it, failed setup degrades to a noop provider
//! - **Resilient wrapper**: deadline per call, failure tracking per request
//!   key, static fallback records instead of errors
//! - **Resilient HTTP client**: the same tracking one layer down, per URL
//! - **Fake REST server**: a seeded dataset served over HTTP for the demo
//!
//! ## Core Modules
//! - `core`: records, ids, parameter/result shapes, `ProviderError`
//! - `data`: seeded dataset, generator, filtering, fallback records
//! - `provider`: the `DataProvider` contract and its implementations
//! - `http`: JSON fetch seam, reqwest client, resilient client
//! - `resilience`: failure tracking, wrapper, failure events
//! - `resolver`: lazy provider resolution and log throttling
//! - `server`: fake simple-REST backend
//! - `stack`: wiring of all of the above from a `Config`

pub mod core;

pub mod config;
pub mod data;
pub mod http;
pub mod provider;
pub mod resilience;
pub mod resolver;
pub mod server;
pub mod stack;
pub mod testing;
pub mod utils;

pub use crate::core::{Method, ProviderError, ProviderResult, Record, RecordId};
pub use config::Config;
pub use provider::DataProvider;
pub use resilience::{FailurePolicy, ResilientProvider};
pub use resolver::ProviderResolver;
pub use stack::{BackendKind, DataAccess};

pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::core::{
        CreateParams, DeleteManyParams, DeleteParams, GetManyParams, GetOneParams, ListParams,
        Method, ProviderError, ProviderResult, Record, RecordId, ReferenceParams, Sort,
        UpdateManyParams, UpdateParams,
    };
    pub use crate::provider::DataProvider;
    pub use crate::resilience::{FailureEvent, FailureKind, FailureObserver, FailurePolicy};
    pub use crate::stack::{BackendKind, DataAccess};
    pub use crate::{Error, Result};
}
