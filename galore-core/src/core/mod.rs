//! Core types shared by every layer
//!
//! - `Record` / `RecordId`: resource records and their identifiers
//! - `Method`: the nine data-access operations
//! - Parameter and result shapes of the data-access contract
//! - `ProviderError`: the single error type providers return

pub mod errors;
pub mod method;
pub mod types;

pub use errors::{ProviderError, ProviderResult};
pub use method::Method;
pub use types::{
    CreateParams, DeleteManyParams, DeleteParams, Filter, GetManyParams, GetOneParams, IdsResult,
    ListParams, ListResult, ManyResult, Pagination, Record, RecordId, RecordResult,
    ReferenceParams, Sort, SortOrder, UpdateManyParams, UpdateParams,
};
