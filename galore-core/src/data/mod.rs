//! Demo data: the seeded in-memory dataset and the static fallback set
//!
//! `Dataset` is the mutable store behind the fake backend. `FallbackData` is
//! the immutable set the resilient layers substitute on failure.

pub mod fallback;
pub mod generator;
pub mod query;

pub use fallback::FallbackData;
pub use generator::GeneratorOptions;

use crate::core::{Filter, ProviderError, ProviderResult, Record, RecordId, Sort};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Offset/limit window over a filtered collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: usize,
}

impl Window {
    /// From an inclusive `[start, end]` wire range
    pub fn from_range(start: usize, end: usize) -> Self {
        Self {
            offset: start,
            limit: end.saturating_sub(start).saturating_add(1),
        }
    }
}

/// In-memory collections keyed by resource name
#[derive(Debug, Default)]
pub struct Dataset {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_collections(collections: HashMap<String, Vec<Record>>) -> Self {
        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Seed a fresh dataset
    pub fn generate(options: &GeneratorOptions) -> Self {
        let collections = generator::generate(options);
        debug!(
            "Generated dataset with {} collections (seed {})",
            collections.len(),
            options.seed
        );
        Self::from_collections(collections)
    }

    pub fn insert_collection(&self, resource: impl Into<String>, records: Vec<Record>) {
        self.collections.write().insert(resource.into(), records);
    }

    pub fn resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        self.collections.read().contains_key(resource)
    }

    pub fn len(&self, resource: &str) -> usize {
        self.collections.read().get(resource).map_or(0, Vec::len)
    }

    /// Filter, sort and window a collection; returns the page and the unwindowed total
    pub fn query(
        &self,
        resource: &str,
        filter: &Filter,
        sort: Option<&Sort>,
        window: Option<Window>,
    ) -> ProviderResult<(Vec<Record>, usize)> {
        let collections = self.collections.read();
        let records = collections
            .get(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.to_string()))?;

        let mut matched: Vec<Record> = records
            .iter()
            .filter(|record| query::matches_filter(record, filter))
            .cloned()
            .collect();
        drop(collections);

        if let Some(sort) = sort {
            query::sort_records(&mut matched, sort);
        }

        let total = matched.len();
        let page = match window {
            Some(window) => matched
                .into_iter()
                .skip(window.offset)
                .take(window.limit)
                .collect(),
            None => matched,
        };
        Ok((page, total))
    }

    pub fn get(&self, resource: &str, id: &RecordId) -> ProviderResult<Record> {
        let collections = self.collections.read();
        let records = collections
            .get(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.to_string()))?;
        records
            .iter()
            .find(|record| record.id().is_some_and(|rid| rid.matches(id)))
            .cloned()
            .ok_or_else(|| ProviderError::not_found(resource, id))
    }

    /// Records among `ids` that exist, in collection order
    pub fn get_many(&self, resource: &str, ids: &[RecordId]) -> ProviderResult<Vec<Record>> {
        let collections = self.collections.read();
        let records = collections
            .get(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.to_string()))?;
        Ok(records
            .iter()
            .filter(|record| {
                record
                    .id()
                    .is_some_and(|rid| ids.iter().any(|id| rid.matches(id)))
            })
            .cloned()
            .collect())
    }

    /// Insert a record; assigns `max(id) + 1` when no id is supplied
    pub fn create(&self, resource: &str, mut data: Record) -> ProviderResult<Record> {
        let mut collections = self.collections.write();
        let records = collections
            .get_mut(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.to_string()))?;

        match data.id() {
            Some(id) => {
                if records
                    .iter()
                    .any(|record| record.id().is_some_and(|rid| rid.matches(&id)))
                {
                    return Err(ProviderError::InvalidParams(format!(
                        "{} record {} already exists",
                        resource, id
                    )));
                }
            }
            None => {
                let next = records
                    .iter()
                    .filter_map(|record| record.id().and_then(|id| id.as_i64()))
                    .max()
                    .map_or(1, |max| max + 1);
                data.set_id(RecordId::Int(next));
            }
        }

        records.push(data.clone());
        Ok(data)
    }

    /// Merge `data` into an existing record; the id never changes
    pub fn update(&self, resource: &str, id: &RecordId, data: &Record) -> ProviderResult<Record> {
        let mut collections = self.collections.write();
        let records = collections
            .get_mut(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.to_string()))?;
        let record = records
            .iter_mut()
            .find(|record| record.id().is_some_and(|rid| rid.matches(id)))
            .ok_or_else(|| ProviderError::not_found(resource, id))?;

        let original_id = record.id();
        record.merge(data);
        if let Some(original_id) = original_id {
            record.set_id(original_id);
        }
        Ok(record.clone())
    }

    pub fn delete(&self, resource: &str, id: &RecordId) -> ProviderResult<Record> {
        let mut collections = self.collections.write();
        let records = collections
            .get_mut(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.to_string()))?;
        let index = records
            .iter()
            .position(|record| record.id().is_some_and(|rid| rid.matches(id)))
            .ok_or_else(|| ProviderError::not_found(resource, id))?;
        Ok(records.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Sort;
    use serde_json::json;

    fn dataset() -> Dataset {
        let dataset = Dataset::new();
        dataset.insert_collection(
            "customers",
            (1..=5)
                .map(|i| {
                    Record::new()
                        .field("id", i)
                        .field("last_name", if i % 2 == 0 { "Even" } else { "Odd" })
                })
                .collect(),
        );
        dataset
    }

    #[test]
    fn test_query_window_and_total() {
        let dataset = dataset();
        let (page, total) = dataset
            .query(
                "customers",
                &Filter::new(),
                Some(&Sort::desc("id")),
                Some(Window::from_range(0, 1)),
            )
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id(), Some(RecordId::Int(5)));
    }

    #[test]
    fn test_query_window_with_full_range() {
        let dataset = dataset();
        let window = Window::from_range(0, usize::MAX);
        assert_eq!(window.limit, usize::MAX);

        let (page, total) = dataset
            .query("customers", &Filter::new(), None, Some(window))
            .unwrap();
        assert_eq!(page.len(), total);
    }

    #[test]
    fn test_query_unknown_resource() {
        let err = Dataset::new()
            .query("invoices", &Filter::new(), None, None)
            .unwrap_err();
        assert_eq!(err, ProviderError::UnknownResource("invoices".into()));
    }

    #[test]
    fn test_create_assigns_next_id() {
        let dataset = dataset();
        let created = dataset
            .create("customers", Record::new().field("last_name", "New"))
            .unwrap();
        assert_eq!(created.id(), Some(RecordId::Int(6)));
        assert_eq!(dataset.len("customers"), 6);
    }

    #[test]
    fn test_create_rejects_duplicate_id() {
        let dataset = dataset();
        let result = dataset.create("customers", Record::with_id(RecordId::Int(2)));
        assert!(matches!(result, Err(ProviderError::InvalidParams(_))));
    }

    #[test]
    fn test_update_keeps_id() {
        let dataset = dataset();
        let updated = dataset
            .update(
                "customers",
                &RecordId::from("2"),
                &Record::new().field("id", 99).field("last_name", "Changed"),
            )
            .unwrap();
        assert_eq!(updated.id(), Some(RecordId::Int(2)));
        assert_eq!(updated.get("last_name"), Some(&json!("Changed")));
    }

    #[test]
    fn test_delete_and_get_many() {
        let dataset = dataset();
        dataset.delete("customers", &RecordId::Int(3)).unwrap();
        assert!(matches!(
            dataset.get("customers", &RecordId::Int(3)),
            Err(ProviderError::NotFound { .. })
        ));

        let many = dataset
            .get_many(
                "customers",
                &[RecordId::Int(1), RecordId::Int(3), RecordId::Int(4)],
            )
            .unwrap();
        assert_eq!(many.len(), 2);
    }
}
