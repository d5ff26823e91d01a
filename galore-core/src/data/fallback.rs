//! Static fallback records
//!
//! Substituted by the resilient layers once the live path has failed. The set
//! is built once and never mutated; lookups on unknown resources yield empty
//! lists or bare id stubs.

use crate::core::{ListResult, Record, RecordId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

const FALLBACK_CUSTOMERS: i64 = 10;
const FALLBACK_ORDERS: i64 = 5;
const FALLBACK_REVIEWS: i64 = 3;
const FALLBACK_PRODUCTS: i64 = 5;

static SHARED: OnceLock<Arc<FallbackData>> = OnceLock::new();

#[derive(Debug, Clone, Default)]
pub struct FallbackData {
    collections: HashMap<String, Vec<Record>>,
}

impl FallbackData {
    /// The demo fallback set, stamped with the current time
    pub fn standard() -> Self {
        Self::generated_at(Utc::now())
    }

    /// Process-wide instance, built on first use
    pub fn shared() -> Arc<Self> {
        SHARED.get_or_init(|| Arc::new(Self::standard())).clone()
    }

    /// No fallback records for any resource
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn generated_at(now: DateTime<Utc>) -> Self {
        let stamp = now.to_rfc3339();
        let mut collections = HashMap::new();

        let customers = (0..FALLBACK_CUSTOMERS)
            .map(|i| {
                Record::new()
                    .field("id", i + 1)
                    .field("first_name", format!("Customer {}", i + 1))
                    .field("last_name", "Smith")
                    .field("email", format!("customer{}@example.com", i + 1))
                    .field("has_ordered", i % 2 == 0)
                    .field("last_seen", stamp.clone())
            })
            .collect();
        collections.insert("customers".to_string(), customers);

        let orders = (0..FALLBACK_ORDERS)
            .map(|i| {
                Record::new()
                    .field("id", i + 1)
                    .field("reference", format!("ORD-{}", i + 100))
                    .field("customer_id", i + 1)
                    .field("date", stamp.clone())
                    .field("status", if i % 2 == 0 { "delivered" } else { "pending" })
                    .field("total", 100 + i * 10)
            })
            .collect();
        collections.insert("orders".to_string(), orders);

        let reviews = (0..FALLBACK_REVIEWS)
            .map(|i| {
                Record::new()
                    .field("id", i + 1)
                    .field("date", stamp.clone())
                    .field("status", "pending")
                    .field("customer_id", i + 1)
                    .field("product_id", i + 1)
                    .field("rating", 3 + i)
            })
            .collect();
        collections.insert("reviews".to_string(), reviews);

        let products = (0..FALLBACK_PRODUCTS)
            .map(|i| {
                Record::new()
                    .field("id", i + 1)
                    .field("category_id", i % 3 + 1)
                    .field("reference", format!("PROD-{}", i + 100))
                    .field("width", 50 + i)
                    .field("height", 50 + i)
                    .field("price", 10 + i * 5)
                    .field("thumbnail", "https://via.placeholder.com/150")
                    .field("image", "https://via.placeholder.com/600x400")
                    .field("description", format!("Product {} description", i + 1))
                    .field("stock", 10 + i * 5)
            })
            .collect();
        collections.insert("products".to_string(), products);

        Self { collections }
    }

    pub fn with_collection(mut self, resource: impl Into<String>, records: Vec<Record>) -> Self {
        self.collections.insert(resource.into(), records);
        self
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        self.collections.contains_key(resource)
    }

    /// Fallback records for `resource`, empty when none are defined
    pub fn records(&self, resource: &str) -> &[Record] {
        self.collections
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn list(&self, resource: &str) -> ListResult {
        let data = self.records(resource).to_vec();
        ListResult {
            total: data.len(),
            data,
        }
    }

    /// Record with a matching id, or a stub carrying only the id
    pub fn find(&self, resource: &str, id: &RecordId) -> Record {
        self.records(resource)
            .iter()
            .find(|record| record.id().is_some_and(|rid| rid.matches(id)))
            .cloned()
            .unwrap_or_else(|| Record::with_id(id.clone()))
    }

    pub fn resources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_standard_counts() {
        let fallback = FallbackData::standard();
        assert_eq!(fallback.records("customers").len(), 10);
        assert_eq!(fallback.records("orders").len(), 5);
        assert_eq!(fallback.records("reviews").len(), 3);
        assert_eq!(fallback.records("products").len(), 5);
        assert_eq!(fallback.resources(), vec!["customers", "orders", "products", "reviews"]);
    }

    #[test]
    fn test_unknown_resource_is_empty() {
        let fallback = FallbackData::standard();
        let list = fallback.list("categories");
        assert!(list.data.is_empty());
        assert_eq!(list.total, 0);
    }

    #[test]
    fn test_find_matches_textual_id() {
        let fallback = FallbackData::standard();
        let record = fallback.find("customers", &RecordId::from("3"));
        assert_eq!(record.get("first_name"), Some(&json!("Customer 3")));
        assert_eq!(record.get("email"), Some(&json!("customer3@example.com")));
    }

    #[test]
    fn test_find_without_match_returns_stub() {
        let fallback = FallbackData::standard();
        let stub = fallback.find("customers", &RecordId::Int(99));
        assert_eq!(stub, Record::with_id(RecordId::Int(99)));

        let stub = fallback.find("invoices", &RecordId::Int(1));
        assert_eq!(stub.len(), 1);
    }

    #[test]
    fn test_order_status_alternates() {
        let fallback = FallbackData::standard();
        let statuses: Vec<_> = fallback
            .records("orders")
            .iter()
            .map(|o| o.get("status").cloned().unwrap())
            .collect();
        assert_eq!(statuses[0], json!("delivered"));
        assert_eq!(statuses[1], json!("pending"));
    }

    #[test]
    fn test_shared_is_built_once() {
        let a = FallbackData::shared();
        let b = FallbackData::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }

    proptest! {
        #[test]
        fn prop_find_always_carries_the_requested_id(id in -50i64..50, resource in "(customers|orders|invoices)") {
            let fallback = FallbackData::shared();
            let record = fallback.find(&resource, &RecordId::Int(id));
            prop_assert_eq!(record.id(), Some(RecordId::Int(id)));
        }

        #[test]
        fn prop_list_total_matches_records(resource in "[a-z]{1,10}") {
            let fallback = FallbackData::shared();
            let list = fallback.list(&resource);
            prop_assert_eq!(list.total, list.data.len());
            prop_assert_eq!(list.total, fallback.records(&resource).len());
        }
    }
}
