//! Records, identifiers and the parameter/result shapes of the data-access contract

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Record identifier: integer or string
///
/// Ids compare by their textual rendering, so `3` and `"3"` designate the
/// same record. Path segments and JSON payloads routinely disagree on the type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Parse a path segment, preferring the integer form
    pub fn parse(segment: &str) -> Self {
        segment
            .parse::<i64>()
            .map(RecordId::Int)
            .unwrap_or_else(|_| RecordId::Text(segment.to_string()))
    }

    /// Extract an id from a JSON value (numbers and strings only)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::from(s.clone()),
        }
    }

    /// Integer view of the id, parsing the text form if needed
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RecordId::Int(n) => Some(*n),
            RecordId::Text(s) => s.parse().ok(),
        }
    }

    /// Loose equality used for lookups
    pub fn matches(&self, other: &RecordId) -> bool {
        match (self, other) {
            (RecordId::Int(a), RecordId::Int(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }

    pub fn matches_value(&self, value: &Value) -> bool {
        RecordId::from_value(value).is_some_and(|id| self.matches(&id))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

/// A resource record: named fields, always expected to carry an `id`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Bare stub carrying only an id
    pub fn with_id(id: RecordId) -> Self {
        let mut record = Self::new();
        record.set_id(id);
        record
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder-style field insertion
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<RecordId> {
        self.0.get("id").and_then(RecordId::from_value)
    }

    pub fn set_id(&mut self, id: RecordId) {
        self.0.insert("id".to_string(), id.to_value());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Overwrite fields with those of `other`
    pub fn merge(&mut self, other: &Record) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Page selection, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Pagination {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Number of records skipped before this page
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Inclusive `[start, end]` range as sent on the wire
    pub fn range(&self) -> (usize, usize) {
        let start = self.offset();
        (start, start.saturating_add(self.per_page.max(1) - 1))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Some(SortOrder::Asc),
            "DESC" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Desc)
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::asc("id")
    }
}

/// Field filters: equality, `q` full-text, `<field>_gte`/`_lte`/`_gt`/`_lt`/`_neq`
pub type Filter = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    pub pagination: Pagination,
    pub sort: Sort,
    pub filter: Filter,
}

impl ListParams {
    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Pagination::new(page, per_page);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetOneParams {
    pub id: RecordId,
}

impl GetOneParams {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetManyParams {
    pub ids: Vec<RecordId>,
}

/// Records of `resource` whose `target` field references `id`
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceParams {
    pub target: String,
    pub id: RecordId,
    pub pagination: Pagination,
    pub sort: Sort,
    pub filter: Filter,
}

impl ReferenceParams {
    pub fn new(target: impl Into<String>, id: impl Into<RecordId>) -> Self {
        Self {
            target: target.into(),
            id: id.into(),
            pagination: Pagination::default(),
            sort: Sort::default(),
            filter: Filter::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateParams {
    pub data: Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateParams {
    pub id: RecordId,
    pub data: Record,
    pub previous_data: Option<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateManyParams {
    pub ids: Vec<RecordId>,
    pub data: Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteParams {
    pub id: RecordId,
    pub previous_data: Option<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteManyParams {
    pub ids: Vec<RecordId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub data: Vec<Record>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub data: Record,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManyResult {
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdsResult {
    pub data: Vec<RecordId>,
}
