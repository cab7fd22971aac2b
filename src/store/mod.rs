//! Document store contract consumed by the gradebook.
//!
//! Collections hold JSON documents keyed by string id. Writes are either a
//! whole-document `set` (optionally merged recursively into what is there), a
//! targeted `update` addressed by field path, or an atomic `create` that fails
//! when the id is taken. `WriteValue::ServerTimestamp` is resolved by the store
//! to the time of the write.

mod sqlite;

pub use sqlite::SqliteStore;

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub type JsonMap = serde_json::Map<String, Value>;
pub type WriteMap = BTreeMap<String, WriteValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: JsonMap,
    pub create_time: String,
    pub update_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteValue {
    Json(Value),
    ServerTimestamp,
    Map(WriteMap),
}

impl WriteValue {
    fn resolve(self, now: &str) -> Value {
        match self {
            WriteValue::Json(v) => v,
            WriteValue::ServerTimestamp => Value::String(now.to_string()),
            WriteValue::Map(m) => Value::Object(
                m.into_iter()
                    .map(|(k, v)| (k, v.resolve(now)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for WriteValue {
    fn from(v: Value) -> Self {
        WriteValue::Json(v)
    }
}

impl From<&str> for WriteValue {
    fn from(v: &str) -> Self {
        WriteValue::Json(Value::String(v.to_string()))
    }
}

impl From<String> for WriteValue {
    fn from(v: String) -> Self {
        WriteValue::Json(Value::String(v))
    }
}

impl From<u8> for WriteValue {
    fn from(v: u8) -> Self {
        WriteValue::Json(Value::from(v))
    }
}

impl From<WriteMap> for WriteValue {
    fn from(m: WriteMap) -> Self {
        WriteValue::Map(m)
    }
}

/// Path to a nested field, one segment per map level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> FieldPath
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPath(segments.into_iter().map(Into::into).collect())
    }

    /// Splits a dotted path. Segments containing dots must go through `new`.
    #[allow(dead_code)]
    pub fn parse(dotted: &str) -> FieldPath {
        FieldPath::new(dotted.split('.'))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("document {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },
    #[error("field path {path} has no parent map in {collection}/{id}")]
    FieldPathNotFound {
        collection: String,
        id: String,
        path: String,
    },
    #[error("workspace belongs to project {found}, credentials are for {expected}")]
    ProjectMismatch { expected: String, found: String },
    #[error("unsupported query value for field {field}: only strings, numbers and booleans")]
    UnsupportedQueryValue { field: String },
    #[error("failed to prepare workspace: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait DocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Exact equality on a top-level field. No case folding.
    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    fn stream(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    fn set(
        &self,
        collection: &str,
        id: &str,
        data: WriteMap,
        merge: bool,
    ) -> Result<(), StoreError>;

    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Vec<(FieldPath, WriteValue)>,
    ) -> Result<(), StoreError>;

    fn create(&self, collection: &str, id: &str, data: WriteMap) -> Result<(), StoreError>;
}

pub(crate) fn server_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Recursive merge-insert: nested maps merge, everything else overwrites.
pub(crate) fn merge_into(target: &mut JsonMap, writes: WriteMap, now: &str) {
    for (key, value) in writes {
        match value {
            WriteValue::Map(nested) => {
                let slot = target
                    .entry(key)
                    .or_insert_with(|| Value::Object(JsonMap::new()));
                if !slot.is_object() {
                    *slot = Value::Object(JsonMap::new());
                }
                if let Value::Object(inner) = slot {
                    merge_into(inner, nested, now);
                }
            }
            other => {
                target.insert(key, other.resolve(now));
            }
        }
    }
}

pub(crate) fn resolve_map(writes: WriteMap, now: &str) -> JsonMap {
    let mut out = JsonMap::new();
    merge_into(&mut out, writes, now);
    out
}

/// Sets the leaf of `path`. Every parent segment must already be a map.
/// Returns the path as text when a parent is missing.
pub(crate) fn apply_field(
    target: &mut JsonMap,
    path: &FieldPath,
    value: WriteValue,
    now: &str,
) -> Result<(), String> {
    let Some((leaf, parents)) = path.segments().split_last() else {
        return Err(path.to_string());
    };
    let mut cursor = target;
    for seg in parents {
        cursor = match cursor.get_mut(seg) {
            Some(Value::Object(inner)) => inner,
            _ => return Err(path.to_string()),
        };
    }
    cursor.insert(leaf.clone(), value.resolve(now));
    Ok(())
}
