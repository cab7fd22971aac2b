//! Student lookup and record reconciliation.
//!
//! A search by RA is authoritative and never falls through to the name. A
//! search by name is exact (no case folding, no partial match) and can hit
//! zero, one or many records. Registration always needs an RA: a miss by RA
//! can register directly, a miss by name hands the name back so the caller
//! can prefill registration once an RA is supplied.

use crate::error::GradebookError;
use crate::model::{StudentRecord, NAME_FIELD, QUARTERS_FIELD, RA_FIELD, STUDENTS};
use crate::store::{DocumentStore, FieldPath, StoreError, WriteMap, WriteValue};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    id: Option<String>,
    name: Option<String>,
}

impl LookupQuery {
    /// `None` when both inputs are blank; the caller should prompt for input.
    pub fn new(id: Option<&str>, name: Option<&str>) -> Option<LookupQuery> {
        let id = non_blank(id);
        let name = non_blank(name);
        if id.is_none() && name.is_none() {
            return None;
        }
        Some(LookupQuery { id, name })
    }
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub name: String,
}

impl Candidate {
    pub fn label(&self) -> String {
        format!("{} (RA: {})", self.name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(StudentRecord),
    NotFoundById(String),
    NotFoundByName(String),
    Ambiguous(Vec<Candidate>),
}

pub fn load_student(store: &dyn DocumentStore, id: &str) -> Result<Option<StudentRecord>, StoreError> {
    Ok(store
        .get(STUDENTS, id)?
        .map(|doc| StudentRecord::from_document(&doc)))
}

pub fn resolve(store: &dyn DocumentStore, query: &LookupQuery) -> Result<LookupOutcome, GradebookError> {
    if let Some(id) = &query.id {
        return Ok(match load_student(store, id)? {
            Some(record) => LookupOutcome::Found(record),
            None => LookupOutcome::NotFoundById(id.clone()),
        });
    }

    let Some(name) = &query.name else {
        return Err(GradebookError::BadParams("provide ra or name".into()));
    };
    let mut hits = store.query_eq(STUDENTS, NAME_FIELD, &Value::String(name.clone()))?;
    match hits.len() {
        0 => Ok(LookupOutcome::NotFoundByName(name.clone())),
        1 => {
            let doc = hits.remove(0);
            Ok(LookupOutcome::Found(StudentRecord::from_document(&doc)))
        }
        _ => Ok(LookupOutcome::Ambiguous(
            hits.iter()
                .map(|doc| Candidate {
                    id: doc.id.clone(),
                    name: doc
                        .data
                        .get(NAME_FIELD)
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                })
                .collect(),
        )),
    }
}

/// Resolves a disambiguation choice to the chosen record.
pub fn select_candidate(store: &dyn DocumentStore, id: &str) -> Result<StudentRecord, GradebookError> {
    let id = require(id, "ra")?;
    load_student(store, &id)?.ok_or(GradebookError::StudentNotFound(id))
}

/// Creates `{ra, name, quarters: {}}` only if the RA is still free.
pub fn register(
    store: &dyn DocumentStore,
    id: &str,
    name: &str,
) -> Result<StudentRecord, GradebookError> {
    let id = require(id, "ra")?;
    let name = require(name, "name")?;

    let mut data = WriteMap::new();
    data.insert(RA_FIELD.to_string(), id.as_str().into());
    data.insert(NAME_FIELD.to_string(), name.as_str().into());
    data.insert(QUARTERS_FIELD.to_string(), WriteValue::Map(WriteMap::new()));

    match store.create(STUDENTS, &id, data) {
        Ok(()) => {}
        Err(StoreError::AlreadyExists { .. }) => return Err(GradebookError::AlreadyExists(id)),
        Err(e) => return Err(e.into()),
    }
    tracing::info!(ra = %id, "student registered");
    load_student(store, &id)?.ok_or(GradebookError::StudentNotFound(id))
}

/// Overwrites `name` only; quarters are left alone.
pub fn rename(store: &dyn DocumentStore, id: &str, name: &str) -> Result<StudentRecord, GradebookError> {
    let id = require(id, "ra")?;
    let name = require(name, "name")?;

    match store.update(STUDENTS, &id, vec![(FieldPath::new([NAME_FIELD]), name.into())]) {
        Ok(()) => {}
        Err(StoreError::NotFound { .. }) => return Err(GradebookError::StudentNotFound(id)),
        Err(e) => return Err(e.into()),
    }
    tracing::info!(ra = %id, "student renamed");
    load_student(store, &id)?.ok_or(GradebookError::StudentNotFound(id))
}

fn require(v: &str, what: &str) -> Result<String, GradebookError> {
    let t = v.trim();
    if t.is_empty() {
        return Err(GradebookError::BadParams(format!("{} must not be empty", what)));
    }
    Ok(t.to_string())
}
