// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document persistence.
//!
//! Collections hold JSON objects keyed by their `_id` field. There are no
//! transactions, indexes or caches: each call stands alone.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

/// A stored document.
pub type Document = serde_json::Map<String, Value>;

pub const ID_FIELD: &str = "_id";

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug)]
pub enum StoreError {
    DuplicateId { collection: String, id: String },
    MissingId { collection: String },
    IdMismatch { collection: String, expected: String, found: String },
    Codec(serde_json::Error),
    Seed(String),
}

impl StoreError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateId { .. } => "DUPLICATE_ID",
            Self::MissingId { .. } => "MISSING_ID",
            Self::IdMismatch { .. } => "ID_MISMATCH",
            Self::Codec(_) => "CODEC",
            Self::Seed(_) => "SEED",
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { collection, id } => {
                write!(f, "{collection}: document {id} already exists")
            }
            Self::MissingId { collection } => write!(f, "{collection}: document has no {ID_FIELD}"),
            Self::IdMismatch { collection, expected, found } => {
                write!(f, "{collection}: replacement for {expected} carries {ID_FIELD} {found}")
            }
            Self::Codec(e) => write!(f, "document codec: {e}"),
            Self::Seed(reason) => write!(f, "seed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e)
    }
}

/// Conjunction of field-equality clauses. An array field matches when it
/// contains the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        let id: String = id.into();
        Self::all().eq(ID_FIELD, id)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|(field, want)| match doc.get(field) {
            Some(Value::Array(items)) if !want.is_array() => items.contains(want),
            Some(have) => have == want,
            None => false,
        })
    }
}

/// Generic persistence operations over named collections.
pub trait DocumentStore: Send + Sync {
    fn insert<'a>(&'a self, collection: &'a str, doc: Document) -> StoreFuture<'a, ()>;

    fn find_one<'a>(&'a self, collection: &'a str, filter: &'a Filter)
        -> StoreFuture<'a, Option<Document>>;

    fn find_many<'a>(&'a self, collection: &'a str, filter: &'a Filter)
        -> StoreFuture<'a, Vec<Document>>;

    /// Replace the first match. Resolves to whether anything matched. The
    /// replacement must carry the matched document's id.
    fn replace<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Filter,
        doc: Document,
    ) -> StoreFuture<'a, bool>;

    /// Delete every match. Resolves to the number removed.
    fn delete<'a>(&'a self, collection: &'a str, filter: &'a Filter) -> StoreFuture<'a, usize>;
}

/// In-process store. Collections keep insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a seed file of the form `{"labs": [..], "roles": [..], ..}`.
    pub fn from_seed_file(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;
        let store = Self::from_seed(&raw)?;
        info!(path = %path.display(), "loaded seed data");
        Ok(store)
    }

    pub fn from_seed(raw: &str) -> Result<Self, StoreError> {
        let root: Document = serde_json::from_str(raw)?;
        let store = Self::new();
        for (collection, docs) in root {
            let Value::Array(docs) = docs else {
                return Err(StoreError::Seed(format!("{collection}: expected an array")));
            };
            for doc in docs {
                let Value::Object(doc) = doc else {
                    return Err(StoreError::Seed(format!("{collection}: expected objects")));
                };
                store.insert_now(&collection, doc)?;
            }
        }
        Ok(store)
    }

    fn insert_now(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let Some(id) = document_id(&doc).map(str::to_owned) else {
            return Err(StoreError::MissingId { collection: collection.to_owned() });
        };
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_owned()).or_default();
        if docs.iter().any(|d| d.get(ID_FIELD) == doc.get(ID_FIELD)) {
            return Err(StoreError::DuplicateId { collection: collection.to_owned(), id });
        }
        debug!(collection, id = %id, "insert");
        docs.push(doc);
        Ok(())
    }

    fn matching(&self, collection: &str, filter: &Filter) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default()
    }
}

fn document_id(doc: &Document) -> Option<&str> {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        _ => None,
    }
}

impl DocumentStore for MemoryStore {
    fn insert<'a>(&'a self, collection: &'a str, doc: Document) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.insert_now(collection, doc) })
    }

    fn find_one<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Filter,
    ) -> StoreFuture<'a, Option<Document>> {
        Box::pin(async move { Ok(self.matching(collection, filter).into_iter().next()) })
    }

    fn find_many<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Filter,
    ) -> StoreFuture<'a, Vec<Document>> {
        Box::pin(async move { Ok(self.matching(collection, filter)) })
    }

    fn replace<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Filter,
        doc: Document,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut collections = self.collections.write();
            let Some(docs) = collections.get_mut(collection) else {
                return Ok(false);
            };
            let Some(slot) = docs.iter_mut().find(|d| filter.matches(d)) else {
                return Ok(false);
            };
            let expected = document_id(slot).unwrap_or_default().to_owned();
            match document_id(&doc) {
                None => return Err(StoreError::MissingId { collection: collection.to_owned() }),
                Some(found) if found != expected => {
                    return Err(StoreError::IdMismatch {
                        collection: collection.to_owned(),
                        expected,
                        found: found.to_owned(),
                    });
                }
                Some(_) => {}
            }
            debug!(collection, id = %expected, "replace");
            *slot = doc;
            Ok(true)
        })
    }

    fn delete<'a>(&'a self, collection: &'a str, filter: &'a Filter) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let mut collections = self.collections.write();
            let Some(docs) = collections.get_mut(collection) else {
                return Ok(0);
            };
            let before = docs.len();
            docs.retain(|d| !filter.matches(d));
            Ok(before - docs.len())
        })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
