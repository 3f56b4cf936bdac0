// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed access to the `users`, `labs` and `roles` collections.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::proto::{Lab, Role, User};
use crate::store::{Document, DocumentStore, Filter, StoreError};

pub const USERS: &str = "users";
pub const LABS: &str = "labs";
pub const ROLES: &str = "roles";

/// Serde bridge between records and one collection.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>, collection: &'static str) -> Self {
        Self { store, collection, _record: PhantomData }
    }

    pub async fn create(&self, record: &T) -> Result<(), StoreError> {
        self.store.insert(self.collection, to_document(record)?).await
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        match self.store.find_one(self.collection, filter).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_many(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        let docs = self.store.find_many(self.collection, filter).await?;
        docs.into_iter().map(from_document).collect()
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.find_one(&Filter::by_id(id)).await
    }

    /// Replace the record stored under `id`. Resolves to whether it existed.
    pub async fn update(&self, id: &str, record: &T) -> Result<bool, StoreError> {
        self.store.replace(self.collection, &Filter::by_id(id), to_document(record)?).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.store.delete(self.collection, &Filter::by_id(id)).await? > 0)
    }
}

fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::Codec(<serde_json::Error as serde::ser::Error>::custom(
            format!("record serialized to {other}, not an object"),
        ))),
    }
}

fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

pub struct UserRepository {
    inner: Repository<User>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { inner: Repository::new(store, USERS) }
    }

    pub async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.inner.create(user).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_id(id).await
    }

    pub async fn find_by_open_id(&self, open_id: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_one(&Filter::all().eq("open_id", open_id)).await
    }

    /// Users whose `lab_ids` include `lab_id`.
    pub async fn find_by_lab_id(&self, lab_id: &str) -> Result<Vec<User>, StoreError> {
        self.inner.find_many(&Filter::all().eq("lab_ids", lab_id)).await
    }

    pub async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        self.inner.find_many(&Filter::all()).await
    }

    pub async fn update(&self, user: &User) -> Result<bool, StoreError> {
        self.inner.update(&user.id, user).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }
}

pub struct LabRepository {
    inner: Repository<Lab>,
}

impl LabRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { inner: Repository::new(store, LABS) }
    }

    pub async fn create(&self, lab: &Lab) -> Result<(), StoreError> {
        self.inner.create(lab).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Lab>, StoreError> {
        self.inner.find_by_id(id).await
    }

    /// The lab flagged `is_default`, falling back to any lab.
    pub async fn default_lab(&self) -> Result<Option<Lab>, StoreError> {
        if let Some(lab) = self.inner.find_one(&Filter::all().eq("is_default", true)).await? {
            return Ok(Some(lab));
        }
        self.inner.find_one(&Filter::all()).await
    }

    pub async fn find_all(&self) -> Result<Vec<Lab>, StoreError> {
        self.inner.find_many(&Filter::all()).await
    }
}

pub struct RoleRepository {
    inner: Repository<Role>,
}

impl RoleRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { inner: Repository::new(store, ROLES) }
    }

    pub async fn create(&self, role: &Role) -> Result<(), StoreError> {
        self.inner.create(role).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Role>, StoreError> {
        self.inner.find_by_id(id).await
    }

    pub async fn by_lab_id(&self, lab_id: &str) -> Result<Vec<Role>, StoreError> {
        self.inner.find_many(&Filter::all().eq("lab_id", lab_id)).await
    }

    pub async fn find_all(&self) -> Result<Vec<Role>, StoreError> {
        self.inner.find_many(&Filter::all()).await
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
