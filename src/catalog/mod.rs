//!
//! Ownership-scoped repositories for datasets, models and trainings.
//! ----------------------------------------------------------------
//! A `Repository<T>` holds a `SharedStore` handle and takes one scoped session
//! per operation. Reads and deletes apply the ownership rule: a row that exists
//! but belongs to someone else is reported as not found, exactly like a row
//! that does not exist. Creation always stamps the caller as owner.
//!
//! Deletes never cascade. Removing a dataset or model that trainings still
//! reference leaves those trainings pointing at a missing id (their name
//! snapshots stay intact); this is logged as a warning.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::Owned;
use crate::error::{AppError, AppResult};
use crate::identity::{can_access, visible, Identity};
use crate::storage::{SharedStore, Store, Table, TableRow};

mod assets;
mod trainings;

pub use trainings::NewTraining;

/// A table of owned rows reachable through a `Repository`.
pub trait Resource: Owned + TableRow + Serialize + Send + 'static {
    /// Human name used in error messages ("Dataset with ID 3 not found").
    const KIND: &'static str;
    fn table(store: &Store) -> &Table<Self>;
    fn table_mut(store: &mut Store) -> &mut Table<Self>;
    /// Rows elsewhere that still reference `id`.
    fn dependents(_store: &Store, _id: i64) -> usize { 0 }
}

/// Create payload shared by datasets and models.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAsset {
    pub name: String,
}

/// A resource plus whether its owner account is an admin.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Annotated<T> {
    #[serde(flatten)]
    pub resource: T,
    pub user_is_admin: bool,
}

pub struct Repository<T> {
    store: SharedStore,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self { Self { store: self.store.clone(), _kind: PhantomData } }
}

impl<T: Resource> Repository<T> {
    pub fn new(store: SharedStore) -> Self { Self { store, _kind: PhantomData } }

    pub fn get(&self, id: i64, identity: &Identity) -> AppResult<T> {
        let db = self.store.session();
        let found = T::table(&db).get(id).filter(|r| can_access(identity, *r)).cloned();
        found.ok_or_else(|| AppError::missing(T::KIND, id))
    }

    /// Everything for admins, owned rows for everyone else; ascending id.
    pub fn list(&self, identity: &Identity) -> Vec<T> {
        let db = self.store.session();
        let rows: Vec<T> = visible(identity, T::table(&db).values()).cloned().collect();
        rows
    }

    pub fn delete(&self, id: i64, identity: &Identity) -> AppResult<T> {
        let mut db = self.store.session();
        let allowed = T::table(&db).get(id).is_some_and(|r| can_access(identity, r));
        if !allowed {
            return Err(AppError::missing(T::KIND, id));
        }
        let dangling = T::dependents(&db, id);
        let removed = T::table_mut(&mut db)
            .remove(id)?
            .ok_or_else(|| AppError::missing(T::KIND, id))?;
        if dangling > 0 {
            warn!(target: "modelhub::catalog", "{} {} deleted while {} training(s) still reference it", T::KIND, id, dangling);
        }
        info!(target: "modelhub::catalog", caller = identity.id, "deleted {} {}", T::KIND, removed.id());
        Ok(removed)
    }

    /// Attach `user_is_admin` by looking up each owner account.
    pub fn annotate(&self, items: Vec<T>) -> Vec<Annotated<T>> {
        let db = self.store.session();
        let mut out = Vec::with_capacity(items.len());
        for resource in items {
            let user_is_admin = owner_is_admin(&db, resource.owner_id());
            out.push(Annotated { resource, user_is_admin });
        }
        out
    }

    pub fn annotate_one(&self, resource: T) -> Annotated<T> {
        let db = self.store.session();
        let user_is_admin = owner_is_admin(&db, resource.owner_id());
        Annotated { resource, user_is_admin }
    }
}

/// False when the owner account no longer exists.
fn owner_is_admin(store: &Store, owner_id: i64) -> bool {
    store.users.get(owner_id).map(|u| u.is_admin).unwrap_or(false)
}

/// Trimmed, non-empty resource name.
pub(crate) fn validate_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("name: must not be empty"));
    }
    Ok(name.to_string())
}
