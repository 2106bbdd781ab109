//! Persisted record types. Relationships are plain foreign-key ids; joins are
//! performed explicitly by the catalog when a view needs them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current time truncated to milliseconds, the precision tables persist.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Anything carrying an owner reference that the access policy can inspect.
pub trait Owned {
    fn id(&self) -> i64;
    fn owner_id(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub registration_date: DateTime<Utc>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    pub creation_date: DateTime<Utc>,
    pub owner_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub name: String,
    pub creation_date: DateTime<Utc>,
    pub owner_id: i64,
}

/// A training run. `model_name` and `dataset_name` are snapshots taken when the
/// run was created and are never refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Training {
    pub id: i64,
    pub name: String,
    pub model_id: i64,
    pub model_name: String,
    pub dataset_id: i64,
    pub dataset_name: String,
    pub precision: f64,
    pub recall: f64,
    pub creation_date: DateTime<Utc>,
    pub owner_id: i64,
}

impl Owned for Dataset {
    fn id(&self) -> i64 { self.id }
    fn owner_id(&self) -> i64 { self.owner_id }
}

impl Owned for Model {
    fn id(&self) -> i64 { self.id }
    fn owner_id(&self) -> i64 { self.owner_id }
}

impl Owned for Training {
    fn id(&self) -> i64 { self.id }
    fn owner_id(&self) -> i64 { self.owner_id }
}
