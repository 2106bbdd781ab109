//!
//! modelhub storage module
//! ------------------------
//! On-disk store for users, datasets, models and trainings. Each table lives in
//! memory as an id-keyed ordered map and is persisted as a single Parquet file
//! under the data root (`users.parquet`, `datasets.parquet`, ...). Every
//! mutation rewrites the table file; opening the store loads whatever files
//! exist, and a missing file is an empty table.
//!
//! Timestamps are stored as epoch milliseconds (i64). Ids are assigned per
//! table from a persisted counter and never reused. Files are replaced by
//! writing a `.tmp` sibling and renaming it over the target.
//!
//! The `Store` is shared through `SharedStore` (`Arc<Mutex<Store>>`); callers
//! take a scoped `session()` guard for the duration of one logical operation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use polars::prelude::{AnyValue, DataFrame, NamedFrom, ParquetReader, ParquetWriter, PolarsResult, SerReader, Series};
use tracing::{debug, warn};

use crate::entities::{Dataset, Model, Training, User};

/// A record type that can be persisted as one row of a Parquet table.
pub trait TableRow: Clone {
    /// File name under the data root.
    const FILE: &'static str;
    fn row_id(&self) -> i64;
    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame>;
    fn from_frame(df: &DataFrame) -> Result<Vec<Self>>;
}

/// One persisted table: rows ordered by id plus the next id to hand out.
///
/// The counter lives in its own `<table>.meta.parquet` file and only moves
/// forward, so an id is never issued twice, even after the row holding the
/// highest id is deleted and the store is reopened.
pub struct Table<T> {
    path: PathBuf,
    meta_path: PathBuf,
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T: TableRow> Table<T> {
    fn open(root: &Path) -> Result<Self> {
        let path = root.join(T::FILE);
        let meta_path = path.with_extension("meta.parquet");
        discard_stale_tmp(&path);
        discard_stale_tmp(&meta_path);

        let mut rows = BTreeMap::new();
        if path.exists() {
            let df = read_frame(&path)?;
            for row in T::from_frame(&df).with_context(|| format!("Malformed table: {}", path.display()))? {
                rows.insert(row.row_id(), row);
            }
        }
        let stored_next = if meta_path.exists() {
            let meta = read_frame(&meta_path)?;
            i64_at(&meta, "next_id", 0).with_context(|| format!("Malformed id counter: {}", meta_path.display()))?
        } else {
            1
        };
        let after_rows = rows.keys().next_back().map(|id| id + 1).unwrap_or(1);
        let next_id = stored_next.max(after_rows);
        debug!(target: "modelhub::storage", "open table file='{}' rows={} next_id={}", path.display(), rows.len(), next_id);
        Ok(Self { path, meta_path, rows, next_id })
    }

    pub fn get(&self, id: i64) -> Option<&T> { self.rows.get(&id) }

    /// Rows in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ { self.rows.values() }

    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// Assign the next id, build the row with it, and persist. The counter is
    /// persisted first; if the row write then fails the id stays consumed and
    /// the in-memory rows are left as they were.
    pub fn insert_with<F: FnOnce(i64) -> T>(&mut self, build: F) -> Result<T> {
        let id = self.next_id;
        self.next_id = id + 1;
        if let Err(e) = self.flush_counter() {
            self.next_id = id;
            return Err(e);
        }
        let row = build(id);
        self.rows.insert(id, row.clone());
        if let Err(e) = self.flush() {
            self.rows.remove(&id);
            return Err(e);
        }
        Ok(row)
    }

    /// Apply `f` to the row with `id` and persist. Returns the updated row.
    pub fn update<F: FnOnce(&mut T)>(&mut self, id: i64, f: F) -> Result<Option<T>> {
        let Some(current) = self.rows.get_mut(&id) else { return Ok(None); };
        let before = current.clone();
        f(current);
        let after = current.clone();
        if let Err(e) = self.flush() {
            self.rows.insert(id, before);
            return Err(e);
        }
        Ok(Some(after))
    }

    /// Remove the row with `id` and persist. `None` if it did not exist.
    pub fn remove(&mut self, id: i64) -> Result<Option<T>> {
        let Some(removed) = self.rows.remove(&id) else { return Ok(None); };
        if let Err(e) = self.flush() {
            self.rows.insert(id, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    fn flush(&self) -> Result<()> {
        let rows: Vec<&T> = self.rows.values().collect();
        let mut df = T::to_frame(&rows)?;
        write_frame(&self.path, &mut df)?;
        debug!(target: "modelhub::storage", "flush table file='{}' rows={}", self.path.display(), rows.len());
        Ok(())
    }

    fn flush_counter(&self) -> Result<()> {
        let mut df = DataFrame::new(vec![Series::new("next_id".into(), vec![self.next_id]).into()])?;
        write_frame(&self.meta_path, &mut df)
    }
}

fn read_frame(path: &Path) -> Result<DataFrame> {
    let file = fs::File::open(path).with_context(|| format!("Failed to open table file: {}", path.display()))?;
    ParquetReader::new(file)
        .finish()
        .with_context(|| format!("Failed to read parquet table: {}", path.display()))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

/// Write `df` next to `path` and rename it into place, so readers only ever
/// see the previous file or the complete new one.
fn write_frame(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create data root: {}", dir.display()))?;
    }
    let tmp = tmp_path(path);
    let written = (|| -> Result<()> {
        let mut f = fs::File::create(&tmp).with_context(|| format!("Failed to create {}", tmp.display()))?;
        ParquetWriter::new(&mut f).finish(df).with_context(|| format!("Failed to write {}", tmp.display()))?;
        f.sync_all().with_context(|| format!("Failed to sync {}", tmp.display()))?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))
}

/// Leftover from an interrupted write; the live file is still the previous version.
fn discard_stale_tmp(path: &Path) {
    let tmp = tmp_path(path);
    if tmp.is_file() {
        match fs::remove_file(&tmp) {
            Ok(()) => warn!(target: "modelhub::storage", "removed stale temp file '{}'", tmp.display()),
            Err(e) => warn!(target: "modelhub::storage", "could not remove stale temp file '{}': {}", tmp.display(), e),
        }
    }
}

/// All tables of one data root.
pub struct Store {
    pub users: Table<User>,
    pub datasets: Table<Dataset>,
    pub models: Table<Model>,
    pub trainings: Table<Training>,
}

impl Store {
    /// Open (or initialize) the store under `root`, creating the directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create or access data root: {}", root.display()))?;
        Ok(Self {
            users: Table::open(root)?,
            datasets: Table::open(root)?,
            models: Table::open(root)?,
            trainings: Table::open(root)?,
        })
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }
}

/// Cloneable handle to the store shared by repositories and handlers.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Store::open(root)?))))
    }

    /// Scoped access to the store. The guard is released when dropped, so an
    /// early `?` return releases it as well.
    pub fn session(&self) -> MutexGuard<'_, Store> { self.0.lock() }
}

// --- column helpers ---

fn ms(ts: &DateTime<Utc>) -> i64 { ts.timestamp_millis() }

fn i64_at(df: &DataFrame, col: &str, i: usize) -> Result<i64> {
    df.column(col)?.i64()?.get(i).ok_or_else(|| anyhow!("null {} at row {}", col, i))
}

fn f64_at(df: &DataFrame, col: &str, i: usize) -> Result<f64> {
    df.column(col)?.f64()?.get(i).ok_or_else(|| anyhow!("null {} at row {}", col, i))
}

fn bool_at(df: &DataFrame, col: &str, i: usize) -> Result<bool> {
    Ok(df.column(col)?.bool()?.get(i).unwrap_or(false))
}

fn str_at(df: &DataFrame, col: &str, i: usize) -> Result<String> {
    match df.column(col)?.get(i)? {
        AnyValue::String(s) => Ok(s.to_string()),
        AnyValue::StringOwned(s) => Ok(s.to_string()),
        other => Err(anyhow!("expected string in {} at row {}, found {:?}", col, i, other)),
    }
}

fn time_at(df: &DataFrame, col: &str, i: usize) -> Result<DateTime<Utc>> {
    let v = i64_at(df, col, i)?;
    DateTime::from_timestamp_millis(v).ok_or_else(|| anyhow!("timestamp out of range in {} at row {}", col, i))
}

impl TableRow for User {
    const FILE: &'static str = "users.parquet";

    fn row_id(&self) -> i64 { self.id }

    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new("id".into(), rows.iter().map(|r| r.id).collect::<Vec<i64>>()).into(),
            Series::new("email".into(), rows.iter().map(|r| r.email.clone()).collect::<Vec<String>>()).into(),
            Series::new("password_digest".into(), rows.iter().map(|r| r.password_digest.clone()).collect::<Vec<String>>()).into(),
            Series::new("registration_date".into(), rows.iter().map(|r| ms(&r.registration_date)).collect::<Vec<i64>>()).into(),
            Series::new("is_admin".into(), rows.iter().map(|r| r.is_admin).collect::<Vec<bool>>()).into(),
        ])
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        (0..df.height())
            .map(|i| {
                Ok(User {
                    id: i64_at(df, "id", i)?,
                    email: str_at(df, "email", i)?,
                    password_digest: str_at(df, "password_digest", i)?,
                    registration_date: time_at(df, "registration_date", i)?,
                    is_admin: bool_at(df, "is_admin", i)?,
                })
            })
            .collect()
    }
}

impl TableRow for Dataset {
    const FILE: &'static str = "datasets.parquet";

    fn row_id(&self) -> i64 { self.id }

    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new("id".into(), rows.iter().map(|r| r.id).collect::<Vec<i64>>()).into(),
            Series::new("name".into(), rows.iter().map(|r| r.name.clone()).collect::<Vec<String>>()).into(),
            Series::new("creation_date".into(), rows.iter().map(|r| ms(&r.creation_date)).collect::<Vec<i64>>()).into(),
            Series::new("owner_id".into(), rows.iter().map(|r| r.owner_id).collect::<Vec<i64>>()).into(),
        ])
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        (0..df.height())
            .map(|i| {
                Ok(Dataset {
                    id: i64_at(df, "id", i)?,
                    name: str_at(df, "name", i)?,
                    creation_date: time_at(df, "creation_date", i)?,
                    owner_id: i64_at(df, "owner_id", i)?,
                })
            })
            .collect()
    }
}

impl TableRow for Model {
    const FILE: &'static str = "models.parquet";

    fn row_id(&self) -> i64 { self.id }

    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new("id".into(), rows.iter().map(|r| r.id).collect::<Vec<i64>>()).into(),
            Series::new("name".into(), rows.iter().map(|r| r.name.clone()).collect::<Vec<String>>()).into(),
            Series::new("creation_date".into(), rows.iter().map(|r| ms(&r.creation_date)).collect::<Vec<i64>>()).into(),
            Series::new("owner_id".into(), rows.iter().map(|r| r.owner_id).collect::<Vec<i64>>()).into(),
        ])
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        (0..df.height())
            .map(|i| {
                Ok(Model {
                    id: i64_at(df, "id", i)?,
                    name: str_at(df, "name", i)?,
                    creation_date: time_at(df, "creation_date", i)?,
                    owner_id: i64_at(df, "owner_id", i)?,
                })
            })
            .collect()
    }
}

impl TableRow for Training {
    const FILE: &'static str = "trainings.parquet";

    fn row_id(&self) -> i64 { self.id }

    fn to_frame(rows: &[&Self]) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new("id".into(), rows.iter().map(|r| r.id).collect::<Vec<i64>>()).into(),
            Series::new("name".into(), rows.iter().map(|r| r.name.clone()).collect::<Vec<String>>()).into(),
            Series::new("model_id".into(), rows.iter().map(|r| r.model_id).collect::<Vec<i64>>()).into(),
            Series::new("model_name".into(), rows.iter().map(|r| r.model_name.clone()).collect::<Vec<String>>()).into(),
            Series::new("dataset_id".into(), rows.iter().map(|r| r.dataset_id).collect::<Vec<i64>>()).into(),
            Series::new("dataset_name".into(), rows.iter().map(|r| r.dataset_name.clone()).collect::<Vec<String>>()).into(),
            Series::new("precision".into(), rows.iter().map(|r| r.precision).collect::<Vec<f64>>()).into(),
            Series::new("recall".into(), rows.iter().map(|r| r.recall).collect::<Vec<f64>>()).into(),
            Series::new("creation_date".into(), rows.iter().map(|r| ms(&r.creation_date)).collect::<Vec<i64>>()).into(),
            Series::new("owner_id".into(), rows.iter().map(|r| r.owner_id).collect::<Vec<i64>>()).into(),
        ])
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        (0..df.height())
            .map(|i| {
                Ok(Training {
                    id: i64_at(df, "id", i)?,
                    name: str_at(df, "name", i)?,
                    model_id: i64_at(df, "model_id", i)?,
                    model_name: str_at(df, "model_name", i)?,
                    dataset_id: i64_at(df, "dataset_id", i)?,
                    dataset_name: str_at(df, "dataset_name", i)?,
                    precision: f64_at(df, "precision", i)?,
                    recall: f64_at(df, "recall", i)?,
                    creation_date: time_at(df, "creation_date", i)?,
                    owner_id: i64_at(df, "owner_id", i)?,
                })
            })
            .collect()
    }
}
