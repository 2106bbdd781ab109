use tracing::info;

use crate::entities::{now_millis, Dataset, Model};
use crate::error::AppResult;
use crate::identity::Identity;
use crate::storage::{Store, Table};

use super::{validate_name, Repository, Resource};

impl Resource for Dataset {
    const KIND: &'static str = "Dataset";
    fn table(store: &Store) -> &Table<Self> { &store.datasets }
    fn table_mut(store: &mut Store) -> &mut Table<Self> { &mut store.datasets }
    fn dependents(store: &Store, id: i64) -> usize {
        store.trainings.values().filter(|t| t.dataset_id == id).count()
    }
}

impl Resource for Model {
    const KIND: &'static str = "Model";
    fn table(store: &Store) -> &Table<Self> { &store.models }
    fn table_mut(store: &mut Store) -> &mut Table<Self> { &mut store.models }
    fn dependents(store: &Store, id: i64) -> usize {
        store.trainings.values().filter(|t| t.model_id == id).count()
    }
}

impl Repository<Dataset> {
    pub fn create(&self, name: &str, owner: &Identity) -> AppResult<Dataset> {
        let name = validate_name(name)?;
        let mut db = self.store.session();
        let dataset = db.datasets.insert_with(|id| Dataset {
            id,
            name,
            creation_date: now_millis(),
            owner_id: owner.id,
        })?;
        info!(target: "modelhub::catalog", owner = owner.id, "created Dataset {} '{}'", dataset.id, dataset.name);
        Ok(dataset)
    }
}

impl Repository<Model> {
    pub fn create(&self, name: &str, owner: &Identity) -> AppResult<Model> {
        let name = validate_name(name)?;
        let mut db = self.store.session();
        let model = db.models.insert_with(|id| Model {
            id,
            name,
            creation_date: now_millis(),
            owner_id: owner.id,
        })?;
        info!(target: "modelhub::catalog", owner = owner.id, "created Model {} '{}'", model.id, model.name);
        Ok(model)
    }
}
