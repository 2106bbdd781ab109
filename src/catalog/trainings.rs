use rand::Rng;
use serde::Deserialize;
use tracing::info;

use crate::entities::{now_millis, Training};
use crate::error::{AppError, AppResult};
use crate::identity::{can_access, Identity};
use crate::storage::{Store, Table};

use super::{validate_name, Repository, Resource};

/// Create payload for a training run. Older clients send the name as
/// `training_name` or `experiment_name`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTraining {
    #[serde(alias = "training_name", alias = "experiment_name")]
    pub name: String,
    pub model_id: i64,
    pub dataset_id: i64,
}

impl Resource for Training {
    const KIND: &'static str = "Training";
    fn table(store: &Store) -> &Table<Self> { &store.trainings }
    fn table_mut(store: &mut Store) -> &mut Table<Self> { &mut store.trainings }
}

impl Repository<Training> {
    /// Record a training of `model_id` on `dataset_id`. Both must be visible to
    /// `owner`; the model is checked first. Metrics are drawn uniformly from
    /// `[0, 1)` since nothing is actually trained.
    pub fn create(&self, req: &NewTraining, owner: &Identity) -> AppResult<Training> {
        let name = validate_name(&req.name)?;
        let mut db = self.store.session();
        let model_name = db
            .models
            .get(req.model_id)
            .filter(|m| can_access(owner, *m))
            .map(|m| m.name.clone())
            .ok_or_else(|| AppError::missing("Model", req.model_id))?;
        let dataset_name = db
            .datasets
            .get(req.dataset_id)
            .filter(|d| can_access(owner, *d))
            .map(|d| d.name.clone())
            .ok_or_else(|| AppError::missing("Dataset", req.dataset_id))?;

        let (precision, recall) = {
            let mut rng = rand::thread_rng();
            (rng.gen::<f64>(), rng.gen::<f64>())
        };
        let training = db.trainings.insert_with(|id| Training {
            id,
            name,
            model_id: req.model_id,
            model_name,
            dataset_id: req.dataset_id,
            dataset_name,
            precision,
            recall,
            creation_date: now_millis(),
            owner_id: owner.id,
        })?;
        info!(
            target: "modelhub::catalog",
            owner = owner.id,
            "created Training {} (model {}, dataset {})",
            training.id, training.model_id, training.dataset_id
        );
        Ok(training)
    }
}
