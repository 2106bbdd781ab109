//! Scoped CRUD handlers for datasets, models and trainings.
//!
//! Every handler resolves the caller first, so a missing token is a 401 even
//! when the body is malformed. The `*_as` functions carry the actual work and
//! are shared with the `/admin` mirrors.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::catalog::{Annotated, NewAsset, NewTraining, Resource};
use crate::entities::{Dataset, Model, Training};
use crate::error::{AppError, AppResult};
use crate::identity::Identity;

use super::{body, AppState};

/// Body returned by every delete route.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub message: String,
    pub id: i64,
}

impl Deleted {
    fn of<T: Resource>(id: i64) -> Self {
        Self { message: format!("{} with ID {} deleted successfully", T::KIND, id), id }
    }
}

pub(crate) fn path_id(path: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    match path {
        Ok(Path(id)) => Ok(id),
        Err(rej) => Err(AppError::validation(rej.body_text())),
    }
}

pub(crate) fn create_dataset_as(state: &AppState, caller: &Identity, req: NewAsset) -> AppResult<Json<Annotated<Dataset>>> {
    let created = state.datasets.create(&req.name, caller)?;
    Ok(Json(state.datasets.annotate_one(created)))
}

pub(crate) fn list_datasets_as(state: &AppState, caller: &Identity) -> Json<Vec<Annotated<Dataset>>> {
    Json(state.datasets.annotate(state.datasets.list(caller)))
}

pub(crate) fn get_dataset_as(state: &AppState, caller: &Identity, id: i64) -> AppResult<Json<Annotated<Dataset>>> {
    let found = state.datasets.get(id, caller)?;
    Ok(Json(state.datasets.annotate_one(found)))
}

pub(crate) fn delete_dataset_as(state: &AppState, caller: &Identity, id: i64) -> AppResult<Json<Deleted>> {
    state.datasets.delete(id, caller)?;
    Ok(Json(Deleted::of::<Dataset>(id)))
}

pub(crate) fn create_model_as(state: &AppState, caller: &Identity, req: NewAsset) -> AppResult<Json<Annotated<Model>>> {
    let created = state.models.create(&req.name, caller)?;
    Ok(Json(state.models.annotate_one(created)))
}

pub(crate) fn list_models_as(state: &AppState, caller: &Identity) -> Json<Vec<Annotated<Model>>> {
    Json(state.models.annotate(state.models.list(caller)))
}

pub(crate) fn get_model_as(state: &AppState, caller: &Identity, id: i64) -> AppResult<Json<Annotated<Model>>> {
    let found = state.models.get(id, caller)?;
    Ok(Json(state.models.annotate_one(found)))
}

pub(crate) fn delete_model_as(state: &AppState, caller: &Identity, id: i64) -> AppResult<Json<Deleted>> {
    state.models.delete(id, caller)?;
    Ok(Json(Deleted::of::<Model>(id)))
}

pub(crate) fn create_training_as(state: &AppState, caller: &Identity, req: NewTraining) -> AppResult<Json<Training>> {
    Ok(Json(state.trainings.create(&req, caller)?))
}

pub(crate) fn get_training_as(state: &AppState, caller: &Identity, id: i64) -> AppResult<Json<Training>> {
    Ok(Json(state.trainings.get(id, caller)?))
}

pub(crate) fn delete_training_as(state: &AppState, caller: &Identity, id: i64) -> AppResult<Json<Deleted>> {
    state.trainings.delete(id, caller)?;
    Ok(Json(Deleted::of::<Training>(id)))
}

pub async fn create_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewAsset>, JsonRejection>,
) -> AppResult<Json<Annotated<Dataset>>> {
    let caller = state.caller(&headers)?;
    create_dataset_as(&state, &caller, body(payload)?)
}

pub async fn list_datasets(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Annotated<Dataset>>>> {
    let caller = state.caller(&headers)?;
    Ok(list_datasets_as(&state, &caller))
}

pub async fn get_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Annotated<Dataset>>> {
    let caller = state.caller(&headers)?;
    get_dataset_as(&state, &caller, path_id(path)?)
}

pub async fn delete_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Deleted>> {
    let caller = state.caller(&headers)?;
    delete_dataset_as(&state, &caller, path_id(path)?)
}

pub async fn create_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewAsset>, JsonRejection>,
) -> AppResult<Json<Annotated<Model>>> {
    let caller = state.caller(&headers)?;
    create_model_as(&state, &caller, body(payload)?)
}

pub async fn list_models(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Annotated<Model>>>> {
    let caller = state.caller(&headers)?;
    Ok(list_models_as(&state, &caller))
}

pub async fn get_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Annotated<Model>>> {
    let caller = state.caller(&headers)?;
    get_model_as(&state, &caller, path_id(path)?)
}

pub async fn delete_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Deleted>> {
    let caller = state.caller(&headers)?;
    delete_model_as(&state, &caller, path_id(path)?)
}

pub async fn create_training(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewTraining>, JsonRejection>,
) -> AppResult<Json<Training>> {
    let caller = state.caller(&headers)?;
    create_training_as(&state, &caller, body(payload)?)
}

pub async fn list_trainings(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Training>>> {
    let caller = state.caller(&headers)?;
    Ok(Json(state.trainings.list(&caller)))
}

pub async fn get_training(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Training>> {
    let caller = state.caller(&headers)?;
    get_training_as(&state, &caller, path_id(path)?)
}

pub async fn delete_training(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Deleted>> {
    let caller = state.caller(&headers)?;
    delete_training_as(&state, &caller, path_id(path)?)
}
