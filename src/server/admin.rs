//! `/admin` routes. Each resolves the caller, requires the admin flag, then
//! runs the same repository operation as the scoped route.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::catalog::{Annotated, NewAsset, NewTraining};
use crate::entities::{Dataset, Model, Training, User};
use crate::error::{AppError, AppResult};
use crate::identity::{require_admin, Identity};
use crate::security;

use super::resources::{self, path_id, Deleted};
use super::{body, AppState};

fn admin(state: &AppState, headers: &HeaderMap) -> AppResult<Identity> {
    let caller = state.caller(headers)?;
    require_admin(&caller)?;
    Ok(caller)
}

pub async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<User>>> {
    admin(&state, &headers)?;
    let users = security::list_users(&state.store.session());
    Ok(Json(users))
}

pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> AppResult<Json<Value>> {
    let caller = admin(&state, &headers)?;
    let email = match path {
        Ok(Path(email)) => email,
        Err(rej) => return Err(AppError::validation(rej.body_text())),
    };
    let removed = {
        let mut db = state.store.session();
        security::delete_user(&mut db, &email)?
    };
    info!(target: "modelhub::auth", caller = caller.id, "deleted user {} ({})", removed.email, removed.id);
    Ok(Json(json!({"message": format!("User {} has been deleted", removed.email)})))
}

pub async fn create_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewAsset>, JsonRejection>,
) -> AppResult<Json<Annotated<Dataset>>> {
    let caller = admin(&state, &headers)?;
    resources::create_dataset_as(&state, &caller, body(payload)?)
}

pub async fn list_datasets(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Annotated<Dataset>>>> {
    let caller = admin(&state, &headers)?;
    Ok(resources::list_datasets_as(&state, &caller))
}

pub async fn get_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Annotated<Dataset>>> {
    let caller = admin(&state, &headers)?;
    resources::get_dataset_as(&state, &caller, path_id(path)?)
}

pub async fn delete_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Deleted>> {
    let caller = admin(&state, &headers)?;
    resources::delete_dataset_as(&state, &caller, path_id(path)?)
}

pub async fn create_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewAsset>, JsonRejection>,
) -> AppResult<Json<Annotated<Model>>> {
    let caller = admin(&state, &headers)?;
    resources::create_model_as(&state, &caller, body(payload)?)
}

pub async fn list_models(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Annotated<Model>>>> {
    let caller = admin(&state, &headers)?;
    Ok(resources::list_models_as(&state, &caller))
}

pub async fn get_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Annotated<Model>>> {
    let caller = admin(&state, &headers)?;
    resources::get_model_as(&state, &caller, path_id(path)?)
}

pub async fn delete_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Deleted>> {
    let caller = admin(&state, &headers)?;
    resources::delete_model_as(&state, &caller, path_id(path)?)
}

pub async fn create_training(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewTraining>, JsonRejection>,
) -> AppResult<Json<Training>> {
    let caller = admin(&state, &headers)?;
    resources::create_training_as(&state, &caller, body(payload)?)
}

pub async fn list_trainings(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Training>>> {
    let caller = admin(&state, &headers)?;
    Ok(Json(state.trainings.list(&caller)))
}

pub async fn get_training(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Training>> {
    let caller = admin(&state, &headers)?;
    resources::get_training_as(&state, &caller, path_id(path)?)
}

pub async fn delete_training(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Deleted>> {
    let caller = admin(&state, &headers)?;
    resources::delete_training_as(&state, &caller, path_id(path)?)
}
