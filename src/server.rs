//!
//! modelhub HTTP server
//! --------------------
//! Axum-based JSON API over the credential store and the ownership-scoped
//! repositories.
//!
//! Responsibilities:
//! - Registration, login/token issue and a stateless logout.
//! - Bearer-token resolution for every protected route (`Authorization: Bearer <jwt>`).
//! - Scoped CRUD for datasets, models and trainings; admin mirrors under `/admin`.
//! - Startup: data directory creation, admin seeding and a configuration banner.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::Repository;
use crate::config::Config;
use crate::entities::{Dataset, Model, Training, User};
use crate::error::{AppError, AppResult};
use crate::identity::{AuthProvider, Credentials, Identity, LocalAuthProvider, TokenManager};
use crate::security::{self, AdminSeed};
use crate::storage::SharedStore;

pub mod admin;
pub mod resources;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub auth: Arc<dyn AuthProvider>,
    pub datasets: Repository<Dataset>,
    pub models: Repository<Model>,
    pub trainings: Repository<Training>,
}

impl AppState {
    pub fn new(store: SharedStore, tokens: TokenManager) -> Self {
        Self {
            auth: Arc::new(LocalAuthProvider::new(store.clone(), tokens)),
            datasets: Repository::new(store.clone()),
            models: Repository::new(store.clone()),
            trainings: Repository::new(store.clone()),
            store,
        }
    }

    /// Resolve the caller from the `Authorization` header.
    pub fn caller(&self, headers: &HeaderMap) -> AppResult<Identity> {
        let Some(token) = bearer_token(headers) else {
            debug!(target: "modelhub::http", "request without bearer token");
            return Err(AppError::unauthenticated());
        };
        self.auth.resolve(&token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("authorization")?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

/// Unwrap a JSON body, turning axum's rejection into a validation error.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(v)) => Ok(v),
        Err(rej) => Err(AppError::validation(rej.body_text())),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "modelhub ok" }))
        .route("/home", get(home))
        .route("/signin", post(signin))
        .route("/login", post(login))
        .route("/token", post(login))
        .route("/logout", post(logout))
        .route("/users/me", get(me))
        .route("/datasets", post(resources::create_dataset).get(resources::list_datasets))
        .route("/datasets/{id}", get(resources::get_dataset).delete(resources::delete_dataset))
        .route("/models", post(resources::create_model).get(resources::list_models))
        .route("/models/{id}", get(resources::get_model).delete(resources::delete_model))
        .route("/trainings", post(resources::create_training).get(resources::list_trainings))
        .route("/trainings/{id}", get(resources::get_training).delete(resources::delete_training))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/delete/{email}", post(admin::delete_user))
        .route("/admin/users/{email}", delete(admin::delete_user))
        .route("/admin/datasets", post(admin::create_dataset).get(admin::list_datasets))
        .route("/admin/datasets/{id}", get(admin::get_dataset).delete(admin::delete_dataset))
        .route("/admin/models", post(admin::create_model).get(admin::list_models))
        .route("/admin/models/{id}", get(admin::get_model).delete(admin::delete_model))
        .route("/admin/trainings", post(admin::create_training).get(admin::list_trainings))
        .route("/admin/trainings/{id}", get(admin::get_training).delete(admin::delete_training))
        .with_state(state)
}

/// Open the store under `config.data_dir`, seed the admin account if one is
/// configured and build the handler state.
pub fn prepare(config: &Config) -> anyhow::Result<(AppState, Option<AdminSeed>)> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create or access data directory: {}", config.data_dir.display()))?;
    let store = SharedStore::new(&config.data_dir)
        .with_context(|| format!("While opening store at {}", config.data_dir.display()))?;

    let seeded = match &config.admin {
        Some(seed) => {
            let mut db = store.session();
            let outcome = security::ensure_default_admin(&mut db, &seed.email, &seed.password)
                .with_context(|| format!("While seeding admin account {}", seed.email))?;
            Some(outcome)
        }
        None => None,
    };

    let tokens = TokenManager::new(config.secret_key.as_bytes(), chrono::Duration::minutes(config.token_minutes));
    Ok((AppState::new(store, tokens), seeded))
}

pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Start the HTTP server described by `config` and block until it stops.
pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let (state, seeded) = prepare(&config)?;
    let (users, datasets, models, trainings) = {
        let db = state.store.session();
        (db.users.len(), db.datasets.len(), db.models.len(), db.trainings.len())
    };
    info!(
        target: "modelhub",
        "modelhub starting: http_port={}, data_dir='{}', secret_generated={}, token_minutes={}, admin_seed={:?}",
        config.http_port, config.data_dir.display(), config.secret_generated, config.token_minutes, seeded
    );
    info!(
        target: "modelhub",
        "loaded {} user(s), {} dataset(s), {} model(s), {} training(s)",
        users, datasets, models, trainings
    );
    if config.admin.is_none() && users == 0 {
        warn!(target: "modelhub", "no ADMIN_EMAIL/ADMIN_PASSWORD configured and no accounts exist; admin routes are unreachable");
    }

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

#[derive(Debug, Serialize)]
struct SigninResponse {
    user: User,
    access_token: String,
    token_type: &'static str,
}

async fn home() -> impl IntoResponse {
    Json(json!({"message": "Welcome to the AI model management API"}))
}

async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let creds = body(payload)?;
    let user = state.auth.register(&creds)?;
    let issued = state.auth.issue_for(&user)?;
    Ok((
        StatusCode::CREATED,
        Json(SigninResponse { user, access_token: issued.access_token, token_type: issued.token_type }),
    ))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let creds = body(payload)?;
    let resp = state.auth.login(&creds)?;
    info!(target: "modelhub::auth", "login {}", resp.identity.email);
    Ok(Json(resp))
}

async fn logout() -> impl IntoResponse {
    Json(json!({"message": "Logout successful"}))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<User>> {
    let caller = state.caller(&headers)?;
    let db = state.store.session();
    let user = db.users.get(caller.id).cloned();
    user.map(Json).ok_or_else(AppError::unauthenticated)
}
