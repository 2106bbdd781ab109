use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::User;
use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::SharedStore;

use super::principal::Identity;
use super::token::TokenManager;

/// Email/password pair accepted by registration and login.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    /// Where a UI should land after login: the admin area for admins.
    pub redirect_url: &'static str,
    #[serde(skip)]
    pub identity: Identity,
}

pub trait AuthProvider: Send + Sync {
    fn register(&self, req: &Credentials) -> AppResult<User>;
    fn login(&self, req: &Credentials) -> AppResult<LoginResponse>;
    /// Issue a token for an account that was just verified by other means.
    fn issue_for(&self, user: &User) -> AppResult<LoginResponse>;
    /// Turn a bearer token back into the caller, confirming the account still exists.
    fn resolve(&self, token: &str) -> AppResult<Identity>;
}

pub struct LocalAuthProvider {
    pub store: SharedStore,
    pub tokens: TokenManager,
}

impl LocalAuthProvider {
    pub fn new(store: SharedStore, tokens: TokenManager) -> Self { Self { store, tokens } }
}

impl AuthProvider for LocalAuthProvider {
    fn register(&self, req: &Credentials) -> AppResult<User> {
        security::register(&self.store, &req.email, &req.password)
    }

    fn login(&self, req: &Credentials) -> AppResult<LoginResponse> {
        let user = security::authenticate(&self.store, &req.email, &req.password)?;
        self.issue_for(&user)
    }

    fn issue_for(&self, user: &User) -> AppResult<LoginResponse> {
        let identity = Identity::from(user);
        let issued = self
            .tokens
            .issue(&identity)
            .map_err(|e| AppError::internal("token_error".to_string(), e.to_string()))?;
        Ok(LoginResponse {
            access_token: issued.token,
            token_type: "bearer",
            expires_at: issued.expires_at,
            redirect_url: if identity.is_admin { "/admin" } else { "/dashboard" },
            identity,
        })
    }

    fn resolve(&self, token: &str) -> AppResult<Identity> {
        let claims = self.tokens.decode(token).map_err(|e| {
            debug!(target: "modelhub::auth", "token rejected: {}", e);
            AppError::unauthenticated()
        })?;
        let db = self.store.session();
        match db.user_by_email(&claims.sub) {
            Some(user) => Ok(Identity::from(user)),
            None => {
                debug!(target: "modelhub::auth", "token subject {} no longer exists", claims.sub);
                Err(AppError::unauthenticated())
            }
        }
    }
}
