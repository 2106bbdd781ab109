//! Credential store: account registration, password verification and the
//! startup admin seed. Passwords are kept only as Argon2 PHC strings.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use password_hash::{PasswordHash, SaltString};
use regex::Regex;
use tracing::{debug, info};

use crate::entities::{now_millis, User};
use crate::error::{AppError, AppResult};
use crate::storage::{SharedStore, Store};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern")
});

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Trim and lowercase an email, rejecting anything that is not `local@domain.tld`.
pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::validation(format!("email: '{}' is not a valid email address", raw.trim())));
    }
    Ok(email)
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::validation("password: must not be empty"));
    }
    Ok(())
}

/// Create a non-admin account. Fails with `duplicate_email` if the email exists.
///
/// The digest is computed without holding the store lock; the lock is taken
/// only for the duplicate check and the insert.
pub fn register(store: &SharedStore, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email)?;
    validate_password(password)?;
    let taken = store.session().user_by_email(&email).is_some();
    if taken {
        return Err(AppError::duplicate_email(&email));
    }
    let digest = hash_password(password).map_err(|e| AppError::internal("hash_failed".to_string(), e.to_string()))?;

    let mut db = store.session();
    // checked again: another registration may have landed while hashing
    if db.user_by_email(&email).is_some() {
        return Err(AppError::duplicate_email(&email));
    }
    let user = db.users.insert_with(|id| User {
        id,
        email: email.clone(),
        password_digest: digest,
        registration_date: now_millis(),
        is_admin: false,
    })?;
    info!(target: "modelhub::auth", user_id = user.id, "registered {}", user.email);
    Ok(user)
}

/// Check credentials. Unknown email and wrong password fail identically.
/// The account is copied out under the lock and verified after releasing it.
pub fn authenticate(store: &SharedStore, email: &str, password: &str) -> AppResult<User> {
    let email = email.trim().to_lowercase();
    let candidate = store.session().user_by_email(&email).cloned();
    match candidate {
        Some(user) if verify_password(&user.password_digest, password) => Ok(user),
        Some(_) => {
            debug!(target: "modelhub::auth", "password mismatch for {}", email);
            Err(AppError::invalid_credentials())
        }
        None => {
            debug!(target: "modelhub::auth", "unknown account {}", email);
            Err(AppError::invalid_credentials())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSeed { Created, Promoted, Present }

/// Ensure an admin account with `email` exists. An existing non-admin account
/// with that email is promoted; its password is left unchanged.
pub fn ensure_default_admin(store: &mut Store, email: &str, password: &str) -> Result<AdminSeed> {
    let email = normalize_email(email).map_err(|e| anyhow!("ADMIN_EMAIL: {}", e.message()))?;
    if let Some(existing) = store.user_by_email(&email) {
        if existing.is_admin { return Ok(AdminSeed::Present); }
        let id = existing.id;
        store.users.update(id, |u| u.is_admin = true)?;
        info!(target: "modelhub::auth", user_id = id, "promoted {} to admin", email);
        return Ok(AdminSeed::Promoted);
    }
    if password.is_empty() { return Err(anyhow!("ADMIN_PASSWORD must not be empty")); }
    let digest = hash_password(password)?;
    let user = store.users.insert_with(|id| User {
        id,
        email: email.clone(),
        password_digest: digest,
        registration_date: now_millis(),
        is_admin: true,
    })?;
    info!(target: "modelhub::auth", user_id = user.id, "seeded admin {}", user.email);
    Ok(AdminSeed::Created)
}

pub fn list_users(store: &Store) -> Vec<User> {
    store.users.values().cloned().collect()
}

/// Delete an account by email. Resources it owns are left in place.
pub fn delete_user(store: &mut Store, email: &str) -> AppResult<User> {
    let email = email.trim().to_lowercase();
    let Some(id) = store.user_by_email(&email).map(|u| u.id) else {
        return Err(AppError::not_found("not_found".to_string(), format!("User {} not found", email)));
    };
    let removed = store.users.remove(id)?;
    removed.ok_or_else(|| AppError::not_found("not_found".to_string(), format!("User {} not found", email)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SharedStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn register_twice_is_duplicate_email() {
        let (_tmp, store) = store();
        register(&store, "a@x.com", "pw1").unwrap();
        let err = register(&store, "A@X.com ", "other").unwrap_err();
        assert_eq!(err.code_str(), "duplicate_email");
        assert_eq!(store.session().users.len(), 1);
    }

    #[test]
    fn digest_is_not_the_plaintext() {
        let (_tmp, store) = store();
        let user = register(&store, "a@x.com", "pw1").unwrap();
        assert_ne!(user.password_digest, "pw1");
        assert!(user.password_digest.starts_with("$argon2"));
        assert!(!user.is_admin);
        assert!(verify_password(&user.password_digest, "pw1"));
        assert!(!verify_password("not-a-phc-string", "pw1"));
    }

    #[test]
    fn authenticate_checks_password() {
        let (_tmp, store) = store();
        let user = register(&store, "a@x.com", "pw1").unwrap();
        assert_eq!(authenticate(&store, "a@x.com", "pw1").unwrap().id, user.id);
        assert_eq!(authenticate(&store, "a@x.com", "wrong").unwrap_err(), AppError::invalid_credentials());
        assert_eq!(authenticate(&store, "nobody@x.com", "pw1").unwrap_err(), AppError::invalid_credentials());
    }

    #[test]
    fn invalid_input_is_rejected() {
        let (_tmp, store) = store();
        assert_eq!(register(&store, "not-an-email", "pw").unwrap_err().code_str(), "validation_error");
        assert_eq!(register(&store, "a@x.com", "").unwrap_err().code_str(), "validation_error");
        assert!(store.session().users.is_empty());
    }

    #[test]
    fn default_admin_is_created_once_and_promotes_existing() {
        let (_tmp, store) = store();
        assert_eq!(ensure_default_admin(&mut store.session(), "admin@x.com", "secret").unwrap(), AdminSeed::Created);
        assert_eq!(ensure_default_admin(&mut store.session(), "admin@x.com", "secret").unwrap(), AdminSeed::Present);
        assert!(authenticate(&store, "admin@x.com", "secret").unwrap().is_admin);

        register(&store, "b@x.com", "pw2").unwrap();
        assert_eq!(ensure_default_admin(&mut store.session(), "b@x.com", "ignored").unwrap(), AdminSeed::Promoted);
        let b = authenticate(&store, "b@x.com", "pw2").unwrap();
        assert!(b.is_admin);
    }

    #[test]
    fn delete_user_by_email() {
        let (_tmp, store) = store();
        register(&store, "a@x.com", "pw1").unwrap();
        register(&store, "b@x.com", "pw2").unwrap();
        assert_eq!(delete_user(&mut store.session(), "a@x.com").unwrap().email, "a@x.com");
        assert_eq!(delete_user(&mut store.session(), "a@x.com").unwrap_err().http_status(), 404);
        let emails: Vec<String> = list_users(&store.session()).into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec!["b@x.com".to_string()]);
    }

    #[test]
    fn concurrent_registrations_of_one_email_admit_a_single_account() {
        let (_tmp, store) = store();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || register(&store, "race@x.com", &format!("pw{}", i)))
            })
            .collect();
        let results: Vec<AppResult<User>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.code_str(), "duplicate_email");
        }
        assert_eq!(store.session().users.len(), 1);
    }

    #[test]
    fn store_lock_is_free_after_register_and_authenticate() {
        let (_tmp, store) = store();
        register(&store, "a@x.com", "pw1").unwrap();
        assert!(!store.0.is_locked());
        authenticate(&store, "a@x.com", "pw1").unwrap();
        authenticate(&store, "a@x.com", "wrong").unwrap_err();
        assert!(!store.0.is_locked());
    }
}
