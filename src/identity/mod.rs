//! Central identity handling: who the caller is, how tokens are issued and
//! resolved, and the ownership rule applied to every resource access.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod token;
mod provider;
mod authorizer;

pub use principal::Identity;
pub use token::{random_secret, Claims, IssuedToken, TokenError, TokenManager};
pub use provider::{AuthProvider, Credentials, LocalAuthProvider, LoginResponse};
pub use authorizer::{can_access, require_admin, visible};
