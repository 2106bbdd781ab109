use serde::{Deserialize, Serialize};

use crate::entities::User;

/// The authenticated caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl From<&User> for Identity {
    fn from(u: &User) -> Self {
        Identity { id: u.id, email: u.email.clone(), is_admin: u.is_admin }
    }
}
