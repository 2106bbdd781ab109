use crate::entities::Owned;
use crate::error::{AppError, AppResult};

use super::principal::Identity;

/// The ownership rule: admins see everything, everyone else only what they own.
pub fn can_access<T: Owned + ?Sized>(identity: &Identity, resource: &T) -> bool {
    identity.is_admin || resource.owner_id() == identity.id
}

/// Gate for `/admin/*` routes.
pub fn require_admin(identity: &Identity) -> AppResult<()> {
    if identity.is_admin { Ok(()) } else { Err(AppError::admin_only()) }
}

/// Filter a sequence down to what `identity` may see, preserving order.
pub fn visible<'a, T, I>(identity: &'a Identity, items: I) -> impl Iterator<Item = &'a T> + 'a
where
    T: Owned + 'a,
    I: IntoIterator<Item = &'a T>,
    I::IntoIter: 'a,
{
    items.into_iter().filter(move |r| can_access(identity, *r))
}
