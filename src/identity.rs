//! Read-only access to the signed-in user.
//!
//! The local user is injected into the session controller instead of being
//! looked up from ambient state, so tests can supply any identity.

use crate::types::LocalUser;

pub trait IdentityProvider: Send + Sync {
    fn local_user(&self) -> &LocalUser;
}

impl IdentityProvider for LocalUser {
    fn local_user(&self) -> &LocalUser {
        self
    }
}
