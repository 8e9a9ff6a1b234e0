//! Ownership authorization for record mutations.
//!
//! The dashboard service does not know how users authenticate. It only
//! knows the acting identity and asks an [`Authorizer`] whether that
//! identity may change a record owned by someone else.

use crate::ServiceError;

/// Pluggable ownership check, injected into services at startup.
pub trait Authorizer: Send + Sync + 'static {
    /// Check whether `actor` may edit or delete something owned by `owner`.
    ///
    /// - `what`: short description used in the error message, e.g.
    ///   `"inspection 12"`.
    /// - Returns `Err(ServiceError::PermissionDenied)` if not allowed.
    fn check(&self, actor: &str, owner: &str, what: &str) -> Result<(), ServiceError>;
}

/// Only the owner may mutate, with one optional administrative override.
#[derive(Debug, Clone, Default)]
pub struct OwnerOrAdmin {
    admin: Option<String>,
}

impl OwnerOrAdmin {
    pub fn new(admin: Option<String>) -> Self {
        Self { admin }
    }

    /// Owner-only check, no override identity.
    pub fn owner_only() -> Self {
        Self { admin: None }
    }
}

impl Authorizer for OwnerOrAdmin {
    fn check(&self, actor: &str, owner: &str, what: &str) -> Result<(), ServiceError> {
        if actor == owner || self.admin.as_deref() == Some(actor) {
            return Ok(());
        }
        Err(ServiceError::PermissionDenied(format!(
            "{actor} is not allowed to modify {what}"
        )))
    }
}
