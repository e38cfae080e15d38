//! Authentication user types.

use crate::db::Role;
use crate::jwt::SessionClaims;

/// Authenticated user information extracted from a verified session token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// JWT claims from the session token
    pub claims: SessionClaims,
    /// The raw token, kept so logout can revoke exactly what was presented
    pub token: String,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> i64 {
        self.claims.user_id
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn is_admin(&self) -> bool {
        match self.claims.role {
            Role::Admin => true,
            Role::Customer => false,
        }
    }
}
