//! Session authentication with role-based access control.
//!
//! A single signed session token (7 days) travels either in an `Authorization: Bearer`
//! header or in the httpOnly `auth-token` cookie. Logout revokes the token's `jti` through
//! a server-side deny-list.

mod cookie;
mod errors;
mod extractors;
mod guard;
mod ip;
mod state;
mod types;

pub use cookie::{
    SESSION_COOKIE_NAME, bearer_token, clear_session_cookie, get_cookie, session_cookie,
    session_token_candidates,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{
    AdminOnly, AnyRole, Auth, OptionalAuth, RoleConstraint, current_identity, require_admin,
    require_auth,
};
pub use guard::route_guard;
pub use ip::extract_client_ip;
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
