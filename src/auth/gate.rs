//! Authorization Gate
//! Mission: One shared eligibility check for handshakes, events, and HTTP calls

use crate::auth::{jwt::JwtHandler, models::User, user_store::UserStore};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Credential/eligibility failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    ExpiredToken,
    InvalidToken,
    UserNotFound,
    Unapproved,
    MembershipExpired,
    /// The account store itself failed; surfaces as a server error.
    Storage,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AuthError::ExpiredToken => "Token has expired",
            AuthError::InvalidToken => "Invalid token",
            AuthError::UserNotFound => "Account no longer exists",
            AuthError::Unapproved => "Account is awaiting admin approval",
            AuthError::MembershipExpired => "Membership period has expired",
            AuthError::Storage => "Account lookup failed",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for AuthError {}

/// Stateless authorization gate.
///
/// Every call re-resolves the principal from the user store, so revoking
/// approval or expiring a membership takes effect on the next event rather
/// than when the current token happens to lapse.
pub struct AuthGate {
    users: Arc<UserStore>,
    jwt: Arc<JwtHandler>,
}

impl AuthGate {
    pub fn new(users: Arc<UserStore>, jwt: Arc<JwtHandler>) -> Self {
        Self { users, jwt }
    }

    /// Validate a bearer token and resolve its subject to an eligible account.
    pub fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.jwt.validate_token(token)?;
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidToken)?;
        self.resolve(user_id)
    }

    /// Same checks as `authenticate`, but absence instead of failure.
    /// Used by read paths that also serve anonymous callers.
    pub fn authenticate_optional(&self, token: Option<&str>) -> Option<User> {
        let token = token?;
        match self.authenticate(token) {
            Ok(user) => Some(user),
            Err(e) => {
                debug!("Optional authentication declined: {}", e);
                None
            }
        }
    }

    /// Re-resolve an already-known principal and re-check eligibility.
    ///
    /// The per-event publish path calls this so that moderation actions
    /// (revoke approval, expire membership) bite mid-session.
    pub fn resolve(&self, user_id: i64) -> Result<User, AuthError> {
        let user = self
            .users
            .by_id(user_id)
            .map_err(|_| AuthError::Storage)?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_approved {
            return Err(AuthError::Unapproved);
        }

        if user.role == crate::auth::models::UserRole::Member {
            if let Some(expiry) = user.expiry_date {
                if expiry < Utc::now() {
                    return Err(AuthError::MembershipExpired);
                }
            }
        }

        Ok(user)
    }

    /// Only elevated roles may publish; members are read-only.
    pub fn authorize_publish(&self, user: &User) -> bool {
        user.role.is_elevated()
    }
}
