//! Authentication Models
//! Mission: Define user accounts, roles, and token payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub name: String,
    pub role: UserRole,
    pub is_approved: bool,
    /// Paid-membership cutoff; only enforced for the member role.
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: String,
}

/// User roles for room access control
///
/// Admin and staff are the elevated roles: they may publish and moderate.
/// Members hold read-only access gated by approval and membership expiry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "staff")]
    Staff,
    #[serde(rename = "member")]
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
            UserRole::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "staff" => Some(UserRole::Staff),
            "member" => Some(UserRole::Member),
            _ => None,
        }
    }

    /// Elevated roles may publish into rooms and moderate messages.
    pub fn is_elevated(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Staff)
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    pub role: UserRole,
    pub exp: usize, // expiration timestamp
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub password: String,
    pub name: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: usize, // seconds until expiration
    pub user: UserResponse,
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub phone: String,
    pub name: String,
    pub role: UserRole,
    pub is_approved: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            name: user.name.clone(),
            role: user.role,
            is_approved: user.is_approved,
            expiry_date: user.expiry_date,
            created_at: user.created_at.clone(),
        }
    }
}

/// Normalize a phone number into the canonical dashed form.
///
/// Accepts 10- or 11-digit numbers with or without dashes; anything else
/// is passed through untouched and rejected by request validation.
pub fn format_phone_number(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| *c != '-').collect();
    match digits.len() {
        11 => format!("{}-{}-{}", &digits[..3], &digits[3..7], &digits[7..]),
        10 => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => phone.to_string(),
    }
}

/// Validate a raw phone number: digits only (dashes allowed), 10 or 11 digits.
pub fn phone_is_valid(phone: &str) -> bool {
    let digits: String = phone.chars().filter(|c| *c != '-').collect();
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && matches!(digits.len(), 10 | 11)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_serialization() {
        let admin = UserRole::Admin;
        let json = serde_json::to_string(&admin).unwrap();
        assert_eq!(json, r#""admin""#);

        let staff: UserRole = serde_json::from_str(r#""staff""#).unwrap();
        assert_eq!(staff, UserRole::Staff);
    }

    #[test]
    fn test_user_role_string_conversion() {
        assert_eq!(UserRole::Admin.as_str(), "admin");
        assert_eq!(UserRole::from_str("STAFF"), Some(UserRole::Staff));
        assert_eq!(UserRole::from_str("invalid"), None);
    }

    #[test]
    fn test_elevated_roles() {
        assert!(UserRole::Admin.is_elevated());
        assert!(UserRole::Staff.is_elevated());
        assert!(!UserRole::Member.is_elevated());
    }

    #[test]
    fn test_phone_formatting() {
        assert_eq!(format_phone_number("01012345678"), "010-1234-5678");
        assert_eq!(format_phone_number("010-1234-5678"), "010-1234-5678");
        assert_eq!(format_phone_number("0212345678"), "021-234-5678");
        // Unrecognized lengths pass through unchanged.
        assert_eq!(format_phone_number("123"), "123");
    }

    #[test]
    fn test_phone_validation() {
        assert!(phone_is_valid("010-1234-5678"));
        assert!(phone_is_valid("01012345678"));
        assert!(!phone_is_valid("010-1234-567a"));
        assert!(!phone_is_valid("123"));
        assert!(!phone_is_valid(""));
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: 1,
            phone: "010-1234-5678".to_string(),
            password_hash: "secret-hash".to_string(),
            name: "Tester".to_string(),
            role: UserRole::Member,
            is_approved: true,
            expiry_date: None,
            created_at: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
