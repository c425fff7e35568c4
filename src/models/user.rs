//! User model
//!
//! Users are the identities that own packages and projects and collaborate
//! on projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role
    pub role: UserRole,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Check if the user is the owner of a record created by `creator_id`.
    ///
    /// Ownership is strict: administrators do not own other people's records.
    pub fn owns(&self, creator_id: i64) -> bool {
        self.id == creator_id
    }

    /// Site-relative URL of the user's public profile
    pub fn url_path(&self) -> String {
        format!("/api/v1/users/{}", self.id)
    }
}

/// User role for authorization.
///
/// - Admin: may use the administration endpoints
/// - Member: regular contributor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Administrator
    Admin,
    /// Regular member
    #[default]
    Member,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Member => write!(f, "member"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "member" => Ok(UserRole::Member),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Public view of a user, safe to show to anyone
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new(
            format!("user{}", id),
            format!("user{}@example.com", id),
            "hash".to_string(),
            role,
        );
        user.id = id;
        user
    }

    #[test]
    fn test_user_new() {
        let user = User::new(
            "testuser".to_string(),
            "test@example.com".to_string(),
            "hashed_password".to_string(),
            UserRole::Member,
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "testuser");
        assert_eq!(user.role, UserRole::Member);
    }

    #[test]
    fn test_user_is_admin() {
        assert!(user(1, UserRole::Admin).is_admin());
        assert!(!user(2, UserRole::Member).is_admin());
    }

    #[test]
    fn test_admin_does_not_own_other_records() {
        let admin = user(1, UserRole::Admin);
        let member = user(2, UserRole::Member);

        assert!(admin.owns(1));
        assert!(!admin.owns(2));
        assert!(member.owns(2));
        assert!(!member.owns(1));
    }

    #[test]
    fn test_user_role_round_trip_and_default() {
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!(UserRole::from_str("MEMBER").unwrap(), UserRole::Member);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::Member);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(3, UserRole::Member)).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_public_user_hides_email() {
        let json = serde_json::to_value(PublicUser::from(&user(4, UserRole::Member))).unwrap();
        assert!(json.get("email").is_none());
        assert_eq!(json["username"], "user4");
    }
}
