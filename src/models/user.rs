use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

pub static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r".+@.+\..+").expect("valid email regex"));

pub static AVATAR_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://.+\.(jpg|jpeg|png|gif|svg)$").expect("valid avatar url regex")
});

const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// bcrypt hash; never leaves the service layer
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
    pub oauth_provider: Option<String>,
    pub oauth_id: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            role: Role::default(),
            profile: Profile::default(),
            oauth_provider: None,
            oauth_id: None,
            last_login: None,
            is_active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Soft delete: the record stays, the account stops working
    pub fn deactivate(&mut self) {
        let now = Utc::now();
        self.is_active = false;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
pub enum Role {
    Admin,
    #[default]
    TeamMember,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub full_name: String,
    pub avatar_url: String,
}

/// Public view of a user, without credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub profile: Profile,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            profile: user.profile,
            last_login: user.last_login,
            is_active: user.is_active,
            deleted_at: user.deleted_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, message = "Username must be at least 3 characters long"))]
    pub username: String,
    #[validate(regex(path = *EMAIL_RE, message = "Please use a valid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Fields a user may change; id, password, role and activation are not among them
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[validate(length(min = 3, message = "Username must be at least 3 characters long"))]
    pub username: Option<String>,
    #[validate(regex(path = *EMAIL_RE, message = "Please use a valid email address"))]
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[validate(regex(path = *AVATAR_URL_RE, message = "Invalid URL for avatar"))]
    pub avatar_url: Option<String>,
}

/// At least 8 characters from `[A-Za-z0-9@$!%*?&]` with a lowercase letter,
/// an uppercase letter, a digit and a special character.
pub fn is_strong_password(password: &str) -> bool {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));

    allowed
        && password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_policy() {
        assert!(is_strong_password("Sup3r$ecret"));
        assert!(!is_strong_password("Sh0rt!a"));
        assert!(!is_strong_password("alllowercase1!"));
        assert!(!is_strong_password("NoDigits!!"));
        assert!(!is_strong_password("NoSpecial123"));
        assert!(!is_strong_password("Has Space1!"));
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "Sup3r$ecret".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            username: "al".to_string(),
            email: "not-an-email".to_string(),
            password: "x".to_string(),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_avatar_url_validation() {
        let update = UserUpdate {
            avatar_url: Some("https://cdn.example.com/me.png".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let update = UserUpdate {
            avatar_url: Some("ftp://cdn.example.com/me.bmp".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_deactivate_and_response_hides_hash() {
        let mut user = User::new(
            "bob".to_string(),
            "bob@example.com".to_string(),
            "$2b$10$hash".to_string(),
        );
        assert!(user.is_active);
        assert!(!user.is_admin());

        user.deactivate();
        assert!(!user.is_active);
        assert!(user.deleted_at.is_some());

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["isActive"], false);
    }
}
