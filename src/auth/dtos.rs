use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use utoipa::ToSchema;

use crate::passwords::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Failed to compile email regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Login,
    Signup,
}

/// The sign-in / sign-up form posted to `/login`.
#[derive(Debug, Deserialize)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub mode: AuthMode,
}

impl AuthForm {
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !EMAIL_REGEX.is_match(&self.normalized_email()) {
            return Err("Invalid email format".to_string());
        }
        if self.mode == AuthMode::Signup {
            let len = self.password.chars().count();
            if len < MIN_PASSWORD_LEN {
                return Err(format!("Password must be at least {MIN_PASSWORD_LEN} characters"));
            }
            if len > MAX_PASSWORD_LEN {
                return Err("Password too long".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str, mode: AuthMode) -> AuthForm {
        AuthForm {
            email: email.to_string(),
            password: password.to_string(),
            mode,
        }
    }

    #[test]
    fn signup_checks_email_and_password_length() {
        assert!(form("user@example.com", "password123", AuthMode::Signup).validate().is_ok());
        assert!(form("invalid-email", "password123", AuthMode::Signup).validate().is_err());
        assert!(form("user@example.com", "short", AuthMode::Signup).validate().is_err());
    }

    #[test]
    fn login_only_checks_email() {
        assert!(form(" User@Example.com ", "x", AuthMode::Login).validate().is_ok());
        assert!(form("not-an-email", "password", AuthMode::Login).validate().is_err());
    }

    #[test]
    fn mode_defaults_to_login() {
        let parsed: AuthForm =
            serde_json::from_value(serde_json::json!({ "email": "a@b.co", "password": "p" })).unwrap();
        assert_eq!(parsed.mode, AuthMode::Login);
        assert_eq!(form("A@B.co", "", AuthMode::Login).normalized_email(), "a@b.co");
    }
}
