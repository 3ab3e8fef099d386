//! Request and response payloads for the account endpoints.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Field name to error messages, as returned by the API on `400 Bad Request`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Login identifier and secret. The API identifies users by email.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Access/refresh pair issued by `POST auth/auth/login/`.
///
/// The login response also embeds the user, but the session always
/// re-fetches the profile with the new access token.
#[derive(Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenPair { .. }")
    }
}

/// New account submitted to `POST auth/auth/register/`.
#[derive(Clone, Default, Serialize)]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password2: String,
    pub is_farmer: bool,
    pub is_researcher: bool,
}

impl Registration {
    /// Check the input before it goes over the wire.
    ///
    /// Mirrors the server's own rules for required fields and the
    /// password confirmation so obvious mistakes never cost a round trip.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("email", &self.email),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                errors
                    .entry(field.to_string())
                    .or_default()
                    .push("This field may not be blank.".to_string());
            }
        }

        if !self.email.trim().is_empty() && !self.email.contains('@') {
            errors
                .entry("email".to_string())
                .or_default()
                .push("Enter a valid email address.".to_string());
        }

        if self.password != self.password2 {
            errors
                .entry("password".to_string())
                .or_default()
                .push("Password fields didn't match.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.clone(), self.password.clone())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("is_farmer", &self.is_farmer)
            .field("is_researcher", &self.is_researcher)
            .finish_non_exhaustive()
    }
}

/// Partial profile edit sent with `PATCH auth/profile/`. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_farmer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_researcher: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone_number.is_none()
            && self.bio.is_none()
            && self.location.is_none()
            && self.preferred_language.is_none()
            && self.is_farmer.is_none()
            && self.is_researcher.is_none()
    }
}

/// Body of `PUT auth/auth/change-password/`.
#[derive(Clone, Serialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordChange { .. }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            email: "grower@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Okafor".to_string(),
            password: "s3cret-pass".to_string(),
            password2: "s3cret-pass".to_string(),
            is_farmer: true,
            is_researcher: false,
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(registration().validate().is_ok());
    }

    #[test]
    fn test_password_mismatch() {
        let mut reg = registration();
        reg.password2 = "other".to_string();
        let errors = reg.validate().unwrap_err();
        assert_eq!(
            errors.get("password").unwrap(),
            &vec!["Password fields didn't match.".to_string()]
        );
    }

    #[test]
    fn test_blank_required_fields() {
        let reg = Registration::default();
        let errors = reg.validate().unwrap_err();
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("first_name"));
        assert!(errors.contains_key("last_name"));
        assert!(errors.contains_key("password"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("a@b.com", "hunter2");
        let out = format!("{:?}", creds);
        assert!(out.contains("a@b.com"));
        assert!(!out.contains("hunter2"));
        assert!(!format!("{:?}", registration()).contains("s3cret-pass"));
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            bio: Some("Maize agronomist".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "bio": "Maize agronomist" }));
    }

    #[test]
    fn test_token_pair_ignores_embedded_user() {
        let pair: TokenPair = serde_json::from_str(
            r#"{"access":"A","refresh":"R","user":{"id":1,"email":"a@b.com"}}"#,
        )
        .unwrap();
        assert_eq!(pair.access, "A");
        assert_eq!(pair.refresh, "R");
    }
}
