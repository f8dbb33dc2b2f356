/// Request and result types of the authentication workflows
///
/// Requests carry optional fields so a transport layer can hand over whatever
/// it decoded; missing fields surface as validation errors, not panics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::TokenPair;
use crate::error::{AppError, ErrorDetail};
use crate::principal::PrincipalSummary;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub device_info: Option<String>,
    pub origin_info: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub device_info: Option<String>,
    pub origin_info: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
    pub device_info: Option<String>,
    pub origin_info: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Outcome of Register / Login / RefreshToken
///
/// Success is an empty `errors` list; on failure every token field is `None`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub errors: Vec<ErrorDetail>,
}

impl AuthResult {
    pub fn success(principal: PrincipalSummary, tokens: TokenPair) -> Self {
        Self {
            principal: Some(principal),
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            expires_at: Some(tokens.expires_at),
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<ErrorDetail>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Code of the first error, if any
    pub fn error_code(&self) -> Option<&str> {
        self.errors.first().map(|e| e.code.as_str())
    }
}

impl From<AppError> for AuthResult {
    fn from(err: AppError) -> Self {
        Self::failure(vec![ErrorDetail::from(&err)])
    }
}

/// Outcome of Logout / LogoutAll
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogoutResult {
    /// Sessions revoked by this call
    pub revoked: u64,
    pub errors: Vec<ErrorDetail>,
}

impl LogoutResult {
    pub fn success(revoked: u64) -> Self {
        Self {
            revoked,
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.errors.first().map(|e| e.code.as_str())
    }
}

impl From<AppError> for LogoutResult {
    fn from(err: AppError) -> Self {
        Self {
            revoked: 0,
            errors: vec![ErrorDetail::from(&err)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, ValidationError};

    #[test]
    fn test_failure_carries_no_tokens() {
        let result = AuthResult::from(AppError::from(AuthError::InvalidCredentials));

        assert!(!result.is_success());
        assert_eq!(result.error_code(), Some("INVALID_CREDENTIALS"));
        assert!(result.access_token.is_none());
        assert!(result.refresh_token.is_none());
        assert!(result.expires_at.is_none());
    }

    #[test]
    fn test_failure_serialization_omits_token_fields() {
        let result = AuthResult::failure(vec![ErrorDetail::from(AppError::from(
            ValidationError::EmptyField("email".to_string()),
        ))]);
        let json = serde_json::to_value(&result).unwrap();

        assert!(json.get("access_token").is_none());
        assert_eq!(json["errors"][0]["field"], "email");
    }

    #[test]
    fn test_request_fields_are_optional() {
        let request: LoginRequest = serde_json::from_str(r#"{"email":"a@b.com"}"#).unwrap();
        assert_eq!(request.email.as_deref(), Some("a@b.com"));
        assert!(request.password.is_none());
    }

    #[test]
    fn test_logout_success() {
        let result = LogoutResult::success(1);
        assert!(result.is_success());
        assert_eq!(result.error_code(), None);
    }
}
