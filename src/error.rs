/// Error Handling Module
///
/// Unified error handling for the authentication core:
/// 1. Domain-specific error types (validation, credentials, tokens, sessions, storage)
/// 2. A unified `AppError` used for control flow inside the crate
/// 3. Classification into the error taxonomy callers key behavior off
/// 4. The `ErrorDetail` value returned inside result objects
/// 5. Structured error logging with context

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data, detected before any I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(String, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(String),
    #[error("{0} is already registered")]
    AlreadyExists(String),
}

impl ValidationError {
    /// Name of the offending input field
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField(field)
            | ValidationError::TooShort(field, _)
            | ValidationError::TooLong(field, _)
            | ValidationError::InvalidFormat(field)
            | ValidationError::SuspiciousContent(field)
            | ValidationError::AlreadyExists(field) => field,
        }
    }
}

/// Credential and account-state errors
///
/// `InvalidCredentials` is deliberately uniform: unknown account, wrong
/// password and unreadable hash all collapse into it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account is inactive")]
    AccountInactive,
}

/// Access token errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,
    #[error("Token has expired")]
    Expired,
}

/// Refresh session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,
    #[error("Session expiry must be in the future")]
    ExpiryNotInFuture,
}

/// Storage errors raised by session and principal stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate entry: {0}")]
    UniqueConstraintViolation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Query error: {0}")]
    QueryExecution(String),
    #[error("Database connection error: {0}")]
    ConnectionPool(String),
    #[error("Store operation cancelled")]
    Cancelled,
    #[error("Store operation timed out")]
    Timeout,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::UniqueConstraintViolation(db_err.message().to_string())
            }
            other @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
                StoreError::ConnectionPool(other.to_string())
            }
            other => StoreError::QueryExecution(other.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
    #[error("Config parse error: {0}")]
    Parse(#[from] config::ConfigError),
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all crate errors map to
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Credential,
    AccountState,
    Token,
    Session,
    Infrastructure,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Auth(AuthError::InvalidCredentials) => ErrorKind::Credential,
            AppError::Auth(AuthError::AccountInactive) => ErrorKind::AccountState,
            AppError::Token(_) => ErrorKind::Token,
            AppError::Session(_) => ErrorKind::Session,
            AppError::Store(_) | AppError::Config(_) | AppError::Internal(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Expected business outcomes (as opposed to infrastructure failure)
    pub fn is_business(&self) -> bool {
        self.kind() != ErrorKind::Infrastructure
    }

    /// Stable code for client-side handling
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(ValidationError::AlreadyExists(_)) => "EMAIL_ALREADY_EXISTS",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(AuthError::InvalidCredentials) => "INVALID_CREDENTIALS",
            AppError::Auth(AuthError::AccountInactive) => "ACCOUNT_INACTIVE",
            AppError::Token(TokenError::Invalid) => "TOKEN_INVALID",
            AppError::Token(TokenError::Expired) => "TOKEN_EXPIRED",
            AppError::Session(SessionError::InvalidRefreshToken) => "INVALID_REFRESH_TOKEN",
            AppError::Session(SessionError::ExpiryNotInFuture) => "INVALID_SESSION_EXPIRY",
            AppError::Store(
                StoreError::ConnectionPool(_) | StoreError::Cancelled | StoreError::Timeout,
            ) => "SERVICE_UNAVAILABLE",
            AppError::Store(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// ============================================================================
// 3. ERROR-AS-VALUE (returned inside result objects)
// ============================================================================

/// Code / message / field triple carried in result error lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl From<&AppError> for ErrorDetail {
    fn from(err: &AppError) -> Self {
        let message = match err {
            AppError::Store(StoreError::ConnectionPool(_) | StoreError::Cancelled | StoreError::Timeout) => {
                "Storage service temporarily unavailable".to_string()
            }
            AppError::Store(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Server configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let detail = ErrorDetail::new(err.code(), message);
        match err {
            AppError::Validation(e) => detail.with_field(e.field()),
            _ => detail,
        }
    }
}

impl From<AppError> for ErrorDetail {
    fn from(err: AppError) -> Self {
        ErrorDetail::from(&err)
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Error context for structured logging of workflow failures
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match error.kind() {
            ErrorKind::Validation => {
                tracing::warn!(error = %error, context = ?context, "Validation error");
            }
            ErrorKind::Credential => {
                tracing::warn!(error = %error, context = ?context, "Invalid credentials attempt");
            }
            ErrorKind::AccountState | ErrorKind::Token | ErrorKind::Session => {
                tracing::warn!(error = %error, context = ?context, "Authentication error");
            }
            ErrorKind::Infrastructure => {
                tracing::error!(error = %error, context = ?context, "Infrastructure error");
            }
        }
    }
}
