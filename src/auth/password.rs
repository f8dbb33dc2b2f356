/// Password Hashing and Verification
///
/// Handles password hashing with bcrypt and password length validation.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, AuthError, ValidationError};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Salted, adaptively-costed password hasher
#[derive(Debug, Clone, Copy)]
pub struct CredentialVerifier {
    cost: u32,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl CredentialVerifier {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt
    ///
    /// # Errors
    /// Returns error if:
    /// - Password fails validation (empty, too short, too long)
    /// - Bcrypt hashing fails
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        validate_password(password)?;

        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    ///
    /// Wrong password and unreadable hash both yield
    /// `AuthError::InvalidCredentials`; callers cannot tell them apart.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), AuthError> {
        match verify(password, hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                tracing::debug!("Stored password hash could not be checked: {}", e);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// `hash` on the blocking thread pool
    pub async fn hash_blocking(&self, password: String) -> Result<String, AppError> {
        let verifier = *self;
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// `verify` on the blocking thread pool
    pub async fn verify_blocking(&self, password: String, hash: String) -> Result<(), AppError> {
        let verifier = *self;
        tokio::task::spawn_blocking(move || verifier.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
            .map_err(AppError::from)
    }
}

/// Validate password length requirements
///
/// Length is counted in characters, not bytes.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    // DoS prevention: bcrypt cost applies to every attempt
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        ));
    }

    Ok(())
}
