/// JWT Claims structure
///
/// Represents the payload of an access token: principal identity plus the
/// standard registered claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;
use crate::principal::PrincipalIdentity;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (principal ID as UUID string)
    pub sub: String,
    /// Principal email
    pub email: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims valid from `now` for `expiry_seconds`
    pub fn new(
        principal_id: Uuid,
        email: String,
        issuer: String,
        audience: String,
        now: i64,
        expiry_seconds: i64,
    ) -> Self {
        Self {
            sub: principal_id.to_string(),
            email,
            iss: issuer,
            aud: audience,
            iat: now,
            nbf: now,
            exp: now + expiry_seconds,
        }
    }

    /// Extract principal ID from claims
    ///
    /// # Errors
    /// Returns `TokenError::Invalid` if the subject is not a valid UUID
    pub fn principal_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid)
    }

    /// Expired once the current time reaches `exp`
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    /// Minimal identity projection for authorization checks
    pub fn identity(&self) -> Result<PrincipalIdentity, TokenError> {
        Ok(PrincipalIdentity {
            id: self.principal_id()?,
            email: self.email.clone(),
        })
    }
}
