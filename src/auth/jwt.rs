/// JWT Token Issuance and Validation
///
/// Mints access/refresh token pairs and validates access tokens.
/// Access tokens are HS256-signed JWTs; the algorithm is fixed and any token
/// whose header names another algorithm is rejected.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::refresh_token::generate_refresh_token;
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Freshly minted credentials. Never persisted as a unit.
#[derive(Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token, not the refresh token
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    config: JwtSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: JwtSettings) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "sub", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.config.access_token_expiry)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.config.refresh_token_expiry)
    }

    /// Mint an access token and an independent opaque refresh token
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue_token_pair(&self, principal_id: Uuid, email: &str) -> Result<TokenPair, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims::new(
            principal_id,
            email.to_string(),
            self.config.issuer.clone(),
            self.config.audience.clone(),
            now,
            self.config.access_token_expiry,
        );

        let access_token = self.sign(&claims)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AppError::Internal("Access token expiry out of range".to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token: generate_refresh_token(),
            expires_at,
        })
    }

    /// Sign arbitrary claims with the configured key and algorithm
    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Validate and extract claims from an access token
    ///
    /// # Errors
    /// - `TokenError::Expired` once the current time reaches `exp`
    /// - `TokenError::Invalid` for anything malformed, unsigned, tampered
    ///   with, signed with another algorithm, or issued for another
    ///   issuer/audience
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::warn!("JWT validation error: {}", e);
                    TokenError::Invalid
                }
            })?;

        // the library accepts exp == now; expiry here is strict
        if claims.is_expired_at(Utc::now().timestamp()) {
            return Err(TokenError::Expired);
        }

        claims.principal_id()?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
            audience: "test-clients".to_string(),
        }
    }

    fn claims_with_expiry(issuer: &TokenIssuer, principal_id: Uuid, offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        let mut claims = Claims::new(
            principal_id,
            "test@example.com".to_string(),
            issuer.config.issuer.clone(),
            issuer.config.audience.clone(),
            now - 1000,
            1000,
        );
        claims.exp = now + offset;
        claims
    }

    #[test]
    fn test_issue_and_validate_token() {
        let issuer = TokenIssuer::new(get_test_config());
        let principal_id = Uuid::new_v4();

        let pair = issuer
            .issue_token_pair(principal_id, "test@example.com")
            .expect("Failed to issue tokens");
        let claims = issuer
            .validate_access_token(&pair.access_token)
            .expect("Failed to validate token");

        assert_eq!(claims.sub, principal_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.aud, "test-clients");
        assert_eq!(claims.exp, pair.expires_at.timestamp());
    }

    #[test]
    fn test_expires_at_mirrors_access_ttl() {
        let issuer = TokenIssuer::new(get_test_config());
        let before = Utc::now();
        let pair = issuer.issue_token_pair(Uuid::new_v4(), "test@example.com").unwrap();

        let delta = pair.expires_at - before;
        assert!(delta <= chrono::Duration::seconds(901));
        assert!(delta >= chrono::Duration::seconds(898));
    }

    #[test]
    fn test_refresh_token_independent_of_access_token() {
        let issuer = TokenIssuer::new(get_test_config());
        let pair = issuer.issue_token_pair(Uuid::new_v4(), "test@example.com").unwrap();

        assert_eq!(pair.refresh_token.len(), 64);
        assert!(!pair.access_token.contains(&pair.refresh_token));
        assert!(issuer.validate_access_token(&pair.refresh_token).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let issuer = TokenIssuer::new(get_test_config());
        assert_eq!(
            issuer.validate_access_token("invalid.token.here"),
            Err(TokenError::Invalid)
        );
        assert_eq!(issuer.validate_access_token(""), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_token() {
        let issuer = TokenIssuer::new(get_test_config());
        let pair = issuer.issue_token_pair(Uuid::new_v4(), "test@example.com").unwrap();

        let tampered = format!("{}X", pair.access_token);
        assert_eq!(issuer.validate_access_token(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let issuer = TokenIssuer::new(get_test_config());
        // {"alg":"none","typ":"JWT"} . {"sub":"1"} . <empty signature>
        let unsigned = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJzdWIiOiIxIn0.";
        assert_eq!(issuer.validate_access_token(unsigned), Err(TokenError::Invalid));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(config.clone());
        let claims = claims_with_expiry(&issuer, Uuid::new_v4(), 600);

        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(issuer.validate_access_token(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenIssuer::new(get_test_config());
        let mut other_config = get_test_config();
        other_config.secret = "another-secret-key-at-least-32-characters".to_string();
        let other = TokenIssuer::new(other_config);

        let pair = other.issue_token_pair(Uuid::new_v4(), "test@example.com").unwrap();
        assert_eq!(issuer.validate_access_token(&pair.access_token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_token() {
        let issuer = TokenIssuer::new(get_test_config());
        let claims = claims_with_expiry(&issuer, Uuid::new_v4(), -10);
        let token = issuer.sign(&claims).unwrap();

        assert_eq!(issuer.validate_access_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_expiring_now_is_expired() {
        let issuer = TokenIssuer::new(get_test_config());
        let claims = claims_with_expiry(&issuer, Uuid::new_v4(), 0);
        let token = issuer.sign(&claims).unwrap();

        assert_eq!(issuer.validate_access_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_issuer() {
        let issuer = TokenIssuer::new(get_test_config());
        let pair = issuer.issue_token_pair(Uuid::new_v4(), "test@example.com").unwrap();

        let mut config = get_test_config();
        config.issuer = "wrong-issuer".to_string();
        let other = TokenIssuer::new(config);

        assert_eq!(other.validate_access_token(&pair.access_token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_wrong_audience() {
        let issuer = TokenIssuer::new(get_test_config());
        let pair = issuer.issue_token_pair(Uuid::new_v4(), "test@example.com").unwrap();

        let mut config = get_test_config();
        config.audience = "someone-else".to_string();
        let other = TokenIssuer::new(config);

        assert_eq!(other.validate_access_token(&pair.access_token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let issuer = TokenIssuer::new(get_test_config());
        let mut claims = claims_with_expiry(&issuer, Uuid::new_v4(), 600);
        claims.sub = "not-a-uuid".to_string();
        let token = issuer.sign(&claims).unwrap();

        assert_eq!(issuer.validate_access_token(&token), Err(TokenError::Invalid));
    }
}
