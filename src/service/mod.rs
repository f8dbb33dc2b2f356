/// Authentication Service
///
/// Coordinates credential verification, token issuance and session storage
/// for the register / login / refresh / logout workflows.
///
/// Every workflow returns a result object. Expected outcomes (bad input,
/// wrong password, inactive account, unknown or spent refresh token) and
/// storage failures on the critical path both land in `errors`; callers
/// never need to catch anything.

mod models;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::{
    hash_refresh_token, CredentialVerifier, TokenIssuer, TokenPair, MAX_PASSWORD_LENGTH,
};
use crate::configuration::{AuthSettings, JwtSettings, Settings};
use crate::context::RequestContext;
use crate::error::{
    AppError, AuthError, ErrorContext, ErrorDetail, SessionError, StoreError, TokenError,
    ValidationError,
};
use crate::principal::{NewPrincipal, Principal, PrincipalIdentity};
use crate::session::{Session, SessionInfo};
use crate::store::{PrincipalRepository, SessionStore};
use crate::validators::{is_valid_email, is_valid_name, is_valid_refresh_token};

pub use models::{
    AuthResult, LoginRequest, LogoutRequest, LogoutResult, RefreshTokenRequest, RegisterRequest,
};

// Verified against when the email is unknown so both paths pay the bcrypt cost
const TIMING_EQUALIZER_PASSWORD: &str = "timing-equalizer-password";

pub struct AuthService {
    sessions: Arc<dyn SessionStore>,
    principals: Arc<dyn PrincipalRepository>,
    issuer: TokenIssuer,
    verifier: CredentialVerifier,
    store_timeout: Duration,
    equalizer_hash: String,
}

impl AuthService {
    /// Build the service from its collaborators
    ///
    /// # Errors
    /// Returns error if the settings are invalid or the timing-equalizer
    /// hash cannot be computed
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        principals: Arc<dyn PrincipalRepository>,
        jwt: JwtSettings,
        auth: &AuthSettings,
    ) -> Result<Self, AppError> {
        jwt.validate()?;
        auth.validate()?;

        let verifier = CredentialVerifier::new(auth.bcrypt_cost);
        let equalizer_hash = verifier.hash(TIMING_EQUALIZER_PASSWORD)?;

        Ok(Self {
            sessions,
            principals,
            issuer: TokenIssuer::new(jwt),
            verifier,
            store_timeout: auth.store_timeout(),
            equalizer_hash,
        })
    }

    pub fn from_settings(
        settings: &Settings,
        sessions: Arc<dyn SessionStore>,
        principals: Arc<dyn PrincipalRepository>,
    ) -> Result<Self, AppError> {
        Self::new(sessions, principals, settings.jwt.clone(), &settings.auth)
    }

    /// A context carrying the configured store timeout
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.store_timeout)
    }

    // ------------------------------------------------------------------------
    // Register
    // ------------------------------------------------------------------------

    /// Create a principal and open its first session
    ///
    /// A principal created before a later step fails is left in place.
    pub async fn register(&self, ctx: &RequestContext, request: RegisterRequest) -> AuthResult {
        let context = ErrorContext::new("register");

        let (email, name, password) = match validate_registration(&request) {
            Ok(input) => input,
            Err(errors) => return validation_failure(&context, errors),
        };

        match self
            .register_principal(ctx, email, name, password, request.device_info, request.origin_info)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                context.log_error(&e);
                e.into()
            }
        }
    }

    async fn register_principal(
        &self,
        ctx: &RequestContext,
        email: String,
        name: String,
        password: String,
        device_info: Option<String>,
        origin_info: Option<String>,
    ) -> Result<AuthResult, AppError> {
        if self.principals.exists_by_email(ctx, &email).await? {
            return Err(ValidationError::AlreadyExists("email".to_string()).into());
        }

        let password_hash = self.verifier.hash_blocking(password).await?;

        let principal = self
            .principals
            .create(
                ctx,
                NewPrincipal {
                    email,
                    name,
                    password_hash,
                },
            )
            .await
            .map_err(|e| match e {
                // lost a race with a concurrent registration
                StoreError::UniqueConstraintViolation(_) => {
                    AppError::from(ValidationError::AlreadyExists("email".to_string()))
                }
                other => other.into(),
            })?;

        let tokens = self
            .start_session(ctx, &principal, device_info, origin_info)
            .await
            .map_err(|e| {
                tracing::error!(
                    user_id = %principal.id,
                    "Principal created but no session could be opened"
                );
                e
            })?;

        tracing::info!(user_id = %principal.id, "Principal registered successfully");

        Ok(AuthResult::success(principal.summary(), tokens))
    }

    // ------------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------------

    /// Authenticate with email and password and open a new session
    ///
    /// Unknown email and wrong password produce the same error.
    pub async fn login(&self, ctx: &RequestContext, request: LoginRequest) -> AuthResult {
        let context = ErrorContext::new("login");

        let (email, password) = match validate_login(&request) {
            Ok(input) => input,
            Err(errors) => return validation_failure(&context, errors),
        };

        match self
            .authenticate(ctx, email, password, request.device_info, request.origin_info)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                context.log_error(&e);
                e.into()
            }
        }
    }

    async fn authenticate(
        &self,
        ctx: &RequestContext,
        email: String,
        password: String,
        device_info: Option<String>,
        origin_info: Option<String>,
    ) -> Result<AuthResult, AppError> {
        let mut principal = match self.principals.find_by_email(ctx, &email).await? {
            Some(principal) => principal,
            None => {
                // result is discarded; only the elapsed time matters
                let _ = self
                    .verifier
                    .verify_blocking(password, self.equalizer_hash.clone())
                    .await;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !principal.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        self.verifier
            .verify_blocking(password, principal.password_hash.clone())
            .await?;

        let now = Utc::now();
        principal.record_login(now);
        if let Err(e) = self.principals.record_login(ctx, principal.id, now).await {
            tracing::warn!(
                user_id = %principal.id,
                error = %e,
                "Failed to record last login time"
            );
        }

        let tokens = self
            .start_session(ctx, &principal, device_info, origin_info)
            .await?;

        tracing::info!(user_id = %principal.id, "Principal logged in successfully");

        Ok(AuthResult::success(principal.summary(), tokens))
    }

    // ------------------------------------------------------------------------
    // RefreshToken
    // ------------------------------------------------------------------------

    /// Exchange a refresh token for a new token pair
    ///
    /// The presented token's session is revoked with a conditional update
    /// before the new session is created, so a token can be redeemed at most
    /// once even when submitted concurrently.
    pub async fn refresh_token(
        &self,
        ctx: &RequestContext,
        request: RefreshTokenRequest,
    ) -> AuthResult {
        let context = ErrorContext::new("refresh_token");

        let token = match is_valid_refresh_token(request.refresh_token.as_deref().unwrap_or("")) {
            Ok(token) => token.to_string(),
            Err(e) => return validation_failure(&context, vec![e.into()]),
        };

        match self
            .rotate(ctx, &token, request.device_info, request.origin_info)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                context.log_error(&e);
                e.into()
            }
        }
    }

    async fn rotate(
        &self,
        ctx: &RequestContext,
        token: &str,
        device_info: Option<String>,
        origin_info: Option<String>,
    ) -> Result<AuthResult, AppError> {
        let token_hash = hash_refresh_token(token);

        let session = match self
            .sessions
            .find_by_refresh_token_hash(ctx, &token_hash)
            .await?
        {
            Some(session) => session,
            None => {
                tracing::warn!("Refresh token not found");
                return Err(SessionError::InvalidRefreshToken.into());
            }
        };

        if session.is_revoked() {
            tracing::warn!(
                user_id = %session.owner_id(),
                session_id = %session.id(),
                "Attempt to use revoked refresh token"
            );
            return Err(SessionError::InvalidRefreshToken.into());
        }
        if session.is_expired() {
            tracing::info!(
                user_id = %session.owner_id(),
                session_id = %session.id(),
                "Refresh token expired"
            );
            return Err(SessionError::InvalidRefreshToken.into());
        }

        let principal = self
            .principals
            .find_by_id(ctx, session.owner_id())
            .await?
            .ok_or(SessionError::InvalidRefreshToken)?;

        if !principal.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        if !self.sessions.revoke_if_active(ctx, session.id()).await? {
            tracing::warn!(
                user_id = %principal.id,
                session_id = %session.id(),
                "Refresh token already redeemed by a concurrent request"
            );
            return Err(SessionError::InvalidRefreshToken.into());
        }

        // new session keeps the old descriptors unless the caller sends fresh ones
        let device_info = device_info.or_else(|| session.device_info().map(str::to_string));
        let origin_info = origin_info.or_else(|| session.origin_info().map(str::to_string));

        let tokens = self
            .start_session(ctx, &principal, device_info, origin_info)
            .await?;

        tracing::info!(
            user_id = %principal.id,
            previous_session_id = %session.id(),
            "Token refreshed successfully"
        );

        Ok(AuthResult::success(principal.summary(), tokens))
    }

    // ------------------------------------------------------------------------
    // Logout
    // ------------------------------------------------------------------------

    /// Revoke the session behind a refresh token
    ///
    /// Unknown and already-revoked tokens succeed without touching the store.
    pub async fn logout(&self, ctx: &RequestContext, request: LogoutRequest) -> LogoutResult {
        let context = ErrorContext::new("logout");

        let token = match is_valid_refresh_token(request.refresh_token.as_deref().unwrap_or("")) {
            Ok(token) => token.to_string(),
            Err(e) => {
                let e = AppError::from(e);
                context.log_error(&e);
                return e.into();
            }
        };

        match self.end_session(ctx, &token).await {
            Ok(revoked) => LogoutResult::success(revoked),
            Err(e) => {
                context.log_error(&e);
                e.into()
            }
        }
    }

    async fn end_session(&self, ctx: &RequestContext, token: &str) -> Result<u64, AppError> {
        let token_hash = hash_refresh_token(token);

        let mut session = match self
            .sessions
            .find_by_refresh_token_hash(ctx, &token_hash)
            .await?
        {
            Some(session) => session,
            None => {
                tracing::debug!("Logout for unknown refresh token");
                return Ok(0);
            }
        };

        if session.is_revoked() {
            return Ok(0);
        }

        session.revoke();
        self.sessions.update(ctx, &session).await?;

        tracing::info!(
            user_id = %session.owner_id(),
            session_id = %session.id(),
            "Session revoked"
        );
        Ok(1)
    }

    /// Revoke every session of a principal (logout on all devices)
    pub async fn logout_all(&self, ctx: &RequestContext, owner_id: Uuid) -> LogoutResult {
        let context = ErrorContext::new("logout_all").with_user_id(owner_id.to_string());

        match self.sessions.revoke_all_for_owner(ctx, owner_id).await {
            Ok(revoked) => {
                tracing::info!(user_id = %owner_id, revoked, "All sessions revoked for principal");
                LogoutResult::success(revoked)
            }
            Err(e) => {
                let e = AppError::from(e);
                context.log_error(&e);
                e.into()
            }
        }
    }

    /// Currently valid sessions of a principal, newest first
    pub async fn list_sessions(
        &self,
        ctx: &RequestContext,
        owner_id: Uuid,
    ) -> Result<Vec<SessionInfo>, AppError> {
        let now = Utc::now();
        let sessions = self.sessions.find_by_owner(ctx, owner_id).await?;

        Ok(sessions
            .iter()
            .filter(|s| s.is_valid_at(now))
            .map(SessionInfo::from)
            .collect())
    }

    // ------------------------------------------------------------------------
    // ValidateAccessToken
    // ------------------------------------------------------------------------

    /// Decode an access token into the identity it was issued for
    pub fn validate_access_token(&self, token: &str) -> Result<PrincipalIdentity, TokenError> {
        self.issuer.validate_access_token(token)?.identity()
    }

    // ------------------------------------------------------------------------
    // Shared steps
    // ------------------------------------------------------------------------

    /// Issue a token pair and persist a session for its refresh half
    async fn start_session(
        &self,
        ctx: &RequestContext,
        principal: &Principal,
        device_info: Option<String>,
        origin_info: Option<String>,
    ) -> Result<TokenPair, AppError> {
        let tokens = self.issuer.issue_token_pair(principal.id, &principal.email)?;

        let session = Session::create(
            principal.id,
            hash_refresh_token(&tokens.refresh_token),
            Utc::now() + self.issuer.refresh_token_ttl(),
            device_info,
            origin_info,
        )?;
        self.sessions.create(ctx, &session).await?;

        tracing::debug!(
            user_id = %principal.id,
            session_id = %session.id(),
            "Session created"
        );

        Ok(tokens)
    }
}

fn validation_failure(context: &ErrorContext, errors: Vec<AppError>) -> AuthResult {
    for e in &errors {
        context.log_error(e);
    }
    AuthResult::failure(errors.iter().map(ErrorDetail::from).collect())
}

/// Check every registration field, reporting all problems at once
fn validate_registration(
    request: &RegisterRequest,
) -> Result<(String, String, String), Vec<AppError>> {
    let email = is_valid_email(request.email.as_deref().unwrap_or(""));
    let name = is_valid_name(request.name.as_deref().unwrap_or(""));
    let password = request.password.as_deref().unwrap_or("");
    let password_check = crate::auth::validate_password(password);

    match (email, name, password_check) {
        (Ok(email), Ok(name), Ok(())) => Ok((email, name, password.to_string())),
        (email, name, password_check) => Err([email.err(), name.err(), password_check.err()]
            .into_iter()
            .flatten()
            .map(AppError::from)
            .collect()),
    }
}

/// Login only checks presence and the upper length bound of the password;
/// the length policy for new passwords is not reapplied to existing ones.
fn validate_login(request: &LoginRequest) -> Result<(String, String), Vec<AppError>> {
    let email = is_valid_email(request.email.as_deref().unwrap_or(""));
    let password = request.password.as_deref().unwrap_or("");
    let password_check = if password.is_empty() {
        Err(ValidationError::EmptyField("password".to_string()))
    } else if password.chars().count() > MAX_PASSWORD_LENGTH {
        Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH))
    } else {
        Ok(())
    };

    match (email, password_check) {
        (Ok(email), Ok(())) => Ok((email, password.to_string())),
        (email, password_check) => Err([email.err(), password_check.err()]
            .into_iter()
            .flatten()
            .map(AppError::from)
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_reports_every_invalid_field() {
        let request = RegisterRequest {
            email: Some("not-an-email".to_string()),
            name: None,
            password: Some("short".to_string()),
            ..Default::default()
        };

        let errors = validate_registration(&request).unwrap_err();
        let fields: Vec<_> = errors
            .iter()
            .map(|e| ErrorDetail::from(e).field.unwrap_or_default())
            .collect();

        assert_eq!(fields, vec!["email", "name", "password"]);
    }

    #[test]
    fn test_registration_normalizes_input() {
        let request = RegisterRequest {
            email: Some(" A@B.com ".to_string()),
            name: Some(" A Name ".to_string()),
            password: Some("longenoughpassword".to_string()),
            ..Default::default()
        };

        let (email, name, password) = validate_registration(&request).unwrap();
        assert_eq!(email, "a@b.com");
        assert_eq!(name, "A Name");
        assert_eq!(password, "longenoughpassword");
    }

    #[test]
    fn test_login_requires_password() {
        let request = LoginRequest {
            email: Some("a@b.com".to_string()),
            ..Default::default()
        };

        let errors = validate_login(&request).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            AppError::Validation(ValidationError::EmptyField(_))
        ));
    }

    #[test]
    fn test_login_does_not_reapply_minimum_length() {
        let request = LoginRequest {
            email: Some("a@b.com".to_string()),
            password: Some("short".to_string()),
            ..Default::default()
        };

        assert!(validate_login(&request).is_ok());
    }
}
