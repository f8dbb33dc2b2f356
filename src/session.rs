/// Refresh session record.
///
/// One session per refresh-token grant. A session is Active until it is
/// revoked (explicit, terminal) or its expiry passes (implicit, terminal).
/// Validity is always computed, never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Session {
    id: Uuid,
    owner_id: Uuid,
    refresh_token_hash: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
    device_info: Option<String>,
    origin_info: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new active session
    ///
    /// # Errors
    /// `SessionError::ExpiryNotInFuture` unless `expires_at` is strictly after now
    pub fn create(
        owner_id: Uuid,
        refresh_token_hash: String,
        expires_at: DateTime<Utc>,
        device_info: Option<String>,
        origin_info: Option<String>,
    ) -> Result<Self, SessionError> {
        let now = Utc::now();
        if expires_at <= now {
            return Err(SessionError::ExpiryNotInFuture);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            owner_id,
            refresh_token_hash,
            expires_at,
            revoked: false,
            device_info,
            origin_info,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn refresh_token_hash(&self) -> &str {
        &self.refresh_token_hash
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn device_info(&self) -> Option<&str> {
        self.device_info.as_deref()
    }

    pub fn origin_info(&self) -> Option<&str> {
        self.origin_info.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Mark the session revoked. Revoking twice is a no-op.
    pub fn revoke(&mut self) {
        if self.revoked {
            return;
        }
        self.revoked = true;
        self.updated_at = Utc::now();
    }
}

/// Session view safe to hand to callers (no token hash)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: Uuid,
    pub device_info: Option<String>,
    pub origin_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            device_info: s.device_info.clone(),
            origin_info: s.origin_info.clone(),
            created_at: s.created_at,
            expires_at: s.expires_at,
        }
    }
}
