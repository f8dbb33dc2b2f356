/// Principal records owned by the user-management subsystem.
///
/// This crate reads principals, creates them on registration and records
/// the last login time; everything else about them is managed elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for principal creation
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

impl NewPrincipal {
    pub fn into_principal(self) -> Principal {
        let now = Utc::now();
        Principal {
            id: Uuid::new_v4(),
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Principal {
    pub fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login_at = Some(at);
        self.updated_at = at;
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary::from(self)
    }
}

/// Principal fields returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for PrincipalSummary {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            email: p.email.clone(),
            name: p.name.clone(),
            is_active: p.is_active,
            created_at: p.created_at,
        }
    }
}

/// Identity decoded from a valid access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalIdentity {
    pub id: Uuid,
    pub email: String,
}
