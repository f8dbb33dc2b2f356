/// Storage collaborators.
///
/// `SessionStore` persists refresh sessions; `PrincipalRepository` is the
/// slice of the user-management subsystem this crate consumes. Both are
/// injected into `AuthService` as trait objects. Every call takes the
/// caller's `RequestContext` and must give up once it is cancelled or
/// past its deadline.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::StoreError;
use crate::principal::{NewPrincipal, Principal};
use crate::session::Session;

pub use memory::{InMemoryPrincipalRepository, InMemorySessionStore};
pub use postgres::{PgPrincipalRepository, PgSessionStore};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. The refresh token hash must be unique.
    async fn create(&self, ctx: &RequestContext, session: &Session) -> Result<(), StoreError>;

    async fn find_by_refresh_token_hash(
        &self,
        ctx: &RequestContext,
        hash: &str,
    ) -> Result<Option<Session>, StoreError>;

    async fn find_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: Uuid,
    ) -> Result<Vec<Session>, StoreError>;

    /// Persist the mutable state of an existing session.
    ///
    /// Only `revoked` and `updated_at` are written, and `revoked` is never
    /// cleared once stored.
    async fn update(&self, ctx: &RequestContext, session: &Session) -> Result<(), StoreError>;

    /// Atomically revoke the session only if it is still unrevoked and
    /// unexpired. Returns `false` when another caller got there first or
    /// the session is no longer valid.
    async fn revoke_if_active(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, StoreError>;

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), StoreError>;

    /// Revoke every unrevoked session of `owner_id`, returning how many changed
    async fn revoke_all_for_owner(
        &self,
        ctx: &RequestContext,
        owner_id: Uuid,
    ) -> Result<u64, StoreError>;

    /// Hard-delete expired sessions, returning how many were removed
    async fn delete_expired(&self, ctx: &RequestContext) -> Result<u64, StoreError>;

    async fn count(&self, ctx: &RequestContext) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    async fn find_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<Option<Principal>, StoreError>;

    async fn find_by_id(&self, ctx: &RequestContext, id: Uuid)
        -> Result<Option<Principal>, StoreError>;

    async fn exists_by_email(&self, ctx: &RequestContext, email: &str) -> Result<bool, StoreError>;

    async fn create(
        &self,
        ctx: &RequestContext,
        principal: NewPrincipal,
    ) -> Result<Principal, StoreError>;

    async fn update(&self, ctx: &RequestContext, principal: &Principal) -> Result<(), StoreError>;

    /// Stamp a successful login. Writes `last_login_at` and `updated_at`
    /// only, leaving the rest of the row as currently stored.
    async fn record_login(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
