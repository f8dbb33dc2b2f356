/// PostgreSQL-backed stores
///
/// Schema lives in `migrations/`. `sessions.refresh_token_hash` carries a
/// unique index so lookups by hash are a single index probe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::StoreError;
use crate::principal::{NewPrincipal, Principal};
use crate::session::Session;
use crate::store::{PrincipalRepository, SessionStore};

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, ctx: &RequestContext, session: &Session) -> Result<(), StoreError> {
        ctx.run(async {
            sqlx::query(
                r#"
                INSERT INTO sessions
                    (id, owner_id, refresh_token_hash, expires_at, revoked,
                     device_info, origin_info, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(session.id())
            .bind(session.owner_id())
            .bind(session.refresh_token_hash())
            .bind(session.expires_at())
            .bind(session.is_revoked())
            .bind(session.device_info())
            .bind(session.origin_info())
            .bind(session.created_at())
            .bind(session.updated_at())
            .execute(&self.pool)
            .await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn find_by_refresh_token_hash(
        &self,
        ctx: &RequestContext,
        hash: &str,
    ) -> Result<Option<Session>, StoreError> {
        ctx.run(async {
            let session = sqlx::query_as::<_, Session>(
                r#"
                SELECT id, owner_id, refresh_token_hash, expires_at, revoked,
                       device_info, origin_info, created_at, updated_at
                FROM sessions
                WHERE refresh_token_hash = $1
                "#,
            )
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(session)
        })
        .await
    }

    async fn find_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: Uuid,
    ) -> Result<Vec<Session>, StoreError> {
        ctx.run(async {
            let sessions = sqlx::query_as::<_, Session>(
                r#"
                SELECT id, owner_id, refresh_token_hash, expires_at, revoked,
                       device_info, origin_info, created_at, updated_at
                FROM sessions
                WHERE owner_id = $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
            Ok::<_, StoreError>(sessions)
        })
        .await
    }

    async fn update(&self, ctx: &RequestContext, session: &Session) -> Result<(), StoreError> {
        ctx.run(async {
            let result = sqlx::query(
                r#"
                UPDATE sessions
                SET revoked = revoked OR $2, updated_at = $3
                WHERE id = $1
                "#,
            )
            .bind(session.id())
            .bind(session.is_revoked())
            .bind(session.updated_at())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("session {}", session.id())));
            }
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn revoke_if_active(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, StoreError> {
        ctx.run(async {
            let now = Utc::now();
            let result = sqlx::query(
                r#"
                UPDATE sessions
                SET revoked = true, updated_at = $2
                WHERE id = $1 AND revoked = false AND expires_at > $2
                "#,
            )
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
            Ok::<_, StoreError>(result.rows_affected() == 1)
        })
        .await
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), StoreError> {
        ctx.run(async {
            sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn revoke_all_for_owner(
        &self,
        ctx: &RequestContext,
        owner_id: Uuid,
    ) -> Result<u64, StoreError> {
        ctx.run(async {
            let result = sqlx::query(
                r#"
                UPDATE sessions
                SET revoked = true, updated_at = $1
                WHERE owner_id = $2 AND revoked = false
                "#,
            )
            .bind(Utc::now())
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
            Ok::<_, StoreError>(result.rows_affected())
        })
        .await
    }

    async fn delete_expired(&self, ctx: &RequestContext) -> Result<u64, StoreError> {
        ctx.run(async {
            let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
            Ok::<_, StoreError>(result.rows_affected())
        })
        .await
    }

    async fn count(&self, ctx: &RequestContext) -> Result<u64, StoreError> {
        ctx.run(async {
            let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
                .fetch_one(&self.pool)
                .await?;
            Ok::<_, StoreError>(count.max(0) as u64)
        })
        .await
    }
}

#[derive(Clone)]
pub struct PgPrincipalRepository {
    pool: PgPool,
}

impl PgPrincipalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalRepository for PgPrincipalRepository {
    async fn find_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<Option<Principal>, StoreError> {
        ctx.run(async {
            let principal = sqlx::query_as::<_, Principal>(
                r#"
                SELECT id, email, name, password_hash, is_active, last_login_at, created_at, updated_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(principal)
        })
        .await
    }

    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<Option<Principal>, StoreError> {
        ctx.run(async {
            let principal = sqlx::query_as::<_, Principal>(
                r#"
                SELECT id, email, name, password_hash, is_active, last_login_at, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(principal)
        })
        .await
    }

    async fn exists_by_email(&self, ctx: &RequestContext, email: &str) -> Result<bool, StoreError> {
        ctx.run(async {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
            )
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
            Ok::<_, StoreError>(exists)
        })
        .await
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        principal: NewPrincipal,
    ) -> Result<Principal, StoreError> {
        let principal = principal.into_principal();
        ctx.run(async {
            sqlx::query(
                r#"
                INSERT INTO users
                    (id, email, name, password_hash, is_active, last_login_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(principal.id)
            .bind(&principal.email)
            .bind(&principal.name)
            .bind(&principal.password_hash)
            .bind(principal.is_active)
            .bind(principal.last_login_at)
            .bind(principal.created_at)
            .bind(principal.updated_at)
            .execute(&self.pool)
            .await?;
            Ok::<_, StoreError>(())
        })
        .await?;

        Ok(principal)
    }

    async fn update(&self, ctx: &RequestContext, principal: &Principal) -> Result<(), StoreError> {
        ctx.run(async {
            let result = sqlx::query(
                r#"
                UPDATE users
                SET email = $2, name = $3, password_hash = $4, is_active = $5,
                    last_login_at = $6, updated_at = $7
                WHERE id = $1
                "#,
            )
            .bind(principal.id)
            .bind(&principal.email)
            .bind(&principal.name)
            .bind(&principal.password_hash)
            .bind(principal.is_active)
            .bind(principal.last_login_at)
            .bind(principal.updated_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("principal {}", principal.id)));
            }
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn record_login(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        ctx.run(async {
            let result = sqlx::query(
                "UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1",
            )
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("principal {}", id)));
            }
            Ok::<_, StoreError>(())
        })
        .await
    }
}
