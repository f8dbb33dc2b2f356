/// In-memory stores
///
/// Process-local implementations of the storage traits. Each operation takes
/// a single write lock, so every create/update (including the conditional
/// revoke) is atomic per call, matching what the PostgreSQL stores guarantee.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::StoreError;
use crate::principal::{NewPrincipal, Principal};
use crate::session::Session;
use crate::store::{PrincipalRepository, SessionStore};

#[derive(Default)]
struct SessionTable {
    by_id: HashMap<Uuid, Session>,
    // refresh_token_hash -> id
    by_hash: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    table: RwLock<SessionTable>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, ctx: &RequestContext, session: &Session) -> Result<(), StoreError> {
        ctx.run(async {
            let mut table = self.table.write().await;
            if table.by_id.contains_key(&session.id()) {
                return Err(StoreError::UniqueConstraintViolation(format!(
                    "session {} already exists",
                    session.id()
                )));
            }
            if table.by_hash.contains_key(session.refresh_token_hash()) {
                return Err(StoreError::UniqueConstraintViolation(
                    "refresh token hash already exists".to_string(),
                ));
            }
            table
                .by_hash
                .insert(session.refresh_token_hash().to_string(), session.id());
            table.by_id.insert(session.id(), session.clone());
            Ok(())
        })
        .await
    }

    async fn find_by_refresh_token_hash(
        &self,
        ctx: &RequestContext,
        hash: &str,
    ) -> Result<Option<Session>, StoreError> {
        ctx.run(async {
            let table = self.table.read().await;
            Ok(table
                .by_hash
                .get(hash)
                .and_then(|id| table.by_id.get(id))
                .cloned())
        })
        .await
    }

    async fn find_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: Uuid,
    ) -> Result<Vec<Session>, StoreError> {
        ctx.run(async {
            let table = self.table.read().await;
            let mut sessions: Vec<Session> = table
                .by_id
                .values()
                .filter(|s| s.owner_id() == owner_id)
                .cloned()
                .collect();
            sessions.sort_by_key(|s| std::cmp::Reverse(s.created_at()));
            Ok(sessions)
        })
        .await
    }

    async fn update(&self, ctx: &RequestContext, session: &Session) -> Result<(), StoreError> {
        ctx.run(async {
            let mut table = self.table.write().await;
            let stored = table
                .by_id
                .get_mut(&session.id())
                .ok_or_else(|| StoreError::NotFound(format!("session {}", session.id())))?;

            // revoked is monotonic; nothing else is mutable
            if session.is_revoked() && !stored.is_revoked() {
                *stored = session.clone();
            }
            Ok(())
        })
        .await
    }

    async fn revoke_if_active(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, StoreError> {
        ctx.run(async {
            let mut table = self.table.write().await;
            match table.by_id.get_mut(&id) {
                Some(session) if session.is_valid_at(Utc::now()) => {
                    session.revoke();
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
        .await
    }

    async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), StoreError> {
        ctx.run(async {
            let mut table = self.table.write().await;
            if let Some(session) = table.by_id.remove(&id) {
                table.by_hash.remove(session.refresh_token_hash());
            }
            Ok(())
        })
        .await
    }

    async fn revoke_all_for_owner(
        &self,
        ctx: &RequestContext,
        owner_id: Uuid,
    ) -> Result<u64, StoreError> {
        ctx.run(async {
            let mut table = self.table.write().await;
            let mut revoked = 0;
            for session in table.by_id.values_mut() {
                if session.owner_id() == owner_id && !session.is_revoked() {
                    session.revoke();
                    revoked += 1;
                }
            }
            Ok(revoked)
        })
        .await
    }

    async fn delete_expired(&self, ctx: &RequestContext) -> Result<u64, StoreError> {
        ctx.run(async {
            let mut table = self.table.write().await;
            let now = Utc::now();
            let expired: Vec<Session> = table
                .by_id
                .values()
                .filter(|s| s.is_expired_at(now))
                .cloned()
                .collect();

            for session in &expired {
                table.by_id.remove(&session.id());
                table.by_hash.remove(session.refresh_token_hash());
            }
            Ok(expired.len() as u64)
        })
        .await
    }

    async fn count(&self, ctx: &RequestContext) -> Result<u64, StoreError> {
        ctx.run(async { Ok(self.table.read().await.by_id.len() as u64) })
            .await
    }
}

#[derive(Default)]
pub struct InMemoryPrincipalRepository {
    principals: RwLock<HashMap<Uuid, Principal>>,
}

impl InMemoryPrincipalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalRepository for InMemoryPrincipalRepository {
    async fn find_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<Option<Principal>, StoreError> {
        ctx.run(async {
            let principals = self.principals.read().await;
            Ok(principals.values().find(|p| p.email == email).cloned())
        })
        .await
    }

    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<Option<Principal>, StoreError> {
        ctx.run(async { Ok(self.principals.read().await.get(&id).cloned()) })
            .await
    }

    async fn exists_by_email(&self, ctx: &RequestContext, email: &str) -> Result<bool, StoreError> {
        ctx.run(async {
            let principals = self.principals.read().await;
            Ok(principals.values().any(|p| p.email == email))
        })
        .await
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        principal: NewPrincipal,
    ) -> Result<Principal, StoreError> {
        ctx.run(async {
            let mut principals = self.principals.write().await;
            if principals.values().any(|p| p.email == principal.email) {
                return Err(StoreError::UniqueConstraintViolation(
                    "Email already registered".to_string(),
                ));
            }
            let principal = principal.into_principal();
            principals.insert(principal.id, principal.clone());
            Ok(principal)
        })
        .await
    }

    async fn update(&self, ctx: &RequestContext, principal: &Principal) -> Result<(), StoreError> {
        ctx.run(async {
            let mut principals = self.principals.write().await;
            match principals.get_mut(&principal.id) {
                Some(stored) => {
                    *stored = principal.clone();
                    Ok(())
                }
                None => Err(StoreError::NotFound(format!("principal {}", principal.id))),
            }
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
            let mut principals = self.principals.write().await;
            match principals.get_mut(&id) {
                Some(stored) => {
                    stored.record_login(at);
                    Ok(())
                }
                None => Err(StoreError::NotFound(format!("principal {}", id))),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(owner_id: Uuid, hash: &str, ttl: Duration) -> Session {
        Session::create(owner_id, hash.to_string(), Utc::now() + ttl, None, None).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_by_hash() {
        let store = InMemorySessionStore::new();
        let ctx = RequestContext::new();
        let session = session(Uuid::new_v4(), "hash-1", Duration::days(1));

        store.create(&ctx, &session).await.unwrap();

        let found = store.find_by_refresh_token_hash(&ctx, "hash-1").await.unwrap();
        assert_eq!(found, Some(session));
        assert!(store
            .find_by_refresh_token_hash(&ctx, "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_hash_rejected() {
        let store = InMemorySessionStore::new();
        let ctx = RequestContext::new();
        let owner = Uuid::new_v4();

        store
            .create(&ctx, &session(owner, "dup", Duration::days(1)))
            .await
            .unwrap();
        let result = store
            .create(&ctx, &session(owner, "dup", Duration::days(1)))
            .await;

        assert!(matches!(result, Err(StoreError::UniqueConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_update_never_unrevokes() {
        let store = InMemorySessionStore::new();
        let ctx = RequestContext::new();
        let original = session(Uuid::new_v4(), "h", Duration::days(1));
        store.create(&ctx, &original).await.unwrap();

        let mut revoked = original.clone();
        revoked.revoke();
        store.update(&ctx, &revoked).await.unwrap();

        // stale copy still says revoked = false
        store.update(&ctx, &original).await.unwrap();

        let stored = store.find_by_refresh_token_hash(&ctx, "h").await.unwrap().unwrap();
        assert!(stored.is_revoked());
    }

    #[tokio::test]
    async fn test_update_missing_session() {
        let store = InMemorySessionStore::new();
        let ctx = RequestContext::new();
        let result = store
            .update(&ctx, &session(Uuid::new_v4(), "h", Duration::days(1)))
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_revoke_if_active_succeeds_once() {
        let store = InMemorySessionStore::new();
        let ctx = RequestContext::new();
        let session = session(Uuid::new_v4(), "h", Duration::days(1));
        store.create(&ctx, &session).await.unwrap();

        assert!(store.revoke_if_active(&ctx, session.id()).await.unwrap());
        assert!(!store.revoke_if_active(&ctx, session.id()).await.unwrap());
        assert!(!store.revoke_if_active(&ctx, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_all_and_find_by_owner() {
        let store = InMemorySessionStore::new();
        let ctx = RequestContext::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        store.create(&ctx, &session(owner, "a", Duration::days(1))).await.unwrap();
        store.create(&ctx, &session(owner, "b", Duration::days(1))).await.unwrap();
        store.create(&ctx, &session(other, "c", Duration::days(1))).await.unwrap();

        assert_eq!(store.find_by_owner(&ctx, owner).await.unwrap().len(), 2);
        assert_eq!(store.revoke_all_for_owner(&ctx, owner).await.unwrap(), 2);
        assert_eq!(store.revoke_all_for_owner(&ctx, owner).await.unwrap(), 0);

        let others = store.find_by_owner(&ctx, other).await.unwrap();
        assert!(others.iter().all(|s| !s.is_revoked()));
    }

    #[tokio::test]
    async fn test_delete_and_delete_expired() {
        let store = InMemorySessionStore::new();
        let ctx = RequestContext::new();
        let owner = Uuid::new_v4();
        let keep = session(owner, "keep", Duration::days(1));
        let short = session(owner, "short", Duration::milliseconds(20));
        let gone = session(owner, "gone", Duration::days(1));

        store.create(&ctx, &keep).await.unwrap();
        store.create(&ctx, &short).await.unwrap();
        store.create(&ctx, &gone).await.unwrap();
        assert_eq!(store.count(&ctx).await.unwrap(), 3);

        store.delete(&ctx, gone.id()).await.unwrap();
        assert!(store.find_by_refresh_token_hash(&ctx, "gone").await.unwrap().is_none());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.delete_expired(&ctx).await.unwrap(), 1);
        assert_eq!(store.count(&ctx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_is_honored() {
        let store = InMemorySessionStore::new();
        let ctx = RequestContext::new();
        ctx.cancel();

        let result = store
            .create(&ctx, &session(Uuid::new_v4(), "h", Duration::days(1)))
            .await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
        assert_eq!(store.count(&RequestContext::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_principal_repository() {
        let repo = InMemoryPrincipalRepository::new();
        let ctx = RequestContext::new();
        let new_principal = NewPrincipal {
            email: "a@b.com".to_string(),
            name: "A Name".to_string(),
            password_hash: "hash".to_string(),
        };

        let mut principal = repo.create(&ctx, new_principal.clone()).await.unwrap();
        assert!(repo.exists_by_email(&ctx, "a@b.com").await.unwrap());
        assert!(matches!(
            repo.create(&ctx, new_principal).await,
            Err(StoreError::UniqueConstraintViolation(_))
        ));

        principal.is_active = false;
        repo.update(&ctx, &principal).await.unwrap();

        let stored = repo.find_by_id(&ctx, principal.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(
            repo.find_by_email(&ctx, "a@b.com").await.unwrap().map(|p| p.id),
            Some(principal.id)
        );
    }

    #[tokio::test]
    async fn test_record_login_touches_only_login_fields() {
        let repo = InMemoryPrincipalRepository::new();
        let ctx = RequestContext::new();
        let mut principal = repo
            .create(
                &ctx,
                NewPrincipal {
                    email: "a@b.com".to_string(),
                    name: "A Name".to_string(),
                    password_hash: "hash".to_string(),
                },
            )
            .await
            .unwrap();
        let stale = principal.clone();

        principal.is_active = false;
        principal.password_hash = "reset".to_string();
        repo.update(&ctx, &principal).await.unwrap();

        let at = Utc::now();
        repo.record_login(&ctx, stale.id, at).await.unwrap();

        let stored = repo.find_by_id(&ctx, stale.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.password_hash, "reset");
        assert_eq!(stored.last_login_at, Some(at));
        assert!(matches!(
            repo.record_login(&ctx, Uuid::new_v4(), at).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
