//! Server dependencies for the match engine (using traits for testability)
//!
//! `ServerDeps` is the explicit dependency container handed to `MatchEngine`.
//! Production wiring uses the Postgres adapters below; tests swap in
//! `test_dependencies::InMemoryBackend`.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::common::{CatId, MatchRequestId, UserId};
use crate::domains::cats::Cat;
use crate::domains::matching::models::{Approval, InsertOutcome, MatchRequest, PairFacts};
use crate::domains::users::User;
use crate::kernel::{BaseCatDirectory, BaseMatchRequestStore, BaseUserDirectory};

// =============================================================================
// Postgres adapters
// =============================================================================

/// Cat directory backed by the `cats` table
pub struct PgCatDirectory(pub PgPool);

#[async_trait]
impl BaseCatDirectory for PgCatDirectory {
    async fn exists(&self, cat_id: CatId) -> Result<bool> {
        Cat::exists(cat_id, &self.0).await
    }

    async fn is_owned_by(&self, cat_id: CatId, owner_id: UserId) -> Result<bool> {
        Cat::is_owned_by(cat_id, owner_id, &self.0).await
    }

    async fn get(&self, cat_id: CatId) -> Result<Option<Cat>> {
        Cat::find_by_id(cat_id, &self.0).await
    }

    async fn find_by_owner(&self, owner_id: UserId) -> Result<Vec<Cat>> {
        Cat::find_by_owner(owner_id, &self.0).await
    }
}

/// User directory backed by the `users` table
pub struct PgUserDirectory(pub PgPool);

#[async_trait]
impl BaseUserDirectory for PgUserDirectory {
    async fn get(&self, user_id: UserId) -> Result<Option<User>> {
        User::find_by_id(user_id, &self.0).await
    }
}

/// Match request store backed by the `match_requests` table
pub struct PgMatchRequestStore(pub PgPool);

#[async_trait]
impl BaseMatchRequestStore for PgMatchRequestStore {
    async fn find_by_id(&self, id: MatchRequestId) -> Result<Option<MatchRequest>> {
        MatchRequest::find_by_id(id, &self.0).await
    }

    async fn find_for_cats(&self, cat_ids: &[CatId]) -> Result<Vec<MatchRequest>> {
        MatchRequest::find_for_cats(cat_ids, &self.0).await
    }

    async fn compare_cats(&self, a: CatId, b: CatId) -> Result<Option<PairFacts>> {
        MatchRequest::compare_cats(a, b, &self.0).await
    }

    async fn has_active_request(&self, a: CatId, b: CatId) -> Result<bool> {
        MatchRequest::has_active_for_pair(a, b, &self.0).await
    }

    async fn insert(&self, request: &MatchRequest) -> Result<InsertOutcome> {
        request.insert(&self.0).await
    }

    async fn reject(&self, id: MatchRequestId) -> Result<Option<MatchRequest>> {
        MatchRequest::reject(id, &self.0).await
    }

    async fn withdraw(&self, id: MatchRequestId) -> Result<Option<MatchRequest>> {
        MatchRequest::withdraw(id, &self.0).await
    }

    async fn approve(&self, id: MatchRequestId) -> Result<Option<Approval>> {
        MatchRequest::approve(id, &self.0).await
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

#[derive(Clone)]
pub struct ServerDeps {
    pub cats: Arc<dyn BaseCatDirectory>,
    pub users: Arc<dyn BaseUserDirectory>,
    pub matches: Arc<dyn BaseMatchRequestStore>,
}

impl ServerDeps {
    pub fn new(
        cats: Arc<dyn BaseCatDirectory>,
        users: Arc<dyn BaseUserDirectory>,
        matches: Arc<dyn BaseMatchRequestStore>,
    ) -> Self {
        Self {
            cats,
            users,
            matches,
        }
    }

    /// Wire every dependency to the same Postgres pool
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PgCatDirectory(pool.clone())),
            Arc::new(PgUserDirectory(pool.clone())),
            Arc::new(PgMatchRequestStore(pool)),
        )
    }
}
