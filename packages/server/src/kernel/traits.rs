// Trait definitions for dependency injection
//
// These are the seams between the match lifecycle engine and the stores it
// consults. Business rules live in domains/matching, never behind these traits.
//
// Naming convention: Base* for trait names (e.g., BaseCatDirectory)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{CatId, MatchRequestId, UserId};
use crate::domains::cats::Cat;
use crate::domains::matching::models::{Approval, InsertOutcome, MatchRequest, PairFacts};
use crate::domains::users::User;

// =============================================================================
// Cat Directory (authoritative cat records)
// =============================================================================

#[async_trait]
pub trait BaseCatDirectory: Send + Sync {
    async fn exists(&self, cat_id: CatId) -> Result<bool>;

    async fn is_owned_by(&self, cat_id: CatId, owner_id: UserId) -> Result<bool>;

    async fn get(&self, cat_id: CatId) -> Result<Option<Cat>>;

    async fn find_by_owner(&self, owner_id: UserId) -> Result<Vec<Cat>>;
}

// =============================================================================
// User Directory (display identity)
// =============================================================================

#[async_trait]
pub trait BaseUserDirectory: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<Option<User>>;
}

// =============================================================================
// Match Request Store
// =============================================================================

#[async_trait]
pub trait BaseMatchRequestStore: Send + Sync {
    async fn find_by_id(&self, id: MatchRequestId) -> Result<Option<MatchRequest>>;

    /// Every non-withdrawn request touching any of `cat_ids`, oldest first
    async fn find_for_cats(&self, cat_ids: &[CatId]) -> Result<Vec<MatchRequest>>;

    /// Sex/matched/owner comparison of two cats; `None` if either is missing
    async fn compare_cats(&self, a: CatId, b: CatId) -> Result<Option<PairFacts>>;

    /// Whether an active request exists for the unordered pair
    async fn has_active_request(&self, a: CatId, b: CatId) -> Result<bool>;

    /// Persist a new request unless the pair already has an active request or
    /// either cat has matched in the meantime
    async fn insert(&self, request: &MatchRequest) -> Result<InsertOutcome>;

    /// Compare-and-set `pending -> rejected`; `None` if the request was not active
    async fn reject(&self, id: MatchRequestId) -> Result<Option<MatchRequest>>;

    /// Compare-and-set withdrawal; `None` if the request was not active
    async fn withdraw(&self, id: MatchRequestId) -> Result<Option<MatchRequest>>;

    /// Atomic approval: request approved, both cats matched, competitors rejected.
    /// `None` (and no writes) if the request was not active. `None` as well if
    /// either cat already has a partner; the request is then rejected.
    async fn approve(&self, id: MatchRequestId) -> Result<Option<Approval>>;
}
