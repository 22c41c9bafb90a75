use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{CatId, MatchRequestId, UserId};
use crate::domains::cats::Cat;

/// Match request status
///
/// `Pending` is the only non-terminal state. Withdrawal is tracked separately
/// (`is_withdrawn`) and never changes the status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Approved,
    Rejected,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MatchStatus::Pending)
    }
}

/// MatchRequest - a proposal from the owner of `user_cat_id` to pair it with
/// `match_cat_id`.
///
/// The two cat columns are stored asymmetrically (who proposed to whom) but
/// compared as an unordered pair for duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchRequest {
    pub id: MatchRequestId,
    pub match_cat_id: CatId,
    pub user_cat_id: CatId,
    pub message: String,
    pub status: MatchStatus,
    pub issued_by: UserId,
    pub is_withdrawn: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Relational facts about a pair of cats, computed without loading either row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct PairFacts {
    pub same_sex: bool,
    pub any_matched: bool,
    pub same_owner: bool,
}

/// What happened to an insert attempted by `propose`.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Created(MatchRequest),
    /// An active request for the same unordered pair already exists
    Duplicate,
    /// One of the cats was matched after the eligibility checks ran
    CatAlreadyMatched,
}

/// Result of a committed approval.
#[derive(Debug, Clone)]
pub struct Approval {
    pub request: MatchRequest,
    /// Competing requests that were pending on either cat and are now rejected
    pub invalidated: Vec<MatchRequestId>,
}

impl MatchRequest {
    /// Build a fresh pending request. Nothing is persisted.
    pub fn new(issued_by: UserId, match_cat_id: CatId, user_cat_id: CatId, message: String) -> Self {
        let now = Utc::now();
        Self {
            id: MatchRequestId::new(),
            match_cat_id,
            user_cat_id,
            message,
            status: MatchStatus::Pending,
            issued_by,
            is_withdrawn: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Pending and not withdrawn.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal() && !self.is_withdrawn
    }

    pub fn involves(&self, cat_id: CatId) -> bool {
        self.match_cat_id == cat_id || self.user_cat_id == cat_id
    }

    /// Order-independent key for the cat pair.
    pub fn pair_key(&self) -> (CatId, CatId) {
        pair_key(self.match_cat_id, self.user_cat_id)
    }
}

pub fn pair_key(a: CatId, b: CatId) -> (CatId, CatId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

impl MatchRequest {
    pub async fn find_by_id(id: MatchRequestId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM match_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Every non-withdrawn request touching any of `cat_ids`, oldest first.
    pub async fn find_for_cats(cat_ids: &[CatId], pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM match_requests
            WHERE is_withdrawn = false
              AND (match_cat_id = ANY($1) OR user_cat_id = ANY($1))
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(cat_ids)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Compare two live cats in a single query.
    ///
    /// Returns `None` when either cat does not exist (or is soft-deleted).
    pub async fn compare_cats(a: CatId, b: CatId, pool: &PgPool) -> Result<Option<PairFacts>> {
        sqlx::query_as::<_, PairFacts>(
            r#"
            SELECT
                c1.sex = c2.sex                   AS same_sex,
                (c1.has_matched OR c2.has_matched) AS any_matched,
                c1.owner_id = c2.owner_id         AS same_owner
            FROM cats c1, cats c2
            WHERE c1.id = $1 AND c2.id = $2
              AND c1.is_deleted = false AND c2.is_deleted = false
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Is there an active request for this unordered pair?
    pub async fn has_active_for_pair(a: CatId, b: CatId, pool: &PgPool) -> Result<bool> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM match_requests
                WHERE status = 'pending'
                  AND is_withdrawn = false
                  AND ((match_cat_id = $1 AND user_cat_id = $2)
                    OR (match_cat_id = $2 AND user_cat_id = $1))
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// Insert the request while holding share locks on both cats.
    ///
    /// The share locks conflict with the `FOR UPDATE` taken by `approve`, so
    /// an approval either commits first (and the insert sees the matched flag)
    /// or waits for the insert to commit (and its sweep rejects the new row).
    /// A conflict on the active-pair unique index reads as a duplicate.
    pub async fn insert(&self, pool: &PgPool) -> Result<InsertOutcome> {
        let mut tx = pool.begin().await?;

        let flags = Cat::lock_for_share(&[self.match_cat_id, self.user_cat_id], &mut *tx).await?;
        if flags.iter().any(|(_, has_matched)| *has_matched) {
            return Ok(InsertOutcome::CatAlreadyMatched);
        }

        let created = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO match_requests (
                id, match_cat_id, user_cat_id, message, status, issued_by,
                is_withdrawn, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.match_cat_id)
        .bind(self.user_cat_id)
        .bind(&self.message)
        .bind(self.status)
        .bind(self.issued_by)
        .bind(self.is_withdrawn)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(match created {
            Some(request) => InsertOutcome::Created(request),
            None => InsertOutcome::Duplicate,
        })
    }

    /// Compare-and-set `pending -> rejected`.
    pub async fn reject(id: MatchRequestId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE match_requests
            SET status = 'rejected', updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND is_withdrawn = false
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Compare-and-set soft withdrawal of a pending request.
    pub async fn withdraw(id: MatchRequestId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE match_requests
            SET is_withdrawn = true, updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND is_withdrawn = false
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Approve a pending request and apply its side effects atomically.
    ///
    /// Within one transaction: lock both cats, flip the request to approved
    /// (only if still active), flag both cats as matched, and reject every
    /// other active request on either cat. Returns `None` if the request is
    /// missing or no longer active. If either cat already has a partner the
    /// request is rejected instead, and `None` is returned as well.
    ///
    /// Dropping the future before commit rolls the transaction back.
    pub async fn approve(id: MatchRequestId, pool: &PgPool) -> Result<Option<Approval>> {
        let mut tx = pool.begin().await?;

        let Some((match_cat_id, user_cat_id)) = sqlx::query_as::<_, (CatId, CatId)>(
            "SELECT match_cat_id, user_cat_id FROM match_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let cat_ids = [match_cat_id, user_cat_id];

        // A competing approval on either cat commits (and sweeps us) before we proceed.
        let flags = Cat::lock_for_update(&cat_ids, &mut *tx).await?;

        if flags.iter().any(|(_, has_matched)| *has_matched) {
            sqlx::query(
                r#"
                UPDATE match_requests
                SET status = 'rejected', updated_at = NOW()
                WHERE id = $1 AND status = 'pending' AND is_withdrawn = false
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(None);
        }

        let approved = sqlx::query_as::<_, Self>(
            r#"
            UPDATE match_requests
            SET status = 'approved', updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND is_withdrawn = false
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request) = approved else {
            tx.rollback().await?;
            return Ok(None);
        };

        Cat::set_matched(&cat_ids, &mut *tx).await?;

        let invalidated = sqlx::query_as::<_, (MatchRequestId,)>(
            r#"
            UPDATE match_requests
            SET status = 'rejected', updated_at = NOW()
            WHERE id <> $1
              AND status = 'pending'
              AND is_withdrawn = false
              AND (match_cat_id = ANY($2) OR user_cat_id = ANY($2))
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&cat_ids[..])
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id,)| id)
        .collect();

        tx.commit().await?;

        Ok(Some(Approval {
            request,
            invalidated,
        }))
    }
}
