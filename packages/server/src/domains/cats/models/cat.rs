use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::common::{CatId, UserId};

/// Cat sex
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "cat_sex", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

/// Cat - read model over the `cats` table.
///
/// Cat CRUD lives outside the matching core. The only column the core ever
/// writes is `has_matched`, and only from inside the approval transaction.
/// Soft-deleted rows are invisible to every query here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cat {
    pub id: CatId,
    pub owner_id: UserId,
    pub name: String,
    pub race: String,
    pub sex: Sex,
    pub age_in_month: i32,
    pub description: String,
    pub image_urls: Vec<String>,
    pub has_matched: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a cat (fixtures and seeding).
#[derive(Debug, Clone)]
pub struct NewCat {
    pub owner_id: UserId,
    pub name: String,
    pub race: String,
    pub sex: Sex,
    pub age_in_month: i32,
    pub description: String,
    pub image_urls: Vec<String>,
}

const CAT_COLUMNS: &str = "id, owner_id, name, race, sex, age_in_month, description, image_urls, has_matched, created_at";

// =============================================================================
// SQL Queries
// =============================================================================

impl Cat {
    pub async fn find_by_id(id: CatId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {CAT_COLUMNS} FROM cats WHERE id = $1 AND is_deleted = false"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_owner(owner_id: UserId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {CAT_COLUMNS} FROM cats
             WHERE owner_id = $1 AND is_deleted = false
             ORDER BY created_at ASC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn exists(id: CatId, pool: &PgPool) -> Result<bool> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(SELECT 1 FROM cats WHERE id = $1 AND is_deleted = false)",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    pub async fn is_owned_by(id: CatId, owner_id: UserId, pool: &PgPool) -> Result<bool> {
        let (owned,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS(
                SELECT 1 FROM cats WHERE id = $1 AND owner_id = $2 AND is_deleted = false
             )",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_one(pool)
        .await?;
        Ok(owned)
    }

    /// Lock the given cat rows until the surrounding transaction ends and
    /// return their `has_matched` flags as of the lock.
    ///
    /// Rows are locked in id order so two transactions touching overlapping
    /// cats always queue instead of deadlocking.
    pub async fn lock_for_update(ids: &[CatId], conn: &mut PgConnection) -> Result<Vec<(CatId, bool)>> {
        sqlx::query_as::<_, (CatId, bool)>(
            "SELECT id, has_matched FROM cats WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(conn)
        .await
        .map_err(Into::into)
    }

    /// Like `lock_for_update`, but concurrent share lockers do not block each
    /// other. Approvals (which lock for update) wait for share holders.
    pub async fn lock_for_share(ids: &[CatId], conn: &mut PgConnection) -> Result<Vec<(CatId, bool)>> {
        sqlx::query_as::<_, (CatId, bool)>(
            "SELECT id, has_matched FROM cats WHERE id = ANY($1) ORDER BY id FOR SHARE",
        )
        .bind(ids)
        .fetch_all(conn)
        .await
        .map_err(Into::into)
    }

    /// Flag the given cats as matched. Setting an already-set flag is a no-op.
    pub async fn set_matched<'e, E>(ids: &[CatId], executor: E) -> Result<u64>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE cats SET has_matched = true WHERE id = ANY($1)")
            .bind(ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn create(cat: NewCat, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO cats (id, owner_id, name, race, sex, age_in_month, description, image_urls)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {CAT_COLUMNS}"
        ))
        .bind(CatId::new())
        .bind(cat.owner_id)
        .bind(&cat.name)
        .bind(&cat.race)
        .bind(cat.sex)
        .bind(cat.age_in_month)
        .bind(&cat.description)
        .bind(&cat.image_urls)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
