//! Test fixtures for creating test data.
//!
//! These fixtures use the model methods directly to create test data.

use anyhow::Result;
use cats_social::common::{CatId, UserId};
use cats_social::domains::cats::{Cat, NewCat, Sex};
use cats_social::domains::users::User;
use sqlx::PgPool;

/// Create a user with a unique email
pub async fn create_test_user(pool: &PgPool, name: &str) -> Result<UserId> {
    let email = format!("{}-{}@example.com", name.to_lowercase(), UserId::new());
    let user = User::create(name, &email, "not-a-real-hash", pool).await?;
    Ok(user.id)
}

/// Create a cat owned by `owner_id`
pub async fn create_test_cat(pool: &PgPool, owner_id: UserId, name: &str, sex: Sex) -> Result<CatId> {
    let cat = Cat::create(
        NewCat {
            owner_id,
            name: name.to_string(),
            race: "Maine Coon".to_string(),
            sex,
            age_in_month: 18,
            description: format!("{} likes sunny windows", name),
            image_urls: vec!["https://images.example.com/cat.png".to_string()],
        },
        pool,
    )
    .await?;
    Ok(cat.id)
}

/// Soft-delete a cat the way the cat catalogue does
pub async fn soft_delete_cat(pool: &PgPool, cat_id: CatId) -> Result<()> {
    sqlx::query("UPDATE cats SET is_deleted = true WHERE id = $1")
        .bind(cat_id)
        .execute(pool)
        .await?;
    Ok(())
}
