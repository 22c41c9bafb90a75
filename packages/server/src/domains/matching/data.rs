use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{CatId, MatchRequestId, UserId};
use crate::domains::cats::{Cat, Sex};
use crate::domains::matching::models::{MatchRequest, MatchStatus};
use crate::domains::users::User;

/// Public representation of a match request (as returned from `propose`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequestData {
    pub id: MatchRequestId,
    pub match_cat_id: CatId,
    pub user_cat_id: CatId,
    pub message: String,
    pub status: MatchStatus,
    pub issued_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl From<MatchRequest> for MatchRequestData {
    fn from(request: MatchRequest) -> Self {
        Self {
            id: request.id,
            match_cat_id: request.match_cat_id,
            user_cat_id: request.user_cat_id,
            message: request.message,
            status: request.status,
            issued_by: request.issued_by,
            created_at: request.created_at,
        }
    }
}

/// Who issued a request, as shown to both parties
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerDetail {
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for IssuerDetail {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Current public attributes of a cat
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatDetail {
    pub id: CatId,
    pub name: String,
    pub race: String,
    pub sex: Sex,
    pub description: String,
    pub age_in_month: i32,
    pub image_urls: Vec<String>,
    pub has_matched: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Cat> for CatDetail {
    fn from(cat: Cat) -> Self {
        Self {
            id: cat.id,
            name: cat.name,
            race: cat.race,
            sex: cat.sex,
            description: cat.description,
            age_in_month: cat.age_in_month,
            image_urls: cat.image_urls,
            has_matched: cat.has_matched,
            created_at: cat.created_at,
        }
    }
}

/// A match request enriched with issuer identity and both cats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub id: MatchRequestId,
    pub issued_by: IssuerDetail,
    pub match_cat_detail: CatDetail,
    pub user_cat_detail: CatDetail,
    pub message: String,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}
