//! `/v1/cat/match` handlers.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::common::{CatId, MatchRequestId};
use crate::domains::matching::{Decision, MatchRequestData, MatchView};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::server::response::{ApiError, ApiResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeMatchBody {
    pub match_cat_id: String,
    pub user_cat_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideMatchBody {
    pub match_id: String,
}

fn parse_id<T>(field: &str, raw: &str) -> Result<crate::common::Id<T>, ApiError> {
    crate::common::Id::parse(raw.trim())
        .map_err(|_| ApiError::Validation(format!("{} must be a valid id", field)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

/// POST /v1/cat/match
pub async fn propose_match_handler(
    user: AuthUser,
    Extension(state): Extension<AppState>,
    payload: Result<Json<ProposeMatchBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<MatchRequestData>>), ApiError> {
    let payload = body(payload)?;
    let match_cat_id: CatId = parse_id("matchCatId", &payload.match_cat_id)?;
    let user_cat_id: CatId = parse_id("userCatId", &payload.user_cat_id)?;

    let request = state
        .engine
        .propose(user.user_id, match_cat_id, user_cat_id, payload.message)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_data(
            "successfully send match request",
            MatchRequestData::from(request),
        )),
    ))
}

/// GET /v1/cat/match
pub async fn list_matches_handler(
    user: AuthUser,
    Extension(state): Extension<AppState>,
) -> Result<Json<ApiResponse<Vec<MatchView>>>, ApiError> {
    let views = state.engine.list_for_user(user.user_id).await?;
    Ok(Json(ApiResponse::with_data(
        "successfully get match requests",
        views,
    )))
}

async fn decide(
    user: AuthUser,
    state: AppState,
    payload: Result<Json<DecideMatchBody>, JsonRejection>,
    decision: Decision,
) -> Result<(), ApiError> {
    let payload = body(payload)?;
    let match_id: MatchRequestId = parse_id("matchId", &payload.match_id)?;
    state.engine.decide(match_id, user.user_id, decision).await?;
    Ok(())
}

/// POST /v1/cat/match/approve
pub async fn approve_match_handler(
    user: AuthUser,
    Extension(state): Extension<AppState>,
    payload: Result<Json<DecideMatchBody>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    decide(user, state, payload, Decision::Approved).await?;
    Ok(Json(ApiResponse::message(
        "successfully matches the cat match request",
    )))
}

/// POST /v1/cat/match/reject
pub async fn reject_match_handler(
    user: AuthUser,
    Extension(state): Extension<AppState>,
    payload: Result<Json<DecideMatchBody>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    decide(user, state, payload, Decision::Rejected).await?;
    Ok(Json(ApiResponse::message(
        "successfully reject the cat match request",
    )))
}

/// DELETE /v1/cat/match/:id
pub async fn withdraw_match_handler(
    user: AuthUser,
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let match_id: MatchRequestId = parse_id("id", &id)?;
    state.engine.withdraw(match_id, user.user_id).await?;
    Ok(Json(ApiResponse::message(
        "successfully remove a cat match request",
    )))
}
