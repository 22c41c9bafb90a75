//! JSON envelopes and the error kind -> HTTP status mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::domains::matching::MatchError;

/// Success envelope: `{ "message": ..., "data": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_data(message: &str, data: T) -> Self {
        Self {
            message: message.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: &str) -> Self {
        Self {
            message: message.to_string(),
            data: None,
        }
    }
}

/// Error envelope: `{ "error": <reason phrase>, "message": ... }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Everything a handler can fail with
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Validation(String),
    RouteNotFound,
    Match(MatchError),
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        ApiError::Match(err)
    }
}

/// HTTP status for each match error kind
pub fn status_for(err: &MatchError) -> StatusCode {
    match err {
        MatchError::MatchCatNotFound
        | MatchError::UserCatNotFound
        | MatchError::UserCatNotOwnedByIssuer
        | MatchError::MatchRequestNotFound => StatusCode::NOT_FOUND,
        MatchError::InvalidMessage
        | MatchError::SameGender
        | MatchError::AlreadyMatched
        | MatchError::SameOwner
        | MatchError::MatchRequestNoLongerValid => StatusCode::BAD_REQUEST,
        MatchError::DuplicateRequest => StatusCode::CONFLICT,
        MatchError::IssuerCannotDecide
        | MatchError::UnauthorizedDecision
        | MatchError::NotIssuer => StatusCode::FORBIDDEN,
        MatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Match(err) => status_for(err),
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Unauthorized => "missing or invalid bearer token".to_string(),
            ApiError::Validation(message) => message.clone(),
            ApiError::RouteNotFound => "route does not exist".to_string(),
            ApiError::Match(MatchError::Internal(_)) => "internal server error".to_string(),
            ApiError::Match(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Match(MatchError::Internal(err)) = &self {
            error!("Match operation failed: {:#}", err);
        }

        let status = self.status();
        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
