//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::domains::auth::JwtService;
use crate::domains::matching::MatchEngine;
use crate::kernel::ServerDeps;
use crate::server::middleware::jwt_auth_middleware;
use crate::server::response::ApiError;
use crate::server::routes::{
    approve_match_handler, health_handler, list_matches_handler, propose_match_handler,
    reject_match_handler, withdraw_match_handler,
};

/// Handlers give up after this long. Dropping the handler future rolls back
/// any open approval transaction.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub engine: Arc<MatchEngine>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    /// State backed by the Postgres directories and match store
    pub fn postgres(pool: PgPool, jwt_service: JwtService) -> Self {
        let engine = MatchEngine::new(ServerDeps::postgres(pool.clone()));
        Self {
            db_pool: pool,
            engine: Arc::new(engine),
            jwt_service: Arc::new(jwt_service),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Build the Axum application router
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    let jwt_service = state.jwt_service.clone();

    Router::new()
        .route(
            "/v1/cat/match",
            post(propose_match_handler).get(list_matches_handler),
        )
        .route("/v1/cat/match/approve", post(approve_match_handler))
        .route("/v1/cat/match/reject", post(reject_match_handler))
        .route("/v1/cat/match/:id", delete(withdraw_match_handler))
        .route("/health", get(health_handler))
        .fallback(route_not_found)
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service.clone(), req, next)
        }))
        .layer(Extension(state))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
