//! HTTP surface: the `/api/v1` router, CORS and request tracing.

mod error;
mod handlers;
mod state;

pub use error::ApiError;
pub use state::{AppState, StateDeps};

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, warn};

use crate::auth::{TOKEN_HEADER, require_user};

const API_PREFIX: &str = "/api/v1";

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%origin, %error, "Ignoring unusable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(TOKEN_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60))
}

/// Builds the application router.
///
/// `cors_origins` lists the browser origins allowed to call the API; an
/// empty list allows none.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let authenticated = Router::new()
        .route(
            "/content",
            post(handlers::create_content).get(handlers::list_content),
        )
        .route("/content/share", get(handlers::share_content))
        .route(
            "/content/{id}",
            put(handlers::update_content).delete(handlers::delete_content),
        )
        .route("/types", get(handlers::list_types))
        .route("/types/{id}", get(handlers::contents_by_type))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.tokens),
            require_user,
        ));

    let public = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/verify-otp", post(handlers::verify_otp))
        .route("/signin", post(handlers::signin))
        .route("/content/{id}", get(handlers::shared_contents));

    Router::new()
        .nest(API_PREFIX, authenticated.merge(public))
        .route("/healthz", get(handlers::healthz))
        .layer(cors_layer(cors_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
