//! HTTP surface of the attendee roster.
//!
//! Serves the roster and chat pages, the streaming chat relay at `/api/chat`
//! and the tool endpoint under the configured base path.

pub mod error;
pub mod mcp;
pub mod middleware;
pub mod routes;
pub mod sessions;
pub mod state;

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use error::{ApiError, ErrorResponse};
pub use sessions::{Session, SessionBroker};
pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    let mcp_base = state.mcp_base_path();

    Router::new()
        .route("/", get(routes::roster::roster_page))
        .route("/chat", get(routes::chat::chat_page))
        .route("/api/chat", post(routes::chat::chat))
        .route(&mcp_base, post(routes::mcp::streamable_http))
        .route(&format!("{mcp_base}/sse"), get(routes::mcp::sse_connect))
        .route(
            &format!("{mcp_base}/message"),
            post(routes::mcp::sse_message),
        )
        .route("/health", get(routes::health::health_check))
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
}
