use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::mcp::{decode_message, dispatch};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Streamable HTTP transport: one message in, at most one message out.
pub async fn streamable_http(State(state): State<AppState>, body: Bytes) -> Response {
    let message = match decode_message(&body) {
        Ok(message) => message,
        Err(failure) => {
            warn!(?failure, "rejecting tool endpoint body");
            return (StatusCode::BAD_REQUEST, Json(failure.to_failure())).into_response();
        }
    };

    match dispatch(state.tools(), message).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// SSE transport: announce the message endpoint, then relay session traffic.
pub async fn sse_connect(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = state.sessions().open().await?;
    let endpoint = format!(
        "{}/message?sessionId={}",
        state.mcp_base_path(),
        session.id()
    );
    info!(session = %session.id(), "tool session opened");

    let announce = stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint))
    });
    let messages = session.map(|payload| Ok(Event::default().event("message").data(payload)));

    Ok(Sse::new(announce.chain(messages)).keep_alive(KeepAlive::default()))
}

pub async fn sse_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let Some(raw_id) = query.session_id else {
        return Err(ApiError::bad_request("missing sessionId"));
    };
    let session_id = Uuid::parse_str(&raw_id)
        .map_err(|_| ApiError::bad_request(format!("invalid sessionId `{raw_id}`")))?;

    if !state.sessions().contains(session_id).await? {
        return Err(ApiError::not_found("Session not found"));
    }

    let message = decode_message(&body).map_err(|failure| {
        warn!(session = %session_id, ?failure, "rejecting session message");
        ApiError::bad_request(failure.message())
    })?;

    let Some(response) = dispatch(state.tools(), message).await else {
        return Ok(StatusCode::ACCEPTED);
    };

    let payload = serde_json::to_string(&response)
        .map_err(|err| ApiError::internal_server_error(err.to_string()))?;
    if !state.sessions().deliver(session_id, payload).await? {
        debug!(session = %session_id, "session closed before the response was delivered");
        return Err(ApiError::not_found("Session not found"));
    }

    Ok(StatusCode::ACCEPTED)
}
