use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::State;
use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use roster_orchestrator::{
    normalize_discovery_url, parse_chat_request, McpClient, RelayError, RelayStream,
    STREAM_TERMINATOR, UI_MESSAGE_STREAM_HEADER, UI_MESSAGE_STREAM_VERSION,
};
use tracing::{debug, error, info, warn};

use crate::state::AppState;

const CHAT_PAGE: &str = include_str!("../../assets/chat.html");

pub async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

pub async fn chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let messages = match parse_chat_request(&body) {
        Ok(messages) => messages,
        Err(err) => {
            warn!(error = %err, "rejecting chat request");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };
    debug!(count = messages.len(), "chat request received");

    let origin = request_origin(state.config().http.public_origin.as_deref(), &headers);
    let tools = match discover_tools(&state, origin.as_ref()).await {
        Ok(tools) => tools,
        Err(err) => return chat_error(err),
    };

    match state.relay().start(messages, tools).await {
        Ok(stream) => ui_message_stream(stream),
        Err(err) => chat_error(err),
    }
}

async fn discover_tools(
    state: &AppState,
    origin: Option<&RequestOrigin>,
) -> Result<Option<McpClient>, RelayError> {
    let mcp = &state.config().mcp;
    let configured = normalize_discovery_url(mcp.discovery_url.as_deref(), None, &mcp.base_path);
    let (url, trusted) = match configured {
        Some(url) => (url, true),
        None => {
            let derived = origin.and_then(|origin| {
                normalize_discovery_url(None, Some(origin.as_str()), &mcp.base_path)
            });
            let Some(url) = derived else {
                debug!("tool discovery unavailable");
                return Ok(None);
            };
            (url, origin.is_some_and(RequestOrigin::is_configured))
        }
    };

    // Configured headers only travel to configured addresses.
    let anonymous = HashMap::new();
    let headers = if trusted {
        &mcp.discovery_headers
    } else {
        if !mcp.discovery_headers.is_empty() {
            debug!(%url, "withholding discovery headers from a request-derived address");
        }
        &anonymous
    };

    match McpClient::connect(state.http().clone(), url.clone(), headers).await {
        Ok(client) => {
            info!(%url, tools = client.tools().len(), "tool discovery succeeded");
            Ok(Some(client))
        }
        Err(err) if mcp.require_tools => Err(err),
        Err(err) => {
            warn!(%url, error = %err, "tool discovery failed, continuing without tools");
            Ok(None)
        }
    }
}

fn chat_error(err: RelayError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error!(error = %err, %status, "chat request failed");
    (status, format!("Chat error: {err}")).into_response()
}

fn ui_message_stream(parts: RelayStream) -> Response {
    let events = parts
        .map(|part| Ok::<_, Infallible>(Event::default().data(part.to_json())))
        .chain(stream::once(async {
            Ok(Event::default().data(STREAM_TERMINATOR))
        }));

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(UI_MESSAGE_STREAM_HEADER),
        HeaderValue::from_static(UI_MESSAGE_STREAM_VERSION),
    );
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

/// Origin the browser used to reach us, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOrigin {
    /// `http.public_origin`.
    Configured(String),
    /// Rebuilt from the client's `Host` and `X-Forwarded-Proto` headers.
    Forwarded(String),
}

impl RequestOrigin {
    pub fn as_str(&self) -> &str {
        match self {
            RequestOrigin::Configured(origin) | RequestOrigin::Forwarded(origin) => origin,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, RequestOrigin::Configured(_))
    }
}

/// Origin used to derive the discovery address when no override is set.
pub fn request_origin(public_origin: Option<&str>, headers: &HeaderMap) -> Option<RequestOrigin> {
    if let Some(origin) = public_origin
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
    {
        return Some(RequestOrigin::Configured(
            origin.trim_end_matches('/').to_string(),
        ));
    }

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|host| !host.is_empty())?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|scheme| !scheme.is_empty())
        .unwrap_or("http");

    Some(RequestOrigin::Forwarded(format!("{scheme}://{host}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn origin_prefers_configured_public_origin() {
        let origin = request_origin(
            Some("https://roster.example.com/"),
            &headers(&[("host", "internal:3000")]),
        );
        assert_eq!(
            origin,
            Some(RequestOrigin::Configured("https://roster.example.com".to_string()))
        );
    }

    #[test]
    fn origin_uses_forwarded_proto_and_host() {
        let origin = request_origin(
            None,
            &headers(&[("host", "roster.example.com"), ("x-forwarded-proto", "https, http")]),
        );
        assert_eq!(
            origin,
            Some(RequestOrigin::Forwarded("https://roster.example.com".to_string()))
        );
    }

    #[test]
    fn origin_defaults_to_http() {
        let origin = request_origin(Some("  "), &headers(&[("host", "localhost:3000")]));
        assert_eq!(
            origin.as_ref().map(RequestOrigin::as_str),
            Some("http://localhost:3000")
        );
    }

    #[test]
    fn origin_requires_a_host() {
        assert!(request_origin(None, &HeaderMap::new()).is_none());
    }
}
