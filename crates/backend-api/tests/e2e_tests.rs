//! Full round trips over real sockets: the chat relay discovering this
//! server's own tool endpoint, and the discovery client used directly.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use httpmock::prelude::*;
use reqwest::Url;
use roster_backend_api::{build_router, AppState, SessionBroker};
use roster_config::AppConfig;
use roster_database::{initialize_database, AttendeeRepository};
use roster_orchestrator::{normalize_discovery_url, ChatRelay, McpClient};
use roster_tools::ToolRegistry;
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

type TestResult<T = ()> = anyhow::Result<T>;

struct RunningServer {
    _temp_dir: TempDir,
    address: SocketAddr,
    attendees: AttendeeRepository,
    task: tokio::task::JoinHandle<()>,
}

impl RunningServer {
    async fn start(mut config: AppConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        config.database.url = format!("sqlite://{}", temp_dir.path().join("e2e.sqlite").display());

        let pool = initialize_database(&config.database).await?;
        let attendees = AttendeeRepository::new(pool);
        let http = reqwest::Client::new();
        let state = AppState::new(
            Arc::new(config.clone()),
            attendees.clone(),
            Arc::new(ToolRegistry::new(attendees.clone())),
            Arc::new(ChatRelay::from_config(http.clone(), &config.chat)),
            http,
            SessionBroker::local(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let app = build_router(state);
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            _temp_dir: temp_dir,
            address,
            attendees,
            task,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn provider_sse(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str("data: ");
        body.push_str(chunk);
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn chat_discovers_own_tools_and_runs_a_dice_roll() -> TestResult {
    let provider = MockServer::start_async().await;
    let completion = provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("\"roll_dice\"")
                .body_contains("\"attendees_update_by_id\"");
            then.status(200)
                .header("Content-Type", "text/event-stream")
                .body(provider_sse(&[
                    r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"roll_dice","arguments":"{\"sides\":6}"}}]}}]}"#,
                    r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                ]));
        })
        .await;

    let mut config = AppConfig::default();
    config.chat.base_url = provider.url("/v1");
    config.chat.api_key = Some("sk-test".to_string());
    let server = RunningServer::start(config).await?;

    let response = reqwest::Client::new()
        .post(server.url("/api/chat"))
        .json(&json!({
            "messages": [
                { "id": "u1", "role": "user", "parts": [{ "type": "text", "text": "roll a d6" }] }
            ]
        }))
        .send()
        .await?;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await?;
    completion.assert_async().await;

    assert!(body.contains(r#""type":"tool-input-available""#), "{body}");
    assert!(body.contains(r#""type":"tool-output-available""#), "{body}");
    assert!(body.contains("You rolled a"), "{body}");
    assert!(body.trim_end().ends_with("data: [DONE]"));
    Ok(())
}

#[tokio::test]
async fn discovery_client_calls_tools_over_the_sse_transport() -> TestResult {
    let server = RunningServer::start(AppConfig::default()).await?;
    let url = Url::parse(&server.url("/api/mcp/sse"))?;

    let client = McpClient::connect(reqwest::Client::new(), url, &HashMap::new()).await?;
    let names: Vec<&str> = client.tools().iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(
        names,
        ["roll_dice", "attendees_list", "attendees_insert", "attendees_update_by_id"]
    );
    assert!(client
        .endpoint()
        .as_str()
        .starts_with(&server.url("/api/mcp/message?sessionId=")));

    let result = client
        .call_tool(
            "attendees_insert",
            json!({ "firstName": "Ava", "lastName": "Smith", "nickname": "" }),
        )
        .await?;
    assert_eq!(result["isError"], false);

    let stored = server.attendees.list().await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].first_name, "Ava");
    assert!(stored[0]
        .nickname
        .as_deref()
        .is_some_and(|nickname| nickname.starts_with("ava-smith-")));

    client.close();
    client.close();
    Ok(())
}

#[tokio::test]
async fn invalid_tool_arguments_surface_as_client_errors() -> TestResult {
    let server = RunningServer::start(AppConfig::default()).await?;
    let url = normalize_discovery_url(Some(&server.url("/api/mcp")), None, "/api/mcp")
        .ok_or_else(|| anyhow::anyhow!("discovery url should normalise"))?;
    assert!(url.path().ends_with("/api/mcp/sse"));

    let client = McpClient::connect(reqwest::Client::new(), url, &HashMap::new()).await?;
    let error = client
        .call_tool("attendees_update_by_id", json!({ "id": 0 }))
        .await
        .expect_err("id 0 must be rejected");

    assert!(error.to_string().contains("greater than or equal to 1"), "{error}");
    assert!(server.attendees.list().await?.is_empty());
    Ok(())
}
