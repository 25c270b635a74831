use std::sync::Arc;

use roster_config::AppConfig;
use roster_database::AttendeeRepository;
use roster_orchestrator::ChatRelay;
use roster_tools::ToolRegistry;

use crate::sessions::SessionBroker;

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    attendees: AttendeeRepository,
    tools: Arc<ToolRegistry>,
    relay: Arc<ChatRelay>,
    http: reqwest::Client,
    sessions: SessionBroker,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        attendees: AttendeeRepository,
        tools: Arc<ToolRegistry>,
        relay: Arc<ChatRelay>,
        http: reqwest::Client,
        sessions: SessionBroker,
    ) -> Self {
        Self {
            config,
            attendees,
            tools,
            relay,
            http,
            sessions,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn attendees(&self) -> &AttendeeRepository {
        &self.attendees
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn relay(&self) -> &ChatRelay {
        &self.relay
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn sessions(&self) -> &SessionBroker {
        &self.sessions
    }

    /// Mount point of the tool endpoint without a trailing slash.
    pub fn mcp_base_path(&self) -> String {
        normalize_base_path(&self.config.mcp.base_path)
    }
}

pub(crate) fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/api/mcp".to_string()
    } else {
        format!("/{trimmed}")
    }
}
