use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "roster.toml",
    "config/roster.toml",
    "crates/config/roster.toml",
    "../roster.toml",
    "../config/roster.toml",
    "../../roster.toml",
];

/// Plain environment variables understood in addition to the `ROSTER__*` overrides.
///
/// These win over every other source when set to a non-blank value.
pub const ENV_ALIASES: &[(&str, &str)] = &[
    ("OPENAI_MODEL", "chat.model"),
    ("OPENAI_API_KEY", "chat.api_key"),
    ("OPENAI_BASE_URL", "chat.base_url"),
    ("MCP_SSE_URL", "mcp.discovery_url"),
    ("REDIS_URL", "mcp.redis_url"),
];

/// JSON object of extra headers sent on the tool discovery connection.
pub const MCP_HEADERS_ENV: &str = "MCP_HEADERS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub mcp: McpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    /// Origin used to derive the tool discovery address instead of the request's `Host`.
    #[serde(default)]
    pub public_origin: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3000,
            public_origin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://roster.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Settings for the hosted completion service behind `/api/chat`.
///
/// ```
/// use roster_config::ChatConfig;
///
/// let chat = ChatConfig::default();
/// assert_eq!(chat.model, "gpt-4o-mini");
/// assert_eq!(chat.max_steps, 1);
/// assert!(chat.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "ChatConfig::default_model")]
    pub model: String,
    #[serde(default = "ChatConfig::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Ceiling for a whole chat request, streamed body included.
    #[serde(default = "ChatConfig::default_max_duration")]
    pub max_duration_seconds: u64,
    #[serde(default = "ChatConfig::default_max_steps")]
    pub max_steps: u32,
}

impl ChatConfig {
    fn default_model() -> String {
        "gpt-4o-mini".to_string()
    }

    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    const fn default_max_duration() -> u64 {
        30
    }

    const fn default_max_steps() -> u32 {
        1
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            base_url: Self::default_base_url(),
            api_key: None,
            max_duration_seconds: Self::default_max_duration(),
            max_steps: Self::default_max_steps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Mount point of the tool endpoint.
    #[serde(default = "McpConfig::default_base_path")]
    pub base_path: String,
    /// Explicit tool discovery address; derived from the request origin when unset.
    #[serde(default)]
    pub discovery_url: Option<String>,
    #[serde(default)]
    pub discovery_headers: HashMap<String, String>,
    /// Redis instance used to fan SSE session messages out across processes.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Fail chat requests when tool discovery is configured but unreachable.
    #[serde(default)]
    pub require_tools: bool,
}

impl McpConfig {
    fn default_base_path() -> String {
        "/api/mcp".to_string()
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            base_path: Self::default_base_path(),
            discovery_url: None,
            discovery_headers: HashMap::new(),
            redis_url: None,
            require_tools: false,
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use roster_config::load;
///
/// std::env::remove_var("ROSTER_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("chat.model", defaults.chat.model.clone())?
        .set_default("chat.base_url", defaults.chat.base_url.clone())?
        .set_default(
            "chat.max_duration_seconds",
            i64::try_from(defaults.chat.max_duration_seconds).unwrap_or(i64::MAX),
        )?
        .set_default("chat.max_steps", i64::from(defaults.chat.max_steps))?
        .set_default("mcp.base_path", defaults.mcp.base_path.clone())?
        .set_default("mcp.require_tools", defaults.mcp.require_tools)?;

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("ROSTER_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path = %path, "loading configuration via ROSTER_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(config::Environment::with_prefix("ROSTER").separator("__"));

    for (variable, key) in ENV_ALIASES {
        let value = std::env::var(variable)
            .ok()
            .filter(|value| !value.trim().is_empty());
        if value.is_some() {
            debug!(variable, key, "applying environment alias");
        }
        builder = builder.set_override_option(*key, value)?;
    }

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if let Ok(raw) = std::env::var(MCP_HEADERS_ENV) {
        match parse_header_map(&raw) {
            Some(headers) => config.mcp.discovery_headers.extend(headers),
            None => warn!(
                variable = MCP_HEADERS_ENV,
                "ignoring headers that are not a JSON object"
            ),
        }
    }

    if config.chat.max_steps == 0 {
        config.chat.max_steps = 1;
    }
    if config.chat.max_duration_seconds == 0 {
        anyhow::bail!("chat.max_duration_seconds must be at least 1");
    }

    debug!(
        model = %config.chat.model,
        discovery_url = ?config.mcp.discovery_url,
        redis = config.mcp.redis_url.is_some(),
        "loaded backend configuration"
    );
    Ok(config)
}

/// Parse a JSON object into header pairs.
///
/// Strings are kept as-is, numbers and booleans are stringified, anything else is dropped.
/// Returns `None` when the input is not a JSON object.
///
/// ```
/// use roster_config::parse_header_map;
///
/// let headers = parse_header_map(r#"{"Authorization":"Bearer x","X-Retry":3}"#).unwrap();
/// assert_eq!(headers["Authorization"], "Bearer x");
/// assert_eq!(headers["X-Retry"], "3");
/// assert!(parse_header_map("not json").is_none());
/// ```
pub fn parse_header_map(raw: &str) -> Option<HashMap<String, String>> {
    let Value::Object(map) = serde_json::from_str::<Value>(raw).ok()? else {
        return None;
    };

    let headers = map
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(text) => Some((name, text)),
            Value::Number(number) => Some((name, number.to_string())),
            Value::Bool(flag) => Some((name, flag.to_string())),
            _ => None,
        })
        .collect();

    Some(headers)
}
