//! Server configuration.
//!
//! Environment variables are read exactly once at process start into this
//! immutable value object. Database settings delegate to
//! [`tracker_store::StoreConfig`].

use tracker_core::{Error, Result};
use tracker_store::StoreConfig;

/// Settings surfaced to the frontend through `/config.js`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontendConfig {
    /// Jira domain (e.g. `acme.atlassian.net`).
    pub jira_domain: String,
    /// Jira project key used for ticket creation links.
    pub jira_project_key: String,
    /// Slack workspace name.
    pub slack_workspace: String,
    /// Slack channel id events are announced in.
    pub slack_events_channel: String,
}

/// Configuration for the tracker server.
#[derive(Debug, Clone)]
pub struct Config {
    /// gRPC listener port (reserved; the transport surface served today is
    /// the REST gateway).
    pub grpc_port: u16,
    /// HTTP listener port.
    pub http_port: u16,
    /// Metrics listener port.
    pub metrics_port: u16,
    /// Default structured-log level (`RUST_LOG` still takes precedence).
    pub log_level: String,
    /// Document store settings.
    pub store: StoreConfig,
    /// Frontend runtime settings.
    pub frontend: FrontendConfig,
    /// Directory the SPA build is served from.
    pub frontend_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grpc_port: 8765,
            http_port: 8080,
            metrics_port: 8081,
            log_level: "info".to_string(),
            store: StoreConfig::default(),
            frontend: FrontendConfig::default(),
            frontend_dir: "web/dist".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `GRPC_PORT`, `HTTP_PORT`, `METRICS_PORT`
    /// - `LOG_LEVEL`
    /// - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USERNAME`, `DB_PASSWORD`,
    ///   `DB_CA_FILE`, `DB_CERT_FILE`, `DB_KEY_FILE`
    /// - `JIRA_DOMAIN`, `JIRA_PROJECT_KEY`
    /// - `SLACK_WORKSPACE`, `SLACK_EVENTS_CHANNEL`
    ///
    /// # Errors
    ///
    /// Returns a validation error when a present variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            store: StoreConfig::from_env()?,
            ..Self::default()
        };

        if let Some(port) = env_u16("GRPC_PORT")? {
            config.grpc_port = port;
        }
        if let Some(port) = env_u16("HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(port) = env_u16("METRICS_PORT")? {
            config.metrics_port = port;
        }
        if let Some(level) = env_string("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(domain) = env_string("JIRA_DOMAIN") {
            config.frontend.jira_domain = domain;
        }
        if let Some(key) = env_string("JIRA_PROJECT_KEY") {
            config.frontend.jira_project_key = key;
        }
        if let Some(workspace) = env_string("SLACK_WORKSPACE") {
            config.frontend.slack_workspace = workspace;
        }
        if let Some(channel) = env_string("SLACK_EVENTS_CHANNEL") {
            config.frontend.slack_events_channel = channel;
        }

        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(value) = env_string(name) else {
        return Ok(None);
    };
    value
        .parse::<u16>()
        .map(Some)
        .map_err(|e| Error::validation(format!("{name} must be a u16: {e}")))
}
