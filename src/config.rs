//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

const KEYRING_SERVICE: &str = "excels-autobot";

/// Slack connectivity settings.
///
/// Tokens are loaded at runtime via OS keychain or environment variables,
/// never from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Reject webhooks whose `x-slack-signature` does not verify.
    #[serde(default = "default_true")]
    pub verify_signatures: bool,
    /// Bot user token used for Web API calls (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
    /// Signing secret used by the signature guard (populated at runtime).
    #[serde(skip)]
    pub signing_secret: String,
}

/// Airtable-style record store settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RecordStoreConfig {
    /// API root, without the base id.
    #[serde(default = "default_record_store_url")]
    pub base_url: String,
    /// Base (spreadsheet) identifier.
    pub base_id: String,
    /// Table holding one row per employee and week.
    #[serde(default = "default_table")]
    pub table: String,
    /// View used for every read.
    #[serde(default = "default_view")]
    pub view: String,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

/// Backing implementation of the key-value store.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KvBackend {
    /// `SQLite` file or URL handled by sqlx.
    #[default]
    Sqlite,
    /// Process-local map; contents are lost on restart.
    Memory,
}

/// Key-value store settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct KvConfig {
    /// Which backend to use.
    #[serde(default)]
    pub backend: KvBackend,
    /// sqlx connection URL for the `sqlite` backend.
    #[serde(default = "default_kv_url")]
    pub database_url: String,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            backend: KvBackend::default(),
            database_url: default_kv_url(),
        }
    }
}

/// How error reports are tied to the failing request.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// Spawn the report and answer immediately.
    #[default]
    Background,
    /// Finish reporting (including retries) before answering.
    Inline,
}

/// Error telemetry settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TelemetryConfig {
    /// Whether errors are shipped at all.
    #[serde(default)]
    pub enabled: bool,
    /// Ingestion host.
    #[serde(default = "default_telemetry_endpoint")]
    pub endpoint: String,
    /// Project identifier used in the store path.
    #[serde(default)]
    pub project_id: String,
    /// Extra attempts after the first one.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Background or inline reporting.
    #[serde(default)]
    pub mode: ReportMode,
    /// Project key (populated at runtime).
    #[serde(skip)]
    pub key: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_telemetry_endpoint(),
            project_id: String::new(),
            retries: default_retries(),
            mode: ReportMode::default(),
            key: String::new(),
        }
    }
}

/// Static content shown on the home tab.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub struct HomeConfig {
    /// Link to the spreadsheet view, rendered under the intro.
    #[serde(default)]
    pub record_store_url: Option<String>,
    /// Slack user to contact with questions.
    #[serde(default)]
    pub contact_user_id: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_record_store_url() -> String {
    "https://api.airtable.com/v0".into()
}

fn default_table() -> String {
    "People Development".into()
}

fn default_view() -> String {
    "Weekly".into()
}

fn default_kv_url() -> String {
    "sqlite://excels-autobot.db?mode=rwc".into()
}

fn default_telemetry_endpoint() -> String {
    "https://sentry.io".into()
}

fn default_retries() -> u32 {
    5
}

fn default_http_port() -> u16 {
    8787
}

fn default_environment() -> String {
    "production".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// HTTP port for the webhook listener.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Deployment environment name, attached to error reports.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Slack settings.
    pub slack: SlackConfig,
    /// Record store settings.
    pub record_store: RecordStoreConfig,
    /// Key-value store settings.
    #[serde(default)]
    pub kv: KvConfig,
    /// Error telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Home tab content.
    #[serde(default)]
    pub home: HomeConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load secrets from OS keychain with env-var fallback.
    ///
    /// The signing secret is only required when signature verification is
    /// on, and the telemetry key only when telemetry is enabled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required secret is missing.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        self.record_store.api_key = load_credential("airtable_key", "AIRTABLE_KEY").await?;
        if self.slack.verify_signatures {
            self.slack.signing_secret =
                load_credential("slack_signing_secret", "SLACK_SIGNING_SECRET").await?;
        }
        if self.telemetry.enabled {
            self.telemetry.key = load_credential("sentry_key", "SENTRY_KEY").await?;
        }
        Ok(())
    }

    /// Release identifier attached to error reports.
    #[must_use]
    pub fn release(&self) -> String {
        option_env!("EXCELS_AUTOBOT_RELEASE")
            .unwrap_or(env!("CARGO_PKG_VERSION"))
            .to_owned()
    }

    fn validate(&self) -> Result<()> {
        if self.record_store.base_id.trim().is_empty() {
            return Err(AppError::Config(
                "record_store.base_id must not be empty".into(),
            ));
        }

        if self.telemetry.enabled && self.telemetry.project_id.trim().is_empty() {
            return Err(AppError::Config(
                "telemetry.project_id is required when telemetry is enabled".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Config(format!(
                "credential {keyring_key} not found in keychain or {env_key} env var"
            ))
        })
}
