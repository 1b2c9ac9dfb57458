use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use farmlink_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Setting {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Setting {
    fn new(key: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key, env_key, value: value.into() }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(
            setting.key,
            setting.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", setting.key, setting.value));
    }
    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    vec![
        Setting::new("database.url", "FARMLINK_DATABASE_URL", &config.database.url),
        Setting::new(
            "database.max_connections",
            "FARMLINK_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        Setting::new(
            "database.timeout_secs",
            "FARMLINK_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        Setting::new("server.bind_address", "FARMLINK_SERVER_BIND_ADDRESS", &config.server.bind_address),
        Setting::new("server.port", "FARMLINK_SERVER_PORT", config.server.port.to_string()),
        Setting::new(
            "server.graceful_shutdown_secs",
            "FARMLINK_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        Setting::new(
            "agent.engine_url",
            "FARMLINK_AGENT_ENGINE_URL",
            config.agent.engine_url.as_deref().unwrap_or("<unset>"),
        ),
        Setting::new(
            "agent.timeout_secs",
            "FARMLINK_AGENT_TIMEOUT_SECS",
            config.agent.timeout_secs.to_string(),
        ),
        Setting::new("market_data.base_url", "FARMLINK_MARKET_DATA_BASE_URL", &config.market_data.base_url),
        Setting::new(
            "market_data.api_key",
            "FARMLINK_MARKET_DATA_API_KEY",
            redact_secret(config.market_data.api_key.as_ref()),
        ),
        Setting::new(
            "community.translation_url",
            "FARMLINK_COMMUNITY_TRANSLATION_URL",
            config.community.translation_url.as_deref().unwrap_or("<unset>"),
        ),
        Setting::new(
            "community.translation_api_key",
            "FARMLINK_COMMUNITY_TRANSLATION_API_KEY",
            redact_secret(config.community.translation_api_key.as_ref()),
        ),
        Setting::new(
            "community.push_url",
            "FARMLINK_COMMUNITY_PUSH_URL",
            config.community.push_url.as_deref().unwrap_or("<unset>"),
        ),
        Setting::new(
            "community.push_api_key",
            "FARMLINK_COMMUNITY_PUSH_API_KEY",
            redact_secret(config.community.push_api_key.as_ref()),
        ),
        Setting::new("community.push_topic", "FARMLINK_COMMUNITY_PUSH_TOPIC", &config.community.push_topic),
        Setting::new(
            "community.history_limit",
            "FARMLINK_COMMUNITY_HISTORY_LIMIT",
            config.community.history_limit.to_string(),
        ),
        Setting::new("logging.level", "FARMLINK_LOGGING_LEVEL", &config.logging.level),
        Setting::new(
            "logging.format",
            "FARMLINK_LOGGING_FORMAT",
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Shows at most the first four characters of a secret.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let exposed = secret.expose_secret().trim();
    if exposed.chars().count() <= 8 {
        return "<redacted>".to_string();
    }
    let prefix: String = exposed.chars().take(4).collect();
    format!("{prefix}***")
}
