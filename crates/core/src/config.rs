use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "farmlink.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub market_data: MarketDataConfig,
    pub community: CommunityConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Remote reasoning engine. When `engine_url` is unset the local keyword
/// router answers agent queries.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub engine_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CommunityConfig {
    pub translation_url: Option<String>,
    pub translation_api_key: Option<SecretString>,
    pub push_url: Option<String>,
    pub push_api_key: Option<SecretString>,
    pub push_topic: String,
    pub history_limit: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub agent_engine_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://farmlink.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            agent: AgentConfig { engine_url: None, timeout_secs: 60 },
            market_data: MarketDataConfig {
                base_url: "https://api.data.gov.in/resource/35985678-0d79-46b4-9ed6-6f13308a1d24"
                    .to_string(),
                api_key: None,
                timeout_secs: 15,
            },
            community: CommunityConfig {
                translation_url: None,
                translation_api_key: None,
                push_url: None,
                push_api_key: None,
                push_topic: "community".to_string(),
                history_limit: 50,
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(engine_url) = agent.engine_url {
                self.agent.engine_url = Some(engine_url);
            }
            if let Some(timeout_secs) = agent.timeout_secs {
                self.agent.timeout_secs = timeout_secs;
            }
        }

        if let Some(market_data) = patch.market_data {
            if let Some(base_url) = market_data.base_url {
                self.market_data.base_url = base_url;
            }
            if let Some(api_key) = market_data.api_key {
                self.market_data.api_key = Some(secret_value(api_key));
            }
            if let Some(timeout_secs) = market_data.timeout_secs {
                self.market_data.timeout_secs = timeout_secs;
            }
        }

        if let Some(community) = patch.community {
            if let Some(translation_url) = community.translation_url {
                self.community.translation_url = Some(translation_url);
            }
            if let Some(translation_api_key) = community.translation_api_key {
                self.community.translation_api_key = Some(secret_value(translation_api_key));
            }
            if let Some(push_url) = community.push_url {
                self.community.push_url = Some(push_url);
            }
            if let Some(push_api_key) = community.push_api_key {
                self.community.push_api_key = Some(secret_value(push_api_key));
            }
            if let Some(push_topic) = community.push_topic {
                self.community.push_topic = push_topic;
            }
            if let Some(history_limit) = community.history_limit {
                self.community.history_limit = history_limit;
            }
            if let Some(timeout_secs) = community.timeout_secs {
                self.community.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FARMLINK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FARMLINK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("FARMLINK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FARMLINK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("FARMLINK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FARMLINK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FARMLINK_SERVER_PORT").or_else(|| read_env("PORT")) {
            self.server.port = parse_u16("FARMLINK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("FARMLINK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("FARMLINK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("FARMLINK_AGENT_ENGINE_URL") {
            self.agent.engine_url = Some(value);
        }
        if let Some(value) = read_env("FARMLINK_AGENT_TIMEOUT_SECS") {
            self.agent.timeout_secs = parse_u64("FARMLINK_AGENT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FARMLINK_MARKET_DATA_BASE_URL") {
            self.market_data.base_url = value;
        }
        let market_key =
            read_env("FARMLINK_MARKET_DATA_API_KEY").or_else(|| read_env("INDIA_GOV_API_KEY"));
        if let Some(value) = market_key {
            self.market_data.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FARMLINK_MARKET_DATA_TIMEOUT_SECS") {
            self.market_data.timeout_secs =
                parse_u64("FARMLINK_MARKET_DATA_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FARMLINK_COMMUNITY_TRANSLATION_URL") {
            self.community.translation_url = Some(value);
        }
        if let Some(value) = read_env("FARMLINK_COMMUNITY_TRANSLATION_API_KEY") {
            self.community.translation_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FARMLINK_COMMUNITY_PUSH_URL") {
            self.community.push_url = Some(value);
        }
        if let Some(value) = read_env("FARMLINK_COMMUNITY_PUSH_API_KEY") {
            self.community.push_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FARMLINK_COMMUNITY_PUSH_TOPIC") {
            self.community.push_topic = value;
        }
        if let Some(value) = read_env("FARMLINK_COMMUNITY_HISTORY_LIMIT") {
            self.community.history_limit = parse_u32("FARMLINK_COMMUNITY_HISTORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("FARMLINK_COMMUNITY_TIMEOUT_SECS") {
            self.community.timeout_secs = parse_u64("FARMLINK_COMMUNITY_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("FARMLINK_LOGGING_LEVEL").or_else(|| read_env("FARMLINK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FARMLINK_LOGGING_FORMAT").or_else(|| read_env("FARMLINK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(engine_url) = overrides.agent_engine_url {
            self.agent.engine_url = Some(engine_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_agent(&self.agent)?;
        validate_market_data(&self.market_data)?;
        validate_community(&self.community)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    check_timeout("database.timeout_secs", database.timeout_secs)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if let Some(url) = &agent.engine_url {
        check_http_url("agent.engine_url", url)?;
    }
    check_timeout("agent.timeout_secs", agent.timeout_secs)
}

fn validate_market_data(market_data: &MarketDataConfig) -> Result<(), ConfigError> {
    check_http_url("market_data.base_url", &market_data.base_url)?;
    check_timeout("market_data.timeout_secs", market_data.timeout_secs)
}

fn validate_community(community: &CommunityConfig) -> Result<(), ConfigError> {
    if let Some(url) = &community.translation_url {
        check_http_url("community.translation_url", url)?;
    }
    if let Some(url) = &community.push_url {
        check_http_url("community.push_url", url)?;
        if community.push_topic.trim().is_empty() {
            return Err(ConfigError::Validation(
                "community.push_topic is required when community.push_url is set".to_string(),
            ));
        }
    }
    if community.history_limit == 0 || community.history_limit > 500 {
        return Err(ConfigError::Validation(
            "community.history_limit must be in range 1..=500".to_string(),
        ));
    }
    check_timeout("community.timeout_secs", community.timeout_secs)
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn check_timeout(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn check_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    agent: Option<AgentPatch>,
    market_data: Option<MarketDataPatch>,
    community: Option<CommunityPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    engine_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketDataPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CommunityPatch {
    translation_url: Option<String>,
    translation_api_key: Option<String>,
    push_url: Option<String>,
    push_api_key: Option<String>,
    push_topic: Option<String>,
    history_limit: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
