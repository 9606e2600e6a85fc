use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_SIGNING_SECRET_LEN: usize = 32;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub pricing: PricingConfig,
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

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub signing_secret: SecretString,
    pub ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub currency: String,
    pub metals: Vec<String>,
    pub interval_secs: u64,
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
    pub server_port: Option<u16>,
    pub session_signing_secret: Option<String>,
    pub pricing_enabled: Option<bool>,
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
                url: "sqlite://goldsmith.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            session: SessionConfig { signing_secret: String::new().into(), ttl_secs: 86_400 },
            pricing: PricingConfig {
                enabled: false,
                api_url: "https://api.metals.dev/v1".to_string(),
                api_key: None,
                currency: "USD".to_string(),
                metals: vec!["gold".to_string(), "silver".to_string(), "platinum".to_string()],
                interval_secs: 3_600,
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("goldsmith.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
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

        if let Some(session) = patch.session {
            if let Some(signing_secret) = session.signing_secret {
                self.session.signing_secret = secret_value(signing_secret);
            }
            if let Some(ttl_secs) = session.ttl_secs {
                self.session.ttl_secs = ttl_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(enabled) = pricing.enabled {
                self.pricing.enabled = enabled;
            }
            if let Some(api_url) = pricing.api_url {
                self.pricing.api_url = api_url;
            }
            if let Some(api_key) = pricing.api_key {
                self.pricing.api_key = Some(secret_value(api_key));
            }
            if let Some(currency) = pricing.currency {
                self.pricing.currency = currency;
            }
            if let Some(metals) = pricing.metals {
                self.pricing.metals = metals;
            }
            if let Some(interval_secs) = pricing.interval_secs {
                self.pricing.interval_secs = interval_secs;
            }
            if let Some(timeout_secs) = pricing.timeout_secs {
                self.pricing.timeout_secs = timeout_secs;
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
        if let Some(value) = read_env("GOLDSMITH_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("GOLDSMITH_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("GOLDSMITH_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("GOLDSMITH_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("GOLDSMITH_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GOLDSMITH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GOLDSMITH_SERVER_PORT") {
            self.server.port = parse_u16("GOLDSMITH_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("GOLDSMITH_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GOLDSMITH_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("GOLDSMITH_SESSION_SIGNING_SECRET") {
            self.session.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("GOLDSMITH_SESSION_TTL_SECS") {
            self.session.ttl_secs = parse_u64("GOLDSMITH_SESSION_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("GOLDSMITH_PRICING_ENABLED") {
            self.pricing.enabled = parse_bool("GOLDSMITH_PRICING_ENABLED", &value)?;
        }
        if let Some(value) = read_env("GOLDSMITH_PRICING_API_URL") {
            self.pricing.api_url = value;
        }
        if let Some(value) = read_env("GOLDSMITH_PRICING_API_KEY") {
            self.pricing.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GOLDSMITH_PRICING_CURRENCY") {
            self.pricing.currency = value;
        }
        if let Some(value) = read_env("GOLDSMITH_PRICING_METALS") {
            self.pricing.metals = split_list(&value);
        }
        if let Some(value) = read_env("GOLDSMITH_PRICING_INTERVAL_SECS") {
            self.pricing.interval_secs = parse_u64("GOLDSMITH_PRICING_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("GOLDSMITH_PRICING_TIMEOUT_SECS") {
            self.pricing.timeout_secs = parse_u64("GOLDSMITH_PRICING_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("GOLDSMITH_LOGGING_LEVEL").or_else(|| read_env("GOLDSMITH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GOLDSMITH_LOGGING_FORMAT").or_else(|| read_env("GOLDSMITH_LOG_FORMAT"));
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
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(signing_secret) = overrides.session_signing_secret {
            self.session.signing_secret = secret_value(signing_secret);
        }
        if let Some(enabled) = overrides.pricing_enabled {
            self.pricing.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_session(&self.session)?;
        validate_pricing(&self.pricing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("goldsmith.toml"), PathBuf::from("config/goldsmith.toml")]
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

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
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

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    let secret = session.signing_secret.expose_secret();
    if secret.trim().is_empty() {
        return Err(ConfigError::Validation(
            "session.signing_secret is required (set GOLDSMITH_SESSION_SIGNING_SECRET)".to_string(),
        ));
    }
    if secret.len() < MIN_SIGNING_SECRET_LEN {
        return Err(ConfigError::Validation(format!(
            "session.signing_secret must be at least {MIN_SIGNING_SECRET_LEN} characters"
        )));
    }

    if session.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if !pricing.enabled {
        return Ok(());
    }

    if !pricing.api_url.starts_with("http://") && !pricing.api_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "pricing.api_url must start with http:// or https://".to_string(),
        ));
    }

    if pricing.metals.iter().all(|metal| metal.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "pricing.metals must name at least one metal when pricing is enabled".to_string(),
        ));
    }

    let currency = pricing.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(
            "pricing.currency must be a three-letter currency code".to_string(),
        ));
    }

    if pricing.interval_secs < 60 {
        return Err(ConfigError::Validation(
            "pricing.interval_secs must be at least 60".to_string(),
        ));
    }

    if pricing.timeout_secs == 0 || pricing.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "pricing.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    session: Option<SessionPatch>,
    pricing: Option<PricingPatch>,
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
struct SessionPatch {
    signing_secret: Option<String>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    enabled: Option<bool>,
    api_url: Option<String>,
    api_key: Option<String>,
    currency: Option<String>,
    metals: Option<Vec<String>>,
    interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
