use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use goldsmith_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One rendered config entry: dotted key, display value, env override name.
struct Entry {
    key: &'static str,
    value: String,
    env_key: &'static str,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            Some(entry.env_key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    // Secrets are never printed, only their presence and length.
    let signing_secret =
        format!("<redacted, {} chars>", config.session.signing_secret.expose_secret().len());
    let pricing_api_key =
        if config.pricing.api_key.is_some() { "<redacted>" } else { "<unset>" }.to_string();

    vec![
        Entry {
            key: "database.url",
            value: config.database.url.clone(),
            env_key: "GOLDSMITH_DATABASE_URL",
        },
        Entry {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_key: "GOLDSMITH_DATABASE_MAX_CONNECTIONS",
        },
        Entry {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_key: "GOLDSMITH_DATABASE_TIMEOUT_SECS",
        },
        Entry {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_key: "GOLDSMITH_SERVER_BIND_ADDRESS",
        },
        Entry {
            key: "server.port",
            value: config.server.port.to_string(),
            env_key: "GOLDSMITH_SERVER_PORT",
        },
        Entry {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_key: "GOLDSMITH_SERVER_GRACEFUL_SHUTDOWN_SECS",
        },
        Entry {
            key: "session.signing_secret",
            value: signing_secret,
            env_key: "GOLDSMITH_SESSION_SIGNING_SECRET",
        },
        Entry {
            key: "session.ttl_secs",
            value: config.session.ttl_secs.to_string(),
            env_key: "GOLDSMITH_SESSION_TTL_SECS",
        },
        Entry {
            key: "pricing.enabled",
            value: config.pricing.enabled.to_string(),
            env_key: "GOLDSMITH_PRICING_ENABLED",
        },
        Entry {
            key: "pricing.api_url",
            value: config.pricing.api_url.clone(),
            env_key: "GOLDSMITH_PRICING_API_URL",
        },
        Entry {
            key: "pricing.api_key",
            value: pricing_api_key,
            env_key: "GOLDSMITH_PRICING_API_KEY",
        },
        Entry {
            key: "pricing.currency",
            value: config.pricing.currency.clone(),
            env_key: "GOLDSMITH_PRICING_CURRENCY",
        },
        Entry {
            key: "pricing.metals",
            value: config.pricing.metals.join(","),
            env_key: "GOLDSMITH_PRICING_METALS",
        },
        Entry {
            key: "pricing.interval_secs",
            value: config.pricing.interval_secs.to_string(),
            env_key: "GOLDSMITH_PRICING_INTERVAL_SECS",
        },
        Entry {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_key: "GOLDSMITH_LOGGING_LEVEL",
        },
        Entry {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_key: "GOLDSMITH_LOGGING_FORMAT",
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("goldsmith.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/goldsmith.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
