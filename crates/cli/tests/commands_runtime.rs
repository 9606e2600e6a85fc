use std::env;
use std::sync::{Mutex, OnceLock};

use goldsmith_cli::commands::{issue_session, migrate, seed};
use serde_json::Value;

const SECRET: &str = "cli-runtime-test-signing-secret-0123456789";

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir, "migrate.db");

    with_env(&[("GOLDSMITH_SESSION_SIGNING_SECRET", SECRET), ("GOLDSMITH_DATABASE_URL", &url)], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_signing_secret() {
    with_env(&[("GOLDSMITH_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_reports_every_demo_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir, "seed.db");

    with_env(&[("GOLDSMITH_SESSION_SIGNING_SECRET", SECRET), ("GOLDSMITH_DATABASE_URL", &url)], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected demo seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.starts_with("demo dataset loaded: 2 customers, 3 goldsmiths, 4 orders"));
        assert!(message.contains("  - ORD-demo-002: in_progress (Accepted by a partner and on the bench)"));
        assert!(message.contains("  - ORD-demo-004: cancelled (Cancelled by the partner after review)"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir, "seed-twice.db");

    with_env(&[("GOLDSMITH_SESSION_SIGNING_SECRET", SECRET), ("GOLDSMITH_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn issued_session_carries_role_and_subject() {
    with_env(&[("GOLDSMITH_SESSION_SIGNING_SECRET", SECRET)], || {
        let result = issue_session::run("admin", "ADM-ops");
        assert_eq!(result.exit_code, 0, "expected issued session: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "issue-session");
        assert_eq!(payload["role"], "admin");
        assert_eq!(payload["subject_id"], "ADM-ops");
        assert!(payload["token"].as_str().is_some_and(|token| token.contains('.')));
    });
}

#[test]
fn issue_session_rejects_unknown_role() {
    with_env(&[("GOLDSMITH_SESSION_SIGNING_SECRET", SECRET)], || {
        let result = issue_session::run("jeweller", "ADM-ops");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

fn database_url(dir: &tempfile::TempDir, name: &str) -> String {
    format!("sqlite://{}", dir.path().join(name).display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GOLDSMITH_DATABASE_URL",
        "GOLDSMITH_DATABASE_MAX_CONNECTIONS",
        "GOLDSMITH_DATABASE_TIMEOUT_SECS",
        "GOLDSMITH_SERVER_BIND_ADDRESS",
        "GOLDSMITH_SERVER_PORT",
        "GOLDSMITH_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "GOLDSMITH_SESSION_SIGNING_SECRET",
        "GOLDSMITH_SESSION_TTL_SECS",
        "GOLDSMITH_PRICING_ENABLED",
        "GOLDSMITH_PRICING_API_URL",
        "GOLDSMITH_PRICING_API_KEY",
        "GOLDSMITH_PRICING_CURRENCY",
        "GOLDSMITH_PRICING_METALS",
        "GOLDSMITH_PRICING_INTERVAL_SECS",
        "GOLDSMITH_PRICING_TIMEOUT_SECS",
        "GOLDSMITH_LOGGING_LEVEL",
        "GOLDSMITH_LOGGING_FORMAT",
        "GOLDSMITH_LOG_LEVEL",
        "GOLDSMITH_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
