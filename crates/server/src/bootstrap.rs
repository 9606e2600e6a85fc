use chrono::Utc;
use goldsmith_core::config::{AppConfig, ConfigError, LoadOptions};
use goldsmith_core::session::SessionSigner;
use goldsmith_db::repositories::{SettingsRepository, SqlSettingsRepository};
use goldsmith_db::{connect_with_config, migrations, DbPool, RepositoryError};
use thiserror::Error;
use tracing::info;

use crate::app::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("site settings could not be loaded: {0}")]
    Settings(#[source] RepositoryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Connects, migrates and loads persisted site settings for an already loaded config.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let settings = SqlSettingsRepository::new(db_pool.clone())
        .load_or_init(Utc::now())
        .await
        .map_err(BootstrapError::Settings)?;
    info!(
        event_name = "system.bootstrap.settings_loaded",
        correlation_id = "bootstrap",
        maintenance_mode = settings.maintenance_mode,
        "site settings loaded"
    );

    let sessions =
        SessionSigner::new(config.session.signing_secret.clone(), config.session.ttl_secs);
    let state = AppState::from_pool(db_pool.clone(), sessions, settings);

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use goldsmith_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    const SECRET: &str = "bootstrap-test-signing-secret-0123456789";

    fn overrides(database_url: &str, secret: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                session_signing_secret: secret.map(str::to_string),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_signing_secret() {
        let result = bootstrap(overrides("sqlite::memory:", Some(""))).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("session.signing_secret"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_seeds_site_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("bootstrap.db").display());

        let app = bootstrap(overrides(&url, Some(SECRET))).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('order_request', 'order_status_history', \
             'site_settings', 'audit_event')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 4);

        let (settings_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM site_settings")
            .fetch_one(&app.db_pool)
            .await
            .expect("settings query");
        assert_eq!(settings_rows, 1);
        assert!(!app.state.maintenance.snapshot().await.maintenance_mode);

        app.db_pool.close().await;
    }
}
