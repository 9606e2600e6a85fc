use goldsmith_core::domain::settings::SiteSettings;

use super::{decode, parse_timestamp, RepositoryError, SettingsRepository};
use crate::DbPool;

pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SettingsRepository for SqlSettingsRepository {
    async fn load(&self) -> Result<Option<SiteSettings>, RepositoryError> {
        let row = sqlx::query(
            "SELECT maintenance_mode, maintenance_message, updated_at
             FROM site_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let maintenance_mode: i64 = decode(&row, "maintenance_mode")?;
        let maintenance_message: String = decode(&row, "maintenance_message")?;
        let updated_at: String = decode(&row, "updated_at")?;

        Ok(Some(SiteSettings {
            maintenance_mode: maintenance_mode != 0,
            maintenance_message,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        }))
    }

    async fn save(&self, settings: &SiteSettings) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO site_settings (id, maintenance_mode, maintenance_message, updated_at)
             VALUES (1, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 maintenance_mode = excluded.maintenance_mode,
                 maintenance_message = excluded.maintenance_message,
                 updated_at = excluded.updated_at",
        )
        .bind(i64::from(settings.maintenance_mode))
        .bind(&settings.maintenance_message)
        .bind(settings.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
