use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAINTENANCE_MESSAGE: &str =
    "Goldsmith Connect is undergoing scheduled maintenance. Please check back shortly.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub maintenance_mode: bool,
    pub maintenance_message: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsUpdate {
    pub maintenance_mode: Option<bool>,
    pub maintenance_message: Option<String>,
}

impl SiteSettings {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            maintenance_mode: false,
            maintenance_message: DEFAULT_MAINTENANCE_MESSAGE.to_string(),
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: SettingsUpdate, now: DateTime<Utc>) {
        if let Some(maintenance_mode) = update.maintenance_mode {
            self.maintenance_mode = maintenance_mode;
        }
        if let Some(message) = update.maintenance_message {
            let message = message.trim();
            self.maintenance_message = if message.is_empty() {
                DEFAULT_MAINTENANCE_MESSAGE.to_string()
            } else {
                message.to_string()
            };
        }
        self.updated_at = now;
    }
}
