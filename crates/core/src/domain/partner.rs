use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoldsmithId(pub String);

impl CustomerId {
    pub fn generate() -> Self {
        Self(format!("CUS-{}", Uuid::new_v4().simple()))
    }
}

impl GoldsmithId {
    pub fn generate() -> Self {
        Self(format!("GSM-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GoldsmithId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
    Pending,
    Approved,
    Suspended,
    Rejected,
}

impl PartnerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for PartnerStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "suspended" => Ok(Self::Suspended),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported partner status `{other}` (expected pending|approved|suspended|rejected)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goldsmith {
    pub id: GoldsmithId,
    pub name: String,
    pub email: String,
    pub city: String,
    pub specialties: Vec<String>,
    pub status: PartnerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PartnerApplication {
    pub name: String,
    pub email: String,
    pub city: String,
    #[serde(default)]
    pub specialties: Vec<String>,
}

impl Customer {
    pub fn register(
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = required("customer name", name)?;
        let email = validated_email(email)?;
        Ok(Self { id: CustomerId::generate(), name, email, created_at: now })
    }
}

impl Goldsmith {
    pub fn apply(application: PartnerApplication, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let name = required("goldsmith name", &application.name)?;
        let email = validated_email(&application.email)?;
        let city = required("goldsmith city", &application.city)?;
        let specialties = application
            .specialties
            .iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();

        Ok(Self {
            id: GoldsmithId::generate(),
            name,
            email,
            city,
            specialties,
            status: PartnerStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn accepts_orders(&self) -> bool {
        self.status == PartnerStatus::Approved
    }
}

fn required(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvariantViolation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn validated_email(value: &str) -> Result<String, DomainError> {
    let email = value.trim().to_ascii_lowercase();
    let well_formed = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !well_formed {
        return Err(DomainError::InvariantViolation(format!("`{value}` is not a valid email")));
    }
    Ok(email)
}
