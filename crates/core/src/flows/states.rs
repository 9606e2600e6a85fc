use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::{OrderId, OrderStatus};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Goldsmith,
    Customer,
}

impl ActorRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Goldsmith => "goldsmith",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "goldsmith" => Ok(Self::Goldsmith),
            "customer" => Ok(Self::Customer),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported actor role `{other}` (expected admin|goldsmith|customer)"
            ))),
        }
    }
}

/// The authenticated party driving a change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: ActorRole,
    pub subject_id: String,
}

impl Actor {
    pub fn new(role: ActorRole, subject_id: impl Into<String>) -> Self {
        Self { role, subject_id: subject_id.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Forward,
    Backward,
    Cancellation,
    Unchanged,
}

impl ChangeKind {
    pub fn classify(from: OrderStatus, to: OrderStatus) -> Self {
        if from == to {
            return Self::Unchanged;
        }
        match (from.progress_rank(), to.progress_rank()) {
            (_, None) => Self::Cancellation,
            // Leaving cancellation re-enters the lifecycle; treated as a reversal.
            (None, Some(_)) => Self::Backward,
            (Some(current), Some(next)) if next > current => Self::Forward,
            (Some(_), Some(_)) => Self::Backward,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Cancellation => "cancellation",
            Self::Unchanged => "unchanged",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            "cancellation" => Ok(Self::Cancellation),
            "unchanged" => Ok(Self::Unchanged),
            other => Err(DomainError::InvariantViolation(format!("unknown change kind `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub kind: ChangeKind,
    pub actor: Actor,
    pub changed_at: DateTime<Utc>,
}
