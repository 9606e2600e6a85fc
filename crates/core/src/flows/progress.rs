//! Maps an order status onto the five customer-facing progress stages.
//!
//! Stage lookup is an exhaustive match on [`OrderStatus`], so adding a status
//! without giving it a stage is a compile error rather than a silent fallback.
//! Cancellation is checked first and rendered on its own, since it has no place
//! in the ordered stage list.

use serde::{Deserialize, Serialize};

use crate::domain::order::OrderStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    EnquiryRaised,
    OrderAccepted,
    WorkInProgress,
    OutForDelivery,
    OrderDelivered,
}

impl ProgressStage {
    pub const ORDERED: [ProgressStage; 5] = [
        ProgressStage::EnquiryRaised,
        ProgressStage::OrderAccepted,
        ProgressStage::WorkInProgress,
        ProgressStage::OutForDelivery,
        ProgressStage::OrderDelivered,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::EnquiryRaised => "Enquiry Raised",
            Self::OrderAccepted => "Order Accepted",
            Self::WorkInProgress => "Work in Progress",
            Self::OutForDelivery => "Out for Delivery",
            Self::OrderDelivered => "Order Delivered",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::EnquiryRaised => 0,
            Self::OrderAccepted => 1,
            Self::WorkInProgress => 2,
            Self::OutForDelivery => 3,
            Self::OrderDelivered => 4,
        }
    }

    /// Stage that a non-cancelled status belongs to.
    pub fn for_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::New => Some(Self::EnquiryRaised),
            OrderStatus::PendingGoldsmithReview => Some(Self::OrderAccepted),
            OrderStatus::InProgress
            | OrderStatus::ArtworkCompleted
            | OrderStatus::CustomerReviewRequested => Some(Self::WorkInProgress),
            OrderStatus::Shipped => Some(Self::OutForDelivery),
            OrderStatus::Completed => Some(Self::OrderDelivered),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn matches(self, status: OrderStatus) -> bool {
        Self::for_status(status) == Some(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Completed,
    Active,
    Future,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub stage: ProgressStage,
    pub label: &'static str,
    pub state: StageState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum OrderProgress {
    Stages { stages: [StageView; 5] },
    Cancelled,
    /// A status string from an untyped source that names no known status.
    Unknown { raw: String },
}

impl OrderProgress {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn stages(&self) -> Option<&[StageView; 5]> {
        match self {
            Self::Stages { stages } => Some(stages),
            Self::Cancelled | Self::Unknown { .. } => None,
        }
    }

    pub fn active_stage(&self) -> Option<ProgressStage> {
        self.stages()?.iter().find(|view| view.state == StageState::Active).map(|view| view.stage)
    }

    pub fn count(&self, state: StageState) -> usize {
        self.stages().map_or(0, |stages| stages.iter().filter(|view| view.state == state).count())
    }
}

pub fn render_progress(status: OrderStatus) -> OrderProgress {
    if status == OrderStatus::Cancelled {
        return OrderProgress::Cancelled;
    }
    let Some(active) = ProgressStage::for_status(status) else {
        return OrderProgress::Unknown { raw: status.as_str().to_string() };
    };

    let stages = ProgressStage::ORDERED.map(|stage| StageView {
        stage,
        label: stage.label(),
        state: if stage.matches(status) {
            StageState::Active
        } else if stage.index() < active.index() {
            StageState::Completed
        } else {
            StageState::Future
        },
    });

    OrderProgress::Stages { stages }
}

pub fn render_progress_raw(raw: &str) -> OrderProgress {
    match raw.parse::<OrderStatus>() {
        Ok(status) => render_progress(status),
        Err(_) => OrderProgress::Unknown { raw: raw.to_string() },
    }
}
