//! Which statuses each role may write.
//!
//! This table is the only place the per-role restriction lives. The status update
//! engine enforces it and the order pages read it to build their status pickers.

use crate::domain::order::OrderStatus;
use crate::flows::states::ActorRole;

const ADMIN_STATUSES: &[OrderStatus] = &OrderStatus::ALL;

const GOLDSMITH_STATUSES: &[OrderStatus] = &[
    OrderStatus::InProgress,
    OrderStatus::ArtworkCompleted,
    OrderStatus::CustomerReviewRequested,
    OrderStatus::Shipped,
    OrderStatus::Completed,
    OrderStatus::Cancelled,
];

const CUSTOMER_STATUSES: &[OrderStatus] = &[];

pub fn allowed_statuses(role: ActorRole) -> &'static [OrderStatus] {
    match role {
        ActorRole::Admin => ADMIN_STATUSES,
        ActorRole::Goldsmith => GOLDSMITH_STATUSES,
        ActorRole::Customer => CUSTOMER_STATUSES,
    }
}

pub fn is_permitted(role: ActorRole, status: OrderStatus) -> bool {
    allowed_statuses(role).contains(&status)
}
