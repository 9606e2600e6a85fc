use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::partner::{CustomerId, GoldsmithId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(format!("ORD-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PendingGoldsmithReview,
    InProgress,
    ArtworkCompleted,
    CustomerReviewRequested,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Canonical progress order, with the absorbing cancellation state last.
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::New,
        OrderStatus::PendingGoldsmithReview,
        OrderStatus::InProgress,
        OrderStatus::ArtworkCompleted,
        OrderStatus::CustomerReviewRequested,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::PendingGoldsmithReview => "pending_goldsmith_review",
            Self::InProgress => "in_progress",
            Self::ArtworkCompleted => "artwork_completed",
            Self::CustomerReviewRequested => "customer_review_requested",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Position in the linear lifecycle. `Cancelled` sits outside of it.
    pub fn progress_rank(self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::PendingGoldsmithReview => Some(1),
            Self::InProgress => Some(2),
            Self::ArtworkCompleted => Some(3),
            Self::CustomerReviewRequested => Some(4),
            Self::Shipped => Some(5),
            Self::Completed => Some(6),
            Self::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Orders that have not been through admin review are never shown to partners.
    pub fn visible_to_goldsmith(self) -> bool {
        !matches!(self, Self::New)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownStatus(value.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReferenceImage {
    DataUri(String),
    HostedUrl(String),
}

impl ReferenceImage {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.starts_with("data:image/") {
            return Ok(Self::DataUri(trimmed.to_string()));
        }
        if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
            return Ok(Self::HostedUrl(trimmed.to_string()));
        }
        Err(DomainError::InvariantViolation(
            "reference image must be a data:image/ URI or an http(s) URL".to_string(),
        ))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DataUri(value) | Self::HostedUrl(value) => value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub item: String,
    pub details: String,
    pub reference_image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub goldsmith_id: Option<GoldsmithId>,
    pub item: String,
    pub details: String,
    pub reference_image: Option<ReferenceImage>,
    pub status: OrderStatus,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRequest {
    pub fn place(new_order: NewOrder, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let item = new_order.item.trim();
        if item.is_empty() {
            return Err(DomainError::InvariantViolation("order item is required".to_string()));
        }
        let details = new_order.details.trim();
        if details.is_empty() {
            return Err(DomainError::InvariantViolation(
                "order details are required".to_string(),
            ));
        }
        let reference_image = match new_order.reference_image.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(ReferenceImage::parse(raw)?),
            _ => None,
        };

        Ok(Self {
            id: OrderId::generate(),
            customer_id: new_order.customer_id,
            goldsmith_id: None,
            item: item.to_string(),
            details: details.to_string(),
            reference_image,
            status: OrderStatus::New,
            requested_at: now,
            updated_at: now,
        })
    }

    /// Writes a new status and refreshes `updated_at`.
    pub fn apply_status(&mut self, next: OrderStatus, now: DateTime<Utc>) {
        self.status = next;
        self.updated_at = self.change_timestamp(now);
    }

    /// Timestamp for a change made at `now`. Always strictly after `requested_at`,
    /// even when the clock has not advanced or runs behind.
    pub fn change_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.requested_at + Duration::microseconds(1))
    }

    pub fn is_assigned_to(&self, goldsmith_id: &GoldsmithId) -> bool {
        self.goldsmith_id.as_ref() == Some(goldsmith_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{NewOrder, OrderRequest, OrderStatus, ReferenceImage};
    use crate::domain::partner::CustomerId;
    use crate::errors::DomainError;

    fn new_order() -> NewOrder {
        NewOrder {
            customer_id: CustomerId("CUS-1".to_string()),
            item: "  Engagement ring ".to_string(),
            details: "18k yellow gold, 1ct solitaire".to_string(),
            reference_image: Some("https://images.example.com/ring.png".to_string()),
        }
    }

    #[test]
    fn placed_orders_start_new_with_matching_timestamps() {
        let now = Utc::now();
        let order = OrderRequest::place(new_order(), now).expect("valid order");

        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.requested_at, now);
        assert_eq!(order.updated_at, now);
        assert_eq!(order.item, "Engagement ring");
        assert!(order.goldsmith_id.is_none());
        assert!(order.id.0.starts_with("ORD-"));
        assert!(matches!(order.reference_image, Some(ReferenceImage::HostedUrl(_))));
    }

    #[test]
    fn placing_without_details_is_rejected() {
        let mut input = new_order();
        input.details = "   ".to_string();

        let error = OrderRequest::place(input, Utc::now()).expect_err("details are required");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn reference_image_accepts_data_uri_and_rejects_other_schemes() {
        assert!(matches!(
            ReferenceImage::parse("data:image/png;base64,iVBORw0KGgo="),
            Ok(ReferenceImage::DataUri(_))
        ));
        assert!(ReferenceImage::parse("ftp://example.com/ring.png").is_err());
    }

    #[test]
    fn apply_status_refreshes_updated_at_without_touching_requested_at() {
        let requested_at = Utc::now() - Duration::hours(2);
        let mut order = OrderRequest::place(new_order(), requested_at).expect("valid order");

        let now = Utc::now();
        order.apply_status(OrderStatus::Shipped, now);

        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.requested_at, requested_at);
        assert_eq!(order.updated_at, now);
        assert!(order.updated_at > order.requested_at);
    }

    #[test]
    fn apply_status_never_moves_updated_at_before_requested_at() {
        let requested_at = Utc::now();
        let mut order = OrderRequest::place(new_order(), requested_at).expect("valid order");

        order.apply_status(OrderStatus::InProgress, requested_at - Duration::minutes(5));

        assert!(order.updated_at > order.requested_at);
        assert_eq!(order.updated_at, requested_at + Duration::microseconds(1));
    }

    #[test]
    fn change_in_the_same_instant_as_placement_still_advances_updated_at() {
        let requested_at = Utc::now();
        let mut order = OrderRequest::place(new_order(), requested_at).expect("valid order");

        order.apply_status(OrderStatus::Shipped, requested_at);

        assert!(order.updated_at > order.requested_at);
    }

    #[test]
    fn status_parsing_is_strict() {
        assert_eq!(
            "customer_review_requested".parse::<OrderStatus>().expect("known status"),
            OrderStatus::CustomerReviewRequested
        );
        let error = "on_hold".parse::<OrderStatus>().expect_err("unknown status");
        assert_eq!(error, DomainError::UnknownStatus("on_hold".to_string()));
    }

    #[test]
    fn every_status_round_trips_through_its_storage_name() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
    }

    #[test]
    fn only_new_orders_are_hidden_from_goldsmiths() {
        let hidden: Vec<_> =
            OrderStatus::ALL.into_iter().filter(|status| !status.visible_to_goldsmith()).collect();
        assert_eq!(hidden, vec![OrderStatus::New]);
    }
}
