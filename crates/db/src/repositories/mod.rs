use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use goldsmith_core::audit::AuditEvent;
use goldsmith_core::domain::order::{OrderId, OrderRequest, OrderStatus};
use goldsmith_core::domain::partner::{
    Customer, CustomerId, Goldsmith, GoldsmithId, PartnerStatus,
};
use goldsmith_core::domain::pricing::MetalPrice;
use goldsmith_core::domain::settings::SiteSettings;
use goldsmith_core::errors::ApplicationError;
use goldsmith_core::flows::{Actor, ActorRole, StatusChange};

pub mod audit;
pub mod memory;
pub mod order;
pub mod partner;
pub mod pricing;
pub mod settings;

pub use audit::SqlAuditEventRepository;
pub use memory::{
    InMemoryGoldsmithRepository, InMemoryMetalPriceRepository, InMemoryOrderRepository,
    InMemorySettingsRepository,
};
pub use order::SqlOrderRepository;
pub use partner::{SqlCustomerRepository, SqlGoldsmithRepository};
pub use pricing::SqlMetalPriceRepository;
pub use settings::SqlSettingsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Which orders a listing may return.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<CustomerId>,
    pub goldsmith_id: Option<GoldsmithId>,
    pub hide_unreviewed: bool,
}

impl OrderFilter {
    /// Customers see their own orders, goldsmiths see reviewed orders assigned to them,
    /// admins see everything.
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            ActorRole::Admin => Self::default(),
            ActorRole::Goldsmith => Self {
                goldsmith_id: Some(GoldsmithId(actor.subject_id.clone())),
                hide_unreviewed: true,
                ..Self::default()
            },
            ActorRole::Customer => Self {
                customer_id: Some(CustomerId(actor.subject_id.clone())),
                ..Self::default()
            },
        }
    }

    pub fn with_status(mut self, status: Option<OrderStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn matches(&self, order: &OrderRequest) -> bool {
        if self.status.is_some_and(|status| status != order.status) {
            return false;
        }
        if self.customer_id.as_ref().is_some_and(|id| id != &order.customer_id) {
            return false;
        }
        if self.goldsmith_id.as_ref().is_some_and(|id| !order.is_assigned_to(id)) {
            return false;
        }
        !(self.hide_unreviewed && !order.status.visible_to_goldsmith())
    }
}

/// What happened when a goldsmith was assigned to an order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assignment {
    /// The goldsmith was written. `change` is set when a `new` order advanced to
    /// `pending_goldsmith_review` in the same transaction.
    Assigned { order: OrderRequest, change: Option<StatusChange> },
    Missing,
    /// The order is completed or cancelled and keeps its current goldsmith.
    Closed(OrderStatus),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &OrderRequest) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<OrderRequest>, RepositoryError>;
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderRequest>, RepositoryError>;

    /// Writes `change.to` and `change.changed_at` and appends the history row in one
    /// transaction. With `assignee` set, only an order still assigned to that goldsmith
    /// is written. `None` when no row matched; nothing is written then.
    async fn record_status_change(
        &self,
        change: &StatusChange,
        assignee: Option<&GoldsmithId>,
    ) -> Result<Option<OrderRequest>, RepositoryError>;

    /// Sets the goldsmith on an open order. A `new` order advances to
    /// `pending_goldsmith_review`; any other status is left as stored.
    async fn assign_goldsmith(
        &self,
        id: &OrderId,
        goldsmith_id: &GoldsmithId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Assignment, RepositoryError>;

    async fn list_history(&self, id: &OrderId) -> Result<Vec<StatusChange>, RepositoryError>;

    async fn status_counts(&self) -> Result<Vec<(OrderStatus, u64)>, RepositoryError>;
    async fn goldsmith_counts(&self) -> Result<Vec<(Option<String>, u64)>, RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn insert(&self, customer: &Customer) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, RepositoryError>;
}

#[async_trait]
pub trait GoldsmithRepository: Send + Sync {
    async fn save(&self, goldsmith: &Goldsmith) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &GoldsmithId) -> Result<Option<Goldsmith>, RepositoryError>;
    async fn list(&self, status: Option<PartnerStatus>) -> Result<Vec<Goldsmith>, RepositoryError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(&self) -> Result<Option<SiteSettings>, RepositoryError>;
    async fn save(&self, settings: &SiteSettings) -> Result<(), RepositoryError>;

    async fn load_or_init(&self, now: DateTime<Utc>) -> Result<SiteSettings, RepositoryError> {
        if let Some(settings) = self.load().await? {
            return Ok(settings);
        }
        let settings = SiteSettings::initial(now);
        self.save(&settings).await?;
        Ok(settings)
    }
}

#[async_trait]
pub trait MetalPriceRepository: Send + Sync {
    async fn upsert(&self, price: &MetalPrice) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<MetalPrice>, RepositoryError>;
}

#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_order(&self, order_id: &OrderId) -> Result<Vec<AuditEvent>, RepositoryError>;
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{field} `{raw}`: {error}")))
}

pub(crate) fn decode<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    use sqlx::Row;
    row.try_get(column).map_err(|error| RepositoryError::Decode(error.to_string()))
}
