pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod session;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::order::{NewOrder, OrderId, OrderRequest, OrderStatus, ReferenceImage};
pub use domain::partner::{
    Customer, CustomerId, Goldsmith, GoldsmithId, PartnerApplication, PartnerStatus,
};
pub use domain::pricing::{
    ingest_prices, IngestionReport, MetalPrice, MetalPriceStore, PriceFeed, PriceFeedError,
};
pub use domain::report::{GoldsmithLoad, OrderReport};
pub use domain::settings::{SettingsUpdate, SiteSettings};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{
    allowed_statuses, render_progress, Actor, ActorRole, OrderProgress, StatusTransitionError,
    StatusUpdateEngine,
};
pub use session::{SessionClaims, SessionError, SessionSigner};
