//! Metal spot prices and the ingestion run that refreshes them.
//!
//! A run fetches every configured metal independently: a failed fetch or a failed
//! write for one metal is recorded in the [`IngestionReport`] and the run moves on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetalPrice {
    pub metal: String,
    pub currency: String,
    pub price_per_gram: Decimal,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PriceFeedError {
    #[error("price feed request failed: {0}")]
    Transport(String),
    #[error("price feed returned status {status}")]
    Status { status: u16 },
    #[error("price feed payload could not be decoded: {0}")]
    Decode(String),
    #[error("price feed returned a non-positive price `{price}` for {metal}")]
    NonPositive { metal: String, price: Decimal },
    #[error("price store write failed: {0}")]
    Store(String),
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch(&self, metal: &str, currency: &str) -> Result<Decimal, PriceFeedError>;
}

#[async_trait]
pub trait MetalPriceStore: Send + Sync {
    async fn upsert_price(&self, price: MetalPrice) -> Result<(), PriceFeedError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestionFailure {
    pub metal: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub updated: Vec<MetalPrice>,
    pub failed: Vec<IngestionFailure>,
}

impl IngestionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub async fn ingest_prices<F, S>(
    feed: &F,
    store: &S,
    metals: &[String],
    currency: &str,
    now: DateTime<Utc>,
) -> IngestionReport
where
    F: PriceFeed + ?Sized,
    S: MetalPriceStore + ?Sized,
{
    let mut report = IngestionReport::default();

    for metal in metals {
        let outcome = async {
            let price_per_gram = feed.fetch(metal, currency).await?;
            if price_per_gram <= Decimal::ZERO {
                return Err(PriceFeedError::NonPositive {
                    metal: metal.clone(),
                    price: price_per_gram,
                });
            }
            let price = MetalPrice {
                metal: metal.clone(),
                currency: currency.to_string(),
                price_per_gram,
                fetched_at: now,
            };
            store.upsert_price(price.clone()).await?;
            Ok::<MetalPrice, PriceFeedError>(price)
        }
        .await;

        match outcome {
            Ok(price) => report.updated.push(price),
            Err(error) => {
                warn!(
                    event_name = "pricing.ingest.item_failed",
                    metal = %metal,
                    currency = %currency,
                    error = %error,
                    "metal price ingestion failed for item"
                );
                report.failed.push(IngestionFailure { metal: metal.clone(), reason: error.to_string() });
            }
        }
    }

    info!(
        event_name = "pricing.ingest.completed",
        updated = report.updated.len(),
        failed = report.failed.len(),
        "metal price ingestion run completed"
    );
    report
}
