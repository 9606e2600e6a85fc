//! Metal price feed client, the periodic refresh task and the public price listing.
//!
//! The feed is polled with `GET {api_url}/latest?metal=<metal>&currency=<code>` and
//! must answer with `{"price_per_gram": <number or string>}`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use goldsmith_core::config::PricingConfig;
use goldsmith_core::domain::pricing::{
    ingest_prices, IngestionReport, MetalPrice, MetalPriceStore, PriceFeed, PriceFeedError,
};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::CorrelationId;
use crate::error::ApiError;

pub struct HttpPriceFeed {
    client: Client,
    api_url: String,
    api_key: Option<SecretString>,
}

impl HttpPriceFeed {
    pub fn from_config(config: &PricingConfig) -> Result<Self, PriceFeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| PriceFeedError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch(&self, metal: &str, currency: &str) -> Result<Decimal, PriceFeedError> {
        let mut request = self
            .client
            .get(format!("{}/latest", self.api_url))
            .query(&[("metal", metal), ("currency", currency)]);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| PriceFeedError::Transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(PriceFeedError::Status { status: response.status().as_u16() });
        }

        let payload: Value =
            response.json().await.map_err(|error| PriceFeedError::Decode(error.to_string()))?;
        parse_price(&payload)
    }
}

/// Reads `price_per_gram` from a feed payload. Numbers and numeric strings are
/// both accepted.
pub fn parse_price(payload: &Value) -> Result<Decimal, PriceFeedError> {
    let raw = match payload.get("price_per_gram") {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => {
            return Err(PriceFeedError::Decode(format!("price_per_gram is not numeric: {other}")))
        }
        None => return Err(PriceFeedError::Decode("price_per_gram is missing".to_string())),
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|error| PriceFeedError::Decode(format!("price_per_gram `{raw}`: {error}")))
}

pub async fn run_once(
    feed: &dyn PriceFeed,
    store: &dyn MetalPriceStore,
    config: &PricingConfig,
) -> IngestionReport {
    ingest_prices(feed, store, &config.metals, &config.currency, Utc::now()).await
}

/// Refreshes prices every `interval_secs`, starting immediately.
pub fn spawn_scheduler(
    feed: Arc<dyn PriceFeed>,
    store: Arc<dyn MetalPriceStore>,
    config: PricingConfig,
) -> JoinHandle<()> {
    let period = Duration::from_secs(config.interval_secs.max(1));
    info!(
        event_name = "pricing.scheduler.start",
        interval_secs = period.as_secs(),
        metals = config.metals.len(),
        currency = %config.currency,
        "metal price scheduler started"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let report = run_once(feed.as_ref(), store.as_ref(), &config).await;
            if !report.is_clean() {
                warn!(
                    event_name = "pricing.scheduler.partial_run",
                    failed = report.failed.len(),
                    updated = report.updated.len(),
                    "metal price refresh finished with failures"
                );
            }
        }
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/prices", get(list_prices))
}

async fn list_prices(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
) -> Result<Json<Vec<MetalPrice>>, ApiError> {
    let prices = state
        .prices
        .list()
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?;
    Ok(Json(prices))
}
