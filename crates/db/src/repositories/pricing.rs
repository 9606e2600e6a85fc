use std::str::FromStr;

use rust_decimal::Decimal;

use goldsmith_core::domain::pricing::{MetalPrice, MetalPriceStore, PriceFeedError};

use super::{decode, parse_timestamp, MetalPriceRepository, RepositoryError};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlMetalPriceRepository {
    pool: DbPool,
}

impl SqlMetalPriceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_price(row: &sqlx::sqlite::SqliteRow) -> Result<MetalPrice, RepositoryError> {
    let metal: String = decode(row, "metal")?;
    let currency: String = decode(row, "currency")?;
    let price_per_gram: String = decode(row, "price_per_gram")?;
    let fetched_at: String = decode(row, "fetched_at")?;

    let price_per_gram = Decimal::from_str(&price_per_gram)
        .map_err(|error| RepositoryError::Decode(format!("price_per_gram: {error}")))?;

    Ok(MetalPrice {
        metal,
        currency,
        price_per_gram,
        fetched_at: parse_timestamp("fetched_at", &fetched_at)?,
    })
}

#[async_trait::async_trait]
impl MetalPriceRepository for SqlMetalPriceRepository {
    async fn upsert(&self, price: &MetalPrice) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO metal_price (metal, currency, price_per_gram, fetched_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(metal, currency) DO UPDATE SET
                 price_per_gram = excluded.price_per_gram,
                 fetched_at = excluded.fetched_at",
        )
        .bind(&price.metal)
        .bind(&price.currency)
        .bind(price.price_per_gram.to_string())
        .bind(price.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<MetalPrice>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT metal, currency, price_per_gram, fetched_at
             FROM metal_price
             ORDER BY metal ASC, currency ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_price).collect()
    }
}

#[async_trait::async_trait]
impl MetalPriceStore for SqlMetalPriceRepository {
    async fn upsert_price(&self, price: MetalPrice) -> Result<(), PriceFeedError> {
        self.upsert(&price).await.map_err(|error| PriceFeedError::Store(error.to_string()))
    }
}
