use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Canonical demo orders and the state the seed must leave them in.
const SEED_ORDERS: &[SeedOrderContract] = &[
    SeedOrderContract {
        order_id: "ORD-demo-001",
        customer_id: "CUS-demo-001",
        goldsmith_id: None,
        status: "new",
        history_count: 0,
        description: "Fresh enquiry awaiting admin review",
    },
    SeedOrderContract {
        order_id: "ORD-demo-002",
        customer_id: "CUS-demo-001",
        goldsmith_id: Some("GSM-demo-001"),
        status: "in_progress",
        history_count: 2,
        description: "Accepted by a partner and on the bench",
    },
    SeedOrderContract {
        order_id: "ORD-demo-003",
        customer_id: "CUS-demo-002",
        goldsmith_id: Some("GSM-demo-002"),
        status: "shipped",
        history_count: 3,
        description: "Finished piece out for delivery",
    },
    SeedOrderContract {
        order_id: "ORD-demo-004",
        customer_id: "CUS-demo-002",
        goldsmith_id: Some("GSM-demo-001"),
        status: "cancelled",
        history_count: 2,
        description: "Cancelled by the partner after review",
    },
];

const SEED_CUSTOMER_IDS: &[&str] = &["CUS-demo-001", "CUS-demo-002"];

const SEED_GOLDSMITH_IDS: &[&str] = &["GSM-demo-001", "GSM-demo-002", "GSM-demo-003"];

const SEED_METALS: &[&str] = &["gold", "silver"];

/// Demo marketplace dataset for local runs and end-to-end checks.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let orders_seeded = SEED_ORDERS
            .iter()
            .map(|order| OrderSeedInfo {
                order_id: order.order_id,
                status: order.status,
                description: order.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult {
            customers: SEED_CUSTOMER_IDS.len(),
            goldsmiths: SEED_GOLDSMITH_IDS.len(),
            orders_seeded,
        })
    }

    /// Checks that the seeded rows exist and still match the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let customers: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM customer WHERE id IN {}",
            sql_array_from_ids(SEED_CUSTOMER_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("customers".to_string(), customers == SEED_CUSTOMER_IDS.len() as i64));

        let goldsmiths: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM goldsmith WHERE id IN {}",
            sql_array_from_ids(SEED_GOLDSMITH_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("goldsmiths".to_string(), goldsmiths == SEED_GOLDSMITH_IDS.len() as i64));

        for order in SEED_ORDERS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM order_request
                               WHERE id = ?1 AND customer_id = ?2 AND status = ?3
                                 AND goldsmith_id IS ?4)",
            )
            .bind(order.order_id)
            .bind(order.customer_id)
            .bind(order.status)
            .bind(order.goldsmith_id)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{}-state", order.order_id), exists == 1));

            let history: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM order_status_history WHERE order_id = ?1")
                    .bind(order.order_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("{}-history", order.order_id), history == order.history_count));

            let last_target: Option<String> = sqlx::query_scalar(
                "SELECT to_status FROM order_status_history WHERE order_id = ?1
                 ORDER BY id DESC LIMIT 1",
            )
            .bind(order.order_id)
            .fetch_optional(pool)
            .await?;
            let history_consistent = match last_target {
                Some(target) => target == order.status,
                None => order.history_count == 0,
            };
            checks.push((format!("{}-history-head", order.order_id), history_consistent));

            if let Some(goldsmith_id) = order.goldsmith_id {
                let assignable: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM goldsmith WHERE id = ?1 AND status = 'approved')",
                )
                .bind(goldsmith_id)
                .fetch_one(pool)
                .await?;
                checks.push((format!("{}-partner-approved", order.order_id), assignable == 1));
            }
        }

        let settings: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM site_settings WHERE id = 1")
            .fetch_one(pool)
            .await?;
        checks.push(("site-settings".to_string(), settings == 1));

        let prices: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM metal_price WHERE metal IN {}",
            sql_array_from_ids(SEED_METALS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("metal-prices".to_string(), prices == SEED_METALS.len() as i64));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes seeded rows, children first.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_orders =
            sql_array_from_ids(&SEED_ORDERS.iter().map(|order| order.order_id).collect::<Vec<_>>());
        let quoted_customers = sql_array_from_ids(SEED_CUSTOMER_IDS);
        let quoted_goldsmiths = sql_array_from_ids(SEED_GOLDSMITH_IDS);

        sqlx::query(&format!("DELETE FROM order_status_history WHERE order_id IN {quoted_orders}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM order_request WHERE id IN {quoted_orders}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM customer WHERE id IN {quoted_customers}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM goldsmith WHERE id IN {quoted_goldsmiths}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedOrderContract {
    order_id: &'static str,
    customer_id: &'static str,
    goldsmith_id: Option<&'static str>,
    status: &'static str,
    history_count: i64,
    description: &'static str,
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub customers: usize,
    pub goldsmiths: usize,
    pub orders_seeded: Vec<OrderSeedInfo>,
}

#[derive(Debug)]
pub struct OrderSeedInfo {
    pub order_id: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
