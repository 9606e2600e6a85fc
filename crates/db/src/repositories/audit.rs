use std::collections::BTreeMap;

use goldsmith_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use goldsmith_core::domain::order::OrderId;

use super::{decode, parse_timestamp, AuditEventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditEventRepository {
    pool: DbPool,
}

impl SqlAuditEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_category(raw: &str) -> Result<AuditCategory, RepositoryError> {
    match raw {
        "ingress" => Ok(AuditCategory::Ingress),
        "order" => Ok(AuditCategory::Order),
        "partner" => Ok(AuditCategory::Partner),
        "settings" => Ok(AuditCategory::Settings),
        "pricing" => Ok(AuditCategory::Pricing),
        "system" => Ok(AuditCategory::System),
        other => Err(RepositoryError::Decode(format!("unknown audit category `{other}`"))),
    }
}

fn outcome_as_str(outcome: &AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Rejected => "rejected",
        AuditOutcome::Failed => "failed",
    }
}

fn parse_outcome(raw: &str) -> Result<AuditOutcome, RepositoryError> {
    match raw {
        "success" => Ok(AuditOutcome::Success),
        "rejected" => Ok(AuditOutcome::Rejected),
        "failed" => Ok(AuditOutcome::Failed),
        other => Err(RepositoryError::Decode(format!("unknown audit outcome `{other}`"))),
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let id: String = decode(row, "id")?;
    let order_id: Option<String> = decode(row, "order_id")?;
    let correlation_id: String = decode(row, "correlation_id")?;
    let event_type: String = decode(row, "event_type")?;
    let category: String = decode(row, "category")?;
    let actor: String = decode(row, "actor")?;
    let outcome: String = decode(row, "outcome")?;
    let metadata_json: String = decode(row, "metadata_json")?;
    let occurred_at: String = decode(row, "occurred_at")?;

    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(AuditEvent {
        event_id: id,
        order_id: order_id.map(OrderId),
        correlation_id,
        event_type,
        category: parse_category(&category)?,
        actor,
        outcome: parse_outcome(&outcome)?,
        metadata,
        occurred_at: parse_timestamp("occurred_at", &occurred_at)?,
    })
}

#[async_trait::async_trait]
impl AuditEventRepository for SqlAuditEventRepository {
    async fn append(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&event.metadata)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO audit_event (id, order_id, correlation_id, event_type, category,
                                      actor, outcome, metadata_json, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.order_id.as_ref().map(|id| id.0.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(event.category.as_str())
        .bind(&event.actor)
        .bind(outcome_as_str(&event.outcome))
        .bind(metadata_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_order(&self, order_id: &OrderId) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, order_id, correlation_id, event_type, category, actor, outcome,
                    metadata_json, occurred_at
             FROM audit_event
             WHERE order_id = ?
             ORDER BY occurred_at ASC",
        )
        .bind(&order_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use goldsmith_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
    use goldsmith_core::domain::order::OrderId;

    use super::SqlAuditEventRepository;
    use crate::repositories::AuditEventRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn appended_events_are_listed_per_order() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlAuditEventRepository::new(pool);

        let event = AuditEvent::new(
            Some(OrderId("ORD-1".to_string())),
            "req-1",
            "order.status_changed",
            AuditCategory::Order,
            "admin:ADM-1",
            AuditOutcome::Success,
        )
        .with_metadata("to", "shipped");
        repo.append(&event).await.expect("append");

        let listed = repo.list_for_order(&OrderId("ORD-1".to_string())).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].metadata.get("to").map(String::as_str), Some("shipped"));
        assert_eq!(listed[0].category, AuditCategory::Order);

        let none = repo.list_for_order(&OrderId("ORD-2".to_string())).await.expect("list");
        assert!(none.is_empty());
    }
}
