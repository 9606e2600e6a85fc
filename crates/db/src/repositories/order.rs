use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, Transaction};

use goldsmith_core::domain::order::{OrderId, OrderRequest, OrderStatus, ReferenceImage};
use goldsmith_core::domain::partner::{CustomerId, GoldsmithId};
use goldsmith_core::flows::{Actor, ActorRole, ChangeKind, StatusChange};

use super::{
    decode, parse_timestamp, Assignment, OrderFilter, OrderRepository, RepositoryError,
};
use crate::DbPool;

const ORDER_COLUMNS: &str = "id, customer_id, goldsmith_id, item, details, reference_image,
                             status, requested_at, updated_at";

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, RepositoryError> {
    raw.parse::<OrderStatus>().map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<OrderRequest, RepositoryError> {
    let id: String = decode(row, "id")?;
    let customer_id: String = decode(row, "customer_id")?;
    let goldsmith_id: Option<String> = decode(row, "goldsmith_id")?;
    let item: String = decode(row, "item")?;
    let details: String = decode(row, "details")?;
    let reference_image: Option<String> = decode(row, "reference_image")?;
    let status: String = decode(row, "status")?;
    let requested_at: String = decode(row, "requested_at")?;
    let updated_at: String = decode(row, "updated_at")?;

    let reference_image = reference_image
        .map(|raw| ReferenceImage::parse(&raw))
        .transpose()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(OrderRequest {
        id: OrderId(id),
        customer_id: CustomerId(customer_id),
        goldsmith_id: goldsmith_id.map(GoldsmithId),
        item,
        details,
        reference_image,
        status: parse_status(&status)?,
        requested_at: parse_timestamp("requested_at", &requested_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_change(row: &sqlx::sqlite::SqliteRow) -> Result<StatusChange, RepositoryError> {
    let order_id: String = decode(row, "order_id")?;
    let from_status: String = decode(row, "from_status")?;
    let to_status: String = decode(row, "to_status")?;
    let change_kind: String = decode(row, "change_kind")?;
    let actor_role: String = decode(row, "actor_role")?;
    let actor_id: String = decode(row, "actor_id")?;
    let changed_at: String = decode(row, "changed_at")?;

    let kind = change_kind
        .parse::<ChangeKind>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let role = actor_role
        .parse::<ActorRole>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(StatusChange {
        order_id: OrderId(order_id),
        from: parse_status(&from_status)?,
        to: parse_status(&to_status)?,
        kind,
        actor: Actor::new(role, actor_id),
        changed_at: parse_timestamp("changed_at", &changed_at)?,
    })
}

async fn insert_history(
    tx: &mut Transaction<'_, Sqlite>,
    change: &StatusChange,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO order_status_history (order_id, from_status, to_status, change_kind,
                                           actor_role, actor_id, changed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&change.order_id.0)
    .bind(change.from.as_str())
    .bind(change.to.as_str())
    .bind(change.kind.as_str())
    .bind(change.actor.role.as_str())
    .bind(&change.actor.subject_id)
    .bind(change.changed_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn insert(&self, order: &OrderRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO order_request (id, customer_id, goldsmith_id, item, details,
                                        reference_image, status, requested_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.customer_id.0)
        .bind(order.goldsmith_id.as_ref().map(|id| id.0.as_str()))
        .bind(&order.item)
        .bind(&order.details)
        .bind(order.reference_image.as_ref().map(ReferenceImage::as_str))
        .bind(order.status.as_str())
        .bind(order.requested_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<OrderRequest>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM order_request WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderRequest>, RepositoryError> {
        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM order_request WHERE 1 = 1"));

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(customer_id) = &filter.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id.0.clone());
        }
        if let Some(goldsmith_id) = &filter.goldsmith_id {
            query.push(" AND goldsmith_id = ").push_bind(goldsmith_id.0.clone());
        }
        if filter.hide_unreviewed {
            query.push(" AND status <> ").push_bind(OrderStatus::New.as_str());
        }
        query.push(" ORDER BY requested_at DESC, id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn record_status_change(
        &self,
        change: &StatusChange,
        assignee: Option<&GoldsmithId>,
    ) -> Result<Option<OrderRequest>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE order_request SET status = ");
        query
            .push_bind(change.to.as_str())
            .push(", updated_at = ")
            .push_bind(change.changed_at.to_rfc3339())
            .push(" WHERE id = ")
            .push_bind(change.order_id.0.clone());
        if let Some(goldsmith_id) = assignee {
            query.push(" AND goldsmith_id = ").push_bind(goldsmith_id.0.clone());
        }
        query.push(format!(" RETURNING {ORDER_COLUMNS}"));

        let Some(row) = query.build().fetch_optional(&mut *tx).await? else {
            return Ok(None);
        };
        let order = row_to_order(&row)?;

        if change.kind != ChangeKind::Unchanged {
            insert_history(&mut tx, change).await?;
        }
        tx.commit().await?;

        Ok(Some(order))
    }

    async fn assign_goldsmith(
        &self,
        id: &OrderId,
        goldsmith_id: &GoldsmithId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Assignment, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM order_request WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current.as_ref().map(row_to_order).transpose()? else {
            return Ok(Assignment::Missing);
        };
        if current.status.is_terminal() {
            return Ok(Assignment::Closed(current.status));
        }

        // The status only moves out of `new`; any other stored status is kept as is.
        let row = sqlx::query(&format!(
            "UPDATE order_request
             SET goldsmith_id = ?,
                 status = CASE WHEN status = ? THEN ? ELSE status END,
                 updated_at = ?
             WHERE id = ? AND status NOT IN (?, ?)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&goldsmith_id.0)
        .bind(OrderStatus::New.as_str())
        .bind(OrderStatus::PendingGoldsmithReview.as_str())
        .bind(current.change_timestamp(now).to_rfc3339())
        .bind(&id.0)
        .bind(OrderStatus::Completed.as_str())
        .bind(OrderStatus::Cancelled.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(order) = row.as_ref().map(row_to_order).transpose()? else {
            return Ok(Assignment::Closed(current.status));
        };

        let change = if order.status == current.status {
            None
        } else {
            let change = StatusChange {
                order_id: order.id.clone(),
                from: current.status,
                to: order.status,
                kind: ChangeKind::classify(current.status, order.status),
                actor: actor.clone(),
                changed_at: order.updated_at,
            };
            insert_history(&mut tx, &change).await?;
            Some(change)
        };
        tx.commit().await?;

        Ok(Assignment::Assigned { order, change })
    }

    async fn list_history(&self, id: &OrderId) -> Result<Vec<StatusChange>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT order_id, from_status, to_status, change_kind, actor_role, actor_id, changed_at
             FROM order_status_history
             WHERE order_id = ?
             ORDER BY id ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_change).collect()
    }

    async fn status_counts(&self) -> Result<Vec<(OrderStatus, u64)>, RepositoryError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(1) FROM order_request GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_status(&status)?, u64::try_from(count).unwrap_or(0))))
            .collect()
    }

    async fn goldsmith_counts(&self) -> Result<Vec<(Option<String>, u64)>, RepositoryError> {
        let rows: Vec<(Option<String>, i64)> =
            sqlx::query_as("SELECT goldsmith_id, COUNT(1) FROM order_request GROUP BY goldsmith_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(goldsmith_id, count)| (goldsmith_id, u64::try_from(count).unwrap_or(0)))
            .collect())
    }
}
