//! Admin back-office routes. Every handler requires an admin session.
//!
//! - `GET  /api/admin/partners?status=` list goldsmith partners
//! - `POST /api/admin/partners/{id}/moderate` approve, suspend or reject a partner
//! - `POST /api/admin/orders/{id}/assign` assign an approved goldsmith to an order
//! - `GET  /api/admin/settings` current site settings
//! - `PUT  /api/admin/settings` update maintenance mode and message
//! - `GET  /api/admin/reports/orders` order counts per status and per goldsmith

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use goldsmith_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use goldsmith_core::domain::order::{OrderId, OrderRequest};
use goldsmith_core::domain::partner::{Goldsmith, GoldsmithId, PartnerStatus};
use goldsmith_core::domain::report::OrderReport;
use goldsmith_core::domain::settings::{SettingsUpdate, SiteSettings};
use goldsmith_core::errors::DomainError;
use goldsmith_core::flows::ActorRole;
use goldsmith_db::repositories::Assignment;
use serde::Deserialize;
use tracing::info;

use crate::app::AppState;
use crate::auth::Session;
use crate::error::ApiError;
use crate::orders::actor_label;

#[derive(Debug, Default, Deserialize)]
pub struct PartnerListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModerationRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub goldsmith_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/partners", get(list_partners))
        .route("/api/admin/partners/{id}/moderate", post(moderate_partner))
        .route("/api/admin/orders/{id}/assign", post(assign_order))
        .route("/api/admin/settings", get(get_settings).put(update_settings))
        .route("/api/admin/reports/orders", get(order_report))
}

async fn list_partners(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PartnerListQuery>,
) -> Result<Json<Vec<Goldsmith>>, ApiError> {
    session.require(ActorRole::Admin)?;
    let correlation_id = session.correlation_id.as_str();

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(
            raw.parse::<PartnerStatus>()
                .map_err(|error| ApiError::from_domain(error, correlation_id))?,
        ),
    };

    let partners = state
        .goldsmiths
        .list(status)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;
    Ok(Json(partners))
}

async fn moderate_partner(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(body): Json<ModerationRequest>,
) -> Result<Json<Goldsmith>, ApiError> {
    session.require(ActorRole::Admin)?;
    let correlation_id = session.correlation_id.as_str();
    let next = body
        .status
        .parse::<PartnerStatus>()
        .map_err(|error| ApiError::from_domain(error, correlation_id))?;

    let goldsmith_id = GoldsmithId(id);
    let mut goldsmith = state
        .goldsmiths
        .find_by_id(&goldsmith_id)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found(&format!("goldsmith {goldsmith_id}"), correlation_id))?;

    let previous = goldsmith.status;
    goldsmith.status = next;
    goldsmith.updated_at = Utc::now();
    state
        .goldsmiths
        .save(&goldsmith)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;

    info!(
        event_name = "partner.moderated",
        correlation_id = %correlation_id,
        goldsmith_id = %goldsmith.id,
        from = previous.as_str(),
        to = next.as_str(),
        "goldsmith partner moderated"
    );
    let moderated = AuditEvent::new(
        None,
        correlation_id,
        "partner.moderated",
        AuditCategory::Partner,
        actor_label(&session),
        AuditOutcome::Success,
    )
    .with_metadata("goldsmith_id", goldsmith.id.0.clone())
    .with_metadata("from", previous.as_str())
    .with_metadata("to", next.as_str());
    state.record_audit(vec![moderated]).await;

    Ok(Json(goldsmith))
}

/// Assigns a goldsmith. An order still in `new` moves to
/// `pending_goldsmith_review` in the same transaction.
async fn assign_order(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(body): Json<AssignmentRequest>,
) -> Result<Json<OrderRequest>, ApiError> {
    session.require(ActorRole::Admin)?;
    let correlation_id = session.correlation_id.as_str();
    let order_id = OrderId(id);
    let goldsmith_id = GoldsmithId(body.goldsmith_id.trim().to_string());

    let goldsmith = state
        .goldsmiths
        .find_by_id(&goldsmith_id)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found(&format!("goldsmith {goldsmith_id}"), correlation_id))?;
    if !goldsmith.accepts_orders() {
        return Err(ApiError::from_domain(
            DomainError::InvariantViolation(format!(
                "goldsmith {} is {} and cannot take orders",
                goldsmith.id,
                goldsmith.status.as_str()
            )),
            correlation_id,
        ));
    }

    let assignment = state
        .orders
        .assign_goldsmith(&order_id, &goldsmith.id, &session.actor(), Utc::now())
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;
    let updated = match assignment {
        Assignment::Assigned { order, change } => {
            if let Some(change) = change {
                info!(
                    event_name = "order.status.updated",
                    correlation_id = %correlation_id,
                    order_id = %change.order_id,
                    from = %change.from,
                    to = %change.to,
                    kind = change.kind.as_str(),
                    actor_role = %change.actor.role,
                    "order advanced on assignment"
                );
            }
            order
        }
        Assignment::Missing => {
            return Err(ApiError::not_found(&format!("order {order_id}"), correlation_id));
        }
        Assignment::Closed(status) => {
            return Err(ApiError::from_domain(
                DomainError::InvariantViolation(format!(
                    "order {order_id} is {status} and cannot be reassigned"
                )),
                correlation_id,
            ));
        }
    };

    info!(
        event_name = "order.assigned",
        correlation_id = %correlation_id,
        order_id = %updated.id,
        goldsmith_id = %goldsmith.id,
        status = %updated.status,
        "order assigned to goldsmith"
    );
    let assigned = AuditEvent::new(
        Some(updated.id.clone()),
        correlation_id,
        "order.assigned",
        AuditCategory::Order,
        actor_label(&session),
        AuditOutcome::Success,
    )
    .with_metadata("goldsmith_id", goldsmith.id.0.clone())
    .with_metadata("status", updated.status.as_str());
    state.record_audit(vec![assigned]).await;

    Ok(Json(updated))
}

async fn get_settings(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<SiteSettings>, ApiError> {
    session.require(ActorRole::Admin)?;
    Ok(Json(state.maintenance.snapshot().await))
}

async fn update_settings(
    State(state): State<AppState>,
    session: Session,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SiteSettings>, ApiError> {
    session.require(ActorRole::Admin)?;
    let correlation_id = session.correlation_id.as_str();

    let mut settings = state
        .settings
        .load_or_init(Utc::now())
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;
    settings.apply(update, Utc::now());
    state
        .settings
        .save(&settings)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;
    state.maintenance.replace(settings.clone()).await;

    info!(
        event_name = "settings.updated",
        correlation_id = %correlation_id,
        maintenance_mode = settings.maintenance_mode,
        "site settings updated"
    );
    let updated = AuditEvent::new(
        None,
        correlation_id,
        "settings.updated",
        AuditCategory::Settings,
        actor_label(&session),
        AuditOutcome::Success,
    )
    .with_metadata("maintenance_mode", settings.maintenance_mode.to_string());
    state.record_audit(vec![updated]).await;

    Ok(Json(settings))
}

async fn order_report(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<OrderReport>, ApiError> {
    session.require(ActorRole::Admin)?;
    let correlation_id = session.correlation_id.as_str();

    let status_counts = state
        .orders
        .status_counts()
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;
    let goldsmith_counts = state
        .orders
        .goldsmith_counts()
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;

    Ok(Json(OrderReport::build(status_counts, goldsmith_counts, Utc::now())))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use goldsmith_core::domain::order::{NewOrder, OrderRequest, OrderStatus};
    use goldsmith_core::domain::partner::{
        Customer, CustomerId, Goldsmith, PartnerApplication, PartnerStatus,
    };
    use goldsmith_core::flows::ActorRole;
    use serde_json::json;

    use crate::app::test_support::{app, send, test_state, token};
    use crate::app::AppState;

    async fn pending_goldsmith(state: &AppState) -> Goldsmith {
        let goldsmith = Goldsmith::apply(
            PartnerApplication {
                name: "Tara Jewels".to_string(),
                email: "tara@example.com".to_string(),
                city: "Chennai".to_string(),
                specialties: vec!["filigree".to_string()],
            },
            Utc::now(),
        )
        .expect("application");
        state.goldsmiths.save(&goldsmith).await.expect("save");
        goldsmith
    }

    #[tokio::test]
    async fn non_admin_sessions_are_forbidden() {
        let state = test_state().await;
        let goldsmith = token(&state, ActorRole::Goldsmith, "GSM-1");

        let (status, _) =
            send(&app(&state), Method::GET, "/api/admin/settings", Some(&goldsmith), None).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unapproved_goldsmith_cannot_be_assigned() {
        let state = test_state().await;
        let goldsmith = pending_goldsmith(&state).await;
        let order = OrderRequest::place(
            NewOrder {
                customer_id: CustomerId("CUS-1".to_string()),
                item: "Toe rings".to_string(),
                details: "Silver pair".to_string(),
                reference_image: None,
            },
            Utc::now(),
        )
        .expect("order");
        sqlx::query("INSERT INTO customer (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind("CUS-1")
            .bind("Lata")
            .bind("lata@example.com")
            .bind(Utc::now().to_rfc3339())
            .execute(&state.db_pool)
            .await
            .expect("customer");
        state.orders.insert(&order).await.expect("insert");
        let admin = token(&state, ActorRole::Admin, "ADM-1");

        let (status, body) = send(
            &app(&state),
            Method::POST,
            &format!("/api/admin/orders/{}/assign", order.id),
            Some(&admin),
            Some(json!({ "goldsmith_id": goldsmith.id.0 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("cannot take orders"));
        let stored = state.orders.find_by_id(&order.id).await.expect("find").expect("order");
        assert_eq!(stored.status, OrderStatus::New);
        assert!(stored.goldsmith_id.is_none());
    }

    #[tokio::test]
    async fn closed_orders_keep_their_goldsmith() {
        let state = test_state().await;
        let mut goldsmith = pending_goldsmith(&state).await;
        goldsmith.status = PartnerStatus::Approved;
        state.goldsmiths.save(&goldsmith).await.expect("approve");
        let customer = Customer::register("Lata", "lata@example.com", Utc::now()).expect("customer");
        state.customers.insert(&customer).await.expect("customer");
        let mut order = OrderRequest::place(
            NewOrder {
                customer_id: customer.id.clone(),
                item: "Waist chain".to_string(),
                details: "Silver, 28 inch".to_string(),
                reference_image: None,
            },
            Utc::now(),
        )
        .expect("order");
        order.status = OrderStatus::Cancelled;
        state.orders.insert(&order).await.expect("insert");
        let admin = token(&state, ActorRole::Admin, "ADM-1");

        let (status, body) = send(
            &app(&state),
            Method::POST,
            &format!("/api/admin/orders/{}/assign", order.id),
            Some(&admin),
            Some(json!({ "goldsmith_id": goldsmith.id.0 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("cannot be reassigned"));
        let stored = state.orders.find_by_id(&order.id).await.expect("find").expect("order");
        assert!(stored.goldsmith_id.is_none());
        assert!(state.orders.list_history(&order.id).await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn partner_listing_filters_by_status() {
        let state = test_state().await;
        pending_goldsmith(&state).await;
        let admin = token(&state, ActorRole::Admin, "ADM-1");
        let app = app(&state);

        let (status, pending) =
            send(&app, Method::GET, "/api/admin/partners?status=pending", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pending.as_array().map(Vec::len), Some(1));

        let (_, approved) =
            send(&app, Method::GET, "/api/admin/partners?status=approved", Some(&admin), None)
                .await;
        assert_eq!(approved.as_array().map(Vec::len), Some(0));

        let (status, _) =
            send(&app, Method::GET, "/api/admin/partners?status=famous", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_update_is_persisted_and_published() {
        let state = test_state().await;
        let admin = token(&state, ActorRole::Admin, "ADM-1");

        let (status, body) = send(
            &app(&state),
            Method::PUT,
            "/api/admin/settings",
            Some(&admin),
            Some(json!({ "maintenance_mode": true, "maintenance_message": "Polishing the vault" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["maintenance_mode"], true);
        assert!(state.maintenance.snapshot().await.maintenance_mode);
        let stored = state.settings.load().await.expect("load").expect("row");
        assert_eq!(stored.maintenance_message, "Polishing the vault");
    }
}
