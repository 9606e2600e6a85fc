//! Order routes shared by customers, goldsmith partners and admins.
//!
//! HTML Endpoints:
//! - `GET  /orders/{id}` order detail page with progress bar
//!
//! JSON API Endpoints:
//! - `POST /api/orders` place an order (customer)
//! - `GET  /api/orders` list orders visible to the caller
//! - `GET  /api/orders/{id}` order, rendered progress and selectable statuses
//! - `GET  /api/orders/{id}/history` status history
//! - `POST /api/orders/{id}/status` apply a status change

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use goldsmith_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, InMemoryAuditSink,
};
use goldsmith_core::domain::order::{NewOrder, OrderId, OrderRequest, OrderStatus};
use goldsmith_core::domain::partner::{CustomerId, GoldsmithId};
use goldsmith_core::errors::DomainError;
use goldsmith_core::flows::{
    allowed_statuses, render_progress, ActorRole, OrderProgress, StatusChange,
};
use goldsmith_db::repositories::OrderFilter;
use serde::{Deserialize, Serialize};
use tera::Context;
use tracing::{error, info};

use crate::app::AppState;
use crate::auth::Session;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub item: String,
    pub details: String,
    #[serde(default)]
    pub reference_image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order: OrderRequest,
    pub progress: OrderProgress,
    pub selectable_statuses: Vec<OrderStatus>,
}

impl OrderView {
    fn for_role(order: OrderRequest, role: ActorRole) -> Self {
        let progress = render_progress(order.status);
        Self { order, progress, selectable_statuses: allowed_statuses(role).to_vec() }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub order: OrderRequest,
    pub change: StatusChange,
    pub progress: OrderProgress,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}", get(order_detail_page))
        .route("/api/orders", post(place_order).get(list_orders))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/history", get(order_history))
        .route("/api/orders/{id}/status", post(update_order_status))
}

async fn place_order(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    session.require(ActorRole::Customer)?;
    let correlation_id = session.correlation_id.as_str();
    let customer_id = CustomerId(session.subject_id().to_string());

    let customer = state
        .customers
        .find_by_id(&customer_id)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;
    if customer.is_none() {
        return Err(ApiError::not_found(&format!("customer {customer_id}"), correlation_id));
    }

    let order = OrderRequest::place(
        NewOrder {
            customer_id,
            item: body.item,
            details: body.details,
            reference_image: body.reference_image,
        },
        Utc::now(),
    )
    .map_err(|error| ApiError::from_domain(error, correlation_id))?;

    state
        .orders
        .insert(&order)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;

    info!(
        event_name = "order.placed",
        correlation_id = %correlation_id,
        order_id = %order.id,
        customer_id = %order.customer_id,
        "order placed"
    );
    let placed = AuditEvent::new(
        Some(order.id.clone()),
        correlation_id,
        "order.placed",
        AuditCategory::Order,
        actor_label(&session),
        AuditOutcome::Success,
    )
    .with_metadata("item", order.item.clone());
    state.record_audit(vec![placed]).await;

    Ok((StatusCode::CREATED, Json(OrderView::for_role(order, session.role()))))
}

async fn list_orders(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderRequest>>, ApiError> {
    let correlation_id = session.correlation_id.as_str();
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(
            raw.parse::<OrderStatus>()
                .map_err(|error| ApiError::from_domain(error, correlation_id))?,
        ),
    };

    let filter = OrderFilter::for_actor(&session.actor()).with_status(status);
    let orders = state
        .orders
        .list(&filter)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order = load_visible_order(&state, &session, &OrderId(id)).await?;
    Ok(Json(OrderView::for_role(order, session.role())))
}

async fn order_history(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Vec<StatusChange>>, ApiError> {
    let order = load_visible_order(&state, &session, &OrderId(id)).await?;
    let history = state
        .orders
        .list_history(&order.id)
        .await
        .map_err(|error| ApiError::from_repository(error, &session.correlation_id))?;
    Ok(Json(history))
}

async fn update_order_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let correlation_id = session.correlation_id.clone();
    let next = body
        .status
        .parse::<OrderStatus>()
        .map_err(|error| ApiError::from_domain(error, &correlation_id))?;
    let mut order = load_visible_order(&state, &session, &OrderId(id)).await?;

    let sink = InMemoryAuditSink::default();
    let audit = AuditContext::new(correlation_id.clone(), actor_label(&session));
    let actor = session.actor();
    let change = match state.engine.apply_with_audit(
        &mut order,
        next,
        &actor,
        Utc::now(),
        &sink,
        &audit,
    ) {
        Ok(change) => change,
        Err(rejected) => {
            state.record_audit(sink.events()).await;
            return Err(ApiError::from_domain(DomainError::from(rejected), &correlation_id));
        }
    };

    // A goldsmith may only write an order that is still assigned to them.
    let assignee = (actor.role == ActorRole::Goldsmith)
        .then(|| GoldsmithId(actor.subject_id.clone()));
    let updated = match state.orders.record_status_change(&change, assignee.as_ref()).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            state.record_audit(vec![write_failed(&change, &audit, "order no longer matched")]).await;
            return Err(ApiError::not_found(&format!("order {}", order.id), &correlation_id));
        }
        Err(write_error) => {
            state.record_audit(vec![write_failed(&change, &audit, &write_error.to_string())]).await;
            return Err(ApiError::from_repository(write_error, &correlation_id));
        }
    };
    state.record_audit(sink.events()).await;

    info!(
        event_name = "order.status.updated",
        correlation_id = %correlation_id,
        order_id = %updated.id,
        from = %change.from,
        to = %change.to,
        kind = change.kind.as_str(),
        actor_role = %session.role(),
        "order status updated"
    );

    let progress = render_progress(updated.status);
    Ok(Json(StatusUpdateResponse { order: updated, change, progress }))
}

async fn order_detail_page(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let order = load_visible_order(&state, &session, &OrderId(id))
        .await
        .map_err(|error| (error.status(), Html(format!("<h1>{}</h1>", error.status()))))?;

    let view = OrderView::for_role(order, session.role());
    let selectable: Vec<&str> =
        view.selectable_statuses.iter().map(|status| status.as_str()).collect();
    let stages = view.progress.stages().map(|stages| stages.to_vec()).unwrap_or_default();

    let mut context = Context::new();
    context.insert("order", &view.order);
    context.insert("status", view.order.status.as_str());
    context.insert(
        "reference_image",
        &view.order.reference_image.as_ref().map(|image| image.as_str()),
    );
    context.insert("cancelled", &view.progress.is_cancelled());
    context.insert("stages", &stages);
    context.insert("selectable_statuses", &selectable);
    context.insert("role", session.role().as_str());

    state.templates.render("orders/detail.html", &context).map(Html).map_err(|render_error| {
        error!(
            event_name = "order.page.render_failed",
            correlation_id = %session.correlation_id,
            error = %render_error,
            "order detail template failed to render"
        );
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Order page unavailable</h1>".to_string()))
    })
}

/// Loads an order the caller may see. Orders outside the caller's view are
/// reported as missing rather than forbidden.
async fn load_visible_order(
    state: &AppState,
    session: &Session,
    id: &OrderId,
) -> Result<OrderRequest, ApiError> {
    let correlation_id = session.correlation_id.as_str();
    let order = state
        .orders
        .find_by_id(id)
        .await
        .map_err(|error| ApiError::from_repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found(&format!("order {id}"), correlation_id))?;

    let visible = match session.role() {
        ActorRole::Admin => true,
        ActorRole::Customer => order.customer_id == CustomerId(session.subject_id().to_string()),
        ActorRole::Goldsmith => {
            order.is_assigned_to(&GoldsmithId(session.subject_id().to_string()))
                && order.status.visible_to_goldsmith()
        }
    };
    if !visible {
        return Err(ApiError::not_found(&format!("order {id}"), correlation_id));
    }
    Ok(order)
}

fn write_failed(change: &StatusChange, audit: &AuditContext, reason: &str) -> AuditEvent {
    AuditEvent::new(
        Some(change.order_id.clone()),
        audit.correlation_id.clone(),
        "order.status_write_failed",
        AuditCategory::Order,
        audit.actor.clone(),
        AuditOutcome::Failed,
    )
    .with_metadata("from", change.from.as_str())
    .with_metadata("to", change.to.as_str())
    .with_metadata("reason", reason)
}

pub(crate) fn actor_label(session: &Session) -> String {
    format!("{}:{}", session.role(), session.subject_id())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use goldsmith_core::domain::order::{NewOrder, OrderRequest, OrderStatus};
    use goldsmith_core::audit::AuditOutcome;
    use goldsmith_core::domain::partner::{
        Customer, CustomerId, Goldsmith, GoldsmithId, PartnerApplication, PartnerStatus,
    };
    use goldsmith_core::flows::ActorRole;
    use goldsmith_db::repositories::AuditEventRepository;
    use serde_json::json;
    use uuid::Uuid;

    use crate::app::test_support::{app, send, send_raw, test_state, token};
    use crate::app::AppState;

    async fn seeded_order(
        state: &AppState,
        goldsmith: Option<&str>,
        status: OrderStatus,
    ) -> OrderRequest {
        let email = format!("nila-{}@example.com", Uuid::new_v4().simple());
        let customer = Customer::register("Nila", &email, Utc::now()).expect("customer");
        state.customers.insert(&customer).await.expect("insert customer");
        let mut order = OrderRequest::place(
            NewOrder {
                customer_id: customer.id.clone(),
                item: "Mangalsutra".to_string(),
                details: "Black beads, 22k pendant".to_string(),
                reference_image: Some("https://images.example/ref.jpg".to_string()),
            },
            Utc::now() - chrono::Duration::minutes(5),
        )
        .expect("order");
        if let Some(id) = goldsmith {
            approved_goldsmith(state, id).await;
            order.goldsmith_id = Some(GoldsmithId(id.to_string()));
        }
        order.status = status;
        state.orders.insert(&order).await.expect("insert order");
        order
    }

    async fn approved_goldsmith(state: &AppState, id: &str) {
        let mut goldsmith = Goldsmith::apply(
            PartnerApplication {
                name: "Aurum Atelier".to_string(),
                email: format!("{}@partners.example", id.to_lowercase()),
                city: "Jaipur".to_string(),
                specialties: Vec::new(),
            },
            Utc::now(),
        )
        .expect("goldsmith");
        goldsmith.id = GoldsmithId(id.to_string());
        goldsmith.status = PartnerStatus::Approved;
        state.goldsmiths.save(&goldsmith).await.expect("insert goldsmith");
    }

    #[tokio::test]
    async fn goldsmith_cannot_set_unreviewed_statuses() {
        let state = test_state().await;
        let order = seeded_order(&state, Some("GSM-1"), OrderStatus::InProgress).await;
        let goldsmith = token(&state, ActorRole::Goldsmith, "GSM-1");

        let (status, body) = send(
            &app(&state),
            Method::POST,
            &format!("/api/orders/{}/status", order.id),
            Some(&goldsmith),
            Some(json!({ "status": "new" })),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap_or_default().contains("may not set"));

        let audit = state.audit_log.list_for_order(&order.id).await.expect("audit");
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].event_type, "order.status_rejected");
    }

    #[tokio::test]
    async fn goldsmith_cannot_see_orders_still_in_new() {
        let state = test_state().await;
        let order = seeded_order(&state, Some("GSM-1"), OrderStatus::New).await;
        let goldsmith = token(&state, ActorRole::Goldsmith, "GSM-1");

        let (status, body) = send(
            &app(&state),
            Method::GET,
            &format!("/api/orders/{}", order.id),
            Some(&goldsmith),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap_or_default().contains("not found or not updated"));
    }

    #[tokio::test]
    async fn admin_backward_move_is_applied_and_recorded() {
        let state = test_state().await;
        let order = seeded_order(&state, Some("GSM-1"), OrderStatus::Completed).await;
        let admin = token(&state, ActorRole::Admin, "ADM-1");

        let (status, body) = send(
            &app(&state),
            Method::POST,
            &format!("/api/orders/{}/status", order.id),
            Some(&admin),
            Some(json!({ "status": "in_progress" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["change"]["kind"], "backward");
        assert_eq!(body["progress"]["view"], "stages");

        let history = state.orders.list_history(&order.id).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn failed_status_write_is_audited_as_failure_not_success() {
        let state = test_state().await;
        let order = seeded_order(&state, None, OrderStatus::New).await;
        sqlx::query(
            "CREATE TRIGGER freeze_orders BEFORE UPDATE ON order_request
             BEGIN SELECT RAISE(ABORT, 'orders are read only'); END",
        )
        .execute(&state.db_pool)
        .await
        .expect("trigger");
        let admin = token(&state, ActorRole::Admin, "ADM-1");

        let (status, _) = send(
            &app(&state),
            Method::POST,
            &format!("/api/orders/{}/status", order.id),
            Some(&admin),
            Some(json!({ "status": "shipped" })),
        )
        .await;

        assert!(status.is_server_error());
        let stored = state.orders.find_by_id(&order.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, OrderStatus::New);
        assert!(state.orders.list_history(&order.id).await.expect("history").is_empty());

        let audit = state.audit_log.list_for_order(&order.id).await.expect("audit");
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].event_type, "order.status_write_failed");
        assert_eq!(audit[0].outcome, AuditOutcome::Failed);
        assert_eq!(audit[0].metadata.get("to").map(String::as_str), Some("shipped"));
    }

    #[tokio::test]
    async fn successful_status_write_is_audited_once() {
        let state = test_state().await;
        let order = seeded_order(&state, Some("GSM-1"), OrderStatus::InProgress).await;
        let goldsmith = token(&state, ActorRole::Goldsmith, "GSM-1");

        let (status, body) = send(
            &app(&state),
            Method::POST,
            &format!("/api/orders/{}/status", order.id),
            Some(&goldsmith),
            Some(json!({ "status": "artwork_completed" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["status"], "artwork_completed");
        let audit = state.audit_log.list_for_order(&order.id).await.expect("audit");
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].event_type, "order.status_changed");
        assert_eq!(audit[0].outcome, AuditOutcome::Success);
        assert_eq!(state.orders.list_history(&order.id).await.expect("history").len(), 1);
    }

    #[tokio::test]
    async fn unknown_order_reports_not_found() {
        let state = test_state().await;
        let admin = token(&state, ActorRole::Admin, "ADM-1");

        let (status, body) = send(
            &app(&state),
            Method::POST,
            "/api/orders/ORD-missing/status",
            Some(&admin),
            Some(json!({ "status": "shipped" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "order ORD-missing not found or not updated");
    }

    #[tokio::test]
    async fn unknown_status_string_is_a_bad_request() {
        let state = test_state().await;
        let order = seeded_order(&state, None, OrderStatus::New).await;
        let admin = token(&state, ActorRole::Admin, "ADM-1");

        let (status, _) = send(
            &app(&state),
            Method::POST,
            &format!("/api/orders/{}/status", order.id),
            Some(&admin),
            Some(json!({ "status": "teleported" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn customer_listing_is_scoped_and_requires_session() {
        let state = test_state().await;
        let order = seeded_order(&state, None, OrderStatus::New).await;
        let app = app(&state);

        let (status, _) = send(&app, Method::GET, "/api/orders", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let owner = token(&state, ActorRole::Customer, &order.customer_id.0);
        let (status, listed) = send(&app, Method::GET, "/api/orders", Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let stranger = token(&state, ActorRole::Customer, "CUS-someone-else");
        let (_, listed) = send(&app, Method::GET, "/api/orders", Some(&stranger), None).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn customers_cannot_change_status() {
        let state = test_state().await;
        let order = seeded_order(&state, None, OrderStatus::New).await;
        let owner = token(&state, ActorRole::Customer, &order.customer_id.0);

        let (status, _) = send(
            &app(&state),
            Method::POST,
            &format!("/api/orders/{}/status", order.id),
            Some(&owner),
            Some(json!({ "status": "cancelled" })),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn placing_order_requires_registered_customer() {
        let state = test_state().await;
        let ghost = token(&state, ActorRole::Customer, &CustomerId::generate().0);

        let (status, _) = send(
            &app(&state),
            Method::POST,
            "/api/orders",
            Some(&ghost),
            Some(json!({ "item": "Ring", "details": "Plain band" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn detail_page_renders_progress_and_cancelled_view() {
        let state = test_state().await;
        let app = app(&state);
        let admin = token(&state, ActorRole::Admin, "ADM-1");

        let active = seeded_order(&state, Some("GSM-1"), OrderStatus::ArtworkCompleted).await;
        let uri = format!("/orders/{}", active.id);
        let (status, body) = send_raw(&app, Method::GET, &uri, Some(&admin), None).await;
        let html = String::from_utf8(body).expect("utf8");
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Work in Progress"));
        assert!(html.contains("stage-active"));

        let cancelled = seeded_order(&state, Some("GSM-1"), OrderStatus::Cancelled).await;
        let (_, body) =
            send_raw(&app, Method::GET, &format!("/orders/{}", cancelled.id), Some(&admin), None)
                .await;
        let html = String::from_utf8(body).expect("utf8");
        assert!(html.contains("Order Cancelled"));
        assert!(!html.contains("stage-active"));
    }
}
