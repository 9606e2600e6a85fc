//! Shared application state and the assembled HTTP router.

use std::sync::Arc;

use axum::{middleware, Router};
use goldsmith_core::audit::{AuditEvent, AuditSink, TracingAuditSink};
use goldsmith_core::domain::settings::SiteSettings;
use goldsmith_core::flows::StatusUpdateEngine;
use goldsmith_core::session::SessionSigner;
use goldsmith_db::repositories::{
    AuditEventRepository, CustomerRepository, GoldsmithRepository, MetalPriceRepository,
    OrderRepository, SettingsRepository, SqlAuditEventRepository, SqlCustomerRepository,
    SqlGoldsmithRepository, SqlMetalPriceRepository, SqlOrderRepository, SqlSettingsRepository,
};
use goldsmith_db::DbPool;
use tera::Tera;
use tower_http::services::ServeDir;
use tracing::{error, warn};

use crate::maintenance::{self, MaintenanceSwitch};
use crate::{admin, health, orders, partners, pricing};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub orders: Arc<dyn OrderRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub goldsmiths: Arc<dyn GoldsmithRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub prices: Arc<dyn MetalPriceRepository>,
    pub audit_log: Arc<dyn AuditEventRepository>,
    pub sessions: SessionSigner,
    pub maintenance: MaintenanceSwitch,
    pub templates: Arc<Tera>,
    pub engine: StatusUpdateEngine,
}

impl AppState {
    /// State backed by the SQL repositories on one pool.
    pub fn from_pool(db_pool: DbPool, sessions: SessionSigner, settings: SiteSettings) -> Self {
        Self {
            orders: Arc::new(SqlOrderRepository::new(db_pool.clone())),
            customers: Arc::new(SqlCustomerRepository::new(db_pool.clone())),
            goldsmiths: Arc::new(SqlGoldsmithRepository::new(db_pool.clone())),
            settings: Arc::new(SqlSettingsRepository::new(db_pool.clone())),
            prices: Arc::new(SqlMetalPriceRepository::new(db_pool.clone())),
            audit_log: Arc::new(SqlAuditEventRepository::new(db_pool.clone())),
            db_pool,
            sessions,
            maintenance: MaintenanceSwitch::new(settings),
            templates: init_templates(),
            engine: StatusUpdateEngine::new(),
        }
    }

    /// Sends audit events to the log and to the `audit_event` table. A failed
    /// write is logged and does not fail the request that produced the event.
    pub async fn record_audit(&self, events: Vec<AuditEvent>) {
        for event in events {
            TracingAuditSink.emit(event.clone());
            if let Err(write_error) = self.audit_log.append(&event).await {
                error!(
                    event_name = "server.audit.write_failed",
                    correlation_id = %event.correlation_id,
                    audit_event = %event.event_type,
                    error = %write_error,
                    "failed to persist audit event"
                );
            }
        }
    }
}

/// Loads page templates from `templates/` with embedded copies as fallback.
pub fn init_templates() -> Arc<Tera> {
    let mut tera = match Tera::new("templates/**/*.html") {
        Ok(tera) => tera,
        Err(error) => {
            warn!(
                event_name = "server.templates.filesystem_unavailable",
                error = %error,
                "failed to load templates from filesystem, using embedded templates"
            );
            Tera::default()
        }
    };

    let embedded = [
        ("orders/detail.html", include_str!("../../../templates/orders/detail.html")),
        ("site/maintenance.html", include_str!("../../../templates/site/maintenance.html")),
    ];
    for (name, source) in embedded {
        if tera.get_template_names().any(|loaded| loaded == name) {
            continue;
        }
        if let Err(error) = tera.add_raw_template(name, source) {
            error!(
                event_name = "server.templates.embedded_invalid",
                template = name,
                error = %error,
                "embedded template failed to parse"
            );
        }
    }

    Arc::new(tera)
}

pub fn router(state: AppState) -> Router {
    let db_pool = state.db_pool.clone();

    Router::new()
        .merge(orders::routes())
        .merge(admin::routes())
        .merge(partners::routes())
        .merge(pricing::routes())
        .merge(maintenance::routes())
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn_with_state(state.clone(), maintenance::gate))
        .with_state(state)
        .merge(health::router(db_pool))
}


#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use goldsmith_core::flows::ActorRole;
    use serde_json::json;

    use super::test_support::{app, send, test_state, token};

    #[tokio::test]
    async fn customer_places_order_admin_assigns_goldsmith_advances_it() {
        let state = test_state().await;
        let app = app(&state);

        let (status, customer) = send(
            &app,
            Method::POST,
            "/api/customers",
            None,
            Some(json!({ "name": "Asha Rao", "email": "asha@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let customer_token = customer["token"].as_str().expect("token").to_string();

        let (status, placed) = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&customer_token),
            Some(json!({ "item": "Gold bangle", "details": "Pair, 22k, 2.4 inch" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(placed["order"]["status"], "new");
        let order_id = placed["order"]["id"].as_str().expect("order id").to_string();

        let (status, applied) = send(
            &app,
            Method::POST,
            "/api/partners/apply",
            None,
            Some(json!({ "name": "Kiran Gold", "email": "kiran@example.com", "city": "Pune" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let goldsmith_id = applied["id"].as_str().expect("goldsmith id").to_string();

        let admin = token(&state, ActorRole::Admin, "ADM-1");
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/admin/partners/{goldsmith_id}/moderate"),
            Some(&admin),
            Some(json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, assigned) = send(
            &app,
            Method::POST,
            &format!("/api/admin/orders/{order_id}/assign"),
            Some(&admin),
            Some(json!({ "goldsmith_id": goldsmith_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(assigned["status"], "pending_goldsmith_review");

        let goldsmith = token(&state, ActorRole::Goldsmith, &goldsmith_id);
        let (status, updated) = send(
            &app,
            Method::POST,
            &format!("/api/orders/{order_id}/status"),
            Some(&goldsmith),
            Some(json!({ "status": "in_progress" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["order"]["status"], "in_progress");
        assert_eq!(updated["change"]["kind"], "forward");

        let (status, history) = send(
            &app,
            Method::GET,
            &format!("/api/orders/{order_id}/history"),
            Some(&customer_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().map(Vec::len), Some(2));

        let (status, report) =
            send(&app, Method::GET, "/api/admin/reports/orders", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["total"], 1);
        assert_eq!(report["by_status"]["in_progress"], 1);
        assert_eq!(report["by_status"]["new"], 0);
    }

    #[tokio::test]
    async fn health_is_served_alongside_api_routes() {
        let state = test_state().await;
        let (status, body) = send(&app(&state), Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }
}
