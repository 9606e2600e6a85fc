//! Site-wide maintenance mode.
//!
//! The current [`SiteSettings`] live in a [`MaintenanceSwitch`] shared by every
//! request. While maintenance is on, the [`gate`] middleware answers storefront
//! and API traffic with a 503 page. Admin routes, static assets, the health probe
//! and callers holding an admin session pass through.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use goldsmith_core::domain::settings::SiteSettings;
use tera::Context;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::app::AppState;
use crate::auth::{correlation_id, has_admin_session};

const BYPASS_PREFIXES: &[&str] = &["/api/admin", "/static/", "/health", "/maintenance"];

#[derive(Clone)]
pub struct MaintenanceSwitch {
    settings: Arc<RwLock<SiteSettings>>,
}

impl MaintenanceSwitch {
    pub fn new(settings: SiteSettings) -> Self {
        Self { settings: Arc::new(RwLock::new(settings)) }
    }

    pub async fn snapshot(&self) -> SiteSettings {
        self.settings.read().await.clone()
    }

    pub async fn replace(&self, settings: SiteSettings) {
        *self.settings.write().await = settings;
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/maintenance", get(maintenance_page))
}

pub fn bypasses_gate(path: &str) -> bool {
    BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

pub async fn gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if bypasses_gate(request.uri().path()) {
        return next.run(request).await;
    }

    let settings = state.maintenance.snapshot().await;
    if !settings.maintenance_mode {
        return next.run(request).await;
    }
    if has_admin_session(request.headers(), &state.sessions) {
        debug!(
            event_name = "server.maintenance.admin_bypass",
            path = %request.uri().path(),
            "admin session passed maintenance gate"
        );
        return next.run(request).await;
    }

    debug!(
        event_name = "server.maintenance.blocked",
        correlation_id = %correlation_id(request.headers()),
        path = %request.uri().path(),
        "request blocked by maintenance mode"
    );
    render(&state, &settings, StatusCode::SERVICE_UNAVAILABLE)
}

async fn maintenance_page(State(state): State<AppState>) -> Response {
    let settings = state.maintenance.snapshot().await;
    let status =
        if settings.maintenance_mode { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };
    render(&state, &settings, status)
}

fn render(state: &AppState, settings: &SiteSettings, status: StatusCode) -> Response {
    let mut context = Context::new();
    context.insert("message", &settings.maintenance_message);
    context.insert("active", &settings.maintenance_mode);

    match state.templates.render("site/maintenance.html", &context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(render_error) => {
            error!(
                event_name = "server.templates.render_failed",
                template = "site/maintenance.html",
                error = %render_error,
                "failed to render maintenance page"
            );
            (status, settings.maintenance_message.clone()).into_response()
        }
    }
}
