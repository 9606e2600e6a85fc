//! Public sign-up routes for goldsmith partners and customers.
//!
//! - `POST /api/partners/apply` submit a partner application (pending until moderated)
//! - `GET  /api/partners` approved partners
//! - `POST /api/customers` register a customer and receive a session token

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use chrono::{DateTime, Utc};
use goldsmith_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use goldsmith_core::domain::partner::{Customer, Goldsmith, PartnerApplication, PartnerStatus};
use goldsmith_core::errors::DomainError;
use goldsmith_core::flows::ActorRole;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::AppState;
use crate::auth::CorrelationId;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CustomerRegistration {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredCustomer {
    pub customer: Customer,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/partners/apply", post(apply))
        .route("/api/partners", get(list_approved))
        .route("/api/customers", post(register_customer))
}

async fn apply(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    Json(application): Json<PartnerApplication>,
) -> Result<(StatusCode, Json<Goldsmith>), ApiError> {
    let goldsmith = Goldsmith::apply(application, Utc::now())
        .map_err(|error| ApiError::from_domain(error, &correlation_id))?;
    state
        .goldsmiths
        .save(&goldsmith)
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?;

    info!(
        event_name = "partner.applied",
        correlation_id = %correlation_id,
        goldsmith_id = %goldsmith.id,
        city = %goldsmith.city,
        "goldsmith partner application received"
    );
    let applied = AuditEvent::new(
        None,
        &correlation_id,
        "partner.applied",
        AuditCategory::Partner,
        format!("goldsmith:{}", goldsmith.id),
        AuditOutcome::Success,
    )
    .with_metadata("goldsmith_id", goldsmith.id.0.clone());
    state.record_audit(vec![applied]).await;

    Ok((StatusCode::CREATED, Json(goldsmith)))
}

async fn list_approved(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
) -> Result<Json<Vec<Goldsmith>>, ApiError> {
    let partners = state
        .goldsmiths
        .list(Some(PartnerStatus::Approved))
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?;
    Ok(Json(partners))
}

async fn register_customer(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    Json(body): Json<CustomerRegistration>,
) -> Result<(StatusCode, Json<RegisteredCustomer>), ApiError> {
    let now = Utc::now();
    let customer = Customer::register(&body.name, &body.email, now)
        .map_err(|error| ApiError::from_domain(error, &correlation_id))?;

    let existing = state
        .customers
        .find_by_email(&customer.email)
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?;
    if existing.is_some() {
        return Err(ApiError::from_domain(
            DomainError::InvariantViolation(format!(
                "a customer with email {} is already registered",
                customer.email
            )),
            &correlation_id,
        ));
    }

    state
        .customers
        .insert(&customer)
        .await
        .map_err(|error| ApiError::from_repository(error, &correlation_id))?;
    let (token, claims) =
        state.sessions.issue(ActorRole::Customer, &customer.id.0, now).map_err(|error| {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string(), &correlation_id)
        })?;

    info!(
        event_name = "customer.registered",
        correlation_id = %correlation_id,
        customer_id = %customer.id,
        "customer registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisteredCustomer { customer, token, expires_at: claims.expires_at }),
    ))
}
