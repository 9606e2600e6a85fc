use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::order::{OrderRequest, OrderStatus};
use crate::flows::policy::is_permitted;
use crate::flows::states::{Actor, ActorRole, ChangeKind, StatusChange};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StatusTransitionError {
    #[error("{role} may not set order status to {status}")]
    StatusNotPermitted { role: ActorRole, status: OrderStatus },
    #[error("order {order_id} is not assigned to goldsmith {goldsmith_id}")]
    NotAssigned { order_id: String, goldsmith_id: String },
}

/// Applies status writes to an order on behalf of an actor.
///
/// Role restrictions come from [`crate::flows::policy`]. Direction is recorded but
/// not enforced: backward moves are allowed and logged.
#[derive(Clone, Debug, Default)]
pub struct StatusUpdateEngine;

impl StatusUpdateEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn authorize(
        &self,
        order: &OrderRequest,
        next: OrderStatus,
        actor: &Actor,
    ) -> Result<ChangeKind, StatusTransitionError> {
        if !is_permitted(actor.role, next) {
            return Err(StatusTransitionError::StatusNotPermitted { role: actor.role, status: next });
        }

        if actor.role == ActorRole::Goldsmith
            && order.goldsmith_id.as_ref().map(|id| id.0.as_str()) != Some(actor.subject_id.as_str())
        {
            return Err(StatusTransitionError::NotAssigned {
                order_id: order.id.0.clone(),
                goldsmith_id: actor.subject_id.clone(),
            });
        }

        Ok(ChangeKind::classify(order.status, next))
    }

    pub fn apply(
        &self,
        order: &mut OrderRequest,
        next: OrderStatus,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, StatusTransitionError> {
        let kind = self.authorize(order, next, actor)?;
        let from = order.status;
        order.apply_status(next, now);

        if kind == ChangeKind::Backward {
            warn!(
                event_name = "order.status.backward_transition",
                order_id = %order.id,
                from = %from,
                to = %next,
                actor_role = %actor.role,
                actor_id = %actor.subject_id,
                "order status moved backwards"
            );
        }

        Ok(StatusChange {
            order_id: order.id.clone(),
            from,
            to: next,
            kind,
            actor: actor.clone(),
            changed_at: order.updated_at,
        })
    }

    pub fn apply_with_audit<S>(
        &self,
        order: &mut OrderRequest,
        next: OrderStatus,
        actor: &Actor,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<StatusChange, StatusTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(order, next, actor, now);
        match &result {
            Ok(change) => {
                sink.emit(
                    AuditEvent::new(
                        Some(change.order_id.clone()),
                        audit.correlation_id.clone(),
                        "order.status_changed",
                        AuditCategory::Order,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", change.from.as_str())
                    .with_metadata("to", change.to.as_str())
                    .with_metadata("kind", change.kind.as_str())
                    .with_metadata("actor_role", actor.role.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(order.id.clone()),
                        audit.correlation_id.clone(),
                        "order.status_rejected",
                        AuditCategory::Order,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("requested", next.as_str())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}
