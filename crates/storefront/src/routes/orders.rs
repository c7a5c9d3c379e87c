//! Order history, confirmation and tracking handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use stride_core::{OrderId, OrderStatus};

use super::Shell;
use crate::backend::{BackendError, ErrorKind, Order, Page};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::services::CheckoutService;
use crate::state::AppState;

/// One step of the tracking timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineStep {
    pub label: &'static str,
    pub done: bool,
    pub current: bool,
}

/// Timeline for an order. Orders that left the normal flow (cancelled or
/// returned) have no timeline.
#[must_use]
pub fn timeline(status: OrderStatus) -> Vec<TimelineStep> {
    let Some(position) = status.progress_step() else {
        return Vec::new();
    };
    OrderStatus::TIMELINE
        .iter()
        .enumerate()
        .map(|(step, s)| TimelineStep {
            label: s.label(),
            done: step <= position,
            current: step == position,
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackQuery {
    pub number: Option<String>,
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub shell: Shell,
    pub orders: Page<Order>,
    pub current_page: u32,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub shell: Shell,
    pub order: Order,
    pub steps: Vec<TimelineStep>,
    pub error: Option<String>,
}

/// Post-checkout confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/confirmation.html")]
pub struct ConfirmationTemplate {
    pub shell: Shell,
    pub order: Order,
}

/// Public tracking template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/track.html")]
pub struct TrackTemplate {
    pub shell: Shell,
    pub number: String,
    pub order: Option<Order>,
    pub steps: Vec<TimelineStep>,
    pub error: Option<String>,
}

fn not_found(err: BackendError, what: impl Into<String>) -> AppError {
    match err {
        BackendError::NotFound => AppError::NotFound(what.into()),
        other => AppError::Backend(other),
    }
}

/// Display order history.
#[instrument(skip(state, customer))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    let current_page = query.page.unwrap_or(1).max(1);
    let orders = state
        .backend()
        .list_orders(customer.access_token(), current_page)
        .await?;

    Ok(OrdersIndexTemplate {
        shell: Shell::new(Some(&customer)),
        orders,
        current_page,
    })
}

/// Display one of the customer's orders.
#[instrument(skip(state, customer))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let order = state
        .backend()
        .get_order(customer.access_token(), id)
        .await
        .map_err(|e| not_found(e, format!("order {id}")))?;

    Ok(OrderShowTemplate {
        shell: Shell::new(Some(&customer)),
        steps: timeline(order.status),
        order,
        error: None,
    })
}

/// Cancel an order that has not left the warehouse yet.
#[instrument(skip(state, customer))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Response> {
    let token = customer.access_token();
    let order = state
        .backend()
        .get_order(token, id)
        .await
        .map_err(|e| not_found(e, format!("order {id}")))?;

    let error = if order.status.is_cancellable() {
        match state.backend().cancel_order(token, id).await {
            Ok(cancelled) => {
                info!(order_number = %cancelled.order_number, "Order cancelled by customer");
                return Ok(Redirect::to(&format!("/orders/{id}")).into_response());
            }
            Err(err) if err.kind() == ErrorKind::Client => err.user_message(),
            Err(err) => return Err(err.into()),
        }
    } else {
        format!("This order is {} and can no longer be cancelled.", order.status.label().to_lowercase())
    };

    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        OrderShowTemplate {
            shell: Shell::new(Some(&customer)),
            steps: timeline(order.status),
            order,
            error: Some(error),
        },
    )
        .into_response())
}

/// Confirmation page shown right after checkout.
///
/// Only the order placed in this session is shown, signed in or not.
/// Customers find older orders in their history.
#[instrument(skip(state, session, customer))]
pub async fn confirmation(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Path(number): Path<String>,
) -> Result<impl IntoResponse> {
    let just_placed = CheckoutService::new(
        state.backend(),
        &session,
        state.geography(),
        customer.as_ref(),
    )
    .is_last_order(&number)
    .await?;
    if !just_placed {
        return Err(AppError::NotFound(format!("order {number}")));
    }

    let order = state
        .backend()
        .track_order(&number)
        .await
        .map_err(|e| not_found(e, format!("order {number}")))?;

    Ok(ConfirmationTemplate {
        shell: Shell::new(customer.as_ref()),
        order,
    })
}

/// Public order tracking by number.
#[instrument(skip(state, customer))]
pub async fn track(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
    Query(query): Query<TrackQuery>,
) -> Result<impl IntoResponse> {
    let number = query.number.unwrap_or_default().trim().to_string();
    let mut template = TrackTemplate {
        shell: Shell::new(customer.as_ref()),
        number,
        order: None,
        steps: Vec::new(),
        error: None,
    };
    if template.number.is_empty() {
        return Ok(template);
    }

    match state.backend().track_order(&template.number).await {
        Ok(order) => {
            template.steps = timeline(order.status);
            template.order = Some(order);
        }
        Err(BackendError::NotFound) => {
            template.error = Some("No order found with that number.".to_string());
        }
        Err(err) => return Err(err.into()),
    }
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_marks_progress() {
        let steps = timeline(OrderStatus::Shipped);
        assert_eq!(steps.len(), OrderStatus::TIMELINE.len());
        assert!(steps[..4].iter().all(|s| s.done));
        assert!(steps[3].current);
        assert!(!steps[4].done);
    }

    #[test]
    fn test_cancelled_orders_have_no_timeline() {
        assert!(timeline(OrderStatus::Cancelled).is_empty());
        assert!(timeline(OrderStatus::Returned).is_empty());
    }
}
