// SPDX-FileCopyrightText: 2026 Entoforce Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Handles `GET /health`, `POST /api/orders`, `GET /api/orders` and the
//! per-order `assign`, `timeout` and `complete` triggers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use entoforce_agent::OrderRequest;
use entoforce_core::{EntoforceError, Order, OrderId, OrderStatus, TechnicianId};
use entoforce_dispatch::{AssignOutcome, DeclineOutcome};

use crate::server::ApiState;

/// Request body for `POST /api/orders`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub client_name: String,
    pub phone: String,
    pub address: String,
    pub object_type: String,
    pub insect_quantity: String,
    #[serde(default)]
    pub has_experience: bool,
}

impl From<CreateOrderRequest> for OrderRequest {
    fn from(body: CreateOrderRequest) -> Self {
        OrderRequest {
            client_name: body.client_name,
            phone: body.phone,
            address: body.address,
            object_type: body.object_type,
            insect_quantity: body.insect_quantity,
            has_experience: body.has_experience,
        }
    }
}

/// Request body for `POST /api/orders/{id}/complete`.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub technician_id: TechnicianId,
}

/// Query string for `GET /api/orders`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// What happened when the coordinator tried to place an order.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchView {
    Offered {
        technician_id: TechnicianId,
        technician_name: String,
        delivered: bool,
    },
    NoCapacity,
    Exhausted,
}

impl From<AssignOutcome> for DispatchView {
    fn from(outcome: AssignOutcome) -> Self {
        match outcome {
            AssignOutcome::Offered {
                technician,
                delivered,
            } => DispatchView::Offered {
                technician_id: technician.id,
                technician_name: technician.name,
                delivered,
            },
            AssignOutcome::NoCapacity => DispatchView::NoCapacity,
        }
    }
}

impl From<DeclineOutcome> for DispatchView {
    fn from(outcome: DeclineOutcome) -> Self {
        match outcome {
            DeclineOutcome::Reoffered {
                technician,
                delivered,
            } => DispatchView::Offered {
                technician_id: technician.id,
                technician_name: technician.name,
                delivered,
            },
            DeclineOutcome::NoCapacity => DispatchView::NoCapacity,
            DeclineOutcome::Exhausted => DispatchView::Exhausted,
        }
    }
}

/// Response body for `POST /api/orders`.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub dispatch: DispatchView,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// [`EntoforceError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub EntoforceError);

impl From<EntoforceError> for ApiError {
    fn from(e: EntoforceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EntoforceError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EntoforceError::NotFound { .. } => StatusCode::NOT_FOUND,
            EntoforceError::InvalidTransition { .. }
            | EntoforceError::ReservationConflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            self.0.user_message()
        } else {
            self.0.to_string()
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

/// GET /health
pub async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /api/orders
pub async fn post_order(
    State(state): State<ApiState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    let submission = state.intake.submit_order(body.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: submission.order_id,
            dispatch: submission.outcome.into(),
        }),
    ))
}

/// GET /api/orders?status=
pub async fn list_orders(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let status = match query.status.as_deref().map(str::parse::<OrderStatus>) {
        None => None,
        Some(Ok(status)) => Some(status),
        Some(Err(_)) => {
            return bad_request(format!(
                "unknown status `{}`",
                query.status.unwrap_or_default()
            ));
        }
    };

    match state.coordinator.repository().list_orders(status).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    let order_id = OrderId(id);
    let order = state
        .coordinator
        .repository()
        .get_order(order_id)
        .await?
        .ok_or_else(|| EntoforceError::not_found("order", order_id))?;
    Ok(Json(order))
}

/// POST /api/orders/{id}/assign
pub async fn post_assign(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<DispatchView>, ApiError> {
    let outcome = state.coordinator.assign(OrderId(id)).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/orders/{id}/timeout
pub async fn post_timeout(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<DispatchView>, ApiError> {
    let outcome = state.coordinator.decline_on_timeout(OrderId(id)).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/orders/{id}/complete
pub async fn post_complete(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .coordinator
        .complete(OrderId(id), body.technician_id)
        .await?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_view_serializes_with_outcome_tag() {
        let json = serde_json::to_value(DispatchView::NoCapacity).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "no_capacity" }));

        let json = serde_json::to_value(CreateOrderResponse {
            order_id: OrderId(4),
            dispatch: DispatchView::Offered {
                technician_id: TechnicianId(2),
                technician_name: "ivan".into(),
                delivered: true,
            },
        })
        .unwrap();
        assert_eq!(json["order_id"], 4);
        assert_eq!(json["outcome"], "offered");
        assert_eq!(json["technician_id"], 2);
    }

    #[test]
    fn error_status_codes() {
        let status = |e: EntoforceError| ApiError(e).into_response().status();
        assert_eq!(
            status(EntoforceError::validation("phone", "bad")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(EntoforceError::not_found("order", 9)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(EntoforceError::InvalidTransition {
                order_id: OrderId(1),
                status: OrderStatus::Completed,
                action: "be assigned",
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(EntoforceError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
