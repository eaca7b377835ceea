//! Order intake and outcome endpoints.
//!
//! Intake validates the request, computes the amounts, persists the
//! `PENDING` order, and only then hands off to the saga orchestrator.
//! The response carries the terminal order status together with the full
//! audit trail.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{OrderId, UserId};
use domain::{Order, OrderStatus, SagaStepRecord};
use order_store::SagaStore;
use saga::{Discounts, SagaOrchestrator, StepName};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: SagaStore> {
    pub store: S,
    pub orchestrator: SagaOrchestrator<S>,
    pub discounts: Discounts<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub sku: String,
    pub qty: u32,
    pub promo_code: Option<String>,
    pub fail_at_step: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct StepResponse {
    pub step_name: String,
    pub status: String,
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl From<SagaStepRecord> for StepResponse {
    fn from(record: SagaStepRecord) -> Self {
        Self {
            step_name: record.step_name,
            status: record.status.to_string(),
            error: record.error,
            started_at: record.started_at.to_rfc3339(),
            finished_at: record.finished_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
pub struct OrderOutcomeResponse {
    pub order_id: String,
    pub status: String,
    pub success: bool,
    pub base_cents: i64,
    pub discount_cents: i64,
    pub final_cents: i64,
    pub steps: Vec<StepResponse>,
}

impl OrderOutcomeResponse {
    fn new(order: &Order, steps: Vec<SagaStepRecord>) -> Self {
        Self {
            order_id: order.id.to_string(),
            status: order.status.to_string(),
            success: order.status == OrderStatus::Confirmed,
            base_cents: order.base_amount.cents(),
            discount_cents: order.discount_amount.cents(),
            final_cents: order.final_amount.cents(),
            steps: steps.into_iter().map(StepResponse::from).collect(),
        }
    }
}

// -- Handlers --

/// POST /orders — validate, persist a pending order, and run the saga.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<Json<OrderOutcomeResponse>, ApiError> {
    let user_id = parse_user_id(&req.user_id)?;
    // Form submissions leave empty strings where the field was blank.
    let promo_code = req.promo_code.filter(|s| !s.is_empty());
    let fail_at_step = req
        .fail_at_step
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<StepName>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))
        })
        .transpose()?;

    if req.qty == 0 {
        return Err(ApiError::BadRequest(
            "Quantity must be greater than 0".to_string(),
        ));
    }

    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {user_id} not found")))?;

    let sku = domain::Sku::new(req.sku.as_str());
    let item = state
        .store
        .get_item(&sku)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {sku} not found")))?;

    if let Some(ref code) = promo_code {
        let promo = state
            .store
            .get_promo(code)
            .await?
            .ok_or_else(|| ApiError::BadRequest(format!("Promo code '{code}' not found")))?;
        if promo.remaining_uses == 0 {
            return Err(ApiError::BadRequest(format!(
                "Promo code '{code}' is exhausted"
            )));
        }
    }

    let base_amount = item.price.multiply(req.qty);
    let discount_amount = state
        .discounts
        .calculate_discount(promo_code.as_deref(), base_amount)
        .await?;

    let order = Order::pending(
        user.id,
        sku,
        req.qty,
        promo_code,
        base_amount,
        discount_amount,
    );
    state.store.insert_order(&order).await?;

    state.orchestrator.execute(order.id, fail_at_step).await?;

    // Re-read for the terminal status and the audit trail.
    let order = state
        .store
        .get_order(order.id)
        .await?
        .ok_or_else(|| ApiError::Internal("Order vanished after saga".to_string()))?;
    let steps = state.orchestrator.audit_trail(order.id).await?;

    Ok(Json(OrderOutcomeResponse::new(&order, steps)))
}

/// GET /orders/:id — load an order and its audit trail.
#[tracing::instrument(skip(state))]
pub async fn get<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderOutcomeResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    let steps = state.orchestrator.audit_trail(order_id).await?;

    Ok(Json(OrderOutcomeResponse::new(&order, steps)))
}

fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid user_id: {e}")))?;
    Ok(UserId::from_uuid(uuid))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
