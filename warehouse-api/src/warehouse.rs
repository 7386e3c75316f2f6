use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use warehouse_core::models::{AddProductToWarehouse, InventoryReceipt, ReceiptId};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/warehouse", post(add_product_to_warehouse))
        .route("/api/warehouse/procedure", post(add_product_to_warehouse_procedure))
        .route("/api/warehouse/{id}", get(get_receipt))
}

fn created(id: ReceiptId) -> Response {
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("api/warehouse/{}", id))],
        format!("Created id - {}", id),
    )
        .into_response()
}

/// POST /api/warehouse
///
/// Checks run in a fixed order and stop at the first failure; nothing is
/// written before the final step.
pub async fn add_product_to_warehouse(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<AddProductToWarehouse>, AppError>,
) -> Result<Response, AppError> {
    if req.amount < 1 {
        tracing::debug!(amount = req.amount, "Rejected non-positive amount");
        return Err(AppError::ValidationError("Amount should be greater than 0".to_string()));
    }

    if state.repo.product_exists(req.id_product).await?.is_none() {
        tracing::debug!(product_id = req.id_product, "Unknown product");
        return Err(AppError::NotFoundError(format!(
            "Product with id - {} does not exist",
            req.id_product
        )));
    }

    if !state.repo.warehouse_exists(req.id_warehouse).await? {
        tracing::debug!(warehouse_id = req.id_warehouse, "Unknown warehouse");
        return Err(AppError::NotFoundError(format!(
            "Warehouse with id - {} does not exist",
            req.id_warehouse
        )));
    }

    let order_id = state
        .repo
        .find_matching_order(req.id_product, req.amount, req.created_at)
        .await?
        .ok_or_else(|| AppError::NotFoundError("There is no corresponding order".to_string()))?;

    if !state.repo.order_is_unfulfilled(order_id).await? {
        tracing::info!(order_id, "Order already fulfilled");
        return Err(AppError::ConflictError(format!(
            "Order with id - {} is already fulfilled",
            order_id
        )));
    }

    let id = state.repo.write_fulfillment(&req).await?;
    tracing::info!(
        receipt_id = id,
        order_id,
        warehouse_id = req.id_warehouse,
        "Order fulfilled into warehouse"
    );

    Ok(created(id))
}

/// POST /api/warehouse/procedure
/// Same workflow, executed by the database function.
pub async fn add_product_to_warehouse_procedure(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<AddProductToWarehouse>, AppError>,
) -> Result<Response, AppError> {
    match state.repo.write_fulfillment_procedure(&req).await? {
        Some(id) => {
            tracing::info!(receipt_id = id, "Order fulfilled by procedure");
            Ok(created(id))
        }
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

/// GET /api/warehouse/{id}
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<ReceiptId>,
) -> Result<Json<InventoryReceipt>, AppError> {
    let receipt = state
        .repo
        .get_receipt(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Receipt with id - {} does not exist", id)))?;

    Ok(Json(receipt))
}
