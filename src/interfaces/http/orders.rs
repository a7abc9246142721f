use super::error::{ApiError, ApiResult};
use super::extract::ApiJson;
use crate::application::VendingService;
use crate::application::dispensing::OrderStatusView;
use crate::application::orders::OrderLine;
use crate::domain::ids::{MachineId, OrderId, UserId};
use crate::domain::order::{Order, OrderStatus, PaymentMethod};
use crate::error::VendingError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub products: Vec<OrderLine>,
    pub vending_machine_id: MachineId,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub chariots: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineQuery {
    pub vending_machine_id: MachineId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOrderRequest {
    pub order_id: OrderId,
    pub vending_machine_id: MachineId,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailOrderRequest {
    pub order_id: OrderId,
    pub vending_machine_id: MachineId,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
}

pub async fn create_order(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<CreateOrderResponse>)> {
    let order = service
        .orders
        .create(
            request.user_id,
            &request.products,
            request.payment_method,
            request.vending_machine_id,
        )
        .await?;

    let mut chariots = Vec::new();
    for item in &order.items {
        let product = service.stores.products.fetch(&item.product).await?;
        if let Some(carrier) = product.carrier {
            let name = service.carriers.get(carrier).await?.name;
            if !chariots.contains(&name) {
                chariots.push(name);
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: order.id,
            status: order.status,
            total_amount: order.total_amount.value(),
            chariots,
        }),
    ))
}

pub async fn pending_order(
    State(service): State<VendingService>,
    Query(query): Query<MachineQuery>,
) -> ApiResult<Json<Order>> {
    service
        .dispensing
        .pending_order(&query.vending_machine_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(VendingError::not_found("pending order for machine", &query.vending_machine_id)))
}

pub async fn complete_order(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<CompleteOrderRequest>,
) -> ApiResult<Json<Order>> {
    let order = service
        .orders
        .complete_dispensing(request.order_id, &request.vending_machine_id, request.details)
        .await?;
    Ok(Json(order))
}

pub async fn fail_order(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<FailOrderRequest>,
) -> ApiResult<Json<Order>> {
    let reason = request.reason.as_deref().unwrap_or("Unknown failure");
    let order = service
        .orders
        .fail_dispensing(request.order_id, &request.vending_machine_id, reason, request.details)
        .await?;
    Ok(Json(order))
}

pub async fn order_status(
    State(service): State<VendingService>,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<OrderStatusView>> {
    Ok(Json(service.dispensing.order_status(id).await?))
}

pub async fn get_order(State(service): State<VendingService>, Path(id): Path<OrderId>) -> ApiResult<Json<Order>> {
    Ok(Json(service.orders.get(id).await?))
}

pub async fn cancel_order(
    State(service): State<VendingService>,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<Order>> {
    Ok(Json(service.orders.cancel(id).await?))
}
