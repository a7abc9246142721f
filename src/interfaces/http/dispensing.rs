use super::error::{ApiError, ApiResult};
use super::extract::ApiJson;
use super::orders::MachineQuery;
use crate::application::VendingService;
use crate::application::dispensing::Claim;
use crate::domain::ids::{OrderId, ProductId};
use crate::domain::order::DispensingStatus;
use crate::error::VendingError;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A lane instruction as the hardware poller reads it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Couloir {
    pub couloir: u8,
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextOrderResponse {
    pub order_id: OrderId,
    pub couloirs: Vec<Couloir>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub order_id: OrderId,
    pub couloir: u8,
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResponse {
    pub order_id: OrderId,
    pub dispensing_status: DispensingStatus,
}

pub async fn next_order(
    State(service): State<VendingService>,
    Query(query): Query<MachineQuery>,
) -> ApiResult<Response> {
    let claim = service
        .dispensing
        .next_order_for_machine(&query.vending_machine_id)
        .await?;

    match claim {
        None => Err(ApiError(VendingError::not_found(
            "order to dispense for machine",
            &query.vending_machine_id,
        ))),
        Some(Claim::NoDispensableContent(order_id)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "NO_DISPENSABLE_CONTENT",
                "message": format!("order {order_id} has no product mapped to a lane"),
                "orderId": order_id,
            })),
        )
            .into_response()),
        Some(Claim::Dispatched(order)) => {
            let couloirs = order
                .dispatch
                .iter()
                .map(|instruction| Couloir {
                    couloir: instruction.lane,
                    product_id: instruction.product,
                    quantity: instruction.quantity,
                })
                .collect();
            Ok(Json(NextOrderResponse {
                order_id: order.id,
                couloirs,
            })
            .into_response())
        }
    }
}

pub async fn detection(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<DetectionRequest>,
) -> ApiResult<Json<DetectionResponse>> {
    let order = service
        .dispensing
        .report_detection(request.order_id, request.couloir, request.quantity.unwrap_or(1))
        .await?;
    Ok(Json(DetectionResponse {
        order_id: order.id,
        dispensing_status: order.dispensing_status(),
    }))
}
