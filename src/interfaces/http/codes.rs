use super::error::ApiResult;
use super::extract::ApiJson;
use crate::application::VendingService;
use crate::application::orders::OrderLine;
use crate::domain::ids::{MachineId, OrderId, UserId};
use crate::domain::money::Amount;
use crate::domain::order::Order;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeRequest {
    pub user_id: UserId,
    pub products: Vec<OrderLine>,
    pub amount: Option<Amount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeResponse {
    pub code: String,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCodeRequest {
    pub code: String,
    pub vending_machine_id: MachineId,
}

pub async fn generate(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<GenerateCodeRequest>,
) -> ApiResult<(StatusCode, Json<GenerateCodeResponse>)> {
    let code = service
        .codes
        .issue(request.user_id, &request.products, request.amount)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(GenerateCodeResponse {
            code: code.code,
            order_id: code.order,
            amount: code.amount.value(),
            expires_at: code.expires_at,
        }),
    ))
}

pub async fn validate(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<ValidateCodeRequest>,
) -> ApiResult<Json<Order>> {
    let order = service
        .codes
        .validate(request.code.trim(), &request.vending_machine_id)
        .await?;
    Ok(Json(order))
}
