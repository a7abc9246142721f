use super::error::ApiResult;
use super::extract::ApiJson;
use crate::application::VendingService;
use crate::domain::carrier::Carrier;
use crate::domain::ids::{CarrierId, ProductId};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCarrierRequest {
    pub name: String,
    pub capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProductRequest {
    pub product_id: ProductId,
}

pub async fn list(State(service): State<VendingService>) -> ApiResult<Json<Vec<Carrier>>> {
    Ok(Json(service.carriers.list().await?))
}

pub async fn create(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<CreateCarrierRequest>,
) -> ApiResult<(StatusCode, Json<Carrier>)> {
    let carrier = service.carriers.create(&request.name, request.capacity).await?;
    Ok((StatusCode::CREATED, Json(carrier)))
}

pub async fn get(State(service): State<VendingService>, Path(id): Path<CarrierId>) -> ApiResult<Json<Carrier>> {
    Ok(Json(service.carriers.get(id).await?))
}

pub async fn add_product(
    State(service): State<VendingService>,
    Path(id): Path<CarrierId>,
    ApiJson(request): ApiJson<AddProductRequest>,
) -> ApiResult<Json<Carrier>> {
    Ok(Json(service.carriers.add_product(id, request.product_id).await?))
}

pub async fn remove_product(
    State(service): State<VendingService>,
    Path((id, product)): Path<(CarrierId, ProductId)>,
) -> ApiResult<Json<Carrier>> {
    Ok(Json(service.carriers.remove_product(id, product).await?))
}

pub async fn empty(State(service): State<VendingService>, Path(id): Path<CarrierId>) -> ApiResult<Json<Carrier>> {
    Ok(Json(service.carriers.empty(id).await?))
}
