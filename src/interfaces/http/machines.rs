use super::error::ApiResult;
use super::extract::ApiJson;
use crate::application::VendingService;
use crate::domain::ids::MachineId;
use crate::domain::machine::{LaneMapping, Machine, MachineStatus};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMachineRequest {
    pub id: MachineId,
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: MachineStatus,
}

#[derive(Debug, Deserialize)]
pub struct MappingRequest {
    pub lanes: Vec<LaneMapping>,
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub lane: u8,
    pub delta: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub lane: u8,
    pub stock_level: u32,
}

pub async fn list(State(service): State<VendingService>) -> ApiResult<Json<Vec<Machine>>> {
    Ok(Json(service.machines.list().await?))
}

pub async fn register(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<RegisterMachineRequest>,
) -> ApiResult<(StatusCode, Json<Machine>)> {
    let machine = service
        .machines
        .register(request.id, &request.name, &request.location)
        .await?;
    Ok((StatusCode::CREATED, Json(machine)))
}

pub async fn get(State(service): State<VendingService>, Path(id): Path<MachineId>) -> ApiResult<Json<Machine>> {
    Ok(Json(service.machines.get(&id).await?))
}

pub async fn set_status(
    State(service): State<VendingService>,
    Path(id): Path<MachineId>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<Json<Machine>> {
    Ok(Json(service.machines.set_status(&id, request.status).await?))
}

pub async fn update_mapping(
    State(service): State<VendingService>,
    Path(id): Path<MachineId>,
    ApiJson(request): ApiJson<MappingRequest>,
) -> ApiResult<Json<Machine>> {
    Ok(Json(service.machines.update_lane_mapping(&id, request.lanes).await?))
}

pub async fn adjust_stock(
    State(service): State<VendingService>,
    Path(id): Path<MachineId>,
    ApiJson(request): ApiJson<StockRequest>,
) -> ApiResult<Json<StockResponse>> {
    let stock_level = service.machines.adjust_stock(&id, request.lane, request.delta).await?;
    Ok(Json(StockResponse {
        lane: request.lane,
        stock_level,
    }))
}
