use super::error::ApiResult;
use super::extract::ApiJson;
use crate::application::VendingService;
use crate::domain::ids::UserId;
use crate::domain::money::{Amount, Balance};
use crate::domain::wallet::WalletTransaction;
use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsRequest {
    pub user_id: UserId,
    pub amount: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: UserId,
    pub balance: Balance,
    pub limit: Balance,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub user_id: UserId,
    pub transactions: Vec<WalletTransaction>,
}

pub async fn add_funds(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<FundsRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let wallet = service.wallets.deposit(request.user_id, request.amount).await?;
    Ok(Json(BalanceResponse {
        user_id: wallet.user,
        balance: wallet.balance,
        limit: service.wallets.cap(),
    }))
}

pub async fn payment(
    State(service): State<VendingService>,
    ApiJson(request): ApiJson<FundsRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let wallet = service.wallets.debit(request.user_id, request.amount).await?;
    Ok(Json(BalanceResponse {
        user_id: wallet.user,
        balance: wallet.balance,
        limit: service.wallets.cap(),
    }))
}

pub async fn balance(
    State(service): State<VendingService>,
    Path(user): Path<UserId>,
) -> ApiResult<Json<BalanceResponse>> {
    Ok(Json(BalanceResponse {
        user_id: user,
        balance: service.wallets.balance(user).await?,
        limit: service.wallets.cap(),
    }))
}

pub async fn transactions(
    State(service): State<VendingService>,
    Path(user): Path<UserId>,
) -> ApiResult<Json<TransactionsResponse>> {
    Ok(Json(TransactionsResponse {
        user_id: user,
        transactions: service.wallets.history(user).await?,
    }))
}
