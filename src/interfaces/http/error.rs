use crate::error::VendingError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::error;

/// A [`VendingError`] on its way out of an HTTP handler.
#[derive(Debug)]
pub struct ApiError(pub VendingError);

impl From<VendingError> for ApiError {
    fn from(err: VendingError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Value) {
        use VendingError as E;
        match &self.0 {
            E::ValidationError(_) | E::CsvError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", json!({})),
            E::InvalidState(_) => (StatusCode::BAD_REQUEST, "INVALID_STATE", json!({})),
            E::CapacityExceeded { capacity, .. } => (
                StatusCode::BAD_REQUEST,
                "CAPACITY_EXCEEDED",
                json!({ "capacity": capacity }),
            ),
            E::TypeConflict { current, .. } => (
                StatusCode::BAD_REQUEST,
                "TYPE_CONFLICT",
                json!({ "currentType": current }),
            ),
            E::InsufficientStock { available, .. } => (
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_STOCK",
                json!({ "available": available }),
            ),
            E::InsufficientFunds { balance, required } => (
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_FUNDS",
                json!({ "balance": balance, "required": required }),
            ),
            E::LimitExceeded {
                limit,
                balance,
                remaining,
            } => (
                StatusCode::BAD_REQUEST,
                "LIMIT_EXCEEDED",
                json!({ "limit": limit, "currentBalance": balance, "remainingCapacity": remaining }),
            ),
            E::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", json!({})),
            E::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT", json!({})),
            E::Unavailable(_) => (StatusCode::CONFLICT, "UNAVAILABLE", json!({})),
            E::Expired(_) => (StatusCode::GONE, "EXPIRED", json!({})),
            E::StorageError(_) | E::IoError(_) | E::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", json!({}))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, extra) = self.parts();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let mut body = json!({ "error": code, "message": message });
        if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
            body.extend(extra);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn body_of(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_limit_exceeded_carries_remaining_capacity() {
        let response = ApiError(VendingError::LimitExceeded {
            limit: dec!(5000),
            balance: dec!(4900),
            remaining: dec!(100),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_of(response).await;
        assert_eq!(body["error"], "LIMIT_EXCEEDED");
        assert_eq!(body["remainingCapacity"], json!(dec!(100)));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (VendingError::not_found("order", "1"), StatusCode::NOT_FOUND),
            (VendingError::conflict("order", "1"), StatusCode::CONFLICT),
            (VendingError::Unavailable("busy".into()), StatusCode::CONFLICT),
            (VendingError::Expired("code".into()), StatusCode::GONE),
            (VendingError::InvalidState("done".into()), StatusCode::BAD_REQUEST),
            (VendingError::InternalError("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_of(ApiError(VendingError::InternalError("secret".into())).into_response()).await;
        assert_eq!(body["message"], "Internal server error");
    }
}
