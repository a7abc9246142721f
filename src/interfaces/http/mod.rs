//! JSON over HTTP, built on axum.
//!
//! Payloads use camelCase. Errors map to status codes in [`error`].

pub mod carriers;
pub mod codes;
pub mod dispensing;
pub mod error;
pub mod extract;
pub mod machines;
pub mod orders;
pub mod wallet;

use crate::application::VendingService;
use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(service: VendingService) -> Router {
    Router::new()
        .route("/order", post(orders::create_order))
        .route("/order/pending", get(orders::pending_order))
        .route("/order/complete", post(orders::complete_order))
        .route("/order/fail", post(orders::fail_order))
        .route("/order/status/{id}", get(orders::order_status))
        .route("/order/{id}", get(orders::get_order))
        .route("/order/{id}/cancel", post(orders::cancel_order))
        .route("/dispense/next-order", get(dispensing::next_order))
        .route("/dispense/detection", post(dispensing::detection))
        .route("/code/generate", post(codes::generate))
        .route("/code/validate", post(codes::validate))
        .route("/code/use", post(codes::validate))
        .route("/ewallet/add-funds", post(wallet::add_funds))
        .route("/ewallet/payment", post(wallet::payment))
        .route("/ewallet/transactions/{user}", get(wallet::transactions))
        .route("/ewallet/{user}", get(wallet::balance))
        .route("/chariot", get(carriers::list).post(carriers::create))
        .route("/chariot/{id}", get(carriers::get))
        .route("/chariot/{id}/products", post(carriers::add_product))
        .route("/chariot/{id}/products/{product}", delete(carriers::remove_product))
        .route("/chariot/{id}/empty", post(carriers::empty))
        .route("/hardware", get(machines::list).post(machines::register))
        .route("/hardware/{id}", get(machines::get))
        .route("/hardware/{id}/status", put(machines::set_status))
        .route("/hardware/{id}/mapping", put(machines::update_mapping))
        .route("/hardware/{id}/stock", post(machines::adjust_stock))
        .route("/health", get(health_check))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub async fn health_check() -> &'static str {
    "OK"
}
