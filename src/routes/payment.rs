use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/payments",
            get(commands::payment::get_payments_axum).post(commands::payment::create_payment_axum),
        )
        .route(
            "/api/payments/by-month",
            get(commands::payment::get_payments_by_month_axum),
        )
        .route(
            "/api/payments/batch",
            post(commands::payment::create_payment_batch_axum),
        )
        .route(
            "/api/payments/:id",
            put(commands::payment::update_payment_axum).delete(commands::payment::delete_payment_axum),
        )
        // Catalog
        .route(
            "/api/payment-types",
            get(commands::payment_type::get_payment_types_axum)
                .post(commands::payment_type::create_payment_type_axum),
        )
        // Receipts
        .route(
            "/api/receipts/preview",
            post(commands::receipt::preview_receipt_axum),
        )
        .route("/api/receipts/pdf", post(commands::receipt::receipt_pdf_axum))
}
