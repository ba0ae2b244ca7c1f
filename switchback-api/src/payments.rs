use axum::{
    extract::State,
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use switchback_core::payment::{verify_checkout_signature, PaymentError, PaymentOrder};
use switchback_core::Actor;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/order", post(create_order))
        .route("/v1/payments/verify", post(verify_checkout))
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    trip_id: Uuid,
}

async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<PaymentOrder>, AppError> {
    let trip = state.trips.get(req.trip_id).await?;
    if trip.passenger_id != actor.id {
        return Err(AppError::Forbidden("only the trip's passenger may pay".to_string()));
    }

    // Bounded call to the gateway; a hung upstream surfaces as 504, not a
    // stuck request.
    let order = tokio::time::timeout(
        state.gateway_timeout,
        state.payments.create_order(trip.id, trip.total_fare_inr),
    )
    .await
    .map_err(|_| PaymentError::Timeout)??;

    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    order_id: String,
    payment_id: String,
    signature: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    verified: bool,
}

/// Server-side check of the gateway's checkout signature. Rejection is a
/// hard failure; the client's claim of success is never trusted on its own.
async fn verify_checkout(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    verify_checkout_signature(
        &req.order_id,
        &req.payment_id,
        &req.signature,
        state.checkout_secret.as_bytes(),
    )?;
    Ok(Json(VerifyResponse { verified: true }))
}
