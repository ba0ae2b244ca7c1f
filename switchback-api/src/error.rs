use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use switchback_core::payment::PaymentError;
use switchback_core::{PermissionError, RepoError};
use switchback_offer::OfferError;
use switchback_policy::PolicyError;
use switchback_trip::TripError;

#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    Forbidden(String),
    Validation(String),
    NotFound(String),
    Conflict(String),
    GatewayTimeout(String),
    Backend(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            AppError::Backend(msg) => {
                tracing::error!("backend error: {}", msg);
                (StatusCode::BAD_GATEWAY, "upstream dependency failed".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<PermissionError> for AppError {
    fn from(e: PermissionError) -> Self {
        AppError::Forbidden(e.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(what) => AppError::NotFound(what),
            RepoError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Backend(other.to_string()),
        }
    }
}

impl From<OfferError> for AppError {
    fn from(e: OfferError) -> Self {
        match e {
            OfferError::Validation(msg) => AppError::Validation(msg),
            OfferError::SeatUnavailable(msg) | OfferError::Conflict(msg) => AppError::Conflict(msg),
            OfferError::NotFound(what) => AppError::NotFound(what),
            OfferError::Forbidden(msg) => AppError::Forbidden(msg),
            OfferError::Permission(p) => p.into(),
            OfferError::Repo(r) => r.into(),
        }
    }
}

impl From<TripError> for AppError {
    fn from(e: TripError) -> Self {
        match e {
            TripError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            TripError::Validation(msg) => AppError::Validation(msg),
            TripError::SeatUnavailable(msg) => AppError::Conflict(msg),
            TripError::NotFound(what) => AppError::NotFound(what),
            TripError::Forbidden(msg) => AppError::Forbidden(msg),
            TripError::Permission(p) => p.into(),
            TripError::Offer(o) => o.into(),
            TripError::Repo(r) => r.into(),
        }
    }
}

impl From<PolicyError> for AppError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::TooSoon { .. }
            | PolicyError::BeyondHorizon { .. }
            | PolicyError::TooManySeats { .. } => AppError::Validation(e.to_string()),
            PolicyError::Overlap { .. }
            | PolicyError::TooManyCommitments { .. }
            | PolicyError::NotCancellable { .. } => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Timeout => AppError::GatewayTimeout(e.to_string()),
            PaymentError::Gateway(msg) => AppError::Backend(msg),
            PaymentError::MalformedSignature | PaymentError::SignatureMismatch => {
                AppError::Validation(e.to_string())
            }
        }
    }
}

impl From<switchback_core::media::MediaError> for AppError {
    fn from(e: switchback_core::media::MediaError) -> Self {
        match e {
            switchback_core::media::MediaError::Timeout => AppError::GatewayTimeout(e.to_string()),
            other => AppError::Backend(other.to_string()),
        }
    }
}
