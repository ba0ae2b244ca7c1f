//! The trip state machine. Transitions not listed in `can_transition` fail
//! with `InvalidTransition` and leave the trip untouched.

use crate::models::{Trip, TripStatus};
use chrono::Utc;
use switchback_core::{PermissionError, RepoError};
use switchback_offer::OfferError;

#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: TripStatus, to: TripStatus },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("seats unavailable: {0}")]
    SeatUnavailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Offer(OfferError),

    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for TripError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(what) => TripError::NotFound(what),
            other => TripError::Repo(other),
        }
    }
}

impl From<OfferError> for TripError {
    fn from(e: OfferError) -> Self {
        match e {
            OfferError::SeatUnavailable(msg) => TripError::SeatUnavailable(msg),
            OfferError::NotFound(what) => TripError::NotFound(what),
            other => TripError::Offer(other),
        }
    }
}

/// The transition table. Everything else is illegal.
pub fn can_transition(from: TripStatus, to: TripStatus) -> bool {
    use TripStatus::*;
    match (from, to) {
        (Booked | WaitingConfirmation, Confirmed) => true,
        (Booked | WaitingConfirmation, Cancelled) => true,
        (Confirmed, EnRoute) => true,
        (EnRoute, Arrived) => true,
        (Confirmed | EnRoute | Arrived, Completed) => true,
        // a dispute can be raised instead of confirming, from any live state
        (from, Disputed) => !from.is_terminal(),
        _ => false,
    }
}

/// Apply a transition, stamping completion side effects. Seat release on
/// cancellation is the service's job; this stays pure on the trip itself.
pub fn transition(trip: &mut Trip, to: TripStatus) -> Result<(), TripError> {
    if !can_transition(trip.status, to) {
        return Err(TripError::InvalidTransition {
            from: trip.status,
            to,
        });
    }
    trip.set_status(to);
    if to == TripStatus::Completed {
        trip.completed_at = Some(Utc::now());
        trip.payment_requested = false;
    }
    Ok(())
}
