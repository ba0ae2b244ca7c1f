use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use switchback_trip::lifecycle;
use switchback_trip::TripStatus;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("departure must be at least {minutes} minutes from now")]
    TooSoon { minutes: i64 },

    #[error("departure is more than {days} days out")]
    BeyondHorizon { days: i64 },

    #[error("departure overlaps an existing commitment at {with}")]
    Overlap { with: NaiveDateTime },

    #[error("active commitment limit of {limit} reached")]
    TooManyCommitments { limit: usize },

    #[error("at most {limit} seats per booking")]
    TooManySeats { limit: usize },

    #[error("a {status:?} trip cannot be cancelled")]
    NotCancellable { status: TripStatus },
}

/// Tunable scheduling rules. Defaults match the operator's configuration;
/// the store's config layer can override any of them.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConstants {
    pub advance_notice_minutes: i64,
    pub overlap_window_minutes: i64,
    pub posting_horizon_days: i64,
    pub max_active_commitments: usize,
    pub max_seats_per_booking: usize,
}

impl Default for PolicyConstants {
    fn default() -> Self {
        Self {
            advance_notice_minutes: 60,
            overlap_window_minutes: 60,
            posting_horizon_days: 60,
            max_active_commitments: 10,
            max_seats_per_booking: 4,
        }
    }
}

/// Stateless rule checks over a caller-supplied view of existing
/// commitments (departures of the actor's non-terminal offers and trips).
#[derive(Debug, Clone, Default)]
pub struct PolicyGate {
    constants: PolicyConstants,
}

impl PolicyGate {
    pub fn new(constants: PolicyConstants) -> Self {
        Self { constants }
    }

    pub fn constants(&self) -> &PolicyConstants {
        &self.constants
    }

    /// Departure must sit inside [now + notice, now + horizon].
    fn check_window(&self, now: NaiveDateTime, departure: NaiveDateTime) -> Result<(), PolicyError> {
        if departure < now + Duration::minutes(self.constants.advance_notice_minutes) {
            return Err(PolicyError::TooSoon {
                minutes: self.constants.advance_notice_minutes,
            });
        }
        if departure > now + Duration::days(self.constants.posting_horizon_days) {
            return Err(PolicyError::BeyondHorizon {
                days: self.constants.posting_horizon_days,
            });
        }
        Ok(())
    }

    /// Symmetric overlap window around each existing departure.
    fn check_overlap(
        &self,
        departure: NaiveDateTime,
        existing: &[NaiveDateTime],
    ) -> Result<(), PolicyError> {
        let window = Duration::minutes(self.constants.overlap_window_minutes);
        for &other in existing {
            let gap = if departure > other {
                departure - other
            } else {
                other - departure
            };
            if gap < window {
                return Err(PolicyError::Overlap { with: other });
            }
        }
        Ok(())
    }

    fn check_cap(&self, active: usize) -> Result<(), PolicyError> {
        if active >= self.constants.max_active_commitments {
            return Err(PolicyError::TooManyCommitments {
                limit: self.constants.max_active_commitments,
            });
        }
        Ok(())
    }

    /// Gate for a driver posting a new offer. `existing` holds the
    /// departures of the driver's non-terminal offers and trips.
    pub fn can_post_offer(
        &self,
        now: NaiveDateTime,
        departure: NaiveDateTime,
        existing: &[NaiveDateTime],
    ) -> Result<(), PolicyError> {
        self.check_cap(existing.len())?;
        self.check_window(now, departure)?;
        self.check_overlap(departure, existing)?;
        Ok(())
    }

    /// Gate for a passenger booking seats: only the per-booking seat cap.
    /// Offer state and seat availability are checked by the booking service
    /// against a fresh snapshot; passengers face no scheduling windows, they
    /// may book any open offer up to its departure, on any schedule.
    pub fn can_book_trip(&self, seat_count: usize) -> Result<(), PolicyError> {
        if seat_count > self.constants.max_seats_per_booking {
            return Err(PolicyError::TooManySeats {
                limit: self.constants.max_seats_per_booking,
            });
        }
        Ok(())
    }

    /// Cancellation is a lifecycle question, not a scheduling one; a trip
    /// past its confirmation point must be disputed instead.
    pub fn can_cancel_trip(&self, status: TripStatus) -> Result<(), PolicyError> {
        if !lifecycle::can_transition(status, TripStatus::Cancelled) {
            return Err(PolicyError::NotCancellable { status });
        }
        Ok(())
    }
}
