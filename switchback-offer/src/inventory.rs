//! Seat-set arithmetic for one offer. These functions are pure with respect
//! to persistence; the service layer wraps them in conditional writes.

use crate::models::Offer;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SeatError {
    #[error("no seats selected")]
    EmptySelection,

    #[error("offer has no active seats")]
    NoActiveSeats,

    #[error("seat {seat} is out of range 1..={total}")]
    OutOfRange { seat: u8, total: u8 },

    #[error("seat {0} is listed more than once")]
    Duplicate(u8),

    #[error("seat {0} is not open for sale on this offer")]
    NotActive(u8),

    #[error("seat {0} is already booked")]
    AlreadyBooked(u8),
}

/// Validate a seat plan at offer-creation time: active seats must be a
/// non-empty, duplicate-free subset of 1..=total.
pub fn validate_seat_plan(total: u8, active: &[u8]) -> Result<(), SeatError> {
    if active.is_empty() {
        return Err(SeatError::NoActiveSeats);
    }
    check_well_formed(total, active)
}

/// Mark `seats` as booked. Every requested seat must be active and free;
/// on any failure the offer is left untouched.
pub fn reserve(offer: &mut Offer, seats: &[u8]) -> Result<(), SeatError> {
    if seats.is_empty() {
        return Err(SeatError::EmptySelection);
    }
    check_well_formed(offer.total_seats, seats)?;
    for seat in seats {
        if !offer.active_seats.contains(seat) {
            return Err(SeatError::NotActive(*seat));
        }
        if offer.booked_seats.contains(seat) {
            return Err(SeatError::AlreadyBooked(*seat));
        }
    }
    offer.booked_seats.extend_from_slice(seats);
    offer.booked_seats.sort_unstable();
    offer.touch();
    Ok(())
}

/// Remove `seats` from the booked set. Idempotent; seats not currently
/// booked are skipped.
pub fn release(offer: &mut Offer, seats: &[u8]) {
    offer.booked_seats.retain(|s| !seats.contains(s));
    offer.touch();
}

/// Invariant check: booked ⊆ active ⊆ 1..=total, no duplicates anywhere.
pub fn check_invariants(offer: &Offer) -> Result<(), SeatError> {
    check_well_formed(offer.total_seats, &offer.active_seats)?;
    check_well_formed(offer.total_seats, &offer.booked_seats)?;
    for seat in &offer.booked_seats {
        if !offer.active_seats.contains(seat) {
            return Err(SeatError::NotActive(*seat));
        }
    }
    Ok(())
}

fn check_well_formed(total: u8, seats: &[u8]) -> Result<(), SeatError> {
    for (i, seat) in seats.iter().enumerate() {
        if *seat < 1 || *seat > total {
            return Err(SeatError::OutOfRange { seat: *seat, total });
        }
        if seats[..i].contains(seat) {
            return Err(SeatError::Duplicate(*seat));
        }
    }
    Ok(())
}
