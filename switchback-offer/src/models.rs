use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use switchback_core::identity::VehicleDescriptor;
use switchback_shared::Location;
use uuid::Uuid;

/// Offer status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Open,
    Completed,
    Cancelled,
}

impl OfferStatus {
    /// Terminal offers accept no further bookings or edits.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Completed | OfferStatus::Cancelled)
    }
}

/// A driver-published seat inventory for one route/date/time.
///
/// `version` is the optimistic-lock counter; every persisted write bumps it,
/// and seat mutations are only ever applied conditionally on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub origin: Location,
    pub destination: Location,
    pub date: NaiveDate,
    pub departure_time: NaiveTime,
    pub vehicle: VehicleDescriptor,
    pub total_seats: u8,
    /// Seat indices the driver has enabled for sale, 1-based.
    pub active_seats: Vec<u8>,
    /// Seat indices currently reserved by non-cancelled trips.
    pub booked_seats: Vec<u8>,
    pub price_per_seat_inr: i64,
    /// Per-seat price overrides; seats absent here sell at the uniform price.
    pub seat_price_overrides: BTreeMap<u8, i64>,
    pub status: OfferStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        driver_id: Uuid,
        origin: Location,
        destination: Location,
        date: NaiveDate,
        departure_time: NaiveTime,
        vehicle: VehicleDescriptor,
        total_seats: u8,
        active_seats: Vec<u8>,
        price_per_seat_inr: i64,
        seat_price_overrides: BTreeMap<u8, i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            driver_id,
            origin,
            destination,
            date,
            departure_time,
            vehicle,
            total_seats,
            active_seats,
            booked_seats: Vec::new(),
            price_per_seat_inr,
            seat_price_overrides,
            status: OfferStatus::Open,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OfferStatus::Open
    }

    /// Scheduled departure in the region's local time.
    pub fn departure(&self) -> NaiveDateTime {
        self.date.and_time(self.departure_time)
    }

    pub fn price_for(&self, seat: u8) -> i64 {
        self.seat_price_overrides
            .get(&seat)
            .copied()
            .unwrap_or(self.price_per_seat_inr)
    }

    /// Total fare for a seat selection at current prices.
    pub fn quote(&self, seats: &[u8]) -> i64 {
        seats.iter().map(|s| self.price_for(*s)).sum()
    }

    /// Active seats not yet booked.
    pub fn free_seats(&self) -> Vec<u8> {
        self.active_seats
            .iter()
            .filter(|s| !self.booked_seats.contains(s))
            .copied()
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
