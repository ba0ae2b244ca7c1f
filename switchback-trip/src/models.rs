use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use switchback_core::identity::VehicleDescriptor;
use switchback_offer::Offer;
use switchback_shared::Location;
use uuid::Uuid;

/// Trip status in the lifecycle.
///
/// BOOKED is the entry state for direct bookings with no originating offer;
/// WAITING_CONFIRMATION for offer-backed ones. Both accept the same events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Booked,
    WaitingConfirmation,
    Confirmed,
    EnRoute,
    Arrived,
    Completed,
    Cancelled,
    Disputed,
}

impl TripStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TripStatus::Completed | TripStatus::Cancelled | TripStatus::Disputed
        )
    }
}

/// One entry in a trip's chat log. Timestamps are server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// A passenger's booking of specific seats, optionally against an offer.
///
/// Route, vehicle and driver details are snapshotted at booking time, so
/// later offer edits never retroactively change a trip's displayed terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub offer_id: Option<Uuid>,
    pub driver_id: Uuid,
    pub origin: Location,
    pub destination: Location,
    pub date: NaiveDate,
    pub departure_time: NaiveTime,
    pub vehicle: VehicleDescriptor,
    pub seats: Vec<u8>,
    pub total_fare_inr: i64,
    pub status: TripStatus,
    pub messages: Vec<TripMessage>,
    /// Post-completion rating, 1..=5.
    pub rating: Option<u8>,
    pub payment_requested: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Booking against an offer: snapshot the offer's terms and price the
    /// seats at booking time.
    pub fn from_offer(passenger_id: Uuid, offer: &Offer, seats: Vec<u8>) -> Self {
        let now = Utc::now();
        let total_fare_inr = offer.quote(&seats);
        Self {
            id: Uuid::new_v4(),
            passenger_id,
            offer_id: Some(offer.id),
            driver_id: offer.driver_id,
            origin: offer.origin,
            destination: offer.destination,
            date: offer.date,
            departure_time: offer.departure_time,
            vehicle: offer.vehicle.clone(),
            seats,
            total_fare_inr,
            status: TripStatus::WaitingConfirmation,
            messages: Vec::new(),
            rating: None,
            payment_requested: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Direct booking arranged off-inventory; no seat reservation involved.
    #[allow(clippy::too_many_arguments)]
    pub fn direct(
        passenger_id: Uuid,
        driver_id: Uuid,
        origin: Location,
        destination: Location,
        date: NaiveDate,
        departure_time: NaiveTime,
        vehicle: VehicleDescriptor,
        total_fare_inr: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            passenger_id,
            offer_id: None,
            driver_id,
            origin,
            destination,
            date,
            departure_time,
            vehicle,
            seats: Vec::new(),
            total_fare_inr,
            status: TripStatus::Booked,
            messages: Vec::new(),
            rating: None,
            payment_requested: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Scheduled departure in the region's local time.
    pub fn departure(&self) -> NaiveDateTime {
        self.date.and_time(self.departure_time)
    }

    /// Hours from `now` until departure; negative once departed. Logged on
    /// cancellation for audit, no penalty schedule is applied.
    pub fn hours_until_departure(&self, now: NaiveDateTime) -> f64 {
        (self.departure() - now).num_minutes() as f64 / 60.0
    }

    pub fn set_status(&mut self, status: TripStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
