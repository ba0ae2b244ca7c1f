use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events broadcast to live subscribers after a write has been acknowledged
/// by the store. Consumers replace their cached view wholesale; events carry
/// enough to know *what* changed, not a partial diff to merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    SeatsReserved(SeatsReservedEvent),
    SeatsReleased(SeatsReleasedEvent),
    TripStatusChanged(TripStatusChangedEvent),
    OfferChanged(OfferChangedEvent),
}

impl DomainEvent {
    /// Offer the event pertains to, used for per-offer stream filtering.
    pub fn offer_id(&self) -> Option<Uuid> {
        match self {
            DomainEvent::SeatsReserved(e) => Some(e.offer_id),
            DomainEvent::SeatsReleased(e) => Some(e.offer_id),
            DomainEvent::TripStatusChanged(e) => e.offer_id,
            DomainEvent::OfferChanged(e) => Some(e.offer_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatsReservedEvent {
    pub offer_id: Uuid,
    pub trip_id: Option<Uuid>,
    pub seats: Vec<u8>,
    pub reserved_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatsReleasedEvent {
    pub offer_id: Uuid,
    pub seats: Vec<u8>,
    pub released_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripStatusChangedEvent {
    pub trip_id: Uuid,
    pub offer_id: Option<Uuid>,
    pub status: String,
    pub changed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferChangedEvent {
    pub offer_id: Uuid,
    pub changed_at: i64,
}
