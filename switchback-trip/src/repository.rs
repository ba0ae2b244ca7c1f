use crate::models::Trip;
use async_trait::async_trait;
use switchback_core::RepoError;
use switchback_offer::Offer;
use uuid::Uuid;

/// Repository trait for trip data access.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn insert(&self, trip: &Trip) -> Result<(), RepoError>;

    async fn get(&self, id: Uuid) -> Result<Trip, RepoError>;

    async fn list_by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Trip>, RepoError>;

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Trip>, RepoError>;

    async fn list_by_offer(&self, offer_id: Uuid) -> Result<Vec<Trip>, RepoError>;

    /// Plain update; trip fields are single-writer at any point in the
    /// lifecycle so last-writer-wins is acceptable here.
    async fn update(&self, trip: &Trip) -> Result<(), RepoError>;

    /// Atomically persist the seat reservation (a guarded write of
    /// `reserved_offer`, conditioned on its version) together with the new
    /// trip. Either both land or neither does; a lost version race yields
    /// `RepoError::Conflict` with no trip row.
    async fn create_with_reservation(
        &self,
        trip: &Trip,
        reserved_offer: &Offer,
    ) -> Result<(), RepoError>;
}
