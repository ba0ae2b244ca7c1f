use crate::models::Trip;
use crate::repository::TripRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switchback_core::RepoError;
use switchback_offer::memory::InMemoryOffers;
use switchback_offer::Offer;
use uuid::Uuid;

/// In-memory trip store sharing its offer map with `InMemoryOffers`, so a
/// booking's reservation and trip insert commit together.
#[derive(Clone)]
pub struct InMemoryTrips {
    offers: InMemoryOffers,
    trips: Arc<Mutex<HashMap<Uuid, Trip>>>,
}

impl InMemoryTrips {
    pub fn new(offers: InMemoryOffers) -> Self {
        Self {
            offers,
            trips: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Trip>>, RepoError> {
        self.trips
            .lock()
            .map_err(|_| RepoError::Unavailable("trip store poisoned".to_string()))
    }
}

#[async_trait]
impl TripRepository for InMemoryTrips {
    async fn insert(&self, trip: &Trip) -> Result<(), RepoError> {
        let mut map = self.lock()?;
        if map.contains_key(&trip.id) {
            return Err(RepoError::Conflict(format!("trip {} already exists", trip.id)));
        }
        map.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Trip, RepoError> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("trip {}", id)))
    }

    async fn list_by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Trip>, RepoError> {
        Ok(self
            .lock()?
            .values()
            .filter(|t| t.passenger_id == passenger_id)
            .cloned()
            .collect())
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Trip>, RepoError> {
        Ok(self
            .lock()?
            .values()
            .filter(|t| t.driver_id == driver_id)
            .cloned()
            .collect())
    }

    async fn list_by_offer(&self, offer_id: Uuid) -> Result<Vec<Trip>, RepoError> {
        Ok(self
            .lock()?
            .values()
            .filter(|t| t.offer_id == Some(offer_id))
            .cloned()
            .collect())
    }

    async fn update(&self, trip: &Trip) -> Result<(), RepoError> {
        let mut map = self.lock()?;
        let stored = map
            .get_mut(&trip.id)
            .ok_or_else(|| RepoError::NotFound(format!("trip {}", trip.id)))?;
        *stored = trip.clone();
        Ok(())
    }

    async fn create_with_reservation(
        &self,
        trip: &Trip,
        reserved_offer: &Offer,
    ) -> Result<(), RepoError> {
        let mut map = self.lock()?;
        if map.contains_key(&trip.id) {
            return Err(RepoError::Conflict(format!("trip {} already exists", trip.id)));
        }
        // Guarded offer write first; if it loses the version race, no trip
        // is inserted and the caller sees a clean conflict.
        self.offers.apply_guarded(reserved_offer)?;
        map.insert(trip.id, trip.clone());
        Ok(())
    }
}
