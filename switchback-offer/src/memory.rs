use crate::models::Offer;
use crate::repository::OfferRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switchback_core::RepoError;
use uuid::Uuid;

/// In-memory offer store with the same conditional-write semantics as the
/// Postgres repository. Backs unit and router tests.
#[derive(Clone, Default)]
pub struct InMemoryOffers {
    inner: Arc<Mutex<HashMap<Uuid, Offer>>>,
}

impl InMemoryOffers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Offer>>, RepoError> {
        self.inner
            .lock()
            .map_err(|_| RepoError::Unavailable("offer store poisoned".to_string()))
    }

    /// Synchronous guarded write, shared with the in-memory trip store so a
    /// booking can couple its reservation and trip insert atomically.
    pub fn apply_guarded(&self, offer: &Offer) -> Result<(), RepoError> {
        let mut map = self.lock()?;
        let stored = map
            .get_mut(&offer.id)
            .ok_or_else(|| RepoError::NotFound(format!("offer {}", offer.id)))?;
        if stored.version != offer.version {
            return Err(RepoError::Conflict(format!(
                "offer {} moved from version {} to {}",
                offer.id, offer.version, stored.version
            )));
        }
        let mut next = offer.clone();
        next.version += 1;
        *stored = next;
        Ok(())
    }
}

#[async_trait]
impl OfferRepository for InMemoryOffers {
    async fn insert(&self, offer: &Offer) -> Result<(), RepoError> {
        let mut map = self.lock()?;
        if map.contains_key(&offer.id) {
            return Err(RepoError::Conflict(format!("offer {} already exists", offer.id)));
        }
        map.insert(offer.id, offer.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Offer, RepoError> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("offer {}", id)))
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Offer>, RepoError> {
        Ok(self
            .lock()?
            .values()
            .filter(|o| o.driver_id == driver_id)
            .cloned()
            .collect())
    }

    async fn list_open(&self) -> Result<Vec<Offer>, RepoError> {
        Ok(self.lock()?.values().filter(|o| o.is_open()).cloned().collect())
    }

    async fn update_guarded(&self, offer: &Offer) -> Result<(), RepoError> {
        self.apply_guarded(offer)
    }
}
