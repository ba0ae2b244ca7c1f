use crate::models::Offer;
use async_trait::async_trait;
use switchback_core::RepoError;
use uuid::Uuid;

/// Repository trait for offer data access.
///
/// `update_guarded` is the store's conditional-write primitive: it persists
/// `offer` only if the stored row's version still equals `offer.version`,
/// bumping the version on success. A lost race yields `RepoError::Conflict`
/// and callers re-read before retrying.
#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn insert(&self, offer: &Offer) -> Result<(), RepoError>;

    async fn get(&self, id: Uuid) -> Result<Offer, RepoError>;

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Offer>, RepoError>;

    async fn list_open(&self) -> Result<Vec<Offer>, RepoError>;

    async fn update_guarded(&self, offer: &Offer) -> Result<(), RepoError>;
}
