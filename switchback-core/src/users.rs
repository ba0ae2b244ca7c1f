use crate::error::RepoError;
use crate::identity::UserProfile;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Profile storage behind the session provider's identities.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<UserProfile, RepoError>;

    async fn upsert(&self, user: &UserProfile) -> Result<(), RepoError>;

    async fn set_photo_url(&self, id: Uuid, url: &str) -> Result<(), RepoError>;
}

#[derive(Clone, Default)]
pub struct InMemoryUsers {
    inner: Arc<Mutex<HashMap<Uuid, UserProfile>>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, UserProfile>>, RepoError> {
        self.inner
            .lock()
            .map_err(|_| RepoError::Unavailable("user store poisoned".to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn get(&self, id: Uuid) -> Result<UserProfile, RepoError> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("user {}", id)))
    }

    async fn upsert(&self, user: &UserProfile) -> Result<(), RepoError> {
        self.lock()?.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_photo_url(&self, id: Uuid, url: &str) -> Result<(), RepoError> {
        let mut map = self.lock()?;
        let user = map
            .get_mut(&id)
            .ok_or_else(|| RepoError::NotFound(format!("user {}", id)))?;
        user.photo_url = Some(url.to_string());
        Ok(())
    }
}
