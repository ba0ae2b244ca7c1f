use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor roles form a closed set; operations declare the role they require
/// instead of branching on a free-form string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Passenger => "PASSENGER",
            Role::Driver => "DRIVER",
            Role::Admin => "ADMIN",
        }
    }
}

/// Authenticated identity supplied by the session provider on every call.
/// The engine trusts it and never re-verifies credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub phone: String,
    pub role: Role,
}

impl Actor {
    /// Admins may perform any role-gated operation.
    pub fn require_role(&self, required: Role) -> Result<(), PermissionError> {
        if self.role == required || self.role == Role::Admin {
            Ok(())
        } else {
            Err(PermissionError {
                actor: self.id,
                held: self.role,
                required,
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("actor {actor} holds role {held:?} but the operation requires {required:?}")]
pub struct PermissionError {
    pub actor: Uuid,
    pub held: Role,
    pub required: Role,
}

/// Vehicle details shown to passengers; snapshotted onto trips at booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VehicleDescriptor {
    pub model: String,
    pub registration: String,
    pub photo_url: Option<String>,
}

/// Minimal profile row backing the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub role: Role,
    pub vehicle: Option<VehicleDescriptor>,
    pub photo_url: Option<String>,
}
