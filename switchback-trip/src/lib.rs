pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod repository;
pub mod service;

pub use lifecycle::TripError;
pub use models::{Trip, TripMessage, TripStatus};
pub use repository::TripRepository;
pub use service::TripService;
