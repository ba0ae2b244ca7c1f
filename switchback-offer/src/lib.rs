pub mod inventory;
pub mod memory;
pub mod models;
pub mod repository;
pub mod service;

pub use models::{Offer, OfferStatus};
pub use repository::OfferRepository;
pub use service::{NewOffer, OfferError, OfferPatch, OfferService};
