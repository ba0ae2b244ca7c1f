use std::sync::Arc;
use std::time::Duration;
use switchback_core::media::BlobStore;
use switchback_core::payment::PaymentAdapter;
use switchback_core::UserRepository;
use switchback_offer::OfferService;
use switchback_policy::PolicyGate;
use switchback_shared::events::DomainEvent;
use switchback_store::RedisClient;
use switchback_trip::TripService;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct RateLimit {
    pub requests: i64,
    pub window_seconds: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub offers: Arc<OfferService>,
    pub trips: Arc<TripService>,
    pub users: Arc<dyn UserRepository>,
    pub blobs: Arc<dyn BlobStore>,
    pub payments: Arc<dyn PaymentAdapter>,
    pub gate: Arc<PolicyGate>,
    /// Absent in tests and local runs without Redis; rate limiting and
    /// transient seat holds then fail open.
    pub redis: Option<Arc<RedisClient>>,
    pub seat_hold_seconds: u64,
    pub events_tx: broadcast::Sender<DomainEvent>,
    pub auth: AuthConfig,
    pub checkout_secret: String,
    pub gateway_timeout: Duration,
    pub rate_limit: RateLimit,
}
