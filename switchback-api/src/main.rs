use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use switchback_api::{app, state::{AppState, AuthConfig, RateLimit}};
use switchback_core::media::MockBlobStore;
use switchback_core::payment::MockPaymentAdapter;
use switchback_offer::OfferService;
use switchback_policy::PolicyGate;
use switchback_store::{DbClient, PostgresOfferRepository, PostgresTripRepository, PostgresUserRepository, RedisClient};
use switchback_trip::TripService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchback_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = switchback_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Switchback API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let redis = RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");

    let offers = Arc::new(OfferService::new(
        Arc::new(PostgresOfferRepository { pool: db.pool.clone() }),
        config.business_rules.posting_horizon_days,
    ));
    let trips = Arc::new(TripService::new(
        Arc::new(PostgresTripRepository { pool: db.pool.clone() }),
        offers.clone(),
        config.business_rules.max_seats_per_booking,
    ));

    let (events_tx, _) = tokio::sync::broadcast::channel(100);

    let app_state = AppState {
        offers,
        trips,
        users: Arc::new(PostgresUserRepository { pool: db.pool.clone() }),
        blobs: Arc::new(MockBlobStore),
        payments: Arc::new(MockPaymentAdapter),
        gate: Arc::new(PolicyGate::new(config.business_rules.clone())),
        redis: Some(Arc::new(redis)),
        seat_hold_seconds: config.redis.seat_hold_seconds,
        events_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        checkout_secret: config.payment.checkout_secret.clone(),
        gateway_timeout: Duration::from_secs(config.payment.gateway_timeout_seconds),
        rate_limit: RateLimit {
            requests: config.rate_limit.requests,
            window_seconds: config.rate_limit.window_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
