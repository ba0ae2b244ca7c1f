pub mod app_config;
pub mod database;
pub mod offer_repo;
pub mod redis_repo;
pub mod trip_repo;
pub mod user_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use offer_repo::PostgresOfferRepository;
pub use redis_repo::RedisClient;
pub use trip_repo::PostgresTripRepository;
pub use user_repo::PostgresUserRepository;
