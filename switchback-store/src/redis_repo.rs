use redis::{AsyncCommands, RedisResult};
use tracing::debug;
use uuid::Uuid;

/// Transient coordination state: short-lived seat holds while a booking is
/// in flight, and per-caller rate limiting. Durable truth stays in Postgres;
/// everything here may vanish on restart without correctness loss.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Take a short-lived hold on a seat while the booking transaction runs.
    /// Returns false if another booking already holds it; the database's
    /// version guard remains the final arbiter.
    pub async fn acquire_seat_hold(
        &self,
        offer_id: Uuid,
        seat: u8,
        trip_id: Uuid,
        ttl_seconds: u64,
    ) -> Result<bool, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("seat:{}:{}", offer_id, seat);

        // SET NX: only set if the key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(trip_id.to_string())
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    pub async fn release_seat_hold(&self, offer_id: Uuid, seat: u8) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("seat:{}:{}", offer_id, seat);
        conn.del(key).await
    }

    /// Fixed-window counter. Returns true while the caller is under the
    /// limit for the current window.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        if count > limit {
            debug!(key, count, limit, "rate limit exceeded");
        }
        Ok(count <= limit)
    }
}
