use crate::database::{db_err, json_err};
use crate::offer_repo::guarded_update;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use switchback_core::RepoError;
use switchback_offer::Offer;
use switchback_shared::Location;
use switchback_trip::repository::TripRepository;
use switchback_trip::{Trip, TripStatus};
use uuid::Uuid;

pub struct PostgresTripRepository {
    pub pool: PgPool,
}

const SELECT_TRIP: &str = r#"
    SELECT id, passenger_id, offer_id, driver_id, origin, destination, date,
           departure_time, vehicle, seats, total_fare_inr, status, messages,
           rating, payment_requested, completed_at, created_at, updated_at
    FROM trips
"#;

fn parse_location(s: &str) -> Result<Location, RepoError> {
    s.parse()
        .map_err(|e: switchback_shared::UnknownLocation| RepoError::Data(e.to_string()))
}

fn status_to_text(status: TripStatus) -> Result<String, RepoError> {
    match serde_json::to_value(status).map_err(json_err)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(RepoError::Data(format!("unexpected status encoding: {}", other))),
    }
}

fn status_from_text(s: &str) -> Result<TripStatus, RepoError> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(json_err)
}

fn trip_from_row(row: &PgRow) -> Result<Trip, RepoError> {
    let origin: String = row.try_get("origin").map_err(db_err)?;
    let destination: String = row.try_get("destination").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;
    let vehicle: serde_json::Value = row.try_get("vehicle").map_err(db_err)?;
    let seats: serde_json::Value = row.try_get("seats").map_err(db_err)?;
    let messages: serde_json::Value = row.try_get("messages").map_err(db_err)?;
    let rating: Option<i16> = row.try_get("rating").map_err(db_err)?;

    Ok(Trip {
        id: row.try_get("id").map_err(db_err)?,
        passenger_id: row.try_get("passenger_id").map_err(db_err)?,
        offer_id: row.try_get("offer_id").map_err(db_err)?,
        driver_id: row.try_get("driver_id").map_err(db_err)?,
        origin: parse_location(&origin)?,
        destination: parse_location(&destination)?,
        date: row.try_get("date").map_err(db_err)?,
        departure_time: row.try_get("departure_time").map_err(db_err)?,
        vehicle: serde_json::from_value(vehicle).map_err(json_err)?,
        seats: serde_json::from_value(seats).map_err(json_err)?,
        total_fare_inr: row.try_get("total_fare_inr").map_err(db_err)?,
        status: status_from_text(&status)?,
        messages: serde_json::from_value(messages).map_err(json_err)?,
        rating: rating.map(|r| r as u8),
        payment_requested: row.try_get("payment_requested").map_err(db_err)?,
        completed_at: row.try_get("completed_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

async fn insert_trip<'e, E>(executor: E, trip: &Trip) -> Result<(), RepoError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO trips (id, passenger_id, offer_id, driver_id, origin, destination,
                           date, departure_time, vehicle, seats, total_fare_inr, status,
                           messages, rating, payment_requested, completed_at,
                           created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(trip.id)
    .bind(trip.passenger_id)
    .bind(trip.offer_id)
    .bind(trip.driver_id)
    .bind(trip.origin.as_str())
    .bind(trip.destination.as_str())
    .bind(trip.date)
    .bind(trip.departure_time)
    .bind(serde_json::to_value(&trip.vehicle).map_err(json_err)?)
    .bind(serde_json::to_value(&trip.seats).map_err(json_err)?)
    .bind(trip.total_fare_inr)
    .bind(status_to_text(trip.status)?)
    .bind(serde_json::to_value(&trip.messages).map_err(json_err)?)
    .bind(trip.rating.map(|r| r as i16))
    .bind(trip.payment_requested)
    .bind(trip.completed_at)
    .bind(trip.created_at)
    .bind(trip.updated_at)
    .execute(executor)
    .await
    .map_err(db_err)?;
    Ok(())
}

#[async_trait]
impl TripRepository for PostgresTripRepository {
    async fn insert(&self, trip: &Trip) -> Result<(), RepoError> {
        insert_trip(&self.pool, trip).await
    }

    async fn get(&self, id: Uuid) -> Result<Trip, RepoError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_TRIP))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| RepoError::NotFound(format!("trip {}", id)))?;
        trip_from_row(&row)
    }

    async fn list_by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Trip>, RepoError> {
        let rows = sqlx::query(&format!(
            "{} WHERE passenger_id = $1 ORDER BY created_at DESC",
            SELECT_TRIP
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(trip_from_row).collect()
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Trip>, RepoError> {
        let rows = sqlx::query(&format!(
            "{} WHERE driver_id = $1 ORDER BY created_at DESC",
            SELECT_TRIP
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(trip_from_row).collect()
    }

    async fn list_by_offer(&self, offer_id: Uuid) -> Result<Vec<Trip>, RepoError> {
        let rows = sqlx::query(&format!("{} WHERE offer_id = $1", SELECT_TRIP))
            .bind(offer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(trip_from_row).collect()
    }

    async fn update(&self, trip: &Trip) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = $2, seats = $3, messages = $4, rating = $5,
                payment_requested = $6, completed_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(trip.id)
        .bind(status_to_text(trip.status)?)
        .bind(serde_json::to_value(&trip.seats).map_err(json_err)?)
        .bind(serde_json::to_value(&trip.messages).map_err(json_err)?)
        .bind(trip.rating.map(|r| r as i16))
        .bind(trip.payment_requested)
        .bind(trip.completed_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("trip {}", trip.id)));
        }
        Ok(())
    }

    /// Seat reservation and trip insert in one transaction. The offer write
    /// is conditioned on the caller's read version; zero rows means the
    /// transaction rolls back with a conflict and no trip row exists.
    async fn create_with_reservation(
        &self,
        trip: &Trip,
        reserved_offer: &Offer,
    ) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let affected = guarded_update(&mut *tx, reserved_offer).await?;
        if affected == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Err(RepoError::Conflict(format!(
                "offer {} moved past version {}",
                reserved_offer.id, reserved_offer.version
            )));
        }

        insert_trip(&mut *tx, trip).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
