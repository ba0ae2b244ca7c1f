use crate::database::{db_err, json_err};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use switchback_core::RepoError;
use switchback_offer::repository::OfferRepository;
use switchback_offer::{Offer, OfferStatus};
use switchback_shared::Location;
use uuid::Uuid;

pub struct PostgresOfferRepository {
    pub pool: PgPool,
}

const SELECT_OFFER: &str = r#"
    SELECT id, driver_id, origin, destination, date, departure_time, vehicle,
           total_seats, active_seats, booked_seats, price_per_seat_inr,
           seat_price_overrides, status, version, created_at, updated_at
    FROM offers
"#;

fn parse_location(s: &str) -> Result<Location, RepoError> {
    s.parse().map_err(|e: switchback_shared::UnknownLocation| RepoError::Data(e.to_string()))
}

fn status_to_text(status: OfferStatus) -> Result<String, RepoError> {
    match serde_json::to_value(status).map_err(json_err)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(RepoError::Data(format!("unexpected status encoding: {}", other))),
    }
}

fn status_from_text(s: &str) -> Result<OfferStatus, RepoError> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(json_err)
}

pub(crate) fn offer_from_row(row: &PgRow) -> Result<Offer, RepoError> {
    let origin: String = row.try_get("origin").map_err(db_err)?;
    let destination: String = row.try_get("destination").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;
    let total_seats: i16 = row.try_get("total_seats").map_err(db_err)?;
    let vehicle: serde_json::Value = row.try_get("vehicle").map_err(db_err)?;
    let active_seats: serde_json::Value = row.try_get("active_seats").map_err(db_err)?;
    let booked_seats: serde_json::Value = row.try_get("booked_seats").map_err(db_err)?;
    let overrides: serde_json::Value = row.try_get("seat_price_overrides").map_err(db_err)?;

    Ok(Offer {
        id: row.try_get("id").map_err(db_err)?,
        driver_id: row.try_get("driver_id").map_err(db_err)?,
        origin: parse_location(&origin)?,
        destination: parse_location(&destination)?,
        date: row.try_get("date").map_err(db_err)?,
        departure_time: row.try_get("departure_time").map_err(db_err)?,
        vehicle: serde_json::from_value(vehicle).map_err(json_err)?,
        total_seats: total_seats as u8,
        active_seats: serde_json::from_value(active_seats).map_err(json_err)?,
        booked_seats: serde_json::from_value(booked_seats).map_err(json_err)?,
        price_per_seat_inr: row.try_get("price_per_seat_inr").map_err(db_err)?,
        seat_price_overrides: serde_json::from_value::<BTreeMap<u8, i64>>(overrides)
            .map_err(json_err)?,
        status: status_from_text(&status)?,
        version: row.try_get("version").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

/// The version-guarded UPDATE shared by `update_guarded` and the trip
/// repository's booking transaction. Returns rows affected.
pub(crate) async fn guarded_update<'e, E>(executor: E, offer: &Offer) -> Result<u64, RepoError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE offers
        SET date = $2, departure_time = $3, vehicle = $4, total_seats = $5,
            active_seats = $6, booked_seats = $7, price_per_seat_inr = $8,
            seat_price_overrides = $9, status = $10,
            version = version + 1, updated_at = NOW()
        WHERE id = $1 AND version = $11
        "#,
    )
    .bind(offer.id)
    .bind(offer.date)
    .bind(offer.departure_time)
    .bind(serde_json::to_value(&offer.vehicle).map_err(json_err)?)
    .bind(offer.total_seats as i16)
    .bind(serde_json::to_value(&offer.active_seats).map_err(json_err)?)
    .bind(serde_json::to_value(&offer.booked_seats).map_err(json_err)?)
    .bind(offer.price_per_seat_inr)
    .bind(serde_json::to_value(&offer.seat_price_overrides).map_err(json_err)?)
    .bind(status_to_text(offer.status)?)
    .bind(offer.version)
    .execute(executor)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected())
}

#[async_trait]
impl OfferRepository for PostgresOfferRepository {
    async fn insert(&self, offer: &Offer) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO offers (id, driver_id, origin, destination, date, departure_time,
                                vehicle, total_seats, active_seats, booked_seats,
                                price_per_seat_inr, seat_price_overrides, status, version,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(offer.id)
        .bind(offer.driver_id)
        .bind(offer.origin.as_str())
        .bind(offer.destination.as_str())
        .bind(offer.date)
        .bind(offer.departure_time)
        .bind(serde_json::to_value(&offer.vehicle).map_err(json_err)?)
        .bind(offer.total_seats as i16)
        .bind(serde_json::to_value(&offer.active_seats).map_err(json_err)?)
        .bind(serde_json::to_value(&offer.booked_seats).map_err(json_err)?)
        .bind(offer.price_per_seat_inr)
        .bind(serde_json::to_value(&offer.seat_price_overrides).map_err(json_err)?)
        .bind(status_to_text(offer.status)?)
        .bind(offer.version)
        .bind(offer.created_at)
        .bind(offer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Offer, RepoError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_OFFER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| RepoError::NotFound(format!("offer {}", id)))?;
        offer_from_row(&row)
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Offer>, RepoError> {
        let rows = sqlx::query(&format!(
            "{} WHERE driver_id = $1 ORDER BY date, departure_time",
            SELECT_OFFER
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(offer_from_row).collect()
    }

    async fn list_open(&self) -> Result<Vec<Offer>, RepoError> {
        let rows = sqlx::query(&format!(
            "{} WHERE status = 'OPEN' ORDER BY date, departure_time",
            SELECT_OFFER
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(offer_from_row).collect()
    }

    async fn update_guarded(&self, offer: &Offer) -> Result<(), RepoError> {
        let affected = guarded_update(&self.pool, offer).await?;
        if affected == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM offers WHERE id = $1)")
                .bind(offer.id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
            if exists {
                return Err(RepoError::Conflict(format!(
                    "offer {} moved past version {}",
                    offer.id, offer.version
                )));
            }
            return Err(RepoError::NotFound(format!("offer {}", offer.id)));
        }
        Ok(())
    }
}
