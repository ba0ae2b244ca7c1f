use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use switchback_core::identity::VehicleDescriptor;
use switchback_core::Actor;
use switchback_shared::events::{
    DomainEvent, SeatsReleasedEvent, SeatsReservedEvent, TripStatusChangedEvent,
};
use switchback_shared::Location;
use switchback_trip::{Trip, TripStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(book_trip).get(list_trips))
        .route("/v1/trips/direct", post(book_direct))
        .route("/v1/trips/{id}", get(get_trip))
        .route("/v1/trips/{id}/status", post(set_status))
        .route("/v1/trips/{id}/rating", post(rate_trip))
        .route("/v1/trips/{id}/messages", post(send_message))
        .route("/v1/trips/{id}/payment-request", post(request_payment))
}

#[derive(Debug, Deserialize)]
struct BookTripRequest {
    offer_id: Uuid,
    seats: Vec<u8>,
}

async fn book_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<BookTripRequest>,
) -> Result<Json<Trip>, AppError> {
    // 1. Per-booking seat cap; offer state and availability are checked
    // by the booking service against a fresh snapshot
    state.gate.can_book_trip(req.seats.len())?;

    // 2. Best-effort transient holds shrink the race window between
    // concurrent bookers; the store's version guard stays the arbiter.
    let mut held: Vec<u8> = Vec::new();
    if let Some(redis) = state.redis.as_ref() {
        let hold_id = Uuid::new_v4();
        for &seat in &req.seats {
            match redis
                .acquire_seat_hold(req.offer_id, seat, hold_id, state.seat_hold_seconds)
                .await
            {
                Ok(true) => held.push(seat),
                Ok(false) => {
                    for &s in &held {
                        let _ = redis.release_seat_hold(req.offer_id, s).await;
                    }
                    return Err(AppError::Conflict(format!(
                        "seat {} is being booked by someone else",
                        seat
                    )));
                }
                Err(_) => break, // Redis down: fail open, the version guard still protects us
            }
        }
    }

    // 3. Reserve and create atomically
    let result = state.trips.book_trip(&actor, req.offer_id, &req.seats).await;
    if let Some(redis) = state.redis.as_ref() {
        for &s in &held {
            let _ = redis.release_seat_hold(req.offer_id, s).await;
        }
    }
    let (trip, offer_after) = result?;

    let _ = state.events_tx.send(DomainEvent::SeatsReserved(SeatsReservedEvent {
        offer_id: offer_after.id,
        trip_id: Some(trip.id),
        seats: trip.seats.clone(),
        reserved_at: Utc::now().timestamp(),
    }));
    Ok(Json(trip))
}

#[derive(Debug, Deserialize)]
struct BookDirectRequest {
    driver_id: Uuid,
    origin: Location,
    destination: Location,
    date: NaiveDate,
    departure_time: NaiveTime,
    vehicle: VehicleDescriptor,
    total_fare_inr: i64,
}

async fn book_direct(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<BookDirectRequest>,
) -> Result<Json<Trip>, AppError> {
    let trip = Trip::direct(
        actor.id,
        req.driver_id,
        req.origin,
        req.destination,
        req.date,
        req.departure_time,
        req.vehicle,
        req.total_fare_inr,
    );
    let trip = state.trips.book_direct(&actor, trip).await?;
    Ok(Json(trip))
}

async fn list_trips(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Trip>>, AppError> {
    // drivers see trips against their offers, passengers their own bookings
    let trips = match actor.role {
        switchback_core::Role::Driver => state.trips.list_by_driver(actor.id).await?,
        _ => state.trips.list_by_passenger(actor.id).await?,
    };
    Ok(Json(trips))
}

async fn get_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let trip = state.trips.get(id).await?;
    if actor.id != trip.passenger_id
        && actor.id != trip.driver_id
        && actor.role != switchback_core::Role::Admin
    {
        return Err(AppError::Forbidden("trip belongs to other parties".to_string()));
    }
    Ok(Json(trip))
}

#[derive(Debug, Deserialize)]
struct SetStatusRequest {
    status: TripStatus,
}

async fn set_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<Trip>, AppError> {
    let seats_before = state.trips.get(id).await?.seats.clone();
    let trip = state
        .trips
        .transition(&actor, id, req.status, Utc::now().naive_utc())
        .await?;

    if req.status == TripStatus::Cancelled {
        if let Some(offer_id) = trip.offer_id {
            let _ = state.events_tx.send(DomainEvent::SeatsReleased(SeatsReleasedEvent {
                offer_id,
                seats: seats_before,
                released_at: Utc::now().timestamp(),
            }));
        }
    }
    let _ = state.events_tx.send(DomainEvent::TripStatusChanged(TripStatusChangedEvent {
        trip_id: trip.id,
        offer_id: trip.offer_id,
        status: format!("{:?}", trip.status),
        changed_at: Utc::now().timestamp(),
    }));
    Ok(Json(trip))
}

#[derive(Debug, Deserialize)]
struct RatingRequest {
    stars: u8,
}

async fn rate_trip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<RatingRequest>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.rate(&actor, id, req.stars).await?))
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    body: String,
}

async fn send_message(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.send_message(&actor, id, req.body).await?))
}

async fn request_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.request_payment(&actor, id).await?))
}
