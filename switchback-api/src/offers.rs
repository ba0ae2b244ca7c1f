use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use switchback_core::identity::VehicleDescriptor;
use switchback_core::Actor;
use switchback_offer::{NewOffer, Offer, OfferPatch};
use switchback_shared::events::{DomainEvent, OfferChangedEvent};
use switchback_shared::Location;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/offers", post(create_offer).get(list_open))
        .route("/v1/offers/mine", get(list_mine))
        .route("/v1/offers/{id}", get(get_offer))
        .route("/v1/offers/{id}", patch(edit_offer))
        .route("/v1/offers/{id}/cancel", post(cancel_offer))
        .route("/v1/offers/{id}/stream", get(offer_stream))
        .route("/v1/admin/offers/sweep", post(sweep_departed))
}

#[derive(Debug, Deserialize)]
struct CreateOfferRequest {
    origin: Location,
    destination: Location,
    date: NaiveDate,
    departure_time: NaiveTime,
    vehicle: VehicleDescriptor,
    total_seats: u8,
    active_seats: Vec<u8>,
    price_per_seat_inr: i64,
    #[serde(default)]
    seat_price_overrides: BTreeMap<u8, i64>,
}

/// Departures of the driver's non-terminal offers and trips, the view the
/// scheduling gate checks new postings against.
async fn driver_commitments(state: &AppState, driver_id: Uuid) -> Result<Vec<NaiveDateTime>, AppError> {
    let mut departures: Vec<NaiveDateTime> = state
        .offers
        .list_by_driver(driver_id)
        .await?
        .iter()
        .filter(|o| o.is_open())
        .map(|o| o.departure())
        .collect();
    departures.extend(
        state
            .trips
            .list_by_driver(driver_id)
            .await?
            .iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.departure()),
    );
    Ok(departures)
}

async fn create_offer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateOfferRequest>,
) -> Result<Json<Offer>, AppError> {
    let now = Utc::now().naive_utc();
    let departure = req.date.and_time(req.departure_time);

    // 1. Scheduling gate over the driver's existing commitments
    let existing = driver_commitments(&state, actor.id).await?;
    state.gate.can_post_offer(now, departure, &existing)?;

    // 2. Validate and persist
    let offer = state
        .offers
        .create_offer(
            &actor,
            NewOffer {
                origin: req.origin,
                destination: req.destination,
                date: req.date,
                departure_time: req.departure_time,
                vehicle: req.vehicle,
                total_seats: req.total_seats,
                active_seats: req.active_seats,
                price_per_seat_inr: req.price_per_seat_inr,
                seat_price_overrides: req.seat_price_overrides,
            },
            now,
        )
        .await?;

    Ok(Json(offer))
}

async fn list_open(State(state): State<AppState>) -> Result<Json<Vec<Offer>>, AppError> {
    Ok(Json(state.offers.list_open().await?))
}

async fn list_mine(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Offer>>, AppError> {
    Ok(Json(state.offers.list_by_driver(actor.id).await?))
}

async fn get_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Offer>, AppError> {
    Ok(Json(state.offers.get(id).await?))
}

async fn edit_offer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EditOfferRequest>,
) -> Result<Json<Offer>, AppError> {
    let offer = state
        .offers
        .edit_offer(
            &actor,
            id,
            OfferPatch {
                date: patch.date,
                departure_time: patch.departure_time,
                vehicle: patch.vehicle,
                total_seats: patch.total_seats,
                active_seats: patch.active_seats,
                price_per_seat_inr: patch.price_per_seat_inr,
                seat_price_overrides: patch.seat_price_overrides,
            },
            Utc::now().naive_utc(),
        )
        .await?;

    let _ = state.events_tx.send(DomainEvent::OfferChanged(OfferChangedEvent {
        offer_id: offer.id,
        changed_at: Utc::now().timestamp(),
    }));
    Ok(Json(offer))
}

#[derive(Debug, Deserialize, Default)]
struct EditOfferRequest {
    date: Option<NaiveDate>,
    departure_time: Option<NaiveTime>,
    vehicle: Option<VehicleDescriptor>,
    total_seats: Option<u8>,
    active_seats: Option<Vec<u8>>,
    price_per_seat_inr: Option<i64>,
    seat_price_overrides: Option<BTreeMap<u8, i64>>,
}

async fn cancel_offer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Offer>, AppError> {
    let offer = state.trips.cancel_offer(&actor, id).await?;

    let _ = state.events_tx.send(DomainEvent::OfferChanged(OfferChangedEvent {
        offer_id: offer.id,
        changed_at: Utc::now().timestamp(),
    }));
    Ok(Json(offer))
}

async fn sweep_departed(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<serde_json::Value>, AppError> {
    let swept = state
        .offers
        .sweep_departed(&actor, Utc::now().naive_utc())
        .await?;
    Ok(Json(serde_json::json!({ "swept": swept })))
}

/// Per-offer live updates. Subscribers get every event touching the offer,
/// serialized as JSON; events for other offers are filtered out.
async fn offer_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.offer_id() == Some(id) => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok::<_, Infallible>(Event::default().data(data)))
            }
            // lagged receivers and other offers' events are dropped
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
