use crate::lifecycle::{self, TripError};
use crate::models::{Trip, TripMessage, TripStatus};
use crate::repository::TripRepository;
use chrono::{NaiveDateTime, Utc};
use std::sync::Arc;
use switchback_core::{Actor, Role};
use switchback_offer::inventory::{self, SeatError};
use switchback_offer::{Offer, OfferService};
use uuid::Uuid;

/// Attempts at the book-with-reservation loop before giving up on a
/// contended offer.
const MAX_BOOK_ATTEMPTS: u32 = 3;

fn seat_err(e: SeatError) -> TripError {
    match e {
        SeatError::AlreadyBooked(_) | SeatError::NotActive(_) => {
            TripError::SeatUnavailable(e.to_string())
        }
        other => TripError::Validation(other.to_string()),
    }
}

/// Owns the trip lifecycle and its coupling to offer seat inventory:
/// booking reserves seats and creates the trip in one store transaction,
/// cancellation releases them.
pub struct TripService {
    trips: Arc<dyn TripRepository>,
    offers: Arc<OfferService>,
    max_seats_per_booking: usize,
}

impl TripService {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        offers: Arc<OfferService>,
        max_seats_per_booking: usize,
    ) -> Self {
        Self {
            trips,
            offers,
            max_seats_per_booking,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Trip, TripError> {
        Ok(self.trips.get(id).await?)
    }

    pub async fn list_by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Trip>, TripError> {
        Ok(self.trips.list_by_passenger(passenger_id).await?)
    }

    pub async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Trip>, TripError> {
        Ok(self.trips.list_by_driver(driver_id).await?)
    }

    /// Non-terminal trips referencing an offer; an offer with any of these
    /// cannot be cancelled.
    pub async fn open_trips_for_offer(&self, offer_id: Uuid) -> Result<usize, TripError> {
        Ok(self
            .trips
            .list_by_offer(offer_id)
            .await?
            .iter()
            .filter(|t| !t.status.is_terminal())
            .count())
    }

    /// Book seats on an offer. Validation first, then the reservation and
    /// the trip insert commit atomically under the offer's version guard;
    /// a failed attempt leaves no trip behind and no seats held.
    pub async fn book_trip(
        &self,
        passenger: &Actor,
        offer_id: Uuid,
        seats: &[u8],
    ) -> Result<(Trip, Offer), TripError> {
        passenger.require_role(Role::Passenger)?;
        if seats.len() > self.max_seats_per_booking {
            return Err(TripError::Validation(format!(
                "at most {} seats per booking",
                self.max_seats_per_booking
            )));
        }

        let offer_repo = self.offers.repo();
        for attempt in 1..=MAX_BOOK_ATTEMPTS {
            let mut offer = offer_repo.get(offer_id).await?;
            if !offer.is_open() {
                return Err(TripError::SeatUnavailable(format!(
                    "offer {} is {:?}, not open for booking",
                    offer_id, offer.status
                )));
            }
            inventory::reserve(&mut offer, seats).map_err(seat_err)?;
            let trip = Trip::from_offer(passenger.id, &offer, seats.to_vec());

            match self.trips.create_with_reservation(&trip, &offer).await {
                Ok(()) => {
                    offer.version += 1;
                    tracing::info!(
                        trip_id = %trip.id,
                        offer_id = %offer_id,
                        ?seats,
                        fare = trip.total_fare_inr,
                        "trip booked"
                    );
                    return Ok((trip, offer));
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(offer_id = %offer_id, attempt, "booking lost version race, re-reading");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TripError::SeatUnavailable(format!(
            "offer {} is under contention, seats could not be reserved",
            offer_id
        )))
    }

    /// Direct booking arranged outside the offer inventory.
    pub async fn book_direct(&self, passenger: &Actor, trip: Trip) -> Result<Trip, TripError> {
        passenger.require_role(Role::Passenger)?;
        if trip.passenger_id != passenger.id {
            return Err(TripError::Forbidden("trip passenger mismatch".to_string()));
        }
        if trip.total_fare_inr <= 0 {
            return Err(TripError::Validation("fare must be positive".to_string()));
        }
        self.trips.insert(&trip).await?;
        Ok(trip)
    }

    /// Drive the state machine. Cancellation releases the trip's seats
    /// before the trip itself is updated, so a CANCELLED trip has always
    /// already given its seats back.
    pub async fn transition(
        &self,
        actor: &Actor,
        trip_id: Uuid,
        to: TripStatus,
        now: NaiveDateTime,
    ) -> Result<Trip, TripError> {
        let mut trip = self.trips.get(trip_id).await?;
        self.authorize_transition(actor, &trip, to)?;

        // Validate before any side effect; an illegal transition must not
        // release seats.
        if !lifecycle::can_transition(trip.status, to) {
            return Err(TripError::InvalidTransition {
                from: trip.status,
                to,
            });
        }

        if to == TripStatus::Cancelled {
            let hours = trip.hours_until_departure(now);
            tracing::info!(
                trip_id = %trip_id,
                hours_until_departure = hours,
                "trip cancelled"
            );
            if let Some(offer_id) = trip.offer_id {
                self.offers.release_seats(offer_id, &trip.seats).await?;
            }
        }

        lifecycle::transition(&mut trip, to)?;
        self.trips.update(&trip).await?;
        Ok(trip)
    }

    /// Post-completion rating, 1..=5.
    pub async fn rate(&self, passenger: &Actor, trip_id: Uuid, stars: u8) -> Result<Trip, TripError> {
        let mut trip = self.trips.get(trip_id).await?;
        if trip.passenger_id != passenger.id && passenger.role != Role::Admin {
            return Err(TripError::Forbidden("only the trip's passenger may rate it".to_string()));
        }
        if trip.status != TripStatus::Completed {
            return Err(TripError::Validation("only completed trips can be rated".to_string()));
        }
        if !(1..=5).contains(&stars) {
            return Err(TripError::Validation(format!("rating {} is outside 1..=5", stars)));
        }
        trip.rating = Some(stars);
        trip.updated_at = Utc::now();
        self.trips.update(&trip).await?;
        Ok(trip)
    }

    /// Append to the trip's chat log with a server-assigned timestamp.
    pub async fn send_message(
        &self,
        sender: &Actor,
        trip_id: Uuid,
        body: String,
    ) -> Result<Trip, TripError> {
        if body.trim().is_empty() {
            return Err(TripError::Validation("message body is empty".to_string()));
        }
        let mut trip = self.trips.get(trip_id).await?;
        if sender.id != trip.passenger_id && sender.id != trip.driver_id {
            return Err(TripError::Forbidden("sender is not part of this trip".to_string()));
        }
        trip.messages.push(TripMessage {
            id: Uuid::new_v4(),
            sender_id: sender.id,
            body,
            sent_at: Utc::now(),
        });
        trip.updated_at = Utc::now();
        self.trips.update(&trip).await?;
        Ok(trip)
    }

    /// Driver flags the trip as awaiting payment; completion clears it.
    pub async fn request_payment(&self, driver: &Actor, trip_id: Uuid) -> Result<Trip, TripError> {
        driver.require_role(Role::Driver)?;
        let mut trip = self.trips.get(trip_id).await?;
        if trip.driver_id != driver.id && driver.role != Role::Admin {
            return Err(TripError::Forbidden("trip belongs to another driver".to_string()));
        }
        if trip.status.is_terminal() {
            return Err(TripError::Validation(format!(
                "trip is {:?}, payment can no longer be requested",
                trip.status
            )));
        }
        trip.payment_requested = true;
        trip.updated_at = Utc::now();
        self.trips.update(&trip).await?;
        Ok(trip)
    }

    /// Cancel an offer, refusing while any referencing trip is live.
    pub async fn cancel_offer(&self, driver: &Actor, offer_id: Uuid) -> Result<Offer, TripError> {
        let open = self.open_trips_for_offer(offer_id).await?;
        Ok(self.offers.cancel_offer(driver, offer_id, open).await?)
    }

    fn authorize_transition(
        &self,
        actor: &Actor,
        trip: &Trip,
        to: TripStatus,
    ) -> Result<(), TripError> {
        if actor.role == Role::Admin {
            return Ok(());
        }
        match to {
            // ride progress is the driver's to report
            TripStatus::Confirmed | TripStatus::EnRoute | TripStatus::Arrived | TripStatus::Completed => {
                if actor.id != trip.driver_id {
                    return Err(TripError::Forbidden(
                        "only the offer's driver may report ride progress".to_string(),
                    ));
                }
            }
            TripStatus::Cancelled | TripStatus::Disputed => {
                if actor.id != trip.passenger_id && actor.id != trip.driver_id {
                    return Err(TripError::Forbidden("actor is not part of this trip".to_string()));
                }
            }
            TripStatus::Booked | TripStatus::WaitingConfirmation => {
                return Err(TripError::InvalidTransition {
                    from: trip.status,
                    to,
                });
            }
        }
        Ok(())
    }
}
