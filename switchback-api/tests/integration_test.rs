use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::{Duration as ChronoDuration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use switchback_api::state::{AppState, AuthConfig, RateLimit};
use switchback_api::{app, auth};
use switchback_core::media::MockBlobStore;
use switchback_core::payment::{checkout_signature, MockPaymentAdapter};
use switchback_core::users::InMemoryUsers;
use switchback_core::{Actor, Role};
use switchback_offer::memory::InMemoryOffers;
use switchback_offer::OfferService;
use switchback_policy::PolicyGate;
use switchback_trip::memory::InMemoryTrips;
use switchback_trip::TripService;
use tower::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "integration-test-secret";
const CHECKOUT_SECRET: &str = "integration-checkout-secret";

fn test_state() -> AppState {
    let offer_store = InMemoryOffers::new();
    let trip_store = InMemoryTrips::new(offer_store.clone());
    let offers = Arc::new(OfferService::new(Arc::new(offer_store), 60));
    let trips = Arc::new(TripService::new(Arc::new(trip_store), offers.clone(), 4));
    let (events_tx, _) = tokio::sync::broadcast::channel(100);

    AppState {
        offers,
        trips,
        users: Arc::new(InMemoryUsers::new()),
        blobs: Arc::new(MockBlobStore),
        payments: Arc::new(MockPaymentAdapter),
        gate: Arc::new(PolicyGate::default()),
        redis: None,
        seat_hold_seconds: 120,
        events_tx,
        auth: AuthConfig {
            secret: JWT_SECRET.to_string(),
            expiration: 3600,
        },
        checkout_secret: CHECKOUT_SECRET.to_string(),
        gateway_timeout: Duration::from_secs(15),
        rate_limit: RateLimit {
            requests: 60,
            window_seconds: 60,
        },
    }
}

fn actor(role: Role) -> Actor {
    Actor {
        id: Uuid::new_v4(),
        phone: "+91-98000-22222".to_string(),
        role,
    }
}

fn bearer(actor: &Actor) -> String {
    format!("Bearer {}", auth::issue_token(actor, JWT_SECRET, 3600))
}

fn request(method: Method, uri: &str, actor: &Actor, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(actor))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn offer_payload(days_out: i64) -> Value {
    let date = (Utc::now() + ChronoDuration::days(days_out)).date_naive();
    json!({
        "origin": "SHIMLA",
        "destination": "MANALI",
        "date": date.to_string(),
        "departure_time": "06:30:00",
        "vehicle": {
            "model": "Innova Crysta",
            "registration": "HP-01-1234",
            "photo_url": null
        },
        "total_seats": 7,
        "active_seats": [1, 2, 3, 4, 5, 6, 7],
        "price_per_seat_inr": 2000
    })
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = app(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/v1/offers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn driver_publishes_and_lists_an_offer() {
    let state = test_state();
    let driver = actor(Role::Driver);

    let response = app(state.clone())
        .oneshot(request(Method::POST, "/v1/offers", &driver, offer_payload(7)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let offer = json_body(response).await;
    assert_eq!(offer["status"], "OPEN");
    assert_eq!(offer["version"], 0);

    let passenger = actor(Role::Passenger);
    let response = app(state)
        .oneshot(request(Method::GET, "/v1/offers", &passenger, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let offers = json_body(response).await;
    assert_eq!(offers.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn passenger_cannot_publish_offers() {
    let state = test_state();
    let passenger = actor(Role::Passenger);
    let response = app(state)
        .oneshot(request(Method::POST, "/v1/offers", &passenger, offer_payload(7)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn short_notice_offers_are_rejected_by_the_gate() {
    let state = test_state();
    let driver = actor(Role::Driver);

    // departing now, well inside the one-hour advance notice window
    let date = Utc::now().date_naive();
    let mut payload = offer_payload(0);
    payload["date"] = json!(date.to_string());
    payload["departure_time"] = json!(Utc::now().time().format("%H:%M:%S").to_string());

    let response = app(state)
        .oneshot(request(Method::POST, "/v1/offers", &driver, payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn booking_reserves_seats_and_rejects_the_loser() {
    let state = test_state();
    let driver = actor(Role::Driver);

    let response = app(state.clone())
        .oneshot(request(Method::POST, "/v1/offers", &driver, offer_payload(7)))
        .await
        .unwrap();
    let offer = json_body(response).await;
    let offer_id = offer["id"].as_str().unwrap().to_string();

    // first passenger takes seats 1 and 2
    let first = actor(Role::Passenger);
    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            "/v1/trips",
            &first,
            json!({ "offer_id": offer_id, "seats": [1, 2] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let trip = json_body(response).await;
    assert_eq!(trip["status"], "WAITING_CONFIRMATION");
    assert_eq!(trip["total_fare_inr"], 4000);

    // second passenger races for seat 2 and loses with a conflict
    let second = actor(Role::Passenger);
    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            "/v1/trips",
            &second,
            json!({ "offer_id": offer_id, "seats": [2, 3] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // the offer shows exactly the winner's seats as booked
    let response = app(state)
        .oneshot(request(
            Method::GET,
            &format!("/v1/offers/{}", offer_id),
            &first,
            json!({}),
        ))
        .await
        .unwrap();
    let offer = json_body(response).await;
    assert_eq!(offer["booked_seats"], json!([1, 2]));
}

#[tokio::test]
async fn passenger_books_the_same_offer_twice() {
    // Scheduling windows gate drivers posting offers, never passengers
    // booking seats: a second booking at the same departure must succeed.
    let state = test_state();
    let driver = actor(Role::Driver);
    let response = app(state.clone())
        .oneshot(request(Method::POST, "/v1/offers", &driver, offer_payload(7)))
        .await
        .unwrap();
    let offer = json_body(response).await;
    let offer_id = offer["id"].as_str().unwrap().to_string();

    let passenger = actor(Role::Passenger);
    for seat in [1, 2] {
        let response = app(state.clone())
            .oneshot(request(
                Method::POST,
                "/v1/trips",
                &passenger,
                json!({ "offer_id": offer_id, "seats": [seat] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "booking seat {}", seat);
    }

    let response = app(state)
        .oneshot(request(
            Method::GET,
            &format!("/v1/offers/{}", offer_id),
            &passenger,
            json!({}),
        ))
        .await
        .unwrap();
    let offer = json_body(response).await;
    assert_eq!(offer["booked_seats"], json!([1, 2]));
}

#[tokio::test]
async fn five_seat_bookings_are_rejected() {
    let state = test_state();
    let driver = actor(Role::Driver);
    let response = app(state.clone())
        .oneshot(request(Method::POST, "/v1/offers", &driver, offer_payload(7)))
        .await
        .unwrap();
    let offer = json_body(response).await;

    let passenger = actor(Role::Passenger);
    let response = app(state)
        .oneshot(request(
            Method::POST,
            "/v1/trips",
            &passenger,
            json!({ "offer_id": offer["id"], "seats": [1, 2, 3, 4, 5] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn driver_confirms_and_completes_while_passenger_cannot() {
    let state = test_state();
    let driver = actor(Role::Driver);
    let response = app(state.clone())
        .oneshot(request(Method::POST, "/v1/offers", &driver, offer_payload(7)))
        .await
        .unwrap();
    let offer = json_body(response).await;

    let passenger = actor(Role::Passenger);
    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            "/v1/trips",
            &passenger,
            json!({ "offer_id": offer["id"], "seats": [1] }),
        ))
        .await
        .unwrap();
    let trip = json_body(response).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    // passenger may not confirm
    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            &format!("/v1/trips/{}/status", trip_id),
            &passenger,
            json!({ "status": "CONFIRMED" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    for status in ["CONFIRMED", "EN_ROUTE", "COMPLETED"] {
        let response = app(state.clone())
            .oneshot(request(
                Method::POST,
                &format!("/v1/trips/{}/status", trip_id),
                &driver,
                json!({ "status": status }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "transition to {}", status);
    }

    // rating now opens up
    let response = app(state)
        .oneshot(request(
            Method::POST,
            &format!("/v1/trips/{}/rating", trip_id),
            &passenger,
            json!({ "stars": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rated = json_body(response).await;
    assert_eq!(rated["rating"], 5);
}

#[tokio::test]
async fn cancellation_frees_seats_over_http() {
    let state = test_state();
    let driver = actor(Role::Driver);
    let response = app(state.clone())
        .oneshot(request(Method::POST, "/v1/offers", &driver, offer_payload(7)))
        .await
        .unwrap();
    let offer = json_body(response).await;
    let offer_id = offer["id"].as_str().unwrap().to_string();

    let passenger = actor(Role::Passenger);
    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            "/v1/trips",
            &passenger,
            json!({ "offer_id": offer_id, "seats": [3, 4] }),
        ))
        .await
        .unwrap();
    let trip = json_body(response).await;

    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            &format!("/v1/trips/{}/status", trip["id"].as_str().unwrap()),
            &passenger,
            json!({ "status": "CANCELLED" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(state)
        .oneshot(request(
            Method::GET,
            &format!("/v1/offers/{}", offer_id),
            &passenger,
            json!({}),
        ))
        .await
        .unwrap();
    let offer = json_body(response).await;
    assert_eq!(offer["booked_seats"], json!([]));
}

#[tokio::test]
async fn checkout_signature_verification() {
    let state = test_state();
    let passenger = actor(Role::Passenger);

    let sig = checkout_signature("order_1", "pay_1", CHECKOUT_SECRET.as_bytes());
    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            "/v1/payments/verify",
            &passenger,
            json!({ "order_id": "order_1", "payment_id": "pay_1", "signature": sig }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["verified"], true);

    // tampered payment id fails closed
    let sig = checkout_signature("order_1", "pay_1", CHECKOUT_SECRET.as_bytes());
    let response = app(state)
        .oneshot(request(
            Method::POST,
            "/v1/payments/verify",
            &passenger,
            json!({ "order_id": "order_1", "payment_id": "pay_2", "signature": sig }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payment_order_creation_is_owner_only() {
    let state = test_state();
    let driver = actor(Role::Driver);
    let response = app(state.clone())
        .oneshot(request(Method::POST, "/v1/offers", &driver, offer_payload(7)))
        .await
        .unwrap();
    let offer = json_body(response).await;

    let passenger = actor(Role::Passenger);
    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            "/v1/trips",
            &passenger,
            json!({ "offer_id": offer["id"], "seats": [1, 2] }),
        ))
        .await
        .unwrap();
    let trip = json_body(response).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let response = app(state.clone())
        .oneshot(request(
            Method::POST,
            "/v1/payments/order",
            &passenger,
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = json_body(response).await;
    assert_eq!(order["amount_inr"], 4000);
    assert_eq!(order["currency"], "INR");

    // someone else's trip is off limits
    let other = actor(Role::Passenger);
    let response = app(state)
        .oneshot(request(
            Method::POST,
            "/v1/payments/order",
            &other,
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn profile_photo_upload_stores_a_url() {
    let state = test_state();
    let driver = actor(Role::Driver);

    // seed the profile
    let response = app(state.clone())
        .oneshot(request(
            Method::PUT,
            "/v1/profile",
            &driver,
            json!({ "name": "Ravi", "vehicle": { "model": "Innova", "registration": "HP-01-9999", "photo_url": null } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/v1/profile/photo")
                .header(header::AUTHORIZATION, bearer(&driver))
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(Body::from(vec![0xFFu8, 0xD8, 0xFF]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let url = body["photo_url"].as_str().unwrap().to_string();
    assert!(url.starts_with("https://"));

    let response = app(state)
        .oneshot(request(Method::GET, "/v1/profile", &driver, json!({})))
        .await
        .unwrap();
    let profile = json_body(response).await;
    assert_eq!(profile["photo_url"], url);
}
