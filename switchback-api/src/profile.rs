use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use switchback_core::identity::{UserProfile, VehicleDescriptor};
use switchback_core::Actor;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/profile", get(get_profile).put(update_profile))
        .route("/v1/profile/photo", post(upload_photo))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.get(actor.id).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateProfileRequest {
    name: String,
    vehicle: Option<VehicleDescriptor>,
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let photo_url = state.users.get(actor.id).await.ok().and_then(|u| u.photo_url);
    let profile = UserProfile {
        id: actor.id,
        name: req.name,
        phone: actor.phone.clone(),
        role: actor.role,
        vehicle: req.vehicle,
        photo_url,
    };
    state.users.upsert(&profile).await?;
    Ok(Json(profile))
}

/// Raw image bytes in, hosted URL out. Only the URL is persisted.
async fn upload_photo(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let url = tokio::time::timeout(
        state.gateway_timeout,
        state.blobs.put(&actor.id.to_string(), "vehicle-photo", body.to_vec()),
    )
    .await
    .map_err(|_| switchback_core::media::MediaError::Timeout)??;
    state.users.set_photo_url(actor.id, &url).await?;
    Ok(Json(serde_json::json!({ "photo_url": url })))
}
