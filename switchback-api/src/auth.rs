use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use switchback_core::{Actor, Role};
use uuid::Uuid;

use crate::state::AppState;

/// Claims minted by the session provider. The engine only validates the
/// signature and expiry; it never re-verifies credentials.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub phone: String,
    pub role: Role,
    pub exp: usize,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract token from Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Decode and validate
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // 3. Resolve the acting identity
    let actor = Actor {
        id: token_data
            .claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| StatusCode::UNAUTHORIZED)?,
        phone: token_data.claims.phone.clone(),
        role: token_data.claims.role,
    };

    // 4. Inject into request extensions
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

/// Mint a token the middleware will accept. Used by tests and local tooling.
pub fn issue_token(actor: &Actor, secret: &str, ttl_seconds: u64) -> String {
    let claims = Claims {
        sub: actor.id.to_string(),
        phone: actor.phone.clone(),
        role: actor.role,
        exp: (chrono::Utc::now().timestamp() as usize) + ttl_seconds as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HMAC signing cannot fail with a valid secret")
}
