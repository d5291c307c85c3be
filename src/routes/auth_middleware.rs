use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::error;

use crate::config;
use crate::services::auth_service::{bearer_token, user_id_from_claims, validate_jwt};

/// Bearer-token gate in front of the REST API.
///
/// Validates the JWT and stashes the caller's user id in request extensions
/// for the handlers. The WebSocket handshake runs its own, stricter check
/// (it also verifies the user row is active) in `ws::handler`.
pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    // 1. Get the auth token from the request
    let token = match bearer_token(req.headers(), None) {
        Some(token) => token,
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    // 2. Validate it against the configured secret
    let config = config::get_config();
    let secret = match &config.auth_jwt_secret {
        Some(secret) => secret,
        None => {
            error!("Auth JWT secret not configured");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let token_data = match validate_jwt(&token, secret) {
        Ok(token_data) => token_data,
        Err(e) => {
            error!("JWT validation failed: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 3. Extract the caller's user id for downstream handlers
    let user_id = match user_id_from_claims(&token_data) {
        Ok(user_id) => user_id,
        Err(e) => {
            error!("{}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
