use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use uuid::Uuid;

use crate::config;
use crate::db::RoomRegistry;
use crate::models::UserRow;

/// Pull the bearer credential for a request or realtime handshake.
///
/// Checked in order: Authorization header, auth_token cookie, then the
/// optional query-string token (browser WebSocket clients cannot set
/// headers on the upgrade request).
pub fn bearer_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(raw) = value.to_str() {
            return Some(raw.strip_prefix("Bearer ").unwrap_or(raw).to_string());
        }
    }
    if let Some(value) = headers.get(header::COOKIE) {
        if let Ok(raw) = value.to_str() {
            for cookie in cookie::Cookie::split_parse(raw).flatten() {
                if cookie.name() == "auth_token" {
                    return Some(cookie.value().to_string());
                }
            }
        }
    }
    query_token.map(|token| token.to_string())
}

/// Validate a JWT token and return the token data
pub fn validate_jwt(
    token: &str,
    secret: &str,
) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

/// Extract the user id carried in a validated token's subject claim.
pub fn user_id_from_claims(token_data: &TokenData<serde_json::Value>) -> Result<Uuid, String> {
    let sub = token_data
        .claims
        .get("sub")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "JWT token has no usable subject claim".to_string())?;
    Uuid::parse_str(sub).map_err(|e| format!("JWT subject is not a user id: {}", e))
}

/// Resolve a handshake credential to an active user.
///
/// Any failure here rejects the handshake before a session exists: missing
/// secret, bad signature, expired token, unknown subject, or a user that is
/// missing or deactivated.
pub async fn authenticate(registry: &dyn RoomRegistry, token: &str) -> Result<UserRow, String> {
    let config = config::get_config();
    let secret = config
        .auth_jwt_secret
        .as_ref()
        .ok_or_else(|| "No JWT secret configured".to_string())?;

    let token_data =
        validate_jwt(token, secret).map_err(|e| format!("JWT validation failed: {}", e))?;
    let user_id = user_id_from_claims(&token_data)?;

    let user = registry
        .find_user(user_id)
        .await
        .map_err(|e| format!("User lookup failed: {}", e))?;

    match user {
        Some(user) if user.is_active => Ok(user),
        _ => Err("User not found or inactive".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn authorization_header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(
            bearer_token(&headers, Some("query-token")),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn cookie_is_used_when_no_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=cookie-token"),
        );
        assert_eq!(
            bearer_token(&headers, None),
            Some("cookie-token".to_string())
        );
    }

    #[test]
    fn query_token_is_the_last_resort() {
        let headers = HeaderMap::new();
        assert_eq!(
            bearer_token(&headers, Some("query-token")),
            Some("query-token".to_string())
        );
        assert_eq!(bearer_token(&headers, None), None);
    }

    #[test]
    fn garbage_jwt_fails_validation() {
        assert!(validate_jwt("not-a-jwt", "secret").is_err());
    }

    mod handshake {
        use super::super::*;
        use crate::config::{self, Config};
        use crate::testutil::MemoryRegistry;
        use jsonwebtoken::{encode, EncodingKey, Header};
        use serde_json::json;

        const SECRET: &str = "handshake-test-secret";

        fn install_config() {
            let mut cfg = Config::default();
            cfg.auth_jwt_secret = Some(SECRET.to_string());
            config::init_config(cfg);
        }

        fn token_for(subject: &str, secret: &str) -> String {
            let claims = json!({
                "sub": subject,
                "exp": chrono::Utc::now().timestamp() + 3600,
            });
            encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(secret.as_bytes()),
            )
            .expect("token encoding")
        }

        #[tokio::test]
        async fn resolves_an_active_user() {
            install_config();
            let registry = MemoryRegistry::new();
            let user = registry.add_user("ada");

            let token = token_for(&user.id.to_string(), SECRET);
            let resolved = authenticate(&registry, &token).await.expect("authenticated");
            assert_eq!(resolved.id, user.id);
            assert_eq!(resolved.username, "ada");
        }

        #[tokio::test]
        async fn rejects_an_inactive_user() {
            install_config();
            let registry = MemoryRegistry::new();
            let user = registry.add_user("ada");
            registry.deactivate_user(user.id);

            let token = token_for(&user.id.to_string(), SECRET);
            let err = authenticate(&registry, &token).await.unwrap_err();
            assert_eq!(err, "User not found or inactive");
        }

        #[tokio::test]
        async fn rejects_an_unknown_subject() {
            install_config();
            let registry = MemoryRegistry::new();

            let token = token_for(&Uuid::new_v4().to_string(), SECRET);
            let err = authenticate(&registry, &token).await.unwrap_err();
            assert_eq!(err, "User not found or inactive");
        }

        #[tokio::test]
        async fn rejects_a_forged_signature() {
            install_config();
            let registry = MemoryRegistry::new();
            let user = registry.add_user("ada");

            let token = token_for(&user.id.to_string(), "some-other-secret");
            let err = authenticate(&registry, &token).await.unwrap_err();
            assert!(err.starts_with("JWT validation failed"));
        }

        #[tokio::test]
        async fn rejects_a_non_uuid_subject() {
            install_config();
            let registry = MemoryRegistry::new();

            let token = token_for("service-account", SECRET);
            let err = authenticate(&registry, &token).await.unwrap_err();
            assert!(err.starts_with("JWT subject is not a user id"));
        }
    }
}
