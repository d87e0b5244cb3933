//! API middleware for rate limiting.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Header name for the caller's API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Key prefix for authenticated callers.
const USER_KEY_PREFIX: &str = "user_";

/// Key prefix for unauthenticated callers.
const ANONYMOUS_KEY_PREFIX: &str = "anon_";

/// Shared fallback key when no caller identity can be derived at all.
///
/// Failing open onto one shared key is deliberate: a broken key derivation
/// must never block all traffic.
const FALLBACK_KEY: &str = "anonymous";

/// Rate limiting middleware.
///
/// Derives a per-caller key, consults the rate limiter before any other work
/// runs, and short-circuits with 429 on denial. Rate limit headers are
/// attached to allowed responses as well, and the request outcome is
/// reported back to the limiter for configured skip semantics.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();

    // Exempt liveness checks.
    if path == "/health" {
        return next.run(request).await;
    }

    let key = derive_rate_limit_key(&request);
    let decision = state.rate_limiter.check(&key);

    if !decision.allowed {
        return ApiError::RateLimitExceeded {
            limit: decision.limit,
            remaining: 0,
            reset: decision.reset_epoch_secs(),
            retry_after: decision.retry_after_secs(),
        }
        .into_response();
    }

    let mut response = next.run(request).await;

    state
        .rate_limiter
        .record_outcome(&key, response.status().is_success());

    let headers = response.headers_mut();
    for (name, value) in [
        ("X-RateLimit-Limit", decision.limit.to_string()),
        ("X-RateLimit-Remaining", decision.remaining.to_string()),
        ("X-RateLimit-Reset", decision.reset_epoch_secs().to_string()),
    ] {
        if let Ok(value) = value.parse() {
            headers.insert(name, value);
        }
    }

    response
}

/// Derives the rate limit key for a request.
///
/// Combines the caller's network identity with the API key when one is
/// present. Any derivation failure falls back to a single shared key rather
/// than blocking traffic.
pub fn derive_rate_limit_key(request: &Request<Body>) -> String {
    if let Some(api_key) = request.headers().get(API_KEY_HEADER) {
        if let Ok(value) = api_key.to_str()
            && !value.trim().is_empty()
        {
            return format!("{}{}", USER_KEY_PREFIX, value.trim());
        }
        // Present but undecodable header: fail open.
        return FALLBACK_KEY.to_string();
    }

    match extract_client_ip(request) {
        Some(ip) => format!("{}{}", ANONYMOUS_KEY_PREFIX, ip),
        None => FALLBACK_KEY.to_string(),
    }
}

/// Extract client IP from request headers.
fn extract_client_ip(request: &Request<Body>) -> Option<String> {
    if let Some(forwarded) = request.headers().get("X-Forwarded-For")
        && let Ok(value) = forwarded.to_str()
        && let Some(ip) = value.split(',').next()
        && !ip.trim().is_empty()
    {
        return Some(ip.trim().to_string());
    }

    if let Some(real_ip) = request.headers().get("X-Real-IP")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return Some(value.trim().to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    #[test]
    fn test_extract_client_ip_forwarded() {
        let request = Request::builder()
            .uri("/test")
            .header("X-Forwarded-For", "192.168.1.1, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&request).as_deref(), Some("192.168.1.1"));
    }

    #[test]
    fn test_extract_client_ip_real_ip() {
        let request = Request::builder()
            .uri("/test")
            .header("X-Real-IP", "192.168.1.2")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&request).as_deref(), Some("192.168.1.2"));
    }

    #[test]
    fn test_extract_client_ip_missing() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&request), None);
    }

    #[test]
    fn test_key_prefers_api_key_over_ip() {
        let request = Request::builder()
            .uri("/test")
            .header(API_KEY_HEADER, "sk_live_abc")
            .header("X-Forwarded-For", "192.168.1.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(derive_rate_limit_key(&request), "user_sk_live_abc");
    }

    #[test]
    fn test_key_uses_ip_when_unauthenticated() {
        let request = Request::builder()
            .uri("/test")
            .header("X-Real-IP", "10.0.0.7")
            .body(Body::empty())
            .unwrap();

        assert_eq!(derive_rate_limit_key(&request), "anon_10.0.0.7");
    }

    #[test]
    fn test_key_falls_open_to_shared_key() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert_eq!(derive_rate_limit_key(&request), FALLBACK_KEY);
    }

    #[test]
    fn test_key_falls_open_on_undecodable_header() {
        let request = Request::builder()
            .uri("/test")
            .header(API_KEY_HEADER, "   ")
            .header("X-Forwarded-For", "192.168.1.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(derive_rate_limit_key(&request), FALLBACK_KEY);
    }

    #[test]
    fn test_api_key_header_constant() {
        assert_eq!(API_KEY_HEADER, "X-API-Key");
    }
}
