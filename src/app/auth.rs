use crate::state;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use super::push::api_error;

pub(crate) async fn auth_middleware(
    State(state): State<state::AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected = match &state.config.api_token {
        Some(token) => token,
        None => return next.run(req).await,
    };

    if is_auth_bypass_path(req.uri().path()) {
        return next.run(req).await;
    }

    let authorized = bearer_token(req.headers())
        .is_some_and(|provided| token_matches(expected.as_str(), provided));
    if authorized {
        return next.run(req).await;
    }

    api_error(StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

/// The front-end fetches the public key before it has any credentials.
fn is_auth_bypass_path(path: &str) -> bool {
    path == "/health" || path == "/api/push/public-key"
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

// Compares digests so the comparison time does not depend on the token prefix.
fn token_matches(expected: &str, provided: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(provided.as_bytes())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::app::app;
    use crate::app::tests::test_state;
    use crate::config::{ApiToken, AppConfig, VapidConfig};
    use crate::push::keys::tests::{FIXTURE_PRIVATE_KEY, FIXTURE_PUBLIC_KEY};
    use axum::http::header::CONTENT_TYPE;
    use tower::ServiceExt;

    fn guarded() -> AppConfig {
        AppConfig {
            api_token: ApiToken::new("s3cret"),
            vapid: VapidConfig {
                public_key: Some(FIXTURE_PUBLIC_KEY.to_string()),
                private_key: Some(FIXTURE_PRIVATE_KEY.to_string()),
                subject: "mailto:ops@example.com".to_string(),
            },
            ..AppConfig::default()
        }
    }

    fn notify_request(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/notify")
            .header(CONTENT_TYPE, "application/json");
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        builder
            .body(Body::from(r#"{"title":"Hi","message":"Hello"}"#))
            .expect("request")
    }

    #[tokio::test]
    async fn auth_middleware__should_reject_notify_without_token() {
        // Given
        let app = app(test_state(guarded()));

        // When
        let missing = app
            .clone()
            .oneshot(notify_request(None))
            .await
            .expect("request failed");
        let wrong = app
            .oneshot(notify_request(Some("Bearer guess")))
            .await
            .expect("request failed");

        // Then
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_middleware__should_pass_notify_with_token() {
        // Given
        let app = app(test_state(guarded()));

        // When
        let response = app
            .oneshot(notify_request(Some("Bearer s3cret")))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn auth_middleware__should_leave_public_routes_open() {
        // Given
        let app = app(test_state(guarded()));

        // When
        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("request failed");
        let public_key = app
            .oneshot(
                Request::builder()
                    .uri("/api/push/public-key")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(public_key.status(), StatusCode::OK);
    }

    #[test]
    fn bearer_token__should_read_authorization_header() {
        // Given
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer s3cret".parse().expect("header value"));

        // Then
        assert_eq!(bearer_token(&headers), Some("s3cret"));
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "s3cre"));
    }
}
