use crate::push as push_service;
use crate::push::NotifyError;
use crate::state;
use crate::types::push::{NotificationRequest, NotifyResponse};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

const NOT_CONFIGURED: &str = "Push notifications are not configured.";

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let keys = push_service::load_server_keys(&state.config.vapid).map_err(|err| {
        tracing::warn!(error = %err, "push public key requested without VAPID keys");
        api_error(StatusCode::SERVICE_UNAVAILABLE, NOT_CONFIGURED)
    })?;

    Ok(Json(PublicKeyResponse {
        public_key: keys.public_key_base64(),
    }))
}

pub(crate) async fn notify(
    State(state): State<state::AppState>,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let report = state
        .push
        .notify(&state.config, &request)
        .await
        .map_err(notify_error)?;
    Ok(Json(report.into()))
}

fn notify_error(err: NotifyError) -> ApiError {
    match err {
        NotifyError::InvalidRequest(err) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        NotifyError::Config(err) => {
            tracing::error!(error = %err, "push notification rejected");
            api_error(StatusCode::SERVICE_UNAVAILABLE, NOT_CONFIGURED)
        }
        err @ (NotifyError::Repository(_) | NotifyError::Payload(_)) => {
            tracing::error!(error = %err, "push notification failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send notifications.",
            )
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::app::app;
    use crate::app::tests::test_state;
    use crate::config::{AppConfig, VapidConfig};
    use crate::push::keys::tests::{FIXTURE_PRIVATE_KEY, FIXTURE_PUBLIC_KEY};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
    use serde_json::{Value as JsonValue, json};
    use tower::ServiceExt;

    fn configured() -> AppConfig {
        AppConfig {
            vapid: VapidConfig {
                public_key: Some(FIXTURE_PUBLIC_KEY.to_string()),
                private_key: Some(FIXTURE_PRIVATE_KEY.to_string()),
                subject: "mailto:ops@example.com".to_string(),
            },
            ..AppConfig::default()
        }
    }

    fn notify_request(body: JsonValue) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/notify")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> JsonValue {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn notify__should_report_zero_counts_without_subscriptions() {
        // Given
        let app = app(test_state(configured()));

        // When
        let response = app
            .oneshot(notify_request(json!({"title": "Hi", "message": "Hello"})))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"success": true, "sent": 0, "failed": 0, "total": 0})
        );
    }

    #[tokio::test]
    async fn notify__should_reject_blank_title() {
        // Given
        let app = app(test_state(configured()));

        // When
        let response = app
            .oneshot(notify_request(json!({"title": "  ", "message": "Hello"})))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "title is required"})
        );
    }

    #[tokio::test]
    async fn notify__should_return_service_unavailable_without_keys() {
        // Given
        let app = app(test_state(AppConfig::default()));

        // When
        let response = app
            .oneshot(notify_request(json!({
                "title": "Hi",
                "message": "Hello",
                "userIds": ["user-1"]
            })))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Push notifications are not configured."})
        );
    }

    #[tokio::test]
    async fn push_public_key__should_return_configured_key() {
        // Given
        let app = app(test_state(configured()));

        // When
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/push/public-key")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"publicKey": FIXTURE_PUBLIC_KEY})
        );
    }

    #[tokio::test]
    async fn push_public_key__should_return_service_unavailable_when_unconfigured() {
        // Given
        let app = app(test_state(AppConfig::default()));

        // When
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/push/public-key")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
