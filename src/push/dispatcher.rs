use std::time::Duration;

use super::encryption::{CONTENT_ENCODING, EncryptedRecord};
use crate::ports::{PushRequest, PushResponse, PushTransport};
use crate::types::push::{DeliveryOutcome, DeliveryStatus};

const URGENCY: &str = "normal";
const MAX_ERROR_BODY_CHARS: usize = 200;

pub(crate) fn build_request(
    endpoint: &str,
    record: &EncryptedRecord,
    token: &str,
    server_public_key: &str,
    ttl: u32,
) -> PushRequest {
    let body = record.to_bytes();
    PushRequest {
        endpoint: endpoint.to_string(),
        headers: vec![
            ("Content-Encoding", CONTENT_ENCODING.to_string()),
            ("Content-Type", "application/octet-stream".to_string()),
            ("Content-Length", body.len().to_string()),
            ("TTL", ttl.to_string()),
            ("Urgency", URGENCY.to_string()),
            (
                "Authorization",
                format!("vapid t={token}, k={server_public_key}"),
            ),
        ],
        body,
    }
}

pub(crate) fn classify(status: u16) -> DeliveryStatus {
    match status {
        200..=299 => DeliveryStatus::Sent,
        400 | 404 | 410 => DeliveryStatus::FailedGone,
        _ => DeliveryStatus::FailedTransient,
    }
}

/// Posts one request and classifies the result. Never retries.
pub(crate) async fn send<T: PushTransport>(
    transport: &T,
    request: &PushRequest,
    timeout: Duration,
) -> DeliveryOutcome {
    let endpoint = request.endpoint.clone();
    let response = match tokio::time::timeout(timeout, transport.post(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => return DeliveryOutcome::transient(endpoint, None, err.to_string()),
        Err(_) => {
            return DeliveryOutcome::transient(
                endpoint,
                None,
                format!("no response within {}ms", timeout.as_millis()),
            );
        }
    };

    match classify(response.status) {
        DeliveryStatus::Sent => DeliveryOutcome::sent(endpoint, response.status),
        DeliveryStatus::FailedGone => {
            DeliveryOutcome::gone(endpoint, response.status, error_detail(&response))
        }
        DeliveryStatus::FailedTransient => DeliveryOutcome::transient(
            endpoint,
            Some(response.status),
            error_detail(&response),
        ),
    }
}

fn error_detail(response: &PushResponse) -> String {
    let body = response.body.trim();
    if body.is_empty() {
        return format!("HTTP {}", response.status);
    }
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("HTTP {}: {body}", response.status)
}
