use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A browser push subscription as the subscription store keeps it.
///
/// Mirrors `PushSubscription.toJSON()` with the owning user attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub owner_id: String,
}

/// Base64url encoded subscriber key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// What the application asks to deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub user_ids: Option<Vec<String>>,
}

impl NotificationRequest {
    /// Recipient filter for the subscription query. An empty list is treated
    /// as no filter.
    pub fn recipients(&self) -> Option<&[String]> {
        self.user_ids
            .as_deref()
            .filter(|user_ids| !user_ids.is_empty())
    }

    pub fn validate(&self) -> Result<(), InvalidRequest> {
        if self.title.trim().is_empty() {
            return Err(InvalidRequest::MissingTitle);
        }
        if self.message.trim().is_empty() {
            return Err(InvalidRequest::MissingMessage);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("title is required")]
    MissingTitle,
    #[error("message is required")]
    MissingMessage,
}

/// The plaintext body every subscriber's service worker receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    FailedTransient,
    /// The push service no longer knows the endpoint.
    FailedGone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub endpoint: String,
    pub status: DeliveryStatus,
    pub status_code: Option<u16>,
    pub error_detail: Option<String>,
}

impl DeliveryOutcome {
    pub fn sent(endpoint: String, status_code: u16) -> Self {
        Self {
            endpoint,
            status: DeliveryStatus::Sent,
            status_code: Some(status_code),
            error_detail: None,
        }
    }

    pub fn gone(endpoint: String, status_code: u16, detail: String) -> Self {
        Self {
            endpoint,
            status: DeliveryStatus::FailedGone,
            status_code: Some(status_code),
            error_detail: Some(detail),
        }
    }

    pub fn transient(endpoint: String, status_code: Option<u16>, detail: String) -> Self {
        Self {
            endpoint,
            status: DeliveryStatus::FailedTransient,
            status_code,
            error_detail: Some(detail),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }

    pub fn is_gone(&self) -> bool {
        self.status == DeliveryStatus::FailedGone
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

impl DeliveryReport {
    pub fn from_outcomes(outcomes: &[DeliveryOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut report, outcome| {
            if outcome.is_sent() {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
            report.total += 1;
            report
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: DeliveryReport,
}

impl From<DeliveryReport> for NotifyResponse {
    fn from(report: DeliveryReport) -> Self {
        Self {
            success: true,
            report,
        }
    }
}
