use crate::config::{self, AppConfig};
use crate::ports::{PushTransport, SubscriptionRepository, TimeProvider};
use crate::types::push::{
    DeliveryOutcome, DeliveryReport, DeliveryStatus, InvalidRequest, NotificationData,
    NotificationPayload, NotificationRequest, Subscription,
};

mod cleanup;
mod dispatcher;
pub mod encryption;
mod kdf;
pub mod keys;
mod raw_signature;
pub(crate) mod vapid;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub use encryption::{EncryptedRecord, EncryptionError, SubscriberKeys};
pub use keys::{
    ConfigError, ServerKeyPair, VapidCredentials, generate_vapid_credentials, load_server_keys,
};
pub use vapid::VapidError;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),
    #[error("push is not configured: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to load subscriptions: {0}")]
    Repository(String),
    #[error("failed to encode notification payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Why a single subscription never reached its push service.
#[derive(Debug, Error)]
enum DeliveryError {
    #[error(transparent)]
    Encryption(#[from] EncryptionError),
    #[error(transparent)]
    Vapid(#[from] VapidError),
}

/// Immutable per-invocation state shared by every delivery task.
struct DispatchContext {
    keys: ServerKeyPair,
    server_public_key: String,
    subject: String,
    payload: Vec<u8>,
    issued_at: OffsetDateTime,
    ttl: u32,
    send_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PushService<R, T, C> {
    repository: R,
    transport: T,
    time: C,
}

impl<R, T, C> PushService<R, T, C>
where
    R: SubscriptionRepository,
    T: PushTransport,
    C: TimeProvider,
{
    pub fn new(repository: R, transport: T, time: C) -> Self {
        Self {
            repository,
            transport,
            time,
        }
    }

    /// Delivers one notification to every matching subscription and removes
    /// the subscriptions their push service reported gone.
    pub async fn notify(
        &self,
        config: &AppConfig,
        request: &NotificationRequest,
    ) -> Result<DeliveryReport, NotifyError> {
        request.validate()?;
        let keys = load_server_keys(&config.vapid)?;

        let subscriptions = self
            .repository
            .query(request.recipients())
            .await
            .map_err(|err| NotifyError::Repository(err.to_string()))?;
        if subscriptions.is_empty() {
            tracing::info!("no push subscriptions matched");
            return Ok(DeliveryReport::default());
        }

        let payload = serde_json::to_vec(&build_payload(request, &config.notification))?;
        let context = Arc::new(DispatchContext {
            server_public_key: keys.public_key_base64(),
            keys,
            subject: config.vapid.subject.clone(),
            payload,
            issued_at: self.time.now(),
            ttl: config.delivery.ttl,
            send_timeout: config.delivery.send_timeout,
        });

        let outcomes = dispatch_all(
            &self.transport,
            context,
            subscriptions,
            config.delivery.concurrency,
        )
        .await;
        let report = DeliveryReport::from_outcomes(&outcomes);

        let gone = cleanup::gone_endpoints(&outcomes);
        cleanup::cleanup(&self.repository, &gone).await;

        tracing::info!(
            sent = report.sent,
            failed = report.failed,
            total = report.total,
            removed = gone.len(),
            "push batch finished"
        );
        Ok(report)
    }
}

fn build_payload(
    request: &NotificationRequest,
    defaults: &config::NotificationDefaults,
) -> NotificationPayload {
    NotificationPayload {
        title: request.title.clone(),
        body: request.message.clone(),
        icon: defaults.icon.clone(),
        badge: defaults.badge.clone(),
        tag: request.tag.clone(),
        data: request.url.clone().map(|url| NotificationData { url }),
    }
}

async fn dispatch_all<T: PushTransport>(
    transport: &T,
    context: Arc<DispatchContext>,
    subscriptions: Vec<Subscription>,
    concurrency: usize,
) -> Vec<DeliveryOutcome> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut endpoints = HashMap::with_capacity(subscriptions.len());

    for subscription in subscriptions {
        let endpoint = subscription.endpoint.clone();
        let transport = transport.clone();
        let context = Arc::clone(&context);
        let permits = Arc::clone(&permits);
        let handle = tasks.spawn(async move {
            // The semaphore is never closed, so acquiring only waits.
            let _permit = permits.acquire_owned().await;
            deliver_one(transport, context, subscription).await
        });
        endpoints.insert(handle.id(), endpoint);
    }

    let mut outcomes = Vec::with_capacity(endpoints.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((_, outcome)) => outcomes.push(outcome),
            Err(err) => {
                let endpoint = endpoints.remove(&err.id()).unwrap_or_default();
                tracing::warn!(
                    origin = %origin(&endpoint),
                    error = %err,
                    "push delivery task failed"
                );
                outcomes.push(DeliveryOutcome::transient(endpoint, None, err.to_string()));
            }
        }
    }
    outcomes
}

async fn deliver_one<T: PushTransport>(
    transport: T,
    context: Arc<DispatchContext>,
    subscription: Subscription,
) -> DeliveryOutcome {
    let request = match prepare(&context, &subscription) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(
                origin = %origin(&subscription.endpoint),
                error = %err,
                "skipping push subscription"
            );
            return DeliveryOutcome::transient(subscription.endpoint, None, err.to_string());
        }
    };

    let outcome = dispatcher::send(&transport, &request, context.send_timeout).await;
    match outcome.status {
        DeliveryStatus::Sent => tracing::debug!(
            origin = %origin(&outcome.endpoint),
            status = outcome.status_code,
            "push delivered"
        ),
        DeliveryStatus::FailedGone => tracing::warn!(
            origin = %origin(&outcome.endpoint),
            status = outcome.status_code,
            "push subscription gone"
        ),
        DeliveryStatus::FailedTransient => tracing::warn!(
            origin = %origin(&outcome.endpoint),
            status = outcome.status_code,
            error = outcome.error_detail.as_deref().unwrap_or_default(),
            "push delivery failed"
        ),
    }
    outcome
}

fn prepare(
    context: &DispatchContext,
    subscription: &Subscription,
) -> Result<crate::ports::PushRequest, DeliveryError> {
    let subscriber = SubscriberKeys::from_subscription(&subscription.keys)?;
    let audience = vapid::audience(&subscription.endpoint)?;
    let record = encryption::encrypt_with_rng(&mut OsRng, &context.payload, &subscriber)?;
    let token = vapid::sign(&audience, &context.subject, &context.keys, context.issued_at)?;
    Ok(dispatcher::build_request(
        &subscription.endpoint,
        &record,
        &token,
        &context.server_public_key,
        context.ttl,
    ))
}

/// Endpoints carry per-subscription capability paths; only the origin is logged.
fn origin(endpoint: &str) -> String {
    vapid::audience(endpoint).unwrap_or_else(|_| "<invalid endpoint>".to_string())
}
