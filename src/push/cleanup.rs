use std::collections::HashSet;

use crate::ports::SubscriptionRepository;
use crate::types::push::DeliveryOutcome;

pub(crate) fn gone_endpoints(outcomes: &[DeliveryOutcome]) -> Vec<String> {
    let mut seen = HashSet::new();
    outcomes
        .iter()
        .filter(|outcome| outcome.is_gone())
        .filter(|outcome| seen.insert(outcome.endpoint.as_str()))
        .map(|outcome| outcome.endpoint.clone())
        .collect()
}

/// Removes dead subscriptions in one batch. Best effort: failures are only logged.
pub(crate) async fn cleanup<R: SubscriptionRepository>(repository: &R, gone: &[String]) {
    if gone.is_empty() {
        return;
    }
    match repository.batch_delete(gone).await {
        Ok(()) => tracing::info!(removed = gone.len(), "removed expired push subscriptions"),
        Err(err) => tracing::warn!(
            error = %err,
            count = gone.len(),
            "failed to remove expired push subscriptions"
        ),
    }
}
