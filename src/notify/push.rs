//! Web-push delivery
//!
//! Fans a rendered payload out to every registered endpoint of every
//! target user. Fan-out is best-effort, all-attempted: each delivery
//! is its own task, one failure never aborts the others, and nothing
//! propagates back to the request that triggered the dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;

use super::registry::SubscriptionRegistry;
use crate::data::{PushSubscription, User};
use crate::metrics::{PUSH_DELIVERIES_TOTAL, PUSH_DISPATCH_DURATION_SECONDS};

/// Rendered notification handed to the push service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Deep link the client opens on tap
    pub url: String,
    pub data: PushData,
}

/// Structured payload data for the client's notification handler
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    pub subject_id: String,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

/// Per-attempt delivery failure classification
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The push service reports the endpoint no longer exists; the
    /// subscription must be removed from the registry
    #[error("push endpoint gone: HTTP {0}")]
    Gone(u16),
    /// Anything else: network error, timeout, 5xx. Logged, not retried.
    #[error("transient push failure: {0}")]
    Transient(String),
}

/// One delivery call to the external push service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushClient: Send + Sync {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), DeliveryError>;
}

/// Production push client: POSTs the payload JSON to the endpoint URL
pub struct HttpPushClient {
    http_client: Arc<reqwest::Client>,
    timeout: Duration,
}

impl HttpPushClient {
    pub fn new(http_client: Arc<reqwest::Client>, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }
}

#[async_trait]
impl PushClient for HttpPushClient {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), DeliveryError> {
        let response = self
            .http_client
            .post(&subscription.endpoint)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(DeliveryError::Gone(status.as_u16()));
        }
        if !status.is_success() {
            return Err(DeliveryError::Transient(format!(
                "endpoint rejected payload: HTTP {}",
                status
            )));
        }

        Ok(())
    }
}

/// Fan-out capability as seen by the orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Deliver the payload to every subscription of every target user.
    /// Completes when all attempts have finished or failed; raises
    /// nothing.
    async fn dispatch(&self, users: Vec<User>, payload: PushPayload);
}

/// Outcome counters for one fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub gone: usize,
    pub transient: usize,
}

enum DeliveryOutcome {
    Delivered,
    Gone,
    Transient,
}

/// Production dispatcher
///
/// Expired endpoints ("gone") are removed from the registry as part of
/// the same fan-out, so the next dispatch no longer targets them.
pub struct NotificationDispatcher {
    push: Arc<dyn PushClient>,
    registry: Arc<dyn SubscriptionRegistry>,
    max_concurrent: usize,
}

impl NotificationDispatcher {
    pub fn new(
        push: Arc<dyn PushClient>,
        registry: Arc<dyn SubscriptionRegistry>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            push,
            registry,
            max_concurrent,
        }
    }

    /// Run the fan-out and report per-attempt outcomes
    pub async fn dispatch_all(&self, users: Vec<User>, payload: PushPayload) -> DispatchSummary {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let payload = Arc::new(payload);

        let mut tasks = Vec::new();

        for user in &users {
            // A failing lookup for one user must not stop delivery to others.
            let subscriptions = match self.registry.list_for(&user.id).await {
                Ok(subscriptions) => subscriptions,
                Err(e) => {
                    tracing::error!(user_id = %user.id, error = %e, "Failed to load subscriptions");
                    continue;
                }
            };

            for subscription in subscriptions {
                let semaphore = semaphore.clone();
                let payload = payload.clone();
                let push = Arc::clone(&self.push);
                let registry = Arc::clone(&self.registry);
                let user_id = user.id.clone();

                tasks.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.unwrap();

                    match push.deliver(&subscription, &payload).await {
                        Ok(()) => {
                            PUSH_DELIVERIES_TOTAL.with_label_values(&["ok"]).inc();
                            DeliveryOutcome::Delivered
                        }
                        Err(DeliveryError::Gone(status)) => {
                            PUSH_DELIVERIES_TOTAL.with_label_values(&["gone"]).inc();
                            tracing::info!(
                                user_id = %user_id,
                                endpoint = %subscription.endpoint,
                                status,
                                "Push endpoint gone; removing subscription"
                            );
                            if let Err(e) =
                                registry.remove(&user_id, &subscription.endpoint).await
                            {
                                tracing::error!(
                                    user_id = %user_id,
                                    endpoint = %subscription.endpoint,
                                    error = %e,
                                    "Failed to remove expired subscription"
                                );
                            }
                            DeliveryOutcome::Gone
                        }
                        Err(DeliveryError::Transient(reason)) => {
                            PUSH_DELIVERIES_TOTAL
                                .with_label_values(&["transient"])
                                .inc();
                            tracing::warn!(
                                user_id = %user_id,
                                endpoint = %subscription.endpoint,
                                reason = %reason,
                                "Push delivery failed"
                            );
                            DeliveryOutcome::Transient
                        }
                    }
                }));
            }
        }

        let mut summary = DispatchSummary {
            attempted: tasks.len(),
            ..DispatchSummary::default()
        };

        for task in tasks {
            if let Ok(outcome) = task.await {
                match outcome {
                    DeliveryOutcome::Delivered => summary.delivered += 1,
                    DeliveryOutcome::Gone => summary.gone += 1,
                    DeliveryOutcome::Transient => summary.transient += 1,
                }
            }
        }

        PUSH_DISPATCH_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        tracing::info!(
            users = users.len(),
            attempted = summary.attempted,
            delivered = summary.delivered,
            gone = summary.gone,
            transient = summary.transient,
            "Push fan-out complete"
        );

        summary
    }
}

#[async_trait]
impl Dispatch for NotificationDispatcher {
    async fn dispatch(&self, users: Vec<User>, payload: PushPayload) {
        self.dispatch_all(users, payload).await;
    }
}
