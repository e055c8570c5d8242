//! Subscription registry and user directory capabilities
//!
//! Thin trait seams over the data layer so the dispatcher and
//! orchestrator can be exercised without a database. The production
//! implementation is `Database`; per-user endpoint uniqueness is
//! enforced there by a SQL constraint, so concurrent adds stay safe.

use async_trait::async_trait;

use crate::data::{Database, NewPushSubscription, PushSubscription, User};
use crate::error::AppError;

/// Durable store of per-user push endpoints
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// Register an endpoint for a user; idempotent by endpoint
    async fn add(
        &self,
        user_id: &str,
        subscription: &NewPushSubscription,
    ) -> Result<(), AppError>;

    /// All endpoints currently registered for a user
    async fn list_for(&self, user_id: &str) -> Result<Vec<PushSubscription>, AppError>;

    /// Drop an endpoint for a user; absent endpoints are a no-op
    async fn remove(&self, user_id: &str, endpoint: &str) -> Result<(), AppError>;
}

#[async_trait]
impl SubscriptionRegistry for Database {
    async fn add(
        &self,
        user_id: &str,
        subscription: &NewPushSubscription,
    ) -> Result<(), AppError> {
        self.add_subscription(user_id, subscription).await
    }

    async fn list_for(&self, user_id: &str) -> Result<Vec<PushSubscription>, AppError> {
        self.list_subscriptions_for(user_id).await
    }

    async fn remove(&self, user_id: &str, endpoint: &str) -> Result<(), AppError> {
        self.remove_subscription(user_id, endpoint).await
    }
}

/// Read-only view of the user base, used for push targeting
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_all_users(&self) -> Result<Vec<User>, AppError>;
}

#[async_trait]
impl UserDirectory for Database {
    async fn list_all_users(&self) -> Result<Vec<User>, AppError> {
        self.list_users().await
    }
}
