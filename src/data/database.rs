//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with a connection pool; migrations run on connect.

use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, role, lat, lng, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role)
        .bind(user.lat)
        .bind(user.lng)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a user by id
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get all users
    ///
    /// This is the current push-targeting set: every known user.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Insert a new report
    pub async fn insert_report(&self, report: &Report) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO reports (id, report_type, description, photo_url, lat, lng, status, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(report.report_type)
        .bind(&report.description)
        .bind(&report.photo_url)
        .bind(report.lat)
        .bind(report.lng)
        .bind(report.status)
        .bind(&report.user_id)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a report by id
    pub async fn get_report(&self, id: &str) -> Result<Option<Report>, AppError> {
        let report = sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(report)
    }

    /// Get all reports, newest first
    pub async fn list_reports(&self) -> Result<Vec<Report>, AppError> {
        let reports =
            sqlx::query_as::<_, Report>("SELECT * FROM reports ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(reports)
    }

    /// Update a report's status
    ///
    /// # Returns
    /// The updated report, or None if no report with that id exists
    pub async fn update_report_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> Result<Option<Report>, AppError> {
        let result = sqlx::query("UPDATE reports SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_report(id).await
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    /// Insert a new panic alert
    pub async fn insert_alert(&self, alert: &Alert) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, user_id, lat, lng, status, created_at, resolved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.user_id)
        .bind(alert.lat)
        .bind(alert.lng)
        .bind(alert.status)
        .bind(alert.created_at)
        .bind(alert.resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an alert by id
    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>, AppError> {
        let alert = sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(alert)
    }

    /// Get all alerts, newest first
    pub async fn list_alerts(&self) -> Result<Vec<Alert>, AppError> {
        let alerts = sqlx::query_as::<_, Alert>("SELECT * FROM alerts ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(alerts)
    }

    /// Update an alert's status
    ///
    /// Leaving the `active` state stamps `resolved_at`; returning to it
    /// clears the stamp.
    ///
    /// # Returns
    /// The updated alert, or None if no alert with that id exists
    pub async fn update_alert_status(
        &self,
        id: &str,
        status: AlertStatus,
    ) -> Result<Option<Alert>, AppError> {
        let resolved_at = match status {
            AlertStatus::Active => None,
            AlertStatus::Resolved | AlertStatus::FalseAlarm => Some(chrono::Utc::now()),
        };

        let result = sqlx::query("UPDATE alerts SET status = ?, resolved_at = ? WHERE id = ?")
            .bind(status)
            .bind(resolved_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_alert(id).await
    }

    // =========================================================================
    // Push subscriptions
    // =========================================================================

    /// Add a push subscription for a user, idempotently by endpoint
    ///
    /// The per-user uniqueness invariant is enforced by the
    /// `UNIQUE(user_id, endpoint)` constraint, so concurrent adds of the
    /// same endpoint cannot produce duplicates.
    pub async fn add_subscription(
        &self,
        user_id: &str,
        subscription: &NewPushSubscription,
    ) -> Result<(), AppError> {
        let keys = serde_json::to_string(&subscription.keys)
            .map_err(|e| AppError::Validation(format!("invalid subscription keys: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO push_subscriptions (id, user_id, endpoint, keys, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, endpoint) DO NOTHING
            "#,
        )
        .bind(EntityId::new().0)
        .bind(user_id)
        .bind(&subscription.endpoint)
        .bind(keys)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all push subscriptions registered for a user
    pub async fn list_subscriptions_for(
        &self,
        user_id: &str,
    ) -> Result<Vec<PushSubscription>, AppError> {
        let subscriptions = sqlx::query_as::<_, PushSubscription>(
            "SELECT * FROM push_subscriptions WHERE user_id = ? ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    /// Remove a user's subscription by endpoint
    ///
    /// Idempotent: removing an absent endpoint is not an error.
    pub async fn remove_subscription(&self, user_id: &str, endpoint: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM push_subscriptions WHERE user_id = ? AND endpoint = ?")
            .bind(user_id)
            .bind(endpoint)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
