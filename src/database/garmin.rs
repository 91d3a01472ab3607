// ABOUTME: Garmin connection and synced activity database operations
// ABOUTME: Token upserts, webhook user routing, permission updates, and idempotent activity upserts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::Utc;
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::{GarminActivity, GarminConnection};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use super::{parse_optional_timestamp, parse_timestamp, parse_uuid};

const CONNECTION_COLUMNS: &str = "athlete_id, garmin_user_id, access_token, refresh_token, \
     expires_at, scope, permissions, connected_at, updated_at";

const ACTIVITY_COLUMNS: &str = "id, athlete_id, source_activity_id, summary_id, activity_name, \
     activity_type, start_time, duration_seconds, distance_meters, average_heart_rate, calories, \
     detail, manually_updated, created_at, updated_at";

/// Garmin database operations manager
pub struct GarminManager {
    pool: SqlitePool,
}

impl GarminManager {
    /// Create a new Garmin manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Insert or replace the athlete's connection; `connected_at` survives reconnects
    ///
    /// A Garmin account links to one athlete at a time, so saving a user id
    /// unlinks it from any other athlete's connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn upsert_connection(&self, connection: &GarminConnection) -> AppResult<()> {
        let permissions = serde_json::to_string(&connection.permissions)?;
        let athlete_id = connection.athlete_id.to_string();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        if let Some(garmin_user_id) = &connection.garmin_user_id {
            let unlinked = sqlx::query(
                "UPDATE garmin_connections SET garmin_user_id = NULL \
                 WHERE garmin_user_id = $1 AND athlete_id != $2",
            )
            .bind(garmin_user_id)
            .bind(&athlete_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to unlink Garmin account: {e}")))?;

            if unlinked.rows_affected() > 0 {
                warn!(
                    garmin_user_id = %garmin_user_id,
                    athlete_id = %athlete_id,
                    "Garmin account moved from another athlete"
                );
            }
        }

        sqlx::query(
            r"
            INSERT INTO garmin_connections (athlete_id, garmin_user_id, access_token, refresh_token,
                                            expires_at, scope, permissions, connected_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (athlete_id) DO UPDATE SET
                garmin_user_id = COALESCE(excluded.garmin_user_id, garmin_connections.garmin_user_id),
                access_token = excluded.access_token,
                refresh_token = COALESCE(excluded.refresh_token, garmin_connections.refresh_token),
                expires_at = excluded.expires_at,
                scope = COALESCE(excluded.scope, garmin_connections.scope),
                permissions = excluded.permissions,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&athlete_id)
        .bind(&connection.garmin_user_id)
        .bind(&connection.access_token)
        .bind(&connection.refresh_token)
        .bind(connection.expires_at.map(|t| t.to_rfc3339()))
        .bind(&connection.scope)
        .bind(permissions)
        .bind(connection.connected_at.to_rfc3339())
        .bind(connection.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to save Garmin connection: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit Garmin connection: {e}")))
    }

    /// Get the athlete's connection
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_connection(&self, athlete_id: Uuid) -> AppResult<Option<GarminConnection>> {
        let row = sqlx::query(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM garmin_connections WHERE athlete_id = $1"
        ))
        .bind(athlete_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get Garmin connection: {e}")))?;

        row.map(|r| row_to_connection(&r)).transpose()
    }

    /// Find the connection a webhook `userId` belongs to
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_connection_by_garmin_user(
        &self,
        garmin_user_id: &str,
    ) -> AppResult<Option<GarminConnection>> {
        let row = sqlx::query(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM garmin_connections WHERE garmin_user_id = $1"
        ))
        .bind(garmin_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get Garmin connection: {e}")))?;

        row.map(|r| row_to_connection(&r)).transpose()
    }

    /// Replace the permission list reported by Garmin
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn update_permissions(&self, athlete_id: Uuid, permissions: &[String]) -> AppResult<()> {
        sqlx::query(
            "UPDATE garmin_connections SET permissions = $1, updated_at = $2 WHERE athlete_id = $3",
        )
        .bind(serde_json::to_string(permissions)?)
        .bind(Utc::now().to_rfc3339())
        .bind(athlete_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update Garmin permissions: {e}")))?;

        Ok(())
    }

    /// Remove the athlete's connection
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn delete_connection(&self, athlete_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM garmin_connections WHERE athlete_id = $1")
            .bind(athlete_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete Garmin connection: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Activities
    // ========================================================================

    /// Insert or refresh an activity keyed by Garmin's activity id
    ///
    /// Detail samples and the manual-edit flag are never cleared by a later summary.
    /// A row owned by another athlete is left untouched.
    /// Returns `true` when a new row was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn upsert_activity(&self, activity: &GarminActivity) -> AppResult<bool> {
        let detail = activity.detail.as_ref().map(serde_json::to_string).transpose()?;

        let row = sqlx::query(
            r"
            INSERT INTO garmin_activities (id, athlete_id, source_activity_id, summary_id,
                                           activity_name, activity_type, start_time,
                                           duration_seconds, distance_meters, average_heart_rate,
                                           calories, detail, manually_updated, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (source_activity_id) DO UPDATE SET
                summary_id = COALESCE(excluded.summary_id, garmin_activities.summary_id),
                activity_name = COALESCE(excluded.activity_name, garmin_activities.activity_name),
                activity_type = COALESCE(excluded.activity_type, garmin_activities.activity_type),
                start_time = COALESCE(excluded.start_time, garmin_activities.start_time),
                duration_seconds = COALESCE(excluded.duration_seconds, garmin_activities.duration_seconds),
                distance_meters = COALESCE(excluded.distance_meters, garmin_activities.distance_meters),
                average_heart_rate = COALESCE(excluded.average_heart_rate, garmin_activities.average_heart_rate),
                calories = COALESCE(excluded.calories, garmin_activities.calories),
                detail = COALESCE(excluded.detail, garmin_activities.detail),
                manually_updated = MAX(excluded.manually_updated, garmin_activities.manually_updated),
                updated_at = excluded.updated_at
            WHERE garmin_activities.athlete_id = excluded.athlete_id
            RETURNING id
            ",
        )
        .bind(activity.id.to_string())
        .bind(activity.athlete_id.to_string())
        .bind(&activity.source_activity_id)
        .bind(&activity.summary_id)
        .bind(&activity.activity_name)
        .bind(&activity.activity_type)
        .bind(activity.start_time.map(|t| t.to_rfc3339()))
        .bind(activity.duration_seconds)
        .bind(activity.distance_meters)
        .bind(activity.average_heart_rate)
        .bind(activity.calories)
        .bind(detail)
        .bind(activity.manually_updated)
        .bind(activity.created_at.to_rfc3339())
        .bind(activity.updated_at.to_rfc3339())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save Garmin activity: {e}")))?;

        let Some(row) = row else {
            warn!(
                source_activity_id = %activity.source_activity_id,
                athlete_id = %activity.athlete_id,
                "Activity belongs to another athlete, update skipped"
            );
            return Ok(false);
        };

        let stored_id: String = row.get("id");
        Ok(stored_id == activity.id.to_string())
    }

    /// Get an activity by Garmin's activity id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_activity_by_source_id(
        &self,
        source_activity_id: &str,
    ) -> AppResult<Option<GarminActivity>> {
        let row = sqlx::query(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM garmin_activities WHERE source_activity_id = $1"
        ))
        .bind(source_activity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get Garmin activity: {e}")))?;

        row.map(|r| row_to_activity(&r)).transpose()
    }

    /// The athlete's activities, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_activities(
        &self,
        athlete_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<GarminActivity>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {ACTIVITY_COLUMNS} FROM garmin_activities
            WHERE athlete_id = $1
            ORDER BY start_time DESC, created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(athlete_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list Garmin activities: {e}")))?;

        rows.iter().map(row_to_activity).collect()
    }
}

fn row_to_connection(row: &SqliteRow) -> AppResult<GarminConnection> {
    let athlete_id: String = row.get("athlete_id");
    let permissions: String = row.get("permissions");
    let connected_at: String = row.get("connected_at");
    let updated_at: String = row.get("updated_at");

    Ok(GarminConnection {
        athlete_id: parse_uuid(&athlete_id)?,
        garmin_user_id: row.get("garmin_user_id"),
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        expires_at: parse_optional_timestamp(row.get("expires_at"))?,
        scope: row.get("scope"),
        permissions: serde_json::from_str(&permissions)
            .map_err(|e| AppError::database(format!("Invalid permissions JSON: {e}")))?,
        connected_at: parse_timestamp(&connected_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_activity(row: &SqliteRow) -> AppResult<GarminActivity> {
    let id: String = row.get("id");
    let athlete_id: String = row.get("athlete_id");
    let detail: Option<String> = row.get("detail");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(GarminActivity {
        id: parse_uuid(&id)?,
        athlete_id: parse_uuid(&athlete_id)?,
        source_activity_id: row.get("source_activity_id"),
        summary_id: row.get("summary_id"),
        activity_name: row.get("activity_name"),
        activity_type: row.get("activity_type"),
        start_time: parse_optional_timestamp(row.get("start_time"))?,
        duration_seconds: row.get("duration_seconds"),
        distance_meters: row.get("distance_meters"),
        average_heart_rate: row.get("average_heart_rate"),
        calories: row.get("calories"),
        detail: detail
            .map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(|e| AppError::database(format!("Invalid activity detail JSON: {e}")))?,
        manually_updated: row.get("manually_updated"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
