// ABOUTME: Crew event and public city run database operations
// ABOUTME: Run CRUD, upcoming-run listings by crew or city, RSVP upserts and tallies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::{DateTime, Utc};
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::{RsvpTally, Run, RunRsvp, RunScope};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

const RUN_COLUMNS: &str = "id, run_crew_id, city, title, description, starts_at, meet_up_point, \
     meet_up_address, distance_km, pace, created_by, created_at, updated_at";

/// Run and RSVP database operations manager
pub struct RunManager {
    pool: SqlitePool,
}

impl RunManager {
    /// Create a new run manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a run
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn create(&self, run: &Run) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO runs (id, run_crew_id, city, title, description, starts_at, meet_up_point,
                              meet_up_address, distance_km, pace, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(run.id.to_string())
        .bind(run.run_crew_id().map(|id| id.to_string()))
        .bind(run.city())
        .bind(&run.title)
        .bind(&run.description)
        .bind(run.starts_at.to_rfc3339())
        .bind(&run.meet_up_point)
        .bind(&run.meet_up_address)
        .bind(run.distance_km)
        .bind(&run.pace)
        .bind(run.created_by.to_string())
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create run: {e}")))?;

        Ok(())
    }

    /// Get a run by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get(&self, id: Uuid) -> AppResult<Option<Run>> {
        let row = sqlx::query(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = $1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get run: {e}")))?;

        row.map(|r| row_to_run(&r)).transpose()
    }

    /// Runs of a crew starting at or after `from`, soonest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_for_crew(
        &self,
        run_crew_id: Uuid,
        from: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Run>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {RUN_COLUMNS} FROM runs
            WHERE run_crew_id = $1 AND ($2 IS NULL OR starts_at >= $2)
            ORDER BY starts_at ASC
            "
        ))
        .bind(run_crew_id.to_string())
        .bind(from.map(|t| t.to_rfc3339()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list crew runs: {e}")))?;

        rows.iter().map(row_to_run).collect()
    }

    /// Public runs of a city (already normalized) starting at or after `from`, soonest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_for_city(&self, city: &str, from: Option<DateTime<Utc>>) -> AppResult<Vec<Run>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {RUN_COLUMNS} FROM runs
            WHERE city = $1 AND ($2 IS NULL OR starts_at >= $2)
            ORDER BY starts_at ASC
            "
        ))
        .bind(city)
        .bind(from.map(|t| t.to_rfc3339()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list city runs: {e}")))?;

        rows.iter().map(row_to_run).collect()
    }

    /// Persist editable run fields and bump `updated_at`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn update(&self, run: &Run) -> AppResult<Run> {
        let now = Utc::now();
        sqlx::query(
            r"
            UPDATE runs
            SET title = $1, description = $2, starts_at = $3, meet_up_point = $4,
                meet_up_address = $5, distance_km = $6, pace = $7, updated_at = $8
            WHERE id = $9
            ",
        )
        .bind(&run.title)
        .bind(&run.description)
        .bind(run.starts_at.to_rfc3339())
        .bind(&run.meet_up_point)
        .bind(&run.meet_up_address)
        .bind(run.distance_km)
        .bind(&run.pace)
        .bind(now.to_rfc3339())
        .bind(run.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update run: {e}")))?;

        Ok(Run {
            updated_at: now,
            ..run.clone()
        })
    }

    /// Delete a run and its RSVPs
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM runs WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete run: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // RSVPs
    // ========================================================================

    /// Insert or replace the athlete's RSVP
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn upsert_rsvp(&self, rsvp: &RunRsvp) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO run_rsvps (run_id, athlete_id, status, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (run_id, athlete_id) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at
            ",
        )
        .bind(rsvp.run_id.to_string())
        .bind(rsvp.athlete_id.to_string())
        .bind(rsvp.status.as_str())
        .bind(rsvp.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save RSVP: {e}")))?;

        Ok(())
    }

    /// All RSVPs of a run, most recent first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_rsvps(&self, run_id: Uuid) -> AppResult<Vec<RunRsvp>> {
        let rows = sqlx::query(
            r"
            SELECT run_id, athlete_id, status, updated_at
            FROM run_rsvps
            WHERE run_id = $1
            ORDER BY updated_at DESC
            ",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list RSVPs: {e}")))?;

        rows.iter().map(row_to_rsvp).collect()
    }

    /// Count RSVPs of a run per status
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn rsvp_tally(&self, run_id: Uuid) -> AppResult<RsvpTally> {
        Ok(RsvpTally::from_rsvps(&self.list_rsvps(run_id).await?))
    }
}

fn row_to_run(row: &SqliteRow) -> AppResult<Run> {
    let id: String = row.get("id");
    let run_crew_id: Option<String> = row.get("run_crew_id");
    let city: Option<String> = row.get("city");
    let starts_at: String = row.get("starts_at");
    let created_by: String = row.get("created_by");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let scope = match (run_crew_id, city) {
        (Some(run_crew_id), _) => RunScope::Crew {
            run_crew_id: parse_uuid(&run_crew_id)?,
        },
        (None, Some(city)) => RunScope::City { city },
        (None, None) => {
            return Err(AppError::database(format!(
                "Run {id} has neither a crew nor a city"
            )))
        }
    };

    Ok(Run {
        id: parse_uuid(&id)?,
        scope,
        title: row.get("title"),
        description: row.get("description"),
        starts_at: parse_timestamp(&starts_at)?,
        meet_up_point: row.get("meet_up_point"),
        meet_up_address: row.get("meet_up_address"),
        distance_km: row.get("distance_km"),
        pace: row.get("pace"),
        created_by: parse_uuid(&created_by)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_rsvp(row: &SqliteRow) -> AppResult<RunRsvp> {
    let run_id: String = row.get("run_id");
    let athlete_id: String = row.get("athlete_id");
    let status: String = row.get("status");
    let updated_at: String = row.get("updated_at");

    Ok(RunRsvp {
        run_id: parse_uuid(&run_id)?,
        athlete_id: parse_uuid(&athlete_id)?,
        status: status
            .parse()
            .map_err(|e: AppError| AppError::database(e.message))?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
