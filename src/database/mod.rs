// ABOUTME: SQLite database connection, schema creation, and per-domain managers
// ABOUTME: Athletes, run crews, crew content, runs/RSVPs, and Garmin data tables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! # Database Management
//!
//! A single `SqlitePool` shared by lightweight managers, one per domain. Each
//! manager owns a clone of the pool (cheap: the pool is reference counted) and
//! maps rows by hand. UUIDs and timestamps are stored as TEXT (RFC 3339).

mod athletes;
mod content;
mod crews;
mod garmin;
mod runs;

pub use athletes::AthleteManager;
pub use content::ContentManager;
pub use crews::{AthleteCrew, CrewManager, CrewMemberDetail};
pub use garmin::GarminManager;
pub use runs::RunManager;

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use gofast_core::errors::{AppError, AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseUrl;

/// Database handle shared by all request handlers
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and create the schema
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema creation fails
    pub async fn new(database_url: &str) -> Result<Self> {
        let url = DatabaseUrl::parse_url(database_url);

        if let DatabaseUrl::SQLite { path } = &url {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&url.to_connection_string())
            .context("Invalid DATABASE_URL")?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to :memory: is a separate database, so keep exactly one alive
        let pool_options = if url.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(10)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.migrate().await?;

        info!(database = %url, "Database ready");
        Ok(db)
    }

    /// Check that the database answers queries
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Database ping failed: {e}")))?;
        Ok(())
    }

    /// Athlete profiles
    #[must_use]
    pub fn athletes(&self) -> AthleteManager {
        AthleteManager::new(self.pool.clone())
    }

    /// Run crews and memberships
    #[must_use]
    pub fn crews(&self) -> CrewManager {
        CrewManager::new(self.pool.clone())
    }

    /// Announcements and chat messages
    #[must_use]
    pub fn content(&self) -> ContentManager {
        ContentManager::new(self.pool.clone())
    }

    /// Crew events, city runs, and RSVPs
    #[must_use]
    pub fn runs(&self) -> RunManager {
        RunManager::new(self.pool.clone())
    }

    /// Garmin connections and synced activities
    #[must_use]
    pub fn garmin(&self) -> GarminManager {
        GarminManager::new(self.pool.clone())
    }

    /// Create all tables; safe to run on every startup
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_athletes().await?;
        self.migrate_crews().await?;
        self.migrate_content().await?;
        self.migrate_runs().await?;
        self.migrate_garmin().await?;
        Ok(())
    }

    async fn execute_all(&self, statements: &[&str]) -> Result<()> {
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Migration failed: {}", first_line(statement)))?;
        }
        Ok(())
    }

    async fn migrate_athletes(&self) -> Result<()> {
        self.execute_all(&[
            r"
            CREATE TABLE IF NOT EXISTS athletes (
                id TEXT PRIMARY KEY,
                firebase_id TEXT NOT NULL UNIQUE,
                email TEXT,
                first_name TEXT,
                last_name TEXT,
                gofast_handle TEXT UNIQUE,
                city TEXT,
                state TEXT,
                bio TEXT,
                photo_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        ])
        .await
    }

    async fn migrate_crews(&self) -> Result<()> {
        self.execute_all(&[
            r"
            CREATE TABLE IF NOT EXISTS run_crews (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                join_code TEXT NOT NULL UNIQUE,
                handle TEXT UNIQUE,
                city TEXT,
                logo_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS crew_memberships (
                id TEXT PRIMARY KEY,
                run_crew_id TEXT NOT NULL REFERENCES run_crews(id) ON DELETE CASCADE,
                athlete_id TEXT NOT NULL REFERENCES athletes(id) ON DELETE CASCADE,
                role TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('member', 'manager', 'admin')),
                joined_at TEXT NOT NULL,
                UNIQUE (run_crew_id, athlete_id)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_crew_memberships_athlete ON crew_memberships(athlete_id)",
        ])
        .await
    }

    async fn migrate_content(&self) -> Result<()> {
        self.execute_all(&[
            r"
            CREATE TABLE IF NOT EXISTS announcements (
                id TEXT PRIMARY KEY,
                run_crew_id TEXT NOT NULL REFERENCES run_crews(id) ON DELETE CASCADE,
                author_id TEXT NOT NULL REFERENCES athletes(id) ON DELETE CASCADE,
                title TEXT,
                content TEXT NOT NULL,
                archived_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_announcements_crew ON announcements(run_crew_id, created_at)",
            r"
            CREATE TABLE IF NOT EXISTS crew_messages (
                id TEXT PRIMARY KEY,
                run_crew_id TEXT NOT NULL REFERENCES run_crews(id) ON DELETE CASCADE,
                author_id TEXT NOT NULL REFERENCES athletes(id) ON DELETE CASCADE,
                topic TEXT NOT NULL DEFAULT 'general',
                content TEXT NOT NULL,
                edited_at TEXT,
                created_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_crew_messages_crew ON crew_messages(run_crew_id, topic, created_at)",
        ])
        .await
    }

    async fn migrate_runs(&self) -> Result<()> {
        self.execute_all(&[
            r"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                run_crew_id TEXT REFERENCES run_crews(id) ON DELETE CASCADE,
                city TEXT,
                title TEXT NOT NULL,
                description TEXT,
                starts_at TEXT NOT NULL,
                meet_up_point TEXT,
                meet_up_address TEXT,
                distance_km REAL,
                pace TEXT,
                created_by TEXT NOT NULL REFERENCES athletes(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK ((run_crew_id IS NULL) != (city IS NULL))
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_runs_crew ON runs(run_crew_id, starts_at)",
            "CREATE INDEX IF NOT EXISTS idx_runs_city ON runs(city, starts_at)",
            r"
            CREATE TABLE IF NOT EXISTS run_rsvps (
                run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                athlete_id TEXT NOT NULL REFERENCES athletes(id) ON DELETE CASCADE,
                status TEXT NOT NULL CHECK (status IN ('going', 'maybe', 'not_going')),
                updated_at TEXT NOT NULL,
                PRIMARY KEY (run_id, athlete_id)
            )
            ",
        ])
        .await
    }

    async fn migrate_garmin(&self) -> Result<()> {
        self.execute_all(&[
            r"
            CREATE TABLE IF NOT EXISTS garmin_connections (
                athlete_id TEXT PRIMARY KEY REFERENCES athletes(id) ON DELETE CASCADE,
                garmin_user_id TEXT,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expires_at TEXT,
                scope TEXT,
                permissions TEXT NOT NULL DEFAULT '[]',
                connected_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            "DROP INDEX IF EXISTS idx_garmin_connections_user",
            // One connection per Garmin account: keep the most recently updated link
            r"
            UPDATE garmin_connections SET garmin_user_id = NULL
            WHERE garmin_user_id IS NOT NULL AND EXISTS (
                SELECT 1 FROM garmin_connections newer
                WHERE newer.garmin_user_id = garmin_connections.garmin_user_id
                  AND (newer.updated_at > garmin_connections.updated_at
                       OR (newer.updated_at = garmin_connections.updated_at
                           AND newer.athlete_id > garmin_connections.athlete_id))
            )
            ",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_garmin_connections_user_unique ON garmin_connections(garmin_user_id)",
            r"
            CREATE TABLE IF NOT EXISTS garmin_activities (
                id TEXT PRIMARY KEY,
                athlete_id TEXT NOT NULL REFERENCES athletes(id) ON DELETE CASCADE,
                source_activity_id TEXT NOT NULL UNIQUE,
                summary_id TEXT,
                activity_name TEXT,
                activity_type TEXT,
                start_time TEXT,
                duration_seconds INTEGER,
                distance_meters REAL,
                average_heart_rate INTEGER,
                calories INTEGER,
                detail TEXT,
                manually_updated INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_garmin_activities_athlete ON garmin_activities(athlete_id, start_time)",
        ])
        .await
    }
}

fn first_line(statement: &str) -> &str {
    statement
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
}

/// Whether a query failed on a UNIQUE or PRIMARY KEY constraint
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Whether a unique violation names `column` (SQLite reports `table.column`)
pub(crate) fn violates_unique_column(error: &sqlx::Error, column: &str) -> bool {
    matches!(error, sqlx::Error::Database(db)
        if db.is_unique_violation() && db.message().contains(column))
}

pub(crate) fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::database(format!("Invalid UUID: {e}")))
}

pub(crate) fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid date: {e}")))
}

pub(crate) fn parse_optional_timestamp(value: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}
