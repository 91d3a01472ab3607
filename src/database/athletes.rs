// ABOUTME: Athlete profile database operations
// ABOUTME: Lookup by id, Firebase uid, and handle; creation and profile updates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::Utc;
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::Athlete;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{is_unique_violation, parse_timestamp, parse_uuid, violates_unique_column};

const ATHLETE_COLUMNS: &str = "id, firebase_id, email, first_name, last_name, gofast_handle, \
     city, state, bio, photo_url, created_at, updated_at";

/// Athlete profile database operations manager
pub struct AthleteManager {
    pool: SqlitePool,
}

impl AthleteManager {
    /// Create a new athlete manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new athlete
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` if the Firebase uid or handle is taken
    pub async fn create(&self, athlete: &Athlete) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO athletes (id, firebase_id, email, first_name, last_name, gofast_handle,
                                  city, state, bio, photo_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(athlete.id.to_string())
        .bind(&athlete.firebase_id)
        .bind(&athlete.email)
        .bind(&athlete.first_name)
        .bind(&athlete.last_name)
        .bind(&athlete.gofast_handle)
        .bind(&athlete.city)
        .bind(&athlete.state)
        .bind(&athlete.bio)
        .bind(&athlete.photo_url)
        .bind(athlete.created_at.to_rfc3339())
        .bind(athlete.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::already_exists("An athlete with this identity or handle already exists")
            } else {
                AppError::database(format!("Failed to create athlete: {e}"))
            }
        })?;

        Ok(())
    }

    /// Get an athlete by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get(&self, id: Uuid) -> AppResult<Option<Athlete>> {
        let row = sqlx::query(&format!("SELECT {ATHLETE_COLUMNS} FROM athletes WHERE id = $1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get athlete: {e}")))?;

        row.map(|r| row_to_athlete(&r)).transpose()
    }

    /// Get an athlete by Firebase uid
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_by_firebase_id(&self, firebase_id: &str) -> AppResult<Option<Athlete>> {
        let row = sqlx::query(&format!(
            "SELECT {ATHLETE_COLUMNS} FROM athletes WHERE firebase_id = $1"
        ))
        .bind(firebase_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get athlete: {e}")))?;

        row.map(|r| row_to_athlete(&r)).transpose()
    }

    /// Get an athlete by handle (already normalized)
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_by_handle(&self, handle: &str) -> AppResult<Option<Athlete>> {
        let row = sqlx::query(&format!(
            "SELECT {ATHLETE_COLUMNS} FROM athletes WHERE gofast_handle = $1"
        ))
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get athlete: {e}")))?;

        row.map(|r| row_to_athlete(&r)).transpose()
    }

    /// Persist the editable profile fields and bump `updated_at`
    ///
    /// # Errors
    ///
    /// - `ResourceAlreadyExists` if the handle belongs to another athlete
    /// - `ResourceNotFound` if the athlete no longer exists
    pub async fn update(&self, athlete: &Athlete) -> AppResult<Athlete> {
        let now = Utc::now();
        let result = sqlx::query(
            r"
            UPDATE athletes
            SET email = $1, first_name = $2, last_name = $3, gofast_handle = $4,
                city = $5, state = $6, bio = $7, photo_url = $8, updated_at = $9
            WHERE id = $10
            ",
        )
        .bind(&athlete.email)
        .bind(&athlete.first_name)
        .bind(&athlete.last_name)
        .bind(&athlete.gofast_handle)
        .bind(&athlete.city)
        .bind(&athlete.state)
        .bind(&athlete.bio)
        .bind(&athlete.photo_url)
        .bind(now.to_rfc3339())
        .bind(athlete.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates_unique_column(&e, "gofast_handle") {
                AppError::already_exists("That handle is already taken")
            } else {
                AppError::database(format!("Failed to update athlete: {e}"))
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Athlete"));
        }

        Ok(Athlete {
            updated_at: now,
            ..athlete.clone()
        })
    }
}

pub(super) fn row_to_athlete(row: &SqliteRow) -> AppResult<Athlete> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Athlete {
        id: parse_uuid(&id)?,
        firebase_id: row.get("firebase_id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        gofast_handle: row.get("gofast_handle"),
        city: row.get("city"),
        state: row.get("state"),
        bio: row.get("bio"),
        photo_url: row.get("photo_url"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use gofast_core::errors::ErrorCode;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let athletes = db.athletes();

        let athlete = Athlete::new("firebase-1".to_owned(), Some("a@gofast.run".to_owned()));
        athletes.create(&athlete).await.unwrap();

        let found = athletes.get_by_firebase_id("firebase-1").await.unwrap().unwrap();
        assert_eq!(found.id, athlete.id);
        assert!(athletes.get(Uuid::new_v4()).await.unwrap().is_none());

        let err = athletes.create(&athlete).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceAlreadyExists);
    }

    #[tokio::test]
    async fn test_handle_conflict() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let athletes = db.athletes();

        let mut first = Athlete::new("a".to_owned(), None);
        first.gofast_handle = Some("speedy".to_owned());
        athletes.create(&first).await.unwrap();

        let mut second = Athlete::new("b".to_owned(), None);
        athletes.create(&second).await.unwrap();
        second.gofast_handle = Some("speedy".to_owned());

        let err = athletes.update(&second).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceAlreadyExists);
        assert_eq!(
            athletes.get_by_handle("speedy").await.unwrap().unwrap().id,
            first.id
        );
    }
}
