// ABOUTME: Crew announcement and chat message database operations
// ABOUTME: Soft-archived announcements and topic-filtered crew messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::Utc;
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::{Announcement, CrewMessage};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_optional_timestamp, parse_timestamp, parse_uuid};

/// Announcement and message database operations manager
pub struct ContentManager {
    pool: SqlitePool,
}

impl ContentManager {
    /// Create a new content manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Announcements
    // ========================================================================

    /// Insert an announcement
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn create_announcement(&self, announcement: &Announcement) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO announcements (id, run_crew_id, author_id, title, content, archived_at,
                                       created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NULL, $6, $7)
            ",
        )
        .bind(announcement.id.to_string())
        .bind(announcement.run_crew_id.to_string())
        .bind(announcement.author_id.to_string())
        .bind(&announcement.title)
        .bind(&announcement.content)
        .bind(announcement.created_at.to_rfc3339())
        .bind(announcement.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create announcement: {e}")))?;

        Ok(())
    }

    /// Get an announcement inside a crew, archived or not
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_announcement(
        &self,
        run_crew_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<Announcement>> {
        let row = sqlx::query(
            r"
            SELECT id, run_crew_id, author_id, title, content, archived_at, created_at, updated_at
            FROM announcements
            WHERE id = $1 AND run_crew_id = $2
            ",
        )
        .bind(id.to_string())
        .bind(run_crew_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get announcement: {e}")))?;

        row.map(|r| row_to_announcement(&r)).transpose()
    }

    /// Active (non-archived) announcements of a crew, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_announcements(&self, run_crew_id: Uuid) -> AppResult<Vec<Announcement>> {
        let rows = sqlx::query(
            r"
            SELECT id, run_crew_id, author_id, title, content, archived_at, created_at, updated_at
            FROM announcements
            WHERE run_crew_id = $1 AND archived_at IS NULL
            ORDER BY created_at DESC, rowid DESC
            ",
        )
        .bind(run_crew_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list announcements: {e}")))?;

        rows.iter().map(row_to_announcement).collect()
    }

    /// Update title and content
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn update_announcement(&self, announcement: &Announcement) -> AppResult<Announcement> {
        let now = Utc::now();
        sqlx::query("UPDATE announcements SET title = $1, content = $2, updated_at = $3 WHERE id = $4")
            .bind(&announcement.title)
            .bind(&announcement.content)
            .bind(now.to_rfc3339())
            .bind(announcement.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update announcement: {e}")))?;

        Ok(Announcement {
            updated_at: now,
            ..announcement.clone()
        })
    }

    /// Soft-archive an announcement; archiving twice keeps the first timestamp
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn archive_announcement(&self, announcement: &Announcement) -> AppResult<Announcement> {
        if announcement.archived_at.is_some() {
            return Ok(announcement.clone());
        }

        let now = Utc::now();
        sqlx::query("UPDATE announcements SET archived_at = $1, updated_at = $1 WHERE id = $2")
            .bind(now.to_rfc3339())
            .bind(announcement.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to archive announcement: {e}")))?;

        Ok(Announcement {
            archived_at: Some(now),
            updated_at: now,
            ..announcement.clone()
        })
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Insert a chat message
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn create_message(&self, message: &CrewMessage) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO crew_messages (id, run_crew_id, author_id, topic, content, edited_at, created_at)
            VALUES ($1, $2, $3, $4, $5, NULL, $6)
            ",
        )
        .bind(message.id.to_string())
        .bind(message.run_crew_id.to_string())
        .bind(message.author_id.to_string())
        .bind(&message.topic)
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create message: {e}")))?;

        Ok(())
    }

    /// Get a message inside a crew
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_message(&self, run_crew_id: Uuid, id: Uuid) -> AppResult<Option<CrewMessage>> {
        let row = sqlx::query(
            r"
            SELECT id, run_crew_id, author_id, topic, content, edited_at, created_at
            FROM crew_messages
            WHERE id = $1 AND run_crew_id = $2
            ",
        )
        .bind(id.to_string())
        .bind(run_crew_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get message: {e}")))?;

        row.map(|r| row_to_message(&r)).transpose()
    }

    /// The latest `limit` messages of a crew (optionally one topic), in chronological order
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_messages(
        &self,
        run_crew_id: Uuid,
        topic: Option<&str>,
        limit: i64,
    ) -> AppResult<Vec<CrewMessage>> {
        let rows = sqlx::query(
            r"
            SELECT id, run_crew_id, author_id, topic, content, edited_at, created_at
            FROM crew_messages
            WHERE run_crew_id = $1 AND ($2 IS NULL OR topic = $2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT $3
            ",
        )
        .bind(run_crew_id.to_string())
        .bind(topic)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list messages: {e}")))?;

        let mut messages = rows
            .iter()
            .map(row_to_message)
            .collect::<AppResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Replace message content and stamp `edited_at`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn update_message(&self, message: &CrewMessage, content: String) -> AppResult<CrewMessage> {
        let now = Utc::now();
        sqlx::query("UPDATE crew_messages SET content = $1, edited_at = $2 WHERE id = $3")
            .bind(&content)
            .bind(now.to_rfc3339())
            .bind(message.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update message: {e}")))?;

        Ok(CrewMessage {
            content,
            edited_at: Some(now),
            ..message.clone()
        })
    }

    /// Delete a message
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn delete_message(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM crew_messages WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete message: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_announcement(row: &SqliteRow) -> AppResult<Announcement> {
    let id: String = row.get("id");
    let run_crew_id: String = row.get("run_crew_id");
    let author_id: String = row.get("author_id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Announcement {
        id: parse_uuid(&id)?,
        run_crew_id: parse_uuid(&run_crew_id)?,
        author_id: parse_uuid(&author_id)?,
        title: row.get("title"),
        content: row.get("content"),
        archived_at: parse_optional_timestamp(row.get("archived_at"))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_message(row: &SqliteRow) -> AppResult<CrewMessage> {
    let id: String = row.get("id");
    let run_crew_id: String = row.get("run_crew_id");
    let author_id: String = row.get("author_id");
    let created_at: String = row.get("created_at");

    Ok(CrewMessage {
        id: parse_uuid(&id)?,
        run_crew_id: parse_uuid(&run_crew_id)?,
        author_id: parse_uuid(&author_id)?,
        topic: row.get("topic"),
        content: row.get("content"),
        edited_at: parse_optional_timestamp(row.get("edited_at"))?,
        created_at: parse_timestamp(&created_at)?,
    })
}
