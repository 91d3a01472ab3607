// ABOUTME: Crew content models for announcements and chat messages
// ABOUTME: Announcement (soft-archived) and CrewMessage (editable) definitions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::crews::DEFAULT_MESSAGE_TOPIC;

/// A crew-wide announcement posted by staff
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Announcement {
    /// Unique identifier
    pub id: Uuid,
    /// Owning crew
    pub run_crew_id: Uuid,
    /// Athlete who posted it
    pub author_id: Uuid,
    /// Optional headline
    pub title: Option<String>,
    /// Body text
    pub content: String,
    /// Set when archived; archived announcements are hidden from listings
    pub archived_at: Option<DateTime<Utc>>,
    /// When the announcement was created
    pub created_at: DateTime<Utc>,
    /// When the announcement was last updated
    pub updated_at: DateTime<Utc>,
}

impl Announcement {
    /// Create a new announcement
    #[must_use]
    pub fn new(run_crew_id: Uuid, author_id: Uuid, title: Option<String>, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            run_crew_id,
            author_id,
            title,
            content,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A chat message in a crew topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrewMessage {
    /// Unique identifier
    pub id: Uuid,
    /// Owning crew
    pub run_crew_id: Uuid,
    /// Athlete who wrote it
    pub author_id: Uuid,
    /// Topic channel
    pub topic: String,
    /// Body text
    pub content: String,
    /// Set when the message was edited
    pub edited_at: Option<DateTime<Utc>>,
    /// When the message was posted
    pub created_at: DateTime<Utc>,
}

impl CrewMessage {
    /// Create a new message, defaulting to the general topic
    #[must_use]
    pub fn new(run_crew_id: Uuid, author_id: Uuid, topic: Option<String>, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_crew_id,
            author_id,
            topic: topic
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_MESSAGE_TOPIC.to_owned()),
            content,
            edited_at: None,
            created_at: Utc::now(),
        }
    }
}
