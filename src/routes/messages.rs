// ABOUTME: Crew chat route handlers
// ABOUTME: Members post and read topic messages; authors or staff edit and delete them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use gofast_core::constants::limits::{DEFAULT_PAGE_SIZE, MAX_MESSAGES_PAGE_SIZE};
use gofast_core::errors::AppError;
use gofast_core::models::CrewMessage;
use gofast_core::permissions::CrewAccess;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{load_crew, optional_text, parse_id, require_content};
use crate::auth::authenticate;
use crate::logging::AppLogger;
use crate::resources::ServerResources;

/// Chat message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message ID
    pub id: String,
    /// Crew ID
    pub run_crew_id: String,
    /// Author athlete ID
    pub author_id: String,
    /// Topic
    pub topic: String,
    /// Body
    pub content: String,
    /// Last edit, if edited
    pub edited_at: Option<String>,
    /// Post time
    pub created_at: String,
}

impl From<CrewMessage> for MessageResponse {
    fn from(m: CrewMessage) -> Self {
        Self {
            id: m.id.to_string(),
            run_crew_id: m.run_crew_id.to_string(),
            author_id: m.author_id.to_string(),
            topic: m.topic,
            content: m.content,
            edited_at: m.edited_at.map(|t| t.to_rfc3339()),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// Message listing
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageListResponse {
    /// Messages, oldest first
    pub messages: Vec<MessageResponse>,
}

/// Listing filters
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// Only this topic
    pub topic: Option<String>,
    /// Latest N messages (default 20, max 200)
    pub limit: Option<i64>,
}

/// Post a message
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    /// Topic (default `general`)
    pub topic: Option<String>,
    /// Body
    pub content: String,
}

/// Edit a message
#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    /// New body
    pub content: String,
}

/// Crew chat routes implementation
pub struct MessageRoutes;

impl MessageRoutes {
    /// Create all crew chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/runcrews/:id/messages",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/runcrews/:id/messages/:message_id",
                put(Self::handle_update).delete(Self::handle_delete),
            )
            .with_state(resources)
    }

    /// Handle GET /api/runcrews/:id/messages - members
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Query(query): Query<MessageQuery>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?;

        let topic = optional_text(query.topic).map(|t| t.to_lowercase());
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_MESSAGES_PAGE_SIZE);

        let messages = resources
            .database
            .content()
            .list_messages(crew_id, topic.as_deref(), limit)
            .await?;

        let response = MessageListResponse {
            messages: messages.into_iter().map(Into::into).collect(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle POST /api/runcrews/:id/messages - members
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(body): Json<CreateMessageRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?;

        let message = CrewMessage::new(crew_id, athlete.id, body.topic, require_content(&body.content)?);
        resources.database.content().create_message(&message).await?;

        let response: MessageResponse = message.into();
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    async fn load_message(
        resources: &ServerResources,
        headers: &HeaderMap,
        id: &str,
        message_id: &str,
    ) -> Result<(Uuid, CrewMessage), AppError> {
        let athlete = authenticate(headers, resources).await?;
        let crew_id = parse_id(id, "crew")?;
        let message_id = parse_id(message_id, "message")?;

        let (_, memberships) = load_crew(resources, crew_id).await?;
        let access = CrewAccess::resolve(&memberships, athlete.id)?;

        let message = resources
            .database
            .content()
            .get_message(crew_id, message_id)
            .await?
            .ok_or_else(|| AppError::not_found("Message"))?;
        access.require_author_or_staff(message.author_id)?;

        Ok((athlete.id, message))
    }

    /// Handle PUT /api/runcrews/:id/messages/:message_id - author or staff
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, message_id)): Path<(String, String)>,
        Json(body): Json<UpdateMessageRequest>,
    ) -> Result<Response, AppError> {
        let (_, message) = Self::load_message(&resources, &headers, &id, &message_id).await?;
        let content = require_content(&body.content)?;

        let updated = resources
            .database
            .content()
            .update_message(&message, content)
            .await?;
        let response: MessageResponse = updated.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/runcrews/:id/messages/:message_id - author or staff
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, message_id)): Path<(String, String)>,
    ) -> Result<Response, AppError> {
        let (actor_id, message) = Self::load_message(&resources, &headers, &id, &message_id).await?;

        if !resources.database.content().delete_message(message.id).await? {
            return Err(AppError::not_found("Message"));
        }
        if actor_id != message.author_id {
            AppLogger::log_crew_event(
                &id,
                &actor_id.to_string(),
                "message_moderated",
                Some(&message_id),
            );
        }
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
