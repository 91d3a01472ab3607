// ABOUTME: Athlete profile model keyed by the external auth provider id
// ABOUTME: Athlete identity plus handle validation rules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::limits::{MAX_HANDLE_LENGTH, MIN_HANDLE_LENGTH};
use crate::errors::{AppError, AppResult};

/// A GoFast user identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Athlete {
    /// Unique identifier
    pub id: Uuid,
    /// Subject id issued by the identity provider
    pub firebase_id: String,
    /// Email from the identity provider
    pub email: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Public handle, unique across athletes
    pub gofast_handle: Option<String>,
    /// Home city
    pub city: Option<String>,
    /// Home state or region
    pub state: Option<String>,
    /// Short bio
    pub bio: Option<String>,
    /// Avatar URL
    pub photo_url: Option<String>,
    /// When the athlete was created
    pub created_at: DateTime<Utc>,
    /// When the athlete was last updated
    pub updated_at: DateTime<Utc>,
}

impl Athlete {
    /// Create a new athlete from identity-provider claims
    #[must_use]
    pub fn new(firebase_id: String, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            firebase_id,
            email,
            first_name: None,
            last_name: None,
            gofast_handle: None,
            city: None,
            state: None,
            bio: None,
            photo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name to show in crew listings
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self
                .gofast_handle
                .clone()
                .or_else(|| self.email.clone())
                .unwrap_or_else(|| "Athlete".to_owned()),
        }
    }
}

/// Split a provider display name into first and last name
#[must_use]
pub fn split_display_name(name: &str) -> (Option<String>, Option<String>) {
    let mut parts = name.split_whitespace();
    let first = parts.next().map(str::to_owned);
    let rest: Vec<&str> = parts.collect();
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    (first, last)
}

/// Validate and normalize a handle: lowercase ascii letters, digits, `_` and `-`
///
/// # Errors
///
/// Returns an error if the handle is too short, too long, or contains other characters
pub fn normalize_handle(handle: &str) -> AppResult<String> {
    let handle = handle.trim().trim_start_matches('@').to_lowercase();
    if handle.len() < MIN_HANDLE_LENGTH || handle.len() > MAX_HANDLE_LENGTH {
        return Err(AppError::invalid_input(format!(
            "Handle must be between {MIN_HANDLE_LENGTH} and {MAX_HANDLE_LENGTH} characters"
        )));
    }
    if !handle
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(AppError::invalid_input(
            "Handle may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_display_name() {
        assert_eq!(
            split_display_name("Ada Mary Lovelace"),
            (Some("Ada".to_owned()), Some("Mary Lovelace".to_owned()))
        );
        assert_eq!(split_display_name("Prefontaine"), (Some("Prefontaine".to_owned()), None));
        assert_eq!(split_display_name("  "), (None, None));
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("@Fast_Runner").unwrap(), "fast_runner");
        assert!(normalize_handle("ab").is_err());
        assert!(normalize_handle("has space").is_err());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut athlete = Athlete::new("uid".to_owned(), Some("a@b.c".to_owned()));
        assert_eq!(athlete.display_name(), "a@b.c");
        athlete.gofast_handle = Some("speedy".to_owned());
        assert_eq!(athlete.display_name(), "speedy");
        athlete.first_name = Some("Joan".to_owned());
        assert_eq!(athlete.display_name(), "Joan");
    }
}
