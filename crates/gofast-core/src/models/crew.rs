// ABOUTME: Run crew and membership models with the crew role hierarchy
// ABOUTME: RunCrew, CrewMembership, CrewRole, and join code generation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::crews::{JOIN_CODE_ALPHABET, JOIN_CODE_LENGTH};
use crate::errors::AppError;

/// Role held by an athlete inside a run crew
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrewRole {
    /// Regular crew member
    #[default]
    Member,
    /// Can post announcements, schedule runs, and moderate content
    Manager,
    /// Full control over the crew and its membership
    Admin,
}

impl CrewRole {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    /// Whether this role may moderate crew content
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self, Self::Manager | Self::Admin)
    }
}

impl Display for CrewRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrewRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "member" => Ok(Self::Member),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::invalid_input(format!("Invalid crew role: {s}"))),
        }
    }
}

/// A user-created social group of runners
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunCrew {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Short invite code shared with prospective members
    pub join_code: String,
    /// Optional unique public handle (slug)
    pub handle: Option<String>,
    /// Home city
    pub city: Option<String>,
    /// Logo image URL
    pub logo_url: Option<String>,
    /// When the crew was created
    pub created_at: DateTime<Utc>,
    /// When the crew was last updated
    pub updated_at: DateTime<Utc>,
}

impl RunCrew {
    /// Create a new crew with a freshly generated join code
    #[must_use]
    pub fn new(name: String, description: Option<String>, city: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            join_code: generate_join_code(),
            handle: None,
            city,
            logo_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Generate a random, uppercase join code without ambiguous characters
#[must_use]
pub fn generate_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LENGTH)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize a user-entered join code for lookup
#[must_use]
pub fn normalize_join_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Join record associating an athlete with a run crew
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrewMembership {
    /// Unique identifier
    pub id: Uuid,
    /// Crew this membership belongs to
    pub run_crew_id: Uuid,
    /// Member athlete
    pub athlete_id: Uuid,
    /// Role inside the crew
    pub role: CrewRole,
    /// When the athlete joined
    pub joined_at: DateTime<Utc>,
}

impl CrewMembership {
    /// Create a new membership
    #[must_use]
    pub fn new(run_crew_id: Uuid, athlete_id: Uuid, role: CrewRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_crew_id,
            athlete_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_and_case() {
        assert_eq!("ADMIN".parse::<CrewRole>().unwrap(), CrewRole::Admin);
        assert_eq!(" manager ".parse::<CrewRole>().unwrap(), CrewRole::Manager);
        assert!("owner".parse::<CrewRole>().is_err());
    }

    #[test]
    fn test_join_code_shape() {
        let code = generate_join_code();
        assert_eq!(code.len(), JOIN_CODE_LENGTH);
        assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
        assert_eq!(normalize_join_code(" ab12cd "), "AB12CD");
    }
}
