// ABOUTME: Scheduled run models for crew events and public city runs
// ABOUTME: Run, RunScope, RunRsvp, RsvpStatus, and RSVP tallies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Where a run belongs: a crew's calendar or a public city listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunScope {
    /// Event scheduled inside a run crew
    Crew {
        /// Owning crew
        run_crew_id: Uuid,
    },
    /// Public run listed for a city
    City {
        /// Normalized (lowercase) city name
        city: String,
    },
}

/// A scheduled group run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    /// Unique identifier
    pub id: Uuid,
    /// Crew or city this run belongs to
    pub scope: RunScope,
    /// Title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
    /// Meeting point name
    pub meet_up_point: Option<String>,
    /// Meeting point address
    pub meet_up_address: Option<String>,
    /// Planned distance in kilometres
    pub distance_km: Option<f64>,
    /// Target pace, free-form ("8:30/mi")
    pub pace: Option<String>,
    /// Athlete who scheduled the run
    pub created_by: Uuid,
    /// When the run was created
    pub created_at: DateTime<Utc>,
    /// When the run was last updated
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Crew id when this is a crew event
    #[must_use]
    pub const fn run_crew_id(&self) -> Option<Uuid> {
        match &self.scope {
            RunScope::Crew { run_crew_id } => Some(*run_crew_id),
            RunScope::City { .. } => None,
        }
    }

    /// City when this is a public city run
    #[must_use]
    pub fn city(&self) -> Option<&str> {
        match &self.scope {
            RunScope::City { city } => Some(city),
            RunScope::Crew { .. } => None,
        }
    }
}

/// Normalize a city name for storage and lookup
#[must_use]
pub fn normalize_city(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// RSVP answer for a run
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    /// Athlete will attend
    Going,
    /// Athlete might attend
    Maybe,
    /// Athlete will not attend
    NotGoing,
}

impl RsvpStatus {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Going => "going",
            Self::Maybe => "maybe",
            Self::NotGoing => "not_going",
        }
    }
}

impl Display for RsvpStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for RsvpStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "going" => Ok(Self::Going),
            "maybe" => Ok(Self::Maybe),
            "not_going" => Ok(Self::NotGoing),
            _ => Err(AppError::invalid_input(format!("Invalid RSVP status: {s}"))),
        }
    }
}

/// An athlete's RSVP to a run, unique per (run, athlete)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRsvp {
    /// Run being answered
    pub run_id: Uuid,
    /// Answering athlete
    pub athlete_id: Uuid,
    /// Answer
    pub status: RsvpStatus,
    /// When the answer was last changed
    pub updated_at: DateTime<Utc>,
}

/// Count of RSVPs per status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RsvpTally {
    /// Athletes going
    pub going: u32,
    /// Athletes who might go
    pub maybe: u32,
    /// Athletes not going
    pub not_going: u32,
}

impl RsvpTally {
    /// Build a tally from a list of RSVPs
    #[must_use]
    pub fn from_rsvps(rsvps: &[RunRsvp]) -> Self {
        rsvps.iter().fold(Self::default(), |mut tally, rsvp| {
            match rsvp.status {
                RsvpStatus::Going => tally.going += 1,
                RsvpStatus::Maybe => tally.maybe += 1,
                RsvpStatus::NotGoing => tally.not_going += 1,
            }
            tally
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsvp_status_accepts_hyphenated_form() {
        assert_eq!("not-going".parse::<RsvpStatus>().unwrap(), RsvpStatus::NotGoing);
        assert_eq!("Going".parse::<RsvpStatus>().unwrap(), RsvpStatus::Going);
        assert!("yes".parse::<RsvpStatus>().is_err());
    }

    #[test]
    fn test_tally() {
        let run_id = Uuid::new_v4();
        let rsvp = |status| RunRsvp {
            run_id,
            athlete_id: Uuid::new_v4(),
            status,
            updated_at: Utc::now(),
        };
        let tally = RsvpTally::from_rsvps(&[
            rsvp(RsvpStatus::Going),
            rsvp(RsvpStatus::Going),
            rsvp(RsvpStatus::NotGoing),
        ]);
        assert_eq!(tally.going, 2);
        assert_eq!(tally.maybe, 0);
        assert_eq!(tally.not_going, 1);
    }

    #[test]
    fn test_normalize_city() {
        assert_eq!(normalize_city("  New   York "), "new york");
    }
}
