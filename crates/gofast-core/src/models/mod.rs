// ABOUTME: Core data models for the GoFast social fitness API
// ABOUTME: Re-exports athlete, crew, run, content, and Garmin types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! # Data Models
//!
//! Plain data structures shared by the database layer, the permission rules,
//! and the HTTP routes. Enums that are persisted as text expose `as_str()` and
//! `FromStr` so the database layer never hand-writes their spelling.

mod athlete;
mod content;
mod crew;
mod garmin;
mod run;

pub use athlete::{normalize_handle, split_display_name, Athlete};
pub use content::{Announcement, CrewMessage};
pub use crew::{generate_join_code, normalize_join_code, CrewMembership, CrewRole, RunCrew};
pub use garmin::{GarminActivity, GarminConnection};
pub use run::{normalize_city, RsvpStatus, RsvpTally, Run, RunRsvp, RunScope};
