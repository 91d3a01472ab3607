// ABOUTME: Configuration module organizing environment-driven server settings
// ABOUTME: Re-exports server, database, Firebase, and Garmin configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

/// Database location parsing
pub mod database;
/// Top-level server configuration loaded from the environment
pub mod environment;
/// Firebase and Garmin OAuth settings
pub mod oauth;

pub use database::DatabaseUrl;
pub use environment::{CorsConfig, Environment, ServerConfig};
pub use oauth::{FirebaseConfig, GarminConfig};
