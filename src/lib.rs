// ABOUTME: Main library entry point for the GoFast API
// ABOUTME: Athletes, run crews, group runs, and Garmin Connect sync over a JSON HTTP API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

#![deny(unsafe_code)]

//! # GoFast API
//!
//! Backend for a social running app. Athletes sign in with Firebase, form run
//! crews with member, manager, and admin roles, post announcements and chat,
//! schedule crew runs and public city runs with RSVPs, and sync activities
//! from Garmin Connect.
//!
//! ## Architecture
//!
//! - **Routes**: one axum router per resource, merged in [`server`]
//! - **Database**: `SQLite` through sqlx, one manager per domain
//! - **Auth**: Firebase ID tokens verified behind the [`auth::TokenVerifier`] trait
//! - **Garmin**: OAuth 2.0 PKCE, lazy token refresh, and the push webhook
//!
//! Domain models, permissions, and errors live in the `gofast-core` crate.

/// Bearer token verification and caller resolution
pub mod auth;

/// Environment-driven configuration
pub mod config;

/// `SQLite` persistence
pub mod database;

/// Garmin Connect OAuth client and webhook processing
pub mod garmin;

/// Structured logging setup and domain event logging
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Shared server state
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// Cookie helpers for the OAuth flow
pub mod security;

/// Router assembly and the serve loop
pub mod server;
