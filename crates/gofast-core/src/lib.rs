// ABOUTME: Core types and constants for the GoFast social fitness API
// ABOUTME: Foundation crate with error handling, domain models, and crew permission rules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

#![deny(unsafe_code)]

//! # GoFast Core
//!
//! Foundation crate shared by the GoFast API server. It holds no I/O: only the
//! types every layer agrees on and the rules that decide who may change a run
//! crew.
//!
//! ## Modules
//!
//! - **errors**: `AppError`, `ErrorCode`, and the JSON error envelope
//! - **models**: athletes, run crews, memberships, runs, RSVPs, crew content, Garmin data
//! - **permissions**: the crew role guard chain (`CrewAccess`)
//! - **constants**: limits and Garmin endpoint defaults

/// Application constants organized by domain
pub mod constants;

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Core data models
pub mod models;

/// Run crew role checks
pub mod permissions;
