// ABOUTME: Garmin Connect integration: OAuth 2.0 PKCE, lazy token refresh, and webhook processing
// ABOUTME: Routes in routes::garmin call into these modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

/// OAuth client and Wellness API calls
pub mod oauth;
/// Token refresh before outbound calls
pub mod tokens;
/// Push webhook dispatch
pub mod webhook;

pub use oauth::{code_challenge_for, GarminOAuthClient, GarminToken, PkceParams};
pub use tokens::{apply_token, ensure_fresh_connection};
pub use webhook::{GarminEvent, WebhookDispatcher, WebhookOutcome};
