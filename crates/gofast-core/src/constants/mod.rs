// ABOUTME: Application constants organized by domain
// ABOUTME: Crew, limits, Garmin endpoint, and service-name constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

/// Service identity
pub mod service_names {
    /// Service name reported in logs and health checks
    pub const GOFAST_API: &str = "gofast-api";
}

/// Run crew constants
pub mod crews {
    /// Length of generated join codes
    pub const JOIN_CODE_LENGTH: usize = 6;

    /// Join code alphabet (no 0/O or 1/I)
    pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Topic used when a message does not name one
    pub const DEFAULT_MESSAGE_TOPIC: &str = "general";
}

/// Input and paging limits
pub mod limits {
    /// Minimum athlete or crew handle length
    pub const MIN_HANDLE_LENGTH: usize = 3;

    /// Maximum athlete or crew handle length
    pub const MAX_HANDLE_LENGTH: usize = 32;

    /// Maximum crew name length
    pub const MAX_CREW_NAME_LENGTH: usize = 80;

    /// Maximum announcement or run title length
    pub const MAX_TITLE_LENGTH: usize = 120;

    /// Maximum message or announcement body length
    pub const MAX_CONTENT_LENGTH: usize = 4000;

    /// Default page size for listings
    pub const DEFAULT_PAGE_SIZE: i64 = 20;

    /// Maximum page size for listings
    pub const MAX_PAGE_SIZE: i64 = 100;

    /// Maximum messages returned in one listing
    pub const MAX_MESSAGES_PAGE_SIZE: i64 = 200;
}

/// Garmin Connect integration constants
pub mod garmin {
    /// OAuth 2.0 authorization endpoint
    pub const AUTH_URL: &str = "https://connect.garmin.com/oauth2Confirm";

    /// OAuth 2.0 token endpoint
    pub const TOKEN_URL: &str = "https://diauth.garmin.com/di-oauth2-service/oauth/token";

    /// Wellness API base URL
    pub const API_BASE_URL: &str = "https://apis.garmin.com";

    /// Path returning the connected user's Garmin id
    pub const USER_ID_PATH: &str = "/wellness-api/rest/user/id";

    /// Path requesting an activity backfill
    pub const BACKFILL_ACTIVITIES_PATH: &str = "/wellness-api/rest/backfill/activities";

    /// Cookie name prefix for the PKCE verifier; the athlete id is appended
    pub const PKCE_COOKIE_PREFIX: &str = "garmin_pkce_";

    /// Lifetime of the PKCE verifier cookie
    pub const PKCE_COOKIE_MAX_AGE_SECS: i64 = 600;

    /// Length of the generated PKCE code verifier (RFC 7636 allows 43-128)
    pub const CODE_VERIFIER_LENGTH: usize = 64;

    /// Refresh access tokens this close to expiry
    pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 600;

    /// Fallback token lifetime when Garmin omits `expires_in`
    pub const DEFAULT_TOKEN_EXPIRY_SECS: i64 = 86_400;

    /// Maximum days of history a single backfill may request
    pub const MAX_BACKFILL_DAYS: i64 = 30;

    /// Request body limit for webhook pushes; activity details carry per-second samples
    pub const WEBHOOK_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
}
