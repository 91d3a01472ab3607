// ABOUTME: HTTP middleware layers applied to the whole router
// ABOUTME: CORS configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

/// CORS layer
pub mod cors;

pub use cors::setup_cors;
