// ABOUTME: HTTP security helpers shared by route handlers
// ABOUTME: Cookie construction and parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

/// Cookie helpers
pub mod cookies;
