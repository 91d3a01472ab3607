// ABOUTME: Cookie helpers for the short-lived Garmin PKCE verifier
// ABOUTME: Builds HttpOnly SameSite=Lax Set-Cookie values and reads cookies from request headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use axum::http::{header, HeaderMap, HeaderValue};
use gofast_core::constants::garmin;
use gofast_core::errors::{AppError, AppResult};

/// Path the PKCE cookie is scoped to
const PKCE_COOKIE_PATH: &str = "/api/garmin";

/// Name of the PKCE cookie for an OAuth `state` (the athlete id)
#[must_use]
pub fn pkce_cookie_name(state: &str) -> String {
    format!("{}{state}", garmin::PKCE_COOKIE_PREFIX)
}

/// `Set-Cookie` value storing the PKCE verifier for ten minutes
///
/// # Errors
///
/// Returns an error if the name or verifier contains characters invalid in a header
pub fn pkce_cookie(state: &str, code_verifier: &str, secure: bool) -> AppResult<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    header_value(&format!(
        "{}={code_verifier}; HttpOnly{secure}; Path={PKCE_COOKIE_PATH}; SameSite=Lax; Max-Age={}",
        pkce_cookie_name(state),
        garmin::PKCE_COOKIE_MAX_AGE_SECS
    ))
}

/// `Set-Cookie` value expiring the PKCE cookie
///
/// # Errors
///
/// Returns an error if the name contains characters invalid in a header
pub fn clear_pkce_cookie(state: &str, secure: bool) -> AppResult<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    header_value(&format!(
        "{}=; HttpOnly{secure}; Path={PKCE_COOKIE_PATH}; SameSite=Lax; Max-Age=0",
        pkce_cookie_name(state)
    ))
}

/// Read a cookie from the request's `Cookie` headers
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
        .filter(|value| !value.is_empty())
}

fn header_value(cookie: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(cookie)
        .map_err(|e| AppError::invalid_input(format!("Invalid cookie value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_cookie_attributes() {
        let value = pkce_cookie("athlete-1", "verifier", false).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("garmin_pkce_athlete-1=verifier;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=600"));
        assert!(!value.contains("Secure"));

        let secure = pkce_cookie("athlete-1", "verifier", true).unwrap();
        assert!(secure.to_str().unwrap().contains("; Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let value = clear_pkce_cookie("athlete-1", false).unwrap();
        assert!(value.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn test_get_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; garmin_pkce_a1=abc123; other=x"),
        );
        assert_eq!(
            get_cookie_value(&headers, "garmin_pkce_a1").as_deref(),
            Some("abc123")
        );
        assert_eq!(get_cookie_value(&headers, "garmin_pkce_a2"), None);
        assert_eq!(get_cookie_value(&HeaderMap::new(), "theme"), None);
    }
}
