//! Token authentication at the transport boundary.
//!
//! Websocket clients present a user token as `?token=` (browsers cannot set
//! headers on an upgrade) or as `Authorization: Bearer`. The ingest endpoint
//! takes the service token as a bearer header only. Either way the token is
//! resolved once, before any realtime operation runs.

use std::collections::HashMap;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use pulse_core::{Principal, UserId};
use pulse_settings::AuthSettings;

/// Outcome of checking an ingest request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestAuth {
    /// Token matched.
    Allowed,
    /// Token missing or wrong.
    Denied,
    /// No ingest token is configured; ingest is off.
    Disabled,
}

/// Resolves bearer tokens to principals.
#[derive(Clone, Debug, Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, UserId>,
    ingest_token: Option<String>,
}

impl TokenAuthenticator {
    /// Build from the `auth` settings section.
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            tokens: settings
                .tokens
                .iter()
                .map(|(token, user)| (token.clone(), UserId(*user)))
                .collect(),
            ingest_token: settings.ingest_token.clone().filter(|t| !t.is_empty()),
        }
    }

    /// Principal for a user token.
    pub fn resolve(&self, token: &str) -> Option<Principal> {
        self.tokens
            .iter()
            .find(|(known, _)| constant_time_eq(known.as_bytes(), token.as_bytes()))
            .map(|(_, user)| Principal::new(*user))
    }

    /// Check an ingest request's bearer token.
    pub fn check_ingest(&self, provided: Option<&str>) -> IngestAuth {
        let Some(expected) = &self.ingest_token else {
            return IngestAuth::Disabled;
        };
        match provided {
            Some(token) if constant_time_eq(expected.as_bytes(), token.as_bytes()) => {
                IngestAuth::Allowed
            }
            _ => IngestAuth::Denied,
        }
    }
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Byte comparison whose running time depends only on `expected`.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for (i, byte) in expected.iter().enumerate() {
        diff |= byte ^ provided.get(i).copied().unwrap_or(0xff);
    }
    diff == 0
}
