// ── Core error types ──
//
// User-facing errors from sitewatch-core. Transport failures are mapped
// from `sitewatch_api::Error` so consumers never match on rumqttc types.

use thiserror::Error;

use crate::model::SiteId;
use crate::parse::{DecodeError, TopicError};

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to MQTT broker at {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("MQTT broker connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Site not found: {site_id}")]
    SiteNotFound { site_id: SiteId },

    #[error("Unrecognised topic: {0}")]
    Topic(#[from] TopicError),

    #[error("Rejected payload: {0}")]
    Decode(#[from] DecodeError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sitewatch_api::Error> for CoreError {
    fn from(err: sitewatch_api::Error) -> Self {
        match err {
            sitewatch_api::Error::Connect { host, port, reason } => CoreError::ConnectionFailed {
                endpoint: format!("{host}:{port}"),
                reason,
            },
            sitewatch_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            sitewatch_api::Error::Client(e) => CoreError::ConnectionFailed {
                endpoint: String::new(),
                reason: e.to_string(),
            },
            sitewatch_api::Error::InvalidOption { field, reason } => CoreError::Config {
                message: format!("{field}: {reason}"),
            },
        }
    }
}
