use thiserror::Error;

/// Top-level error type for the `sitewatch-api` crate.
///
/// Covers broker connection setup, acknowledgement timeouts and client
/// request failures. `sitewatch-core` maps these into user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The transport could not reach the broker or the session dropped
    /// before the broker acknowledged it.
    #[error("Cannot connect to MQTT broker at {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// The broker did not send CONNACK within the configured window.
    #[error("MQTT broker did not acknowledge the connection within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Client ──────────────────────────────────────────────────────
    /// A request could not be queued on the MQTT client.
    #[error("MQTT client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    // ── Options ─────────────────────────────────────────────────────
    #[error("Invalid broker option {field}: {reason}")]
    InvalidOption { field: &'static str, reason: String },
}

impl Error {
    /// Returns `true` if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }
}
