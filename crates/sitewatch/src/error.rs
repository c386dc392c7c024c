//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sitewatch_config::ConfigError;
use sitewatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to MQTT broker at {endpoint}")]
    #[diagnostic(
        code(sitewatch::connection_failed),
        help(
            "Check that the broker is running and reachable.\n\
             Reason: {reason}\n\
             Try: sitewatch sites --host <broker> --port 1883"
        )
    )]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Broker did not answer within {seconds}s")]
    #[diagnostic(
        code(sitewatch::timeout),
        help("Raise connect_timeout_secs in your profile or check broker load.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("No password available for user '{username}' in profile '{profile}'")]
    #[diagnostic(
        code(sitewatch::no_credentials),
        help(
            "Store one with: sitewatch config set-password --profile {profile}\n\
             Or set the SITEWATCH_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String, username: String },

    #[error("Keyring access failed: {reason}")]
    #[diagnostic(code(sitewatch::keyring))]
    Keyring { reason: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(sitewatch::not_found),
        help("Run: sitewatch {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Telemetry ────────────────────────────────────────────────────

    #[error("Message rejected: {reason}")]
    #[diagnostic(
        code(sitewatch::rejected),
        help(
            "Topics look like PLCNEXT/<id>_<name>/CH<n>; payloads are JSON objects\n\
             with strCH<n>_TAG, rCH<n>_mA, rCH<n>_PV, iCH<n>_DetStatus and iCH<n>_DetType."
        )
    )]
    Rejected { reason: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sitewatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(sitewatch::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: sitewatch config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(sitewatch::config))]
    Config(Box<figment::Error>),

    #[error("Could not write configuration: {0}")]
    #[diagnostic(code(sitewatch::config_write))]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(sitewatch::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(sitewatch::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    #[diagnostic(code(sitewatch::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } | Self::Keyring { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { endpoint, reason } => {
                CliError::ConnectionFailed { endpoint, reason }
            }
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::SiteNotFound { site_id } => CliError::NotFound {
                resource_type: "site".into(),
                identifier: site_id.to_string(),
                list_command: "sites".into(),
            },
            CoreError::Topic(e) => CliError::Rejected {
                reason: e.to_string(),
            },
            CoreError::Decode(e) => CliError::Rejected {
                reason: e.to_string(),
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile, username } => {
                CliError::NoCredentials { profile, username }
            }
            ConfigError::UnknownProfile(name) => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Keyring(e) => CliError::Keyring {
                reason: e.to_string(),
            },
            ConfigError::Serialization(e) => CliError::ConfigWrite(e),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
