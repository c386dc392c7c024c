//! CLI configuration: thin layer over `sitewatch_config`.
//!
//! Resolves the active profile and applies `GlobalOpts` flag overrides
//! (--host, --port, --username, --password) before building the runtime
//! `MonitorConfig`.

use secrecy::SecretString;

use sitewatch_core::MonitorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use sitewatch_config::{Config, Profile, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// Comma-separated, sorted profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// Profile with flag overrides applied.
///
/// An explicitly requested profile must exist; otherwise a missing
/// profile falls back to defaults so `--host` alone is enough.
pub fn effective_profile(
    global: &GlobalOpts,
    config: &Config,
    profile_name: &str,
) -> Result<Profile, CliError> {
    let mut profile = match config.profile(profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name.to_owned(),
                available: available_profiles(config),
            });
        }
        None => Profile::default(),
    };

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if global.username.is_some() {
        profile.username.clone_from(&global.username);
    }
    Ok(profile)
}

/// Build the runtime config from file, profile, and flags.
pub fn resolve_monitor_config(global: &GlobalOpts) -> Result<MonitorConfig, CliError> {
    let config = load_config()?;
    let profile_name = active_profile_name(global, &config);
    let profile = effective_profile(global, &config, &profile_name)?;

    // --password beats every stored source
    let password = match global.password {
        Some(ref pw) if profile.username.is_some() => Some(SecretString::from(pw.clone())),
        _ => sitewatch_config::resolve_password(&profile, &profile_name)?,
    };

    tracing::debug!(
        profile = %profile_name,
        host = %profile.host,
        port = profile.port,
        "resolved broker profile"
    );
    Ok(sitewatch_config::build_monitor_config(
        &profile,
        &config.defaults,
        password,
    )?)
}
