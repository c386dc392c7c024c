//! Shared configuration for sitewatch.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext) and
//! translation to `sitewatch_core::MonitorConfig`. The CLI layers its
//! flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sitewatch_core::{BrokerConfig, LivenessConfig, MonitorConfig};

/// Keyring service name; entries are keyed `<profile>/password`.
pub const KEYRING_SERVICE: &str = "sitewatch";

/// Environment fallback for the broker password.
pub const PASSWORD_ENV: &str = "SITEWATCH_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password found for user '{username}' in profile '{profile}'")]
    NoCredentials { profile: String, username: String },

    #[error("profile '{0}' not found")]
    UnknownProfile(String),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named broker profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Profile name to use: explicit choice, then `default_profile`, then
    /// `"default"`.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_liveness_threshold")]
    pub liveness_threshold_secs: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            reconnect_interval_secs: default_reconnect_interval(),
            sweep_interval_secs: default_sweep_interval(),
            liveness_threshold_secs: default_liveness_threshold(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_keep_alive() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_reconnect_interval() -> u64 {
    5
}
fn default_sweep_interval() -> u64 {
    15
}
fn default_liveness_threshold() -> u64 {
    90
}
fn default_queue_capacity() -> usize {
    sitewatch_core::config::DEFAULT_QUEUE_CAPACITY
}

/// A named broker profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: Option<String>,

    /// Plaintext password (prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    pub client_id_prefix: Option<String>,

    /// Filters subscribed in addition to the autodiscovery set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,

    // Per-profile timing overrides.
    pub keep_alive_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub reconnect_interval_secs: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            password_env: None,
            client_id_prefix: None,
            topics: Vec::new(),
            keep_alive_secs: None,
            connect_timeout_secs: None,
            reconnect_interval_secs: None,
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    1883
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "sitewatch", "sitewatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sitewatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from a specific file, merged over defaults and under
/// `SITEWATCH_*` environment overrides (`__` separates nesting, e.g.
/// `SITEWATCH_DEFAULTS__QUEUE_CAPACITY`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SITEWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

/// Store a broker password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

/// Resolve the broker password for a profile.
///
/// Anonymous profiles (no username) resolve to `None`. Otherwise the
/// chain is: `password_env` variable, `SITEWATCH_PASSWORD`, system
/// keyring, plaintext in the profile.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |profile_name| {
            keyring_entry(profile_name)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

/// [`resolve_password`] with injectable env and keyring lookups.
pub fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<Option<SecretString>, ConfigError> {
    let Some(ref username) = profile.username else {
        return Ok(None);
    };

    let found = profile
        .password_env
        .as_deref()
        .and_then(&env)
        .or_else(|| env(PASSWORD_ENV))
        .or_else(|| keyring(profile_name))
        .or_else(|| profile.password.clone());

    match found {
        Some(pw) => Ok(Some(SecretString::from(pw))),
        None => Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
            username: username.clone(),
        }),
    }
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `MonitorConfig` from a profile plus global defaults.
pub fn profile_to_monitor_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<MonitorConfig, ConfigError> {
    let password = resolve_password(profile, profile_name)?;
    build_monitor_config(profile, defaults, password)
}

/// Validate and assemble the runtime config from already-resolved parts.
pub fn build_monitor_config(
    profile: &Profile,
    defaults: &Defaults,
    password: Option<SecretString>,
) -> Result<MonitorConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }
    if defaults.queue_capacity == 0 {
        return Err(ConfigError::Validation {
            field: "queue_capacity".into(),
            reason: "must be at least 1".into(),
        });
    }
    if defaults.sweep_interval_secs == 0 || defaults.liveness_threshold_secs == 0 {
        return Err(ConfigError::Validation {
            field: "liveness".into(),
            reason: "sweep interval and threshold must be greater than zero".into(),
        });
    }

    let secs = |over: Option<u64>, fallback: u64| Duration::from_secs(over.unwrap_or(fallback));
    let broker = BrokerConfig {
        host: profile.host.trim().to_owned(),
        port: profile.port,
        username: profile.username.clone(),
        password,
        client_id_prefix: profile
            .client_id_prefix
            .clone()
            .unwrap_or_else(|| BrokerConfig::default().client_id_prefix),
        keep_alive: secs(profile.keep_alive_secs, defaults.keep_alive_secs),
        connect_timeout: secs(profile.connect_timeout_secs, defaults.connect_timeout_secs),
        reconnect_interval: secs(
            profile.reconnect_interval_secs,
            defaults.reconnect_interval_secs,
        ),
        extra_topics: profile.topics.clone(),
    };

    Ok(MonitorConfig {
        broker,
        liveness: LivenessConfig {
            sweep_interval: Duration::from_secs(defaults.sweep_interval_secs),
            threshold: Duration::from_secs(defaults.liveness_threshold_secs),
        },
        queue_capacity: defaults.queue_capacity,
        directory: sitewatch_core::SiteDirectory::default(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn profile_with_user() -> Profile {
        Profile {
            username: Some("scada".into()),
            password: Some("plain".into()),
            password_env: Some("PLANT_MQTT_PW".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "plant"

[defaults]
reconnect_interval_secs = 3
queue_capacity = 64

[profiles.plant]
host = "broker.plant.local"
port = 8883
username = "scada"
topics = ["alarms/#"]
keep_alive_secs = 60
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.profile_name(None), "plant");
        assert_eq!(config.defaults.reconnect_interval_secs, 3);
        assert_eq!(config.defaults.liveness_threshold_secs, 90);

        let plant = config.profile("plant").unwrap();
        assert_eq!(plant.host, "broker.plant.local");
        assert_eq!(plant.port, 8883);
        assert_eq!(plant.topics, ["alarms/#"]);

        let monitor = build_monitor_config(plant, &config.defaults, None).unwrap();
        assert_eq!(monitor.broker.endpoint(), "broker.plant.local:8883");
        assert_eq!(monitor.broker.keep_alive, Duration::from_secs(60));
        assert_eq!(monitor.broker.reconnect_interval, Duration::from_secs(3));
        assert_eq!(monitor.broker.extra_topics, ["alarms/#"]);
        assert_eq!(monitor.queue_capacity, 64);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.defaults, Defaults::default());
        assert_eq!(config.profile_name(Some("other")), "other");
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                host: "10.0.0.5".into(),
                ..Profile::default()
            },
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile("default").unwrap().host, "10.0.0.5");
    }

    #[test]
    fn anonymous_profile_needs_no_password() {
        let resolved =
            resolve_password_with(&Profile::default(), "default", no_env, |_| None).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn password_env_wins() {
        let env = |name: &str| match name {
            "PLANT_MQTT_PW" => Some("from-profile-env".to_string()),
            PASSWORD_ENV => Some("from-global-env".to_string()),
            _ => None,
        };
        let pw = resolve_password_with(&profile_with_user(), "plant", env, |_| {
            Some("from-keyring".into())
        })
        .unwrap()
        .unwrap();
        assert_eq!(pw.expose_secret(), "from-profile-env");
    }

    #[test]
    fn global_env_then_keyring_then_plaintext() {
        let profile = profile_with_user();

        let global = |name: &str| (name == PASSWORD_ENV).then(|| "global".to_string());
        let pw = resolve_password_with(&profile, "plant", global, |_| Some("ring".into()))
            .unwrap()
            .unwrap();
        assert_eq!(pw.expose_secret(), "global");

        let pw = resolve_password_with(&profile, "plant", no_env, |name| {
            (name == "plant").then(|| "ring".to_string())
        })
        .unwrap()
        .unwrap();
        assert_eq!(pw.expose_secret(), "ring");

        let pw = resolve_password_with(&profile, "plant", no_env, |_| None)
            .unwrap()
            .unwrap();
        assert_eq!(pw.expose_secret(), "plain");
    }

    #[test]
    fn username_without_any_password_is_an_error() {
        let profile = Profile {
            username: Some("scada".into()),
            ..Profile::default()
        };
        let err = resolve_password_with(&profile, "plant", no_env, |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn invalid_profiles_are_rejected() {
        let defaults = Defaults::default();
        let blank = Profile {
            host: "  ".into(),
            ..Profile::default()
        };
        assert!(matches!(
            build_monitor_config(&blank, &defaults, None),
            Err(ConfigError::Validation { ref field, .. }) if field == "host"
        ));

        let zero_queue = Defaults {
            queue_capacity: 0,
            ..Defaults::default()
        };
        assert!(build_monitor_config(&Profile::default(), &zero_queue, None).is_err());
    }
}
