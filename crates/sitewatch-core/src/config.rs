// ── Runtime monitor configuration ──
//
// Describes which broker to watch and how aggressively to age out silent
// channels. Built by the CLI (or any embedder) and handed to `Monitor`;
// core never reads config files.

use std::time::Duration;

use secrecy::SecretString;
use sitewatch_api::BrokerOptions;

use crate::model::SiteDirectory;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Broker endpoint, credentials and session timings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub client_id_prefix: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub reconnect_interval: Duration,
    /// Extra filters subscribed alongside the autodiscovery set.
    pub extra_topics: Vec<String>,
}

impl BrokerConfig {
    /// Transport options. A password without a username is ignored.
    pub fn to_options(&self) -> BrokerOptions {
        let mut options = BrokerOptions::new(self.host.clone(), self.port);
        options.client_id_prefix.clone_from(&self.client_id_prefix);
        options.keep_alive = self.keep_alive;
        options.connect_timeout = self.connect_timeout;
        options.reconnect_interval = self.reconnect_interval;
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => options.with_credentials(username, password.clone()),
            (Some(username), None) => {
                options.with_credentials(username, SecretString::from(String::new()))
            }
            _ => options,
        }
    }

    /// `host:port` for display.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let defaults = BrokerOptions::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            username: None,
            password: None,
            client_id_prefix: defaults.client_id_prefix,
            keep_alive: defaults.keep_alive,
            connect_timeout: defaults.connect_timeout,
            reconnect_interval: defaults.reconnect_interval,
            extra_topics: Vec::new(),
        }
    }
}

/// Stale-channel detection timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessConfig {
    pub sweep_interval: Duration,
    /// A channel silent for longer than this is disabled.
    pub threshold: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(15),
            threshold: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub broker: BrokerConfig,
    pub liveness: LivenessConfig,
    /// Inbound messages buffered between transport and processing.
    pub queue_capacity: usize,
    pub directory: SiteDirectory,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            liveness: LivenessConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            directory: SiteDirectory::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_match_field_deployment() {
        let config = MonitorConfig::default();
        assert_eq!(config.broker.endpoint(), "localhost:1883");
        assert_eq!(config.broker.reconnect_interval, Duration::from_secs(5));
        assert_eq!(config.liveness.sweep_interval, Duration::from_secs(15));
        assert_eq!(config.liveness.threshold, Duration::from_secs(90));
        assert_eq!(config.queue_capacity, 1024);
    }

    #[test]
    fn options_carry_credentials() {
        let config = BrokerConfig {
            host: "broker.plant".into(),
            port: 8883,
            username: Some("scada".into()),
            password: Some(SecretString::from("hunter2".to_string())),
            ..BrokerConfig::default()
        };
        let options = config.to_options();
        assert_eq!(options.endpoint(), "broker.plant:8883");
        let creds = options.credentials.unwrap();
        assert_eq!(creds.username, "scada");
        assert_eq!(creds.password.expose_secret(), "hunter2");
    }

    #[test]
    fn password_without_username_is_ignored() {
        let config = BrokerConfig {
            password: Some(SecretString::from("orphan".to_string())),
            ..BrokerConfig::default()
        };
        assert!(config.to_options().credentials.is_none());
    }
}
