// ── Broker options ──
//
// Everything needed to open one MQTT session. A fresh client id is
// minted for every attempt so a half-dead session on the broker never
// collides with the next one.

use std::time::Duration;

use rumqttc::MqttOptions;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::error::Error;

/// Topic filters covering every shape field controllers publish on:
/// `PLCNEXT/<site>/<channel>`, bare `<site>/<channel>`, site-level
/// `<site>` and the leading-slash `/<site>/<channel>` variant.
///
/// Overlap is intentional. A duplicate delivery is harmless because
/// applying the same reading twice leaves the registry unchanged.
pub const SUBSCRIPTION_PATTERNS: &[&str] = &["PLCNEXT/#", "+", "+/+", "+/+/+"];

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_CLIENT_PREFIX: &str = "sitewatch";

/// Username/password pair presented in the CONNECT packet.
#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub username: String,
    pub password: SecretString,
}

/// Connection parameters for a broker.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    pub host: String,
    pub port: u16,
    pub credentials: Option<BrokerCredentials>,
    /// Prefix for generated client ids (`<prefix>_<uuid>`).
    pub client_id_prefix: String,
    pub keep_alive: Duration,
    /// Bounded wait for CONNACK on every attempt.
    pub connect_timeout: Duration,
    /// Fixed delay between reconnection attempts.
    pub reconnect_interval: Duration,
}

impl BrokerOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Some(BrokerCredentials {
            username: username.into(),
            password,
        });
        self
    }

    /// Reject options rumqttc would refuse or panic on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidOption {
                field: "host",
                reason: "must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(Error::InvalidOption {
                field: "port",
                reason: "must be between 1 and 65535".into(),
            });
        }
        if !self.keep_alive.is_zero() && self.keep_alive < Duration::from_secs(1) {
            return Err(Error::InvalidOption {
                field: "keep_alive",
                reason: "must be zero or at least one second".into(),
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::InvalidOption {
                field: "connect_timeout",
                reason: "must be greater than zero".into(),
            });
        }
        if self.reconnect_interval.is_zero() {
            return Err(Error::InvalidOption {
                field: "reconnect_interval",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Mint a unique client id for one connection attempt.
    pub fn client_id(&self) -> String {
        format!("{}_{}", self.client_id_prefix, Uuid::new_v4().simple())
    }

    /// `host:port` for log lines and error messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn to_mqtt_options(&self, client_id: &str) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, self.host.trim(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(ref creds) = self.credentials {
            options.set_credentials(creds.username.clone(), creds.password.expose_secret());
        }
        options
    }
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            credentials: None,
            client_id_prefix: DEFAULT_CLIENT_PREFIX.into(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = BrokerOptions::default();
        assert_eq!(opts.port, 1883);
        assert_eq!(opts.reconnect_interval, Duration::from_secs(5));
        assert!(opts.credentials.is_none());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn client_ids_are_unique_per_attempt() {
        let opts = BrokerOptions::new("broker.local", 1883);
        let a = opts.client_id();
        let b = opts.client_id();
        assert_ne!(a, b);
        assert!(a.starts_with("sitewatch_"));
    }

    #[test]
    fn validate_rejects_empty_host() {
        let opts = BrokerOptions::new("   ", 1883);
        assert!(matches!(
            opts.validate(),
            Err(Error::InvalidOption { field: "host", .. })
        ));
    }

    #[test]
    fn validate_rejects_sub_second_keep_alive() {
        let mut opts = BrokerOptions::new("broker.local", 1883);
        opts.keep_alive = Duration::from_millis(200);
        assert!(opts.validate().is_err());

        opts.keep_alive = Duration::ZERO;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn credentials_are_applied() {
        let opts = BrokerOptions::new("broker.local", 8883)
            .with_credentials("scada", SecretString::from("hunter2".to_string()));
        let mqtt = opts.to_mqtt_options("sitewatch_test");
        assert_eq!(mqtt.broker_address(), ("broker.local".to_string(), 8883));
        assert!(mqtt.clean_session());
        assert_eq!(
            mqtt.credentials(),
            Some(("scada".to_string(), "hunter2".to_string()))
        );
    }

    #[test]
    fn patterns_cover_prefixed_and_bare_topics() {
        assert!(SUBSCRIPTION_PATTERNS.contains(&"PLCNEXT/#"));
        assert!(SUBSCRIPTION_PATTERNS.contains(&"+/+"));
        assert!(SUBSCRIPTION_PATTERNS.contains(&"+/+/+"));
    }
}
