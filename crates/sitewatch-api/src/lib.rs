// sitewatch-api: MQTT transport for field telemetry (connection lifecycle, subscriptions)

pub mod connection;
pub mod error;
pub mod mqtt;

pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState, InboundMessage};
pub use error::Error;
pub use mqtt::{BrokerCredentials, BrokerOptions, SUBSCRIPTION_PATTERNS};
