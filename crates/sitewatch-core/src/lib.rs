// sitewatch-core: telemetry ingestion between sitewatch-api and consumers (CLI, dashboards).

pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod parse;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BrokerConfig, LivenessConfig, MonitorConfig};
pub use error::CoreError;
pub use monitor::Monitor;
pub use parse::{DecodeError, TopicAddress, TopicError, decode, parse_topic};
pub use sitewatch_api::{ConnectionState, InboundMessage};
pub use store::{LatestReadings, LivenessTracker, Registry};
pub use stream::SiteStream;

pub use model::{
    AggregateStatus, ChannelKey, DetectorType, MonitorEvent, Sensor, SensorKey, SensorReading,
    SensorStatus, Site, SiteCondition, SiteDirectory, SiteId, SiteMetadata, SiteStatus,
};
