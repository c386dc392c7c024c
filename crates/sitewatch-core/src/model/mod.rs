// ── Domain model ──
//
// Sites, sensors and the readings that feed them. Everything here is
// plain data; mutation goes through the registry in `store`.

pub mod detector;
pub mod directory;
pub mod event;
pub mod reading;
pub mod sensor;
pub mod site;
pub mod status;

/// Numeric site identifier taken from the topic.
pub type SiteId = u32;

// ── Re-exports ──────────────────────────────────────────────────────

pub use detector::DetectorType;
pub use directory::{AggregateStatus, SiteDirectory, SiteMetadata, aggregate, county_status};
pub use event::MonitorEvent;
pub use reading::{ChannelKey, SensorKey, SensorReading};
pub use sensor::{Sensor, SensorAlarms, SensorConfig, SensorValue};
pub use site::{Site, SiteConnection, SiteStatus};
pub use status::{MAX_STATUS_CODE, SensorStatus, SiteCondition};
