// ── Monitor events ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Sensor, SensorReading, Site, SiteId};

/// Notification broadcast by the monitor. Slow subscribers may lag and
/// miss events; the site snapshot stream is the source of truth.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MonitorEvent {
    ConnectionChanged(bool),
    Log {
        at: DateTime<Utc>,
        message: String,
    },
    SiteDiscovered {
        site_id: SiteId,
        site_name: String,
    },
    /// Carries the site as it stood right after the sensor was added.
    SensorDiscovered {
        sensor: Arc<Sensor>,
        site: Arc<Site>,
    },
    SiteUpdated(Arc<Site>),
    ReadingUpdated(Arc<SensorReading>),
}
