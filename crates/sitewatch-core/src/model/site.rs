// ── Site (one remote installation) ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sensor::compare_tags;
use super::{Sensor, SensorReading, SiteCondition, SiteId, SiteMetadata};

/// Transport label recorded on every site.
pub const SITE_PROTOCOL: &str = "MQTT";

/// A discovered site and its sensors, ordered by tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    /// Name as it appears in topics.
    pub name: String,
    /// Operator-facing name; falls back to `name`.
    pub display_name: String,
    pub county_id: Option<String>,
    pub sensors: Vec<Sensor>,
    pub status: SiteStatus,
    pub connection: SiteConnection,
}

/// Aggregate flags over a site's enabled sensors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteStatus {
    pub has_alarm: bool,
    pub has_fault: bool,
    pub last_update: Option<DateTime<Utc>>,
}

impl SiteStatus {
    /// Disabled sensors never contribute.
    pub fn from_sensors(sensors: &[Sensor], last_update: Option<DateTime<Utc>>) -> Self {
        let enabled = || sensors.iter().filter(|s| !s.is_disabled());
        Self {
            has_alarm: enabled().any(|s| s.current.status.is_alarm()),
            has_fault: enabled().any(|s| s.current.status.is_fault()),
            last_update,
        }
    }

    pub fn condition(&self) -> SiteCondition {
        SiteCondition::from_flags(self.has_alarm, self.has_fault)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConnection {
    pub protocol: String,
    pub last_topic: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Default for SiteConnection {
    fn default() -> Self {
        Self {
            protocol: SITE_PROTOCOL.to_owned(),
            last_topic: None,
            last_message_at: None,
        }
    }
}

impl Site {
    pub fn new(id: SiteId, name: impl Into<String>, metadata: Option<&SiteMetadata>) -> Self {
        let name = name.into();
        let display_name = metadata
            .and_then(|m| m.display_name.clone())
            .unwrap_or_else(|| name.clone());
        Self {
            id,
            name,
            display_name,
            county_id: metadata.and_then(|m| m.county_id.clone()),
            sensors: Vec::new(),
            status: SiteStatus::default(),
            connection: SiteConnection::default(),
        }
    }

    pub fn condition(&self) -> SiteCondition {
        self.status.condition()
    }

    /// Sensor by exact `(channel, tag)` identity.
    pub fn sensor(&self, channel_id: &str, tag: &str) -> Option<&Sensor> {
        self.sensors
            .iter()
            .find(|s| s.id == channel_id && s.tag == tag)
    }

    pub(crate) fn sensor_mut(&mut self, channel_id: &str, tag: &str) -> Option<&mut Sensor> {
        self.sensors
            .iter_mut()
            .find(|s| s.id == channel_id && s.tag == tag)
    }

    /// All sensors on a channel (a re-tagged channel has several).
    pub fn channel_sensors<'a>(&'a self, channel_id: &'a str) -> impl Iterator<Item = &'a Sensor> {
        self.sensors.iter().filter(move |s| s.id == channel_id)
    }

    pub fn enabled_sensor_count(&self) -> usize {
        self.sensors.iter().filter(|s| !s.is_disabled()).count()
    }

    /// Insert keeping tag order; equal tags land after existing ones.
    /// Returns the insertion index.
    pub(crate) fn insert_sensor(&mut self, sensor: Sensor) -> usize {
        let index = self
            .sensors
            .partition_point(|s| compare_tags(&s.tag, &sensor.tag).is_le());
        self.sensors.insert(index, sensor);
        index
    }

    pub(crate) fn touch(&mut self, reading: &SensorReading) {
        self.connection.last_topic = Some(reading.topic.clone());
        self.connection.last_message_at = Some(reading.timestamp);
    }

    pub(crate) fn refresh_status(&mut self, now: DateTime<Utc>) {
        self.status = SiteStatus::from_sensors(&self.sensors, Some(now));
    }
}
