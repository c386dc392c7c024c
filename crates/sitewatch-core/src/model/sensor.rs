// ── Sensor (one tagged channel) ──

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DetectorType, SensorKey, SensorReading, SensorStatus, SiteId};

/// Seconds between expected controller updates for a channel.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 5;

/// A discovered sensor. Created on the first valid reading for its
/// `(site, channel, tag)` key and never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    /// Channel code.
    pub id: String,
    pub tag: String,
    pub name: String,
    pub site_id: SiteId,
    pub detector_type: DetectorType,
    pub current: SensorValue,
    pub alarms: SensorAlarms,
    pub config: SensorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    pub process_value: f64,
    pub current_ma: f64,
    pub unit: String,
    pub status: SensorStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAlarms {
    pub level1: f64,
    pub level2: f64,
    pub level1_active: bool,
    pub level2_active: bool,
}

impl SensorAlarms {
    pub fn with_thresholds(level1: f64, level2: f64) -> Self {
        Self {
            level1,
            level2,
            level1_active: false,
            level2_active: false,
        }
    }

    /// Level 2 wins: at most one flag is ever active.
    pub fn evaluate(&mut self, value: f64) {
        self.level2_active = value >= self.level2;
        self.level1_active = value >= self.level1 && !self.level2_active;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub min: f64,
    pub max: f64,
    pub update_interval_secs: u64,
}

impl Sensor {
    /// Build a sensor from its first reading with factory thresholds and range.
    pub fn from_reading(reading: &SensorReading) -> Self {
        let detector_type = reading.detector_type;
        let (level1, level2) = detector_type.default_thresholds();
        let (min, max) = detector_type.default_range();

        let mut sensor = Self {
            id: reading.channel_id.clone(),
            tag: reading.tag.clone(),
            name: reading.tag.clone(),
            site_id: reading.site_id,
            detector_type,
            current: SensorValue {
                process_value: reading.process_value,
                current_ma: reading.current_ma,
                unit: detector_type.unit().to_owned(),
                status: reading.status,
                timestamp: reading.timestamp,
            },
            alarms: SensorAlarms::with_thresholds(level1, level2),
            config: SensorConfig {
                min,
                max,
                update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            },
        };
        if !sensor.is_disabled() {
            sensor.alarms.evaluate(reading.process_value);
        }
        sensor
    }

    pub fn key(&self) -> SensorKey {
        SensorKey {
            site_id: self.site_id,
            channel_id: self.id.clone(),
            tag: self.tag.clone(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.current.status.is_disabled()
    }

    /// Overwrite the live value from a newer reading. Identity (channel,
    /// tag) is untouched; alarm flags follow the value unless disabled.
    pub(crate) fn apply(&mut self, reading: &SensorReading) {
        self.detector_type = reading.detector_type;
        self.current = SensorValue {
            process_value: reading.process_value,
            current_ma: reading.current_ma,
            unit: reading.detector_type.unit().to_owned(),
            status: reading.status,
            timestamp: reading.timestamp,
        };
        if !self.is_disabled() {
            self.alarms.evaluate(reading.process_value);
        }
    }

    /// Force the disabled state. Returns `false` if it already was.
    pub(crate) fn disable(&mut self) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.current.status = SensorStatus::DetectorDisabled;
        true
    }
}

/// Ordinal, case-insensitive tag comparison used for sensor ordering.
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
