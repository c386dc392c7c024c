// ── Decoded sensor reading ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DetectorType, SensorStatus, SiteId};

/// One decoded channel sample. Immutable once produced by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub site_id: SiteId,
    pub site_name: String,
    /// Channel code, e.g. `CH12`.
    pub channel_id: String,
    /// Controller tag, never empty.
    pub tag: String,
    pub process_value: f64,
    /// Raw 4-20 mA loop current.
    pub current_ma: f64,
    pub detector_type: DetectorType,
    pub status: SensorStatus,
    /// Status exactly as sent, before mapping.
    pub status_code: u8,
    /// Decode time.
    pub timestamp: DateTime<Utc>,
    /// Canonical topic, `PLCNEXT/<siteId>_<siteName>/<channel>`.
    pub topic: String,
}

impl SensorReading {
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey::new(self.site_id, &self.channel_id)
    }

    pub fn sensor_key(&self) -> SensorKey {
        SensorKey {
            site_id: self.site_id,
            channel_id: self.channel_id.clone(),
            tag: self.tag.clone(),
        }
    }
}

/// Address of one physical channel at a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub site_id: SiteId,
    pub channel_id: String,
}

impl ChannelKey {
    pub fn new(site_id: SiteId, channel_id: impl Into<String>) -> Self {
        Self {
            site_id,
            channel_id: channel_id.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.site_id, self.channel_id)
    }
}

/// Sensor identity: a channel plus the tag wired to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorKey {
    pub site_id: SiteId,
    pub channel_id: String,
    pub tag: String,
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.site_id, self.channel_id, self.tag)
    }
}
