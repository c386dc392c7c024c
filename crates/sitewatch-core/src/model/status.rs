// ── Sensor and site status ──
//
// Wire status codes reported by field controllers and the aggregate
// condition derived for a site.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Highest status code accepted from the wire. Codes above this are
/// treated as noise and the whole message is discarded.
pub const MAX_STATUS_CODE: i64 = 10;

/// Detector status as reported by the controller.
///
/// Declaration order is severity order for the alarm ladder
/// (`Normal < AlarmLevel1 < AlarmLevel2`).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorStatus {
    #[default]
    Normal,
    AlarmLevel1,
    AlarmLevel2,
    LineOpenFault,
    LineShortFault,
    DetectorError,
    DetectorDisabled,
}

impl SensorStatus {
    /// Map a wire code. `None` for codes outside `0..=MAX_STATUS_CODE`;
    /// in-range codes without a meaning map to `DetectorError`.
    pub fn from_code(code: i64) -> Option<Self> {
        let status = match code {
            0 => Self::Normal,
            1 => Self::AlarmLevel1,
            2 => Self::AlarmLevel2,
            3 => Self::LineOpenFault,
            4 => Self::LineShortFault,
            5 => Self::DetectorError,
            6 => Self::DetectorDisabled,
            7..=MAX_STATUS_CODE => Self::DetectorError,
            _ => return None,
        };
        Some(status)
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::AlarmLevel1 => 1,
            Self::AlarmLevel2 => 2,
            Self::LineOpenFault => 3,
            Self::LineShortFault => 4,
            Self::DetectorError => 5,
            Self::DetectorDisabled => 6,
        }
    }

    pub fn is_alarm(self) -> bool {
        matches!(self, Self::AlarmLevel1 | Self::AlarmLevel2)
    }

    pub fn is_fault(self) -> bool {
        matches!(
            self,
            Self::LineOpenFault | Self::LineShortFault | Self::DetectorError
        )
    }

    pub fn is_disabled(self) -> bool {
        self == Self::DetectorDisabled
    }

    /// Short operator-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::AlarmLevel1 => "Alarm L1",
            Self::AlarmLevel2 => "Alarm L2",
            Self::LineOpenFault => "Line Open",
            Self::LineShortFault => "Line Short",
            Self::DetectorError => "Error",
            Self::DetectorDisabled => "Disabled",
        }
    }
}

/// Display condition for a site. Fault outranks alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum SiteCondition {
    Fault,
    Alarm,
    Normal,
}

impl SiteCondition {
    pub fn from_flags(has_alarm: bool, has_fault: bool) -> Self {
        if has_fault {
            Self::Fault
        } else if has_alarm {
            Self::Alarm
        } else {
            Self::Normal
        }
    }
}
