// ── Detector classification ──

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Kind of field detector wired to a channel.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DetectorType {
    /// Combustible gas, percent of lower explosive limit.
    GasLel,
    /// Toxic gas, parts per million.
    GasPpm,
    Flame,
    ManualCallPoint,
    Smoke,
    #[default]
    Unknown,
}

impl DetectorType {
    /// Map a wire code. `0` and anything unrecognised are `Unknown`;
    /// the decoder runs the heuristic classifier for `0` before this.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::GasLel,
            2 => Self::GasPpm,
            3 => Self::Flame,
            4 => Self::ManualCallPoint,
            5 => Self::Smoke,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::GasLel => 1,
            Self::GasPpm => 2,
            Self::Flame => 3,
            Self::ManualCallPoint => 4,
            Self::Smoke => 5,
            Self::Unknown => 0,
        }
    }

    pub fn is_gas(self) -> bool {
        matches!(self, Self::GasLel | Self::GasPpm)
    }

    /// Engineering unit of the process value.
    pub fn unit(self) -> &'static str {
        match self {
            Self::GasLel => "%LEL",
            Self::GasPpm => "PPM",
            Self::Flame | Self::ManualCallPoint | Self::Smoke => "mA",
            Self::Unknown => "?",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GasLel => "Gas Detector (%LEL)",
            Self::GasPpm => "Gas Detector (PPM)",
            Self::Flame => "Flame Detector",
            Self::ManualCallPoint => "Manual Call Point",
            Self::Smoke => "Smoke Detector",
            Self::Unknown => "Unknown",
        }
    }

    /// Factory alarm thresholds `(level1, level2)`.
    pub fn default_thresholds(self) -> (f64, f64) {
        match self {
            Self::GasLel => (25.0, 50.0),
            Self::GasPpm => (500.0, 1000.0),
            _ => (15.0, 18.0),
        }
    }

    /// Measuring range `(min, max)`: percent scale for gas, loop current otherwise.
    pub fn default_range(self) -> (f64, f64) {
        if self.is_gas() { (0.0, 100.0) } else { (4.0, 20.0) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_types() {
        assert_eq!(DetectorType::from_code(1), DetectorType::GasLel);
        assert_eq!(DetectorType::from_code(5), DetectorType::Smoke);
        assert_eq!(DetectorType::from_code(0), DetectorType::Unknown);
        assert_eq!(DetectorType::from_code(42), DetectorType::Unknown);
        assert_eq!(DetectorType::Flame.code(), 3);
    }

    #[test]
    fn units() {
        assert_eq!(DetectorType::GasLel.unit(), "%LEL");
        assert_eq!(DetectorType::GasPpm.unit(), "PPM");
        assert_eq!(DetectorType::Smoke.unit(), "mA");
        assert_eq!(DetectorType::Unknown.unit(), "?");
    }

    #[test]
    fn defaults_follow_detector_family() {
        assert_eq!(DetectorType::GasLel.default_thresholds(), (25.0, 50.0));
        assert_eq!(DetectorType::GasPpm.default_thresholds(), (500.0, 1000.0));
        assert_eq!(DetectorType::Flame.default_thresholds(), (15.0, 18.0));
        assert_eq!(DetectorType::GasPpm.default_range(), (0.0, 100.0));
        assert_eq!(DetectorType::ManualCallPoint.default_range(), (4.0, 20.0));
    }
}
