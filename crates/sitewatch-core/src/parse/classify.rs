use crate::model::DetectorType;

/// Guess the detector kind for controllers that report type `0`.
///
/// A live 4-20 mA loop is a gas head: readings above 100 can only be PPM,
/// anything else is %LEL. Off-loop currents with a small value are
/// treated as flame detectors.
pub fn infer_detector_type(process_value: f64, current_ma: f64) -> DetectorType {
    let in_loop = (4.0..=20.0).contains(&current_ma);
    match (in_loop, process_value > 100.0) {
        (true, true) => DetectorType::GasPpm,
        (true, false) => DetectorType::GasLel,
        (false, false) => DetectorType::Flame,
        (false, true) => DetectorType::Unknown,
    }
}
