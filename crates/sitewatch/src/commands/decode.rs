//! Offline decode of a single message.

use std::io::Read;

use sitewatch_core::{Sensor, SensorReading, decode, parse_topic};

use crate::cli::{DecodeArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

fn reading_detail(reading: &SensorReading) -> String {
    let sensor = Sensor::from_reading(reading);
    let alarm = if sensor.alarms.level2_active {
        format!("level 2 (>= {})", sensor.alarms.level2)
    } else if sensor.alarms.level1_active {
        format!("level 1 (>= {})", sensor.alarms.level1)
    } else {
        "-".into()
    };
    [
        format!("Site:      {} ({})", reading.site_name, reading.site_id),
        format!("Channel:   {}", reading.channel_id),
        format!("Tag:       {}", reading.tag),
        format!("Detector:  {}", reading.detector_type.name()),
        format!(
            "Value:     {} {}",
            reading.process_value,
            reading.detector_type.unit()
        ),
        format!("Loop:      {} mA", reading.current_ma),
        format!(
            "Status:    {} (code {})",
            reading.status.label(),
            reading.status_code
        ),
        format!("Alarm:     {alarm}"),
        format!("Topic:     {}", reading.topic),
    ]
    .join("\n")
}

fn read_payload(arg: Option<String>) -> Result<Vec<u8>, CliError> {
    match arg {
        Some(text) if text != "-" => Ok(text.into_bytes()),
        _ => {
            let mut buf = Vec::new();
            std::io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

pub fn handle(args: DecodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let address = parse_topic(&args.topic).map_err(sitewatch_core::CoreError::from)?;
    let payload = read_payload(args.payload)?;
    let reading = decode(&payload, &address).map_err(sitewatch_core::CoreError::from)?;

    let out = output::render_single(global.output, &reading, reading_detail, |r| {
        r.sensor_key().to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn detail_reports_active_alarm() {
        let address = parse_topic("PLCNEXT/7_NorthSite/CH12").unwrap();
        let payload = br#"{"strCH12_TAG":"KGD-007","iCH12_mA":12,"rCH12_PV":30,"iCH12_DetStatus":1,"iCH12_DetType":1}"#;
        let reading = decode(payload, &address).unwrap();
        let detail = reading_detail(&reading);
        assert!(detail.contains("Tag:       KGD-007"));
        assert!(detail.contains("Alarm:     level 1 (>= 25)"));
        assert!(detail.contains("Status:    Alarm L1 (code 1)"));
    }
}
