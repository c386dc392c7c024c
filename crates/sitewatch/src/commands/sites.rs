//! Site command handler: collect for a fixed window, then print.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tabled::Tabled;

use sitewatch_core::{Monitor, Sensor, Site};

use crate::cli::{GlobalOpts, OutputFormat, SitesArgs};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Sensors")]
    sensors: String,
    #[tabled(rename = "Last Update")]
    last_update: String,
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "mA")]
    current_ma: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Alarm")]
    alarm: String,
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into())
}

fn site_row(site: &Site, online: bool, color: bool) -> SiteRow {
    SiteRow {
        id: site.id.to_string(),
        name: site.display_name.clone(),
        status: output::paint_condition(site.condition(), color),
        online: if online { "yes" } else { "no" }.into(),
        sensors: format!("{}/{}", site.enabled_sensor_count(), site.sensors.len()),
        last_update: format_time(site.connection.last_message_at),
    }
}

fn sensor_row(sensor: &Sensor, color: bool) -> SensorRow {
    let alarm = if sensor.alarms.level2_active {
        "L2"
    } else if sensor.alarms.level1_active {
        "L1"
    } else {
        ""
    };
    SensorRow {
        channel: sensor.id.clone(),
        tag: sensor.tag.clone(),
        kind: sensor.detector_type.name().into(),
        value: format!("{:.2} {}", sensor.current.process_value, sensor.current.unit),
        current_ma: format!("{:.2}", sensor.current.current_ma),
        status: output::paint_status(sensor.current.status, color),
        alarm: alarm.into(),
    }
}

fn site_detail(site: &Site) -> String {
    let mut lines = vec![
        format!("Site:        {} ({})", site.display_name, site.id),
        format!("Controller:  {}", site.name),
        format!("Condition:   {}", site.condition()),
        format!(
            "Sensors:     {}/{} enabled",
            site.enabled_sensor_count(),
            site.sensors.len()
        ),
        format!("Last topic:  {}", site.connection.last_topic.as_deref().unwrap_or("-")),
        format!("Last update: {}", format_time(site.connection.last_message_at)),
    ];
    if let Some(ref county) = site.county_id {
        lines.insert(2, format!("County:      {county}"));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    monitor: &Monitor,
    args: SitesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    monitor.connect().await?;
    if !global.quiet {
        eprintln!(
            "Collecting from {} for {}s...",
            monitor.config().broker.endpoint(),
            args.duration
        );
    }
    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(args.duration)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    let color = output::should_color(global.color);
    let out = match args.site {
        Some(site_id) => {
            let sensors = monitor.sensors(site_id)?;
            let rendered = output::render_list(
                global.output,
                &sensors,
                |s| sensor_row(s, color),
                |s| s.tag.clone(),
            )?;
            match monitor.site(site_id) {
                Some(site) if global.output == OutputFormat::Table => {
                    format!("{}\n\n{rendered}", site_detail(&site))
                }
                _ => rendered,
            }
        }
        None => {
            let snapshot = monitor.sites();
            let sites: &[Arc<Site>] = &snapshot;
            output::render_list(
                global.output,
                sites,
                |s| site_row(s, monitor.is_site_online(s.id), color),
                |s| s.id.to_string(),
            )?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
