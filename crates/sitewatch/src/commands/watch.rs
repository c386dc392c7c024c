//! Live event stream.

use std::collections::HashMap;
use std::fmt::Write as _;

use tokio::sync::broadcast::error::RecvError;

use sitewatch_core::{Monitor, MonitorEvent, SiteCondition, SiteId};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    monitor: &Monitor,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // subscribe first so discovery triggered by the first messages is seen
    let mut events = monitor.events();
    monitor.connect().await?;
    if !global.quiet {
        eprintln!(
            "Watching {} (Ctrl-C to stop)",
            monitor.config().broker.endpoint()
        );
    }

    let mut printer = EventPrinter::new(args, global.output, output::should_color(global.color));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = printer.render(&event)? {
                        output::print_output(&line, global.quiet);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged; some notifications were lost");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────────

struct EventPrinter {
    args: WatchArgs,
    format: OutputFormat,
    color: bool,
    /// Last printed `(condition, enabled sensors)` per site. Site updates
    /// arrive with every reading; only changes are worth a line.
    last_seen: HashMap<SiteId, (SiteCondition, usize)>,
}

impl EventPrinter {
    fn new(args: WatchArgs, format: OutputFormat, color: bool) -> Self {
        Self {
            args,
            format,
            color,
            last_seen: HashMap::new(),
        }
    }

    fn render(&mut self, event: &MonitorEvent) -> Result<Option<String>, CliError> {
        if !self.wanted(event) {
            return Ok(None);
        }
        match self.format {
            OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(event)?)),
            // one event per line
            OutputFormat::JsonCompact => Ok(Some(serde_json::to_string(event)?)),
            OutputFormat::Yaml => Ok(Some(format!("---\n{}", serde_yaml::to_string(event)?))),
            OutputFormat::Table | OutputFormat::Plain => Ok(self.describe(event)),
        }
    }

    fn wanted(&self, event: &MonitorEvent) -> bool {
        if matches!(event, MonitorEvent::ReadingUpdated(_)) && !self.args.readings {
            return false;
        }
        match (self.args.site, event_site(event)) {
            (Some(wanted), Some(site_id)) => wanted == site_id,
            _ => true,
        }
    }

    fn describe(&mut self, event: &MonitorEvent) -> Option<String> {
        let color = self.color && self.format == OutputFormat::Table;
        let now = chrono::Local::now().format("%H:%M:%S");
        let mut line = format!("{now}  ");
        match event {
            MonitorEvent::ConnectionChanged(true) => line.push_str("connected to broker"),
            MonitorEvent::ConnectionChanged(false) => line.push_str("disconnected from broker"),
            MonitorEvent::Log { message, .. } => line.push_str(message),
            MonitorEvent::SiteDiscovered { site_id, site_name } => {
                let _ = write!(line, "+ site {site_id} {site_name}");
            }
            MonitorEvent::SensorDiscovered { sensor, site } => {
                let _ = write!(
                    line,
                    "+ sensor {}/{} {} ({})",
                    site.id,
                    sensor.id,
                    sensor.tag,
                    sensor.detector_type.name()
                );
            }
            MonitorEvent::SiteUpdated(site) => {
                let state = (site.condition(), site.enabled_sensor_count());
                if self.last_seen.insert(site.id, state) == Some(state) {
                    return None;
                }
                let _ = write!(
                    line,
                    "site {} {}  {}  {}/{} sensors enabled",
                    site.id,
                    site.display_name,
                    output::paint_condition(state.0, color),
                    state.1,
                    site.sensors.len()
                );
            }
            MonitorEvent::ReadingUpdated(reading) => {
                let _ = write!(
                    line,
                    "{}/{} {}  {:.2} {}  {:.2} mA  {}",
                    reading.site_id,
                    reading.channel_id,
                    reading.tag,
                    reading.process_value,
                    reading.detector_type.unit(),
                    reading.current_ma,
                    output::paint_status(reading.status, color)
                );
            }
        }
        Some(line)
    }
}

fn event_site(event: &MonitorEvent) -> Option<SiteId> {
    match event {
        MonitorEvent::SiteDiscovered { site_id, .. } => Some(*site_id),
        MonitorEvent::SensorDiscovered { site, .. } | MonitorEvent::SiteUpdated(site) => {
            Some(site.id)
        }
        MonitorEvent::ReadingUpdated(reading) => Some(reading.site_id),
        MonitorEvent::ConnectionChanged(_) | MonitorEvent::Log { .. } => None,
    }
}
