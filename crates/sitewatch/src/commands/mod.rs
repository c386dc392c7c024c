//! Command dispatch: bridges CLI args -> monitor -> output formatting.

pub mod config_cmd;
pub mod decode;
pub mod sites;
pub mod watch;

use sitewatch_core::Monitor;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a broker-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let monitor = Monitor::new(config::resolve_monitor_config(global)?);
    let result = match cmd {
        Command::Watch(args) => watch::handle(&monitor, args, global).await,
        Command::Sites(args) => sites::handle(&monitor, args, global).await,
        // handled before a monitor is built
        Command::Decode(_) | Command::Config(_) | Command::Completions(_) => {
            Err(CliError::Internal("command does not use a broker".into()))
        }
    };
    monitor.disconnect().await;
    result
}
