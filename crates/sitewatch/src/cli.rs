//! Clap derive structures for the `sitewatch` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sitewatch -- live view of MQTT-connected gas and fire detection sites
#[derive(Debug, Parser)]
#[command(
    name = "sitewatch",
    version,
    about = "Monitor gas and fire detection sites over MQTT",
    long_about = "Connects to an MQTT broker, autodiscovers field controllers from the\n\
        topics they publish on, and tracks every detector channel in real time.\n\n\
        Channels that stay silent past the liveness threshold are marked disabled.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Broker profile to use
    #[arg(long, short = 'p', env = "SITEWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Broker host (overrides profile)
    #[arg(long, short = 'H', env = "SITEWATCH_HOST", global = true)]
    pub host: Option<String>,

    /// Broker port (overrides profile)
    #[arg(long, short = 'P', env = "SITEWATCH_PORT", global = true)]
    pub port: Option<u16>,

    /// Broker username (overrides profile)
    #[arg(long, short = 'u', env = "SITEWATCH_USERNAME", global = true)]
    pub username: Option<String>,

    /// Broker password
    #[arg(long, env = "SITEWATCH_PASSWORD", global = true, hide_env = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SITEWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream discovery and status notifications until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Collect traffic for a while, then print the discovered sites
    #[command(alias = "s")]
    Sites(SitesArgs),

    /// Decode one message offline and print the resulting reading
    Decode(DecodeArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  MONITORING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only report events for this site id
    #[arg(long, short = 's')]
    pub site: Option<u32>,

    /// Also print every accepted reading
    #[arg(long, short = 'r')]
    pub readings: bool,
}

#[derive(Debug, Args)]
pub struct SitesArgs {
    /// Seconds to collect traffic before printing
    #[arg(long, short = 'd', default_value = "10")]
    pub duration: u64,

    /// Show the sensors of one site instead of the site table
    pub site: Option<u32>,
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Topic the payload was published on (e.g. PLCNEXT/7_NorthSite/CH12)
    #[arg(long, short = 't')]
    pub topic: String,

    /// JSON payload; `-` or omitted reads stdin
    pub payload: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current resolved configuration
    Show,

    /// Create initial config file with guided setup
    Init,

    /// Store a broker password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
