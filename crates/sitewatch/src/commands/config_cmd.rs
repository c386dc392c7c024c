//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config, active: &str) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", d.output);
    let _ = writeln!(out, "color = \"{}\"", d.color);
    let _ = writeln!(out, "keep_alive_secs = {}", d.keep_alive_secs);
    let _ = writeln!(out, "connect_timeout_secs = {}", d.connect_timeout_secs);
    let _ = writeln!(out, "reconnect_interval_secs = {}", d.reconnect_interval_secs);
    let _ = writeln!(out, "sweep_interval_secs = {}", d.sweep_interval_secs);
    let _ = writeln!(out, "liveness_threshold_secs = {}", d.liveness_threshold_secs);
    let _ = writeln!(out, "queue_capacity = {}", d.queue_capacity);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let marker = if name == active { "  # active" } else { "" };
        let _ = writeln!(out, "[profiles.{name}]{marker}");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "port = {}", p.port);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref prefix) = p.client_id_prefix {
            let _ = writeln!(out, "client_id_prefix = \"{prefix}\"");
        }
        if !p.topics.is_empty() {
            let quoted: Vec<_> = p.topics.iter().map(|t| format!("\"{t}\"")).collect();
            let _ = writeln!(out, "topics = [{}]", quoted.join(", "));
        }
        if let Some(secs) = p.keep_alive_secs {
            let _ = writeln!(out, "keep_alive_secs = {secs}");
        }
        if let Some(secs) = p.connect_timeout_secs {
            let _ = writeln!(out, "connect_timeout_secs = {secs}");
        }
        if let Some(secs) = p.reconnect_interval_secs {
            let _ = writeln!(out, "reconnect_interval_secs = {secs}");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password(profile_name: &str) -> Result<String, CliError> {
    let pass = rpassword::prompt_password(format!("Password for profile '{profile_name}': "))
        .map_err(prompt_err)?;
    if pass.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(pass)
}

/// Offer to store the password in the system keyring or return it for
/// plaintext config. Returns `Some(password)` if the user chose plaintext.
fn prompt_password_storage(password: String, profile_name: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        sitewatch_config::store_password(profile_name, &password)?;
        eprintln!("   ✓ password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password))
    }
}

fn run_wizard() -> Result<(String, Profile), CliError> {
    let defaults = Profile::default();

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let host: String = Input::new()
        .with_prompt("Broker host")
        .default(defaults.host.clone())
        .interact_text()
        .map_err(prompt_err)?;

    let port: u16 = Input::new()
        .with_prompt("Broker port")
        .default(defaults.port)
        .interact_text()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Username (blank for anonymous)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let (username, password) = if username.trim().is_empty() {
        (None, None)
    } else {
        let pass = prompt_password(&profile_name)?;
        (
            Some(username.trim().to_owned()),
            prompt_password_storage(pass, &profile_name)?,
        )
    };

    let profile = Profile {
        host,
        port,
        username,
        password,
        ..defaults
    };
    Ok((profile_name, profile))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let active = config::active_profile_name(global, &cfg);
            output::print_output(&format_config_redacted(&cfg, &active), global.quiet);
            Ok(())
        }

        ConfigCommand::Init => {
            eprintln!("sitewatch configuration wizard");
            eprintln!("   Config path: {}\n", config::config_path().display());

            let (profile_name, profile) = run_wizard()?;

            let mut cfg = sitewatch_config::load_config_or_default();
            if cfg.profiles.is_empty() {
                cfg.default_profile = Some(profile_name.clone());
            }
            cfg.profiles.insert(profile_name.clone(), profile);
            let path = config::save_config(&cfg)?;

            eprintln!("\n   ✓ profile '{profile_name}' saved to {}", path.display());
            eprintln!("   Try: sitewatch sites --profile {profile_name}");
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = sitewatch_config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if cfg.profile(&profile_name).is_none() {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: config::available_profiles(&cfg),
                });
            }

            let pass = prompt_password(&profile_name)?;
            sitewatch_config::store_password(&profile_name, &pass)?;
            if !global.quiet {
                eprintln!("Password for profile '{profile_name}' stored in system keyring");
            }
            Ok(())
        }
    }
}
