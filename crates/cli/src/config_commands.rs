use {anyhow::Result, clap::Subcommand};

use maxrelay_config::{RelayConfig, Severity, validate};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and report errors and warnings.
    Check,
    /// Print where config and state files are read from.
    Paths,
}

pub fn handle_config(action: ConfigAction, config: &RelayConfig) -> Result<()> {
    match action {
        ConfigAction::Check => check(config),
        ConfigAction::Paths => {
            match maxrelay_config::config_dir() {
                Some(dir) => println!("config dir: {}", dir.display()),
                None => println!("config dir: <none>"),
            }
            println!("data dir:   {}", maxrelay_config::data_dir().display());
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config: &RelayConfig) -> Result<()> {
    let diagnostics = validate(config);
    if diagnostics.is_empty() {
        eprintln!("{GREEN}{BOLD}ok{RESET}: configuration is valid");
        return Ok(());
    }

    for d in &diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("{color}{BOLD}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics.len() - errors;
    eprintln!("\n{errors} error(s), {warnings} warning(s)");
    if errors > 0 {
        anyhow::bail!("configuration has {errors} error(s)");
    }
    Ok(())
}
