use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use wagate_config::{
    GatewayConfig,
    validate::{Diagnostic, Severity, validate},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Report problems in the config file; exits non-zero on errors.
    Check {
        /// Include info-level notes.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the merged configuration (file, env, flags) as TOML.
    Show,
}

/// Run a config subcommand. `load_effective` is only called for `show`, so
/// `check` can report on a file that does not parse.
pub fn handle_config<F>(
    action: &ConfigAction,
    path: Option<&Path>,
    load_effective: F,
) -> Result<()>
where
    F: FnOnce() -> Result<GatewayConfig>,
{
    match action {
        ConfigAction::Check { verbose } => check(path, *verbose),
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(&load_effective()?)?);
            Ok(())
        },
    }
}

fn ansi_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "\x1b[1;31m",
        Severity::Warning => "\x1b[1;33m",
        Severity::Info => "\x1b[1;36m",
    }
}

fn render(diagnostic: &Diagnostic) -> String {
    let label = format!(
        "{}{}\x1b[0m",
        ansi_color(diagnostic.severity),
        diagnostic.severity
    );
    if diagnostic.path.is_empty() {
        format!("  {label} {}", diagnostic.message)
    } else {
        format!("  {label} {}: {}", diagnostic.path, diagnostic.message)
    }
}

fn check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let outcome = validate(path);
    match &outcome.config_path {
        Some(file) => eprintln!("config: {}\n", file.display()),
        None => eprintln!("config: built-in defaults\n"),
    }

    outcome
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .for_each(|d| eprintln!("{}", render(d)));

    let errors = outcome.count(Severity::Error);
    let warnings = outcome.count(Severity::Warning);
    match (errors, warnings) {
        (0, 0) => eprintln!("config is valid"),
        _ => eprintln!("\n{errors} error(s) and {warnings} warning(s)"),
    }

    anyhow::ensure!(!outcome.has_errors(), "invalid configuration");
    Ok(())
}
