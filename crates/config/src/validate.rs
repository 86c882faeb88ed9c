//! Configuration validation for `wagate config check`.
//!
//! Parses the config file the same way the loader does, then runs semantic
//! checks on the resulting [`GatewayConfig`].

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::{loader, schema::GatewayConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "whatsapp.country_code". Empty for file-level issues.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, path: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Validate the config file at `path`, or the discovered one when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(loader::find_config_file);

    let Some(actual_path) = &config_path else {
        let mut diagnostics = vec![Diagnostic::new(
            Severity::Info,
            "",
            "no config file found; using defaults",
        )];
        diagnostics.extend(check_config(&GatewayConfig::default()));
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    let diagnostics = match loader::load_config(actual_path) {
        Ok(config) => check_config(&config),
        Err(e) => vec![Diagnostic::new(Severity::Error, "", format!("{e:#}"))],
    };
    ValidationResult {
        diagnostics,
        config_path,
    }
}

/// Semantic checks on an already parsed config.
#[must_use]
pub fn check_config(config: &GatewayConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if config.server.port == 0 {
        out.push(Diagnostic::new(
            Severity::Warning,
            "server.port",
            "port 0 binds a random free port",
        ));
    }
    if config.session.path.as_os_str().is_empty() {
        out.push(Diagnostic::new(
            Severity::Error,
            "session.path",
            "session file path is empty",
        ));
    }

    let wa = &config.whatsapp;
    if wa.country_code.is_empty() || !wa.country_code.bytes().all(|b| b.is_ascii_digit()) {
        out.push(Diagnostic::new(
            Severity::Error,
            "whatsapp.country_code",
            format!("expected digits only, got {:?}", wa.country_code),
        ));
    }
    if let Some(url) = &wa.sidecar_url
        && !(url.starts_with("ws://") || url.starts_with("wss://"))
    {
        out.push(Diagnostic::new(
            Severity::Error,
            "whatsapp.sidecar_url",
            format!("expected a ws:// or wss:// URL, got {url:?}"),
        ));
    }
    if wa.request_timeout_secs == 0 {
        out.push(Diagnostic::new(
            Severity::Error,
            "whatsapp.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if wa.max_media_bytes == 0 {
        out.push(Diagnostic::new(
            Severity::Error,
            "whatsapp.max_media_bytes",
            "must be greater than zero",
        ));
    }
    if !wa.headless {
        out.push(Diagnostic::new(
            Severity::Info,
            "whatsapp.headless",
            "the sidecar browser needs a display when headless is off",
        ));
    }

    let mut seen = HashSet::new();
    for (i, rule) in config.auto_reply.rules.iter().enumerate() {
        let path = format!("auto_reply.rules[{i}].trigger");
        if rule.trigger.is_empty() {
            out.push(Diagnostic::new(
                Severity::Warning,
                &path,
                "empty trigger only matches empty messages",
            ));
        }
        if !seen.insert(rule.trigger.as_str()) {
            out.push(Diagnostic::new(
                Severity::Warning,
                &path,
                format!("duplicate trigger {:?} never matches", rule.trigger),
            ));
        }
    }

    out
}
