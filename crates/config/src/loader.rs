use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::GatewayConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["wagate.toml", "wagate.yaml", "wagate.yml", "wagate.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env
/// overrides.
///
/// Search order:
/// 1. explicit `path` (errors are returned, not swallowed)
/// 2. `./wagate.{toml,yaml,yml,json}` (project-local)
/// 3. `~/.config/wagate/wagate.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `GatewayConfig::default()` when nothing is found.
pub fn discover_and_load(path: Option<&Path>) -> anyhow::Result<GatewayConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => discover_default(),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

fn discover_default() -> GatewayConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    GatewayConfig::default()
}

/// Apply plain environment overrides on top of a parsed config.
///
/// `PORT` is honoured for compatibility with hosting platforms that inject
/// it; unparsable values are ignored with a warning.
pub fn apply_env_overrides(config: &mut GatewayConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %port, error = %e, "ignoring invalid PORT"),
        }
    }
    if let Some(bind) = lookup("WAGATE_BIND") {
        config.server.bind = bind;
    }
    if let Some(path) = lookup("WAGATE_SESSION_FILE") {
        config.session.path = PathBuf::from(path);
    }
    if let Some(url) = lookup("WAGATE_SIDECAR_URL") {
        config.whatsapp.sidecar_url = Some(url);
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(config_dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/wagate/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "wagate").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<GatewayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
