//! Config schema types (server, session file, WhatsApp sidecar, auto-reply).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default HTTP port when neither config nor `PORT` set one.
pub const DEFAULT_PORT: u16 = 8000;

/// Default location of the persisted session blob, relative to the cwd.
pub const DEFAULT_SESSION_FILE: &str = "./wa-session.json";

/// Default port of the local WhatsApp Web sidecar WebSocket.
pub const DEFAULT_SIDECAR_PORT: u16 = 8765;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub whatsapp: WhatsAppConfig,
    pub auto_reply: AutoReplyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// JSON file holding the authenticated session blob.
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

/// WhatsApp Web sidecar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Full WebSocket URL of an already-running sidecar. When set, the
    /// gateway never spawns a process and `sidecar_port` is ignored.
    pub sidecar_url: Option<String>,
    pub sidecar_port: u16,
    /// Directory with the sidecar's `package.json`. Discovered when unset.
    pub sidecar_dir: Option<PathBuf>,
    /// Spawn the sidecar process when a sidecar directory is available.
    pub auto_start: bool,
    /// Run the automated browser headless.
    pub headless: bool,
    /// Extra arguments handed to the automated browser.
    pub puppeteer_args: Vec<String>,
    /// Replaces a leading `0` in phone numbers.
    pub country_code: String,
    pub request_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    /// Upper bound for media fetched from `/send-media` URLs.
    pub max_media_bytes: usize,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            sidecar_url: None,
            sidecar_port: DEFAULT_SIDECAR_PORT,
            sidecar_dir: None,
            auto_start: true,
            headless: true,
            puppeteer_args: [
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-accelerated-2d-canvas",
                "--no-first-run",
                "--no-zygote",
                "--single-process",
                "--disable-gpu",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            country_code: "62".into(),
            request_timeout_secs: 60,
            reconnect_delay_secs: 5,
            max_media_bytes: 16 * 1024 * 1024,
        }
    }
}

impl WhatsAppConfig {
    /// WebSocket URL the adapter connects to.
    pub fn sidecar_ws_url(&self) -> String {
        self.sidecar_url
            .clone()
            .unwrap_or_else(|| format!("ws://127.0.0.1:{}", self.sidecar_port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoReplyConfig {
    pub enabled: bool,
    pub rules: Vec<AutoReplyRule>,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: vec![
                AutoReplyRule::new("apakah masih ada", "pong"),
                AutoReplyRule::new("hi", "hello"),
            ],
        }
    }
}

/// Exact-match trigger and the text sent back as a quoted reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReplyRule {
    pub trigger: String,
    pub reply: String,
}

impl AutoReplyRule {
    pub fn new(trigger: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            reply: reply.into(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.session.path, PathBuf::from("./wa-session.json"));
        assert_eq!(cfg.whatsapp.country_code, "62");
        assert_eq!(cfg.whatsapp.sidecar_ws_url(), "ws://127.0.0.1:8765");
        assert_eq!(cfg.auto_reply.rules.len(), 2);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: GatewayConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [whatsapp]
            sidecar_url = "ws://sidecar:3000"

            [[auto_reply.rules]]
            trigger = "ping"
            reply = "pong"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.whatsapp.sidecar_ws_url(), "ws://sidecar:3000");
        assert!(cfg.whatsapp.headless);
        assert_eq!(cfg.auto_reply.rules, vec![AutoReplyRule::new("ping", "pong")]);
        assert!(cfg.auto_reply.enabled);
    }
}
