//! Configuration loading and env substitution.
//!
//! Config files: `wagate.toml`, `wagate.yaml`, or `wagate.json`
//! Searched in `./` then `~/.config/wagate/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, and a small set
//! of plain env overrides (`PORT`, `WAGATE_*`) applied after parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AutoReplyConfig, AutoReplyRule, GatewayConfig, ServerConfig, SessionConfig,
        WhatsAppConfig,
    },
};
