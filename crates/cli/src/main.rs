mod config_commands;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context as _,
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    wagate_auto_reply::AutoReplyRules,
    wagate_config::{GatewayConfig, WhatsAppConfig},
    wagate_gateway::{GatewayState, run_lifecycle, start_gateway},
    wagate_whatsapp::{
        SessionStore, SidecarClient, SidecarClientConfig, SidecarConfig, SidecarProcess,
        find_sidecar_dir, start_sidecar,
    },
};

/// Attempts per sidecar (re)connect round.
const SIDECAR_CONNECT_ATTEMPTS: u32 = 10;

#[derive(Parser)]
#[command(name = "wagate", version, about = "wagate: HTTP gateway for WhatsApp Web")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (skips discovery of ./wagate.toml and ~/.config/wagate/).
    #[arg(long, short = 'c', global = true, env = "WAGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value and `PORT`).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Session file location (overrides config value).
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,
    /// WebSocket URL of an already-running sidecar; disables auto-start.
    #[arg(long, global = true)]
    sidecar_url: Option<String>,
    /// Sidecar directory to start the sidecar from.
    #[arg(long, global = true)]
    sidecar_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// CLI flags win over config file and env values.
fn apply_cli_overrides(cli: &Cli, config: &mut GatewayConfig) {
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = &cli.session_file {
        config.session.path = path.clone();
    }
    if let Some(url) = &cli.sidecar_url {
        config.whatsapp.sidecar_url = Some(url.clone());
    }
    if let Some(dir) = &cli.sidecar_dir {
        config.whatsapp.sidecar_dir = Some(dir.clone());
    }
}

fn client_config(config: &WhatsAppConfig) -> SidecarClientConfig {
    SidecarClientConfig {
        url: config.sidecar_ws_url(),
        headless: config.headless,
        puppeteer_args: config.puppeteer_args.clone(),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        connect_attempts: SIDECAR_CONNECT_ATTEMPTS,
    }
}

/// Start the local sidecar unless an external one is configured or
/// auto-start is off. Without a discoverable sidecar directory the client
/// still connects and waits for one to come up.
async fn spawn_sidecar(config: &WhatsAppConfig) -> anyhow::Result<Option<SidecarProcess>> {
    if config.sidecar_url.is_some() || !config.auto_start {
        return Ok(None);
    }
    let Some(sidecar_dir) = find_sidecar_dir(config.sidecar_dir.as_deref())? else {
        warn!(
            url = %config.sidecar_ws_url(),
            "no whatsapp sidecar directory found, waiting for an external sidecar"
        );
        return Ok(None);
    };
    let process = start_sidecar(SidecarConfig {
        sidecar_dir,
        port: config.sidecar_port,
    })
    .await
    .context("failed to start whatsapp sidecar")?;
    Ok(Some(process))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown requested");
}

async fn run_gateway(config: GatewayConfig) -> anyhow::Result<()> {
    let store = SessionStore::new(&config.session.path);
    let session = match store.load().await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable session file");
            None
        },
    };
    info!(
        path = %config.session.path.display(),
        restored = session.is_some(),
        "session store ready"
    );

    let mut sidecar = spawn_sidecar(&config.whatsapp).await?;
    if let Some(process) = &sidecar {
        info!(port = process.port(), "using managed whatsapp sidecar");
    }

    let (client, events) = SidecarClient::start(client_config(&config.whatsapp), session);
    let state = GatewayState::new(Arc::new(client), &config.whatsapp);
    let rules = AutoReplyRules::from_config(&config.auto_reply);
    let lifecycle = tokio::spawn(run_lifecycle(Arc::clone(&state), store, rules, events));

    let served = start_gateway(
        &config.server.bind,
        config.server.port,
        state,
        shutdown_signal(),
    )
    .await;

    lifecycle.abort();
    if let Some(process) = sidecar.as_mut() {
        if !process.is_running() {
            warn!("whatsapp sidecar exited before shutdown");
        } else if let Err(e) = process.stop().await {
            warn!(error = %e, "failed to stop whatsapp sidecar");
        }
    }
    served
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    match &cli.command {
        None | Some(Commands::Gateway) => {
            let config = load_effective_config(&cli)?;
            info!(version = env!("CARGO_PKG_VERSION"), "wagate starting");
            run_gateway(config).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config.as_deref(), || {
                load_effective_config(&cli)
            })
        },
    }
}

/// Config file, env overrides, then command-line flags.
fn load_effective_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut config = wagate_config::discover_and_load(cli.config.as_deref())?;
    apply_cli_overrides(cli, &mut config);
    Ok(config)
}
