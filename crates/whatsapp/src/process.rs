//! Launching and stopping the WhatsApp Web sidecar, a Node.js program that
//! drives the automated browser and serves the sidecar WebSocket.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, BufReader},
        process::{Child, Command},
    },
    tracing::{Level, debug, error, info, trace, warn},
};

use crate::error::{Context as _, Error, Result};

/// Env var pointing at the sidecar directory.
pub const SIDECAR_DIR_ENV: &str = "WAGATE_SIDECAR_DIR";

/// Env var the sidecar reads its listen port from.
pub const SIDECAR_PORT_ENV: &str = "WAGATE_SIDECAR_PORT";

const MANIFEST: &str = "package.json";
const ENTRY: &str = "index.js";
const LOG_TARGET: &str = "whatsapp_sidecar";

const STARTUP_PROBE: Duration = Duration::from_millis(500);
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Installed layouts, relative to the executable.
const EXE_RELATIVE_DIRS: &[&str] = &[
    "../sidecar/whatsapp-web",
    "../../sidecar/whatsapp-web",
    "../share/wagate/sidecar",
];

/// Checkout layouts, relative to the working directory.
const CWD_RELATIVE_DIRS: &[&str] = &[
    "sidecar/whatsapp-web",
    "../sidecar/whatsapp-web",
    "../../sidecar/whatsapp-web",
];

/// Where and how to start the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Holds the sidecar's `package.json` and `index.js`.
    pub sidecar_dir: PathBuf,
    pub port: u16,
}

fn is_sidecar_dir(dir: &Path) -> bool {
    dir.join(MANIFEST).is_file()
}

/// Candidate directories, most specific first.
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = std::env::var_os(SIDECAR_DIR_ENV) {
        dirs.push(PathBuf::from(dir));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.extend(EXE_RELATIVE_DIRS.iter().map(|rel| exe_dir.join(rel)));
    }
    dirs.extend(CWD_RELATIVE_DIRS.iter().map(PathBuf::from));
    dirs
}

/// Locate the sidecar directory.
///
/// An explicit directory must contain a `package.json`. Otherwise the
/// `WAGATE_SIDECAR_DIR` env var, installed layouts next to the executable and
/// checkout layouts under the working directory are tried in that order.
/// `None` means no sidecar is available locally.
pub fn find_sidecar_dir(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(dir) = explicit {
        if is_sidecar_dir(dir) {
            return Ok(Some(dir.to_path_buf()));
        }
        return Err(Error::Message(format!(
            "no {MANIFEST} in sidecar directory {}",
            dir.display()
        )));
    }

    let found = candidate_dirs().into_iter().find(|dir| is_sidecar_dir(dir));
    if let Some(dir) = &found {
        debug!(path = %dir.display(), "found whatsapp sidecar directory");
    }
    Ok(found.map(|dir| dir.canonicalize().unwrap_or(dir)))
}

/// A sidecar child process owned by the gateway.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the process to exit, killing it if it is still alive after a
    /// grace period.
    pub async fn stop(&mut self) -> Result<()> {
        info!(port = self.port, "stopping whatsapp sidecar");
        self.request_exit();

        match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status.context("failed to wait for sidecar")?;
                info!(%status, "whatsapp sidecar exited");
            },
            Err(_) => {
                warn!(
                    grace_secs = STOP_GRACE.as_secs(),
                    "whatsapp sidecar ignored SIGTERM, killing"
                );
                self.child.kill().await.context("failed to kill sidecar")?;
            },
        }
        Ok(())
    }

    #[cfg(unix)]
    fn request_exit(&mut self) {
        use nix::{
            sys::signal::{Signal, kill},
            unistd::Pid,
        };

        let Some(pid) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            debug!(pid, error = %e, "failed to signal sidecar");
        }
    }

    #[cfg(not(unix))]
    fn request_exit(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "failed to kill sidecar");
        }
    }
}

/// Install npm dependencies on first use, then spawn `node index.js` in the
/// sidecar directory with its output routed into `tracing`.
///
/// Fails when the process exits right away (missing node, broken install,
/// port in use).
pub async fn start_sidecar(config: SidecarConfig) -> Result<SidecarProcess> {
    let dir = &config.sidecar_dir;
    if !is_sidecar_dir(dir) {
        return Err(Error::Message(format!(
            "whatsapp sidecar not found at {}",
            dir.display()
        )));
    }
    ensure_dependencies(dir).await?;

    info!(path = %dir.display(), port = config.port, "starting whatsapp sidecar");
    let mut child = Command::new("node")
        .arg(ENTRY)
        .current_dir(dir)
        .env(SIDECAR_PORT_ENV, config.port.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn sidecar process")?;

    if let Some(stdout) = child.stdout.take() {
        forward_output(stdout, Level::INFO);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_output(stderr, Level::WARN);
    }

    tokio::time::sleep(STARTUP_PROBE).await;
    if let Some(status) = child
        .try_wait()
        .context("failed to check sidecar process status")?
    {
        return Err(Error::Message(format!(
            "sidecar process exited during startup with {status}"
        )));
    }

    info!(port = config.port, "whatsapp sidecar running");
    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

async fn ensure_dependencies(dir: &Path) -> Result<()> {
    if dir.join("node_modules").is_dir() {
        return Ok(());
    }
    info!(path = %dir.display(), "installing whatsapp sidecar dependencies");
    let output = Command::new("npm")
        .args(["install", "--omit=dev"])
        .current_dir(dir)
        .output()
        .await
        .context("failed to run npm install")?;
    if !output.status.success() {
        return Err(Error::Message(format!(
            "npm install failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

// ── Output forwarding ────────────────────────────────────────────────────────

fn forward_output<R>(reader: R, plain_level: Level)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => log_line(&line, plain_level),
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "sidecar output stream failed");
                    break;
                },
            }
        }
    });
}

/// Pino JSON lines keep their own level; anything else is logged at
/// `plain_level`.
fn log_line(line: &str, plain_level: Level) {
    let (level, msg) = parse_pino_line(line).unwrap_or_else(|| (plain_level, line.to_string()));
    match level {
        Level::TRACE => trace!(target: LOG_TARGET, "{msg}"),
        Level::DEBUG => debug!(target: LOG_TARGET, "{msg}"),
        Level::INFO => info!(target: LOG_TARGET, "{msg}"),
        Level::WARN => warn!(target: LOG_TARGET, "{msg}"),
        Level::ERROR => error!(target: LOG_TARGET, "{msg}"),
    }
}

/// Level and message of a pino log line (numeric levels 10 to 60).
fn parse_pino_line(line: &str) -> Option<(Level, String)> {
    if !line.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let level = match value.get("level").and_then(serde_json::Value::as_u64) {
        Some(..=10) => Level::TRACE,
        Some(11..=20) => Level::DEBUG,
        Some(21..=30) | None => Level::INFO,
        Some(31..=40) => Level::WARN,
        Some(_) => Level::ERROR,
    };
    let msg = value
        .get("msg")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(line)
        .to_string();
    Some((level, msg))
}
