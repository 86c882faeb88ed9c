//! WebSocket connection to the WhatsApp Web sidecar.
//!
//! Request frames carry a `requestId`; the matching `result` frame resolves
//! the waiting caller through a oneshot channel. Everything else is handed to
//! the [`MessageCallback`].

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    futures::{SinkExt, StreamExt},
    tokio::{
        sync::{mpsc, oneshot},
        task::JoinHandle,
    },
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    types::{GatewayMessage, SidecarMessage},
};

/// Callback invoked for every non-`result` frame from the sidecar.
pub type MessageCallback = Arc<dyn Fn(SidecarMessage) + Send + Sync>;

/// Outcome of a request: the vendor response, or its raw error value.
type RequestOutcome = std::result::Result<serde_json::Value, serde_json::Value>;

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<RequestOutcome>>>>;

struct ConnectionTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Drop for ConnectionTasks {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Cloneable handle to a live sidecar connection.
///
/// The socket tasks are aborted once the last clone is dropped.
#[derive(Clone)]
pub struct SidecarHandle {
    outgoing: mpsc::UnboundedSender<String>,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
    _tasks: Arc<ConnectionTasks>,
}

impl std::fmt::Debug for SidecarHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidecarHandle")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SidecarHandle {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Send a frame without waiting for a response.
    pub fn send(&self, msg: &GatewayMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let json = serde_json::to_string(msg)?;
        self.outgoing.send(json).map_err(|_| Error::NotConnected)
    }

    /// Send a request frame and wait for its `result`.
    ///
    /// `ok: false` results become [`Error::Delivery`] with the raw payload.
    pub async fn request(
        &self,
        msg: GatewayMessage,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let request_id = msg
            .request_id()
            .ok_or_else(|| Error::Message("frame has no request id".into()))?
            .to_string();

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request_id.clone(), tx);

        if let Err(e) = self.send(&msg) {
            lock(&self.pending).remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(response))) => Ok(response),
            Ok(Ok(Err(error))) => Err(Error::rejected(error)),
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => {
                lock(&self.pending).remove(&request_id);
                warn!(request_id, "sidecar request timed out");
                Err(Error::Timeout { request_id })
            },
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Connect to the sidecar once.
///
/// Returns the handle and a receiver that yields the close reason when the
/// socket goes away. Pending requests fail with [`Error::NotConnected`] at
/// that point.
pub async fn connect(
    url: &str,
    callback: MessageCallback,
) -> Result<(SidecarHandle, oneshot::Receiver<String>)> {
    let (ws, _) = connect_async(url).await?;
    info!(url, "connected to whatsapp sidecar");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
    let (closed_tx, closed_rx) = oneshot::channel::<String>();
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let connected = Arc::new(AtomicBool::new(true));

    let writer = tokio::spawn(async move {
        while let Some(frame) = outgoing_rx.recv().await {
            if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                debug!(error = %e, "sidecar write loop closed");
                break;
            }
        }
    });

    let reader_pending = Arc::clone(&pending);
    let reader_connected = Arc::clone(&connected);
    let reader = tokio::spawn(async move {
        let reason = loop {
            let text = match ws_rx.next().await {
                Some(Ok(Message::Text(t))) => t,
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "sidecar closed the connection".into());
                },
                Some(Ok(_)) => continue,
                Some(Err(e)) => break format!("sidecar connection error: {e}"),
                None => break "sidecar connection lost".to_string(),
            };

            match serde_json::from_str::<SidecarMessage>(text.as_str()) {
                Ok(SidecarMessage::Result {
                    request_id,
                    ok,
                    response,
                    error,
                }) => {
                    let waiter = lock(&reader_pending).remove(&request_id);
                    let Some(waiter) = waiter else {
                        debug!(request_id, "result for unknown or expired request");
                        continue;
                    };
                    let outcome = if ok {
                        Ok(response.unwrap_or(serde_json::Value::Null))
                    } else {
                        Err(error.unwrap_or(serde_json::Value::Null))
                    };
                    let _ = waiter.send(outcome);
                },
                Ok(msg) => callback(msg),
                Err(e) => warn!(error = %e, "ignoring unrecognised sidecar frame"),
            }
        };

        reader_connected.store(false, Ordering::Release);
        // Dropping the senders wakes every waiter with a closed-channel error.
        lock(&reader_pending).clear();
        info!(reason, "whatsapp sidecar disconnected");
        let _ = closed_tx.send(reason);
    });

    let handle = SidecarHandle {
        outgoing,
        pending,
        connected,
        _tasks: Arc::new(ConnectionTasks { reader, writer }),
    };
    Ok((handle, closed_rx))
}

/// Connect with a fixed delay between attempts, for a sidecar that may still
/// be starting.
pub async fn connect_with_retry(
    url: &str,
    callback: MessageCallback,
    attempts: u32,
    delay: Duration,
) -> Result<(SidecarHandle, oneshot::Receiver<String>)> {
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match connect(url, Arc::clone(&callback)).await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                debug!(url, attempt, error = %e, "sidecar connect attempt failed");
                last_err = Some(e);
            },
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    Err(last_err.unwrap_or(Error::NotConnected))
}
