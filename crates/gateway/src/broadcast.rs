use {
    serde::{Deserialize, Serialize},
    tokio::sync::broadcast,
    tracing::debug,
};

// ── Push events ──────────────────────────────────────────────────────────────

pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_QR: &str = "qr";
pub const EVENT_AUTHENTICATED: &str = "authenticated";
pub const EVENT_READY: &str = "ready";

/// Frames buffered per UI client before it starts skipping.
pub const DEFAULT_CAPACITY: usize = 64;

/// One server-to-UI push frame: `{"event": "...", "data": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    pub data: String,
}

impl PushFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Status line shown in the UI log.
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(EVENT_MESSAGE, data)
    }
}

// ── Broadcaster ──────────────────────────────────────────────────────────────

/// Fan-out of push frames to every subscribed UI connection.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<PushFrame>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushFrame> {
        self.tx.subscribe()
    }

    /// Send `frame` to all current subscribers. Returns how many received it.
    pub fn send(&self, frame: PushFrame) -> usize {
        let event = frame.event.clone();
        match self.tx.send(frame) {
            Ok(clients) => {
                debug!(event = %event, clients, "broadcasting push frame");
                clients
            },
            // No UI connected; nothing to deliver.
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
