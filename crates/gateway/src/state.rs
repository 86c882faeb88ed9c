use std::sync::Arc;

use {
    tokio::sync::{RwLock, broadcast},
    wagate_config::WhatsAppConfig,
    wagate_whatsapp::{ConnectionState, MediaFetcher, MessagingClient},
};

use crate::broadcast::{Broadcaster, EVENT_AUTHENTICATED, EVENT_QR, EVENT_READY, PushFrame};

// ── Status texts ─────────────────────────────────────────────────────────────

pub const CONNECTING_TEXT: &str = "Connecting...";
pub const SCAN_QR_TEXT: &str = "Please Scan QR Code";
pub const AUTHENTICATED_TEXT: &str = "authenticated!";
pub const READY_TEXT: &str = "Connected!";

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared runtime state for the HTTP handlers, the push channel and the
/// lifecycle pump.
pub struct GatewayState {
    pub version: String,
    pub client: Arc<dyn MessagingClient>,
    pub broadcaster: Broadcaster,
    pub media: MediaFetcher,
    /// Prefix substituted for a leading `0` in phone numbers.
    pub country_code: String,
    /// Written only by the lifecycle pump.
    connection: RwLock<ConnectionState>,
}

impl GatewayState {
    pub fn new(client: Arc<dyn MessagingClient>, config: &WhatsAppConfig) -> Arc<Self> {
        Arc::new(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            client,
            broadcaster: Broadcaster::default(),
            media: MediaFetcher::new(config.max_media_bytes),
            country_code: config.country_code.clone(),
            connection: RwLock::new(ConnectionState::Disconnected),
        })
    }

    pub async fn connection(&self) -> ConnectionState {
        self.connection.read().await.clone()
    }

    /// Move to `next` and broadcast `frames`.
    ///
    /// Both happen under the state write lock so a UI connection that
    /// subscribes concurrently sees each frame exactly once, either in its
    /// snapshot or live.
    pub async fn transition(
        &self,
        next: ConnectionState,
        frames: impl IntoIterator<Item = PushFrame>,
    ) {
        let mut connection = self.connection.write().await;
        *connection = next;
        for frame in frames {
            self.broadcaster.send(frame);
        }
    }

    /// Subscribe to live frames and get the frames describing the current
    /// state.
    pub async fn subscribe(&self) -> (broadcast::Receiver<PushFrame>, Vec<PushFrame>) {
        let connection = self.connection.read().await;
        let rx = self.broadcaster.subscribe();
        (rx, snapshot_frames(&connection))
    }

    /// Number of UI connections on the push channel.
    pub fn ui_client_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }
}

/// Frames a newly connected UI needs to catch up with `state`.
pub fn snapshot_frames(state: &ConnectionState) -> Vec<PushFrame> {
    match state {
        ConnectionState::Disconnected => Vec::new(),
        ConnectionState::QrPending(data_url) => vec![
            PushFrame::new(EVENT_QR, data_url.as_str()),
            PushFrame::message(SCAN_QR_TEXT),
        ],
        ConnectionState::Authenticated => vec![
            PushFrame::new(EVENT_AUTHENTICATED, AUTHENTICATED_TEXT),
            PushFrame::message(AUTHENTICATED_TEXT),
        ],
        ConnectionState::Ready => vec![
            PushFrame::new(EVENT_AUTHENTICATED, AUTHENTICATED_TEXT),
            PushFrame::new(EVENT_READY, READY_TEXT),
            PushFrame::message(READY_TEXT),
        ],
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn events(frames: &[PushFrame]) -> Vec<&str> {
        frames.iter().map(|f| f.event.as_str()).collect()
    }

    #[test]
    fn disconnected_has_no_snapshot() {
        assert!(snapshot_frames(&ConnectionState::Disconnected).is_empty());
    }

    #[test]
    fn qr_snapshot_replays_image_then_prompt() {
        let frames =
            snapshot_frames(&ConnectionState::QrPending("data:image/png;base64,AA".into()));
        assert_eq!(events(&frames), ["qr", "message"]);
        assert_eq!(frames[0].data, "data:image/png;base64,AA");
        assert_eq!(frames[1].data, SCAN_QR_TEXT);
    }

    #[test]
    fn ready_snapshot_includes_authenticated() {
        let frames = snapshot_frames(&ConnectionState::Ready);
        assert_eq!(events(&frames), ["authenticated", "ready", "message"]);
        assert_eq!(frames[2].data, READY_TEXT);
    }
}
