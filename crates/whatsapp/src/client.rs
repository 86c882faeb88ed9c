//! Messaging client adapter.
//!
//! [`MessagingClient`] is the seam the HTTP layer and auto-reply talk to.
//! [`SidecarClient`] implements it on top of the WhatsApp Web sidecar and
//! keeps the connection alive, re-sending the stored session on every
//! reconnect.

use std::{
    sync::{Arc, RwLock as StdRwLock},
    time::Duration,
};

use {
    async_trait::async_trait,
    serde::Serialize,
    tokio::{
        sync::{RwLock, mpsc},
        task::JoinHandle,
    },
    tracing::{info, warn},
    wagate_common::types::InboundMessage,
};

use crate::{
    error::{Error, Result},
    session::Session,
    sidecar::{MessageCallback, SidecarHandle, connect_with_retry},
    types::{GatewayMessage, MediaPayload, SidecarMessage},
};

/// Vendor response to a successful send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeliveryReceipt(pub serde_json::Value);

/// Lifecycle and inbound events pushed by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Raw QR payload; the phone must scan it to log in.
    Qr(String),
    /// Login succeeded. Carries the session blob when the vendor exposes one.
    Authenticated(Option<Session>),
    Ready,
    /// The vendor rejected the stored session.
    AuthFailure(String),
    Disconnected(String),
    Message(InboundMessage),
}

#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Whether `address` belongs to a WhatsApp account.
    async fn is_registered(&self, address: &str) -> Result<bool>;

    async fn send_text(&self, address: &str, body: &str) -> Result<DeliveryReceipt>;

    async fn send_media(
        &self,
        address: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt>;

    /// Quoted reply to a received message.
    async fn reply(&self, message: &InboundMessage, body: &str) -> Result<DeliveryReceipt>;
}

/// Settings for [`SidecarClient`].
#[derive(Debug, Clone)]
pub struct SidecarClientConfig {
    pub url: String,
    pub headless: bool,
    pub puppeteer_args: Vec<String>,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
    /// Connect attempts per (re)connect round.
    pub connect_attempts: u32,
}

impl Default for SidecarClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765".into(),
            headless: true,
            puppeteer_args: Vec::new(),
            request_timeout: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(5),
            connect_attempts: 10,
        }
    }
}

struct Shared {
    config: SidecarClientConfig,
    handle: RwLock<Option<SidecarHandle>>,
    /// Latest session seen, replayed in `init` after a reconnect.
    session: StdRwLock<Option<Session>>,
}

/// [`MessagingClient`] backed by the WhatsApp Web sidecar.
pub struct SidecarClient {
    shared: Arc<Shared>,
    supervisor: JoinHandle<()>,
}

impl SidecarClient {
    /// Spawn the connection supervisor.
    ///
    /// Returns the client and the single stream of lifecycle events. The
    /// stream ends when the client is dropped.
    pub fn start(
        config: SidecarClientConfig,
        session: Option<Session>,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            config,
            handle: RwLock::new(None),
            session: StdRwLock::new(session),
        });
        let supervisor = tokio::spawn(supervise(Arc::clone(&shared), events_tx));
        (Self { shared, supervisor }, events_rx)
    }

    /// Whether a sidecar connection is currently up.
    pub async fn is_connected(&self) -> bool {
        self.shared
            .handle
            .read()
            .await
            .as_ref()
            .is_some_and(SidecarHandle::is_connected)
    }

    async fn request(&self, msg: GatewayMessage) -> Result<serde_json::Value> {
        let handle = self
            .shared
            .handle
            .read()
            .await
            .clone()
            .filter(SidecarHandle::is_connected)
            .ok_or(Error::NotConnected)?;
        handle.request(msg, self.shared.config.request_timeout).await
    }
}

impl Drop for SidecarClient {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
impl MessagingClient for SidecarClient {
    async fn is_registered(&self, address: &str) -> Result<bool> {
        let response = self
            .request(GatewayMessage::IsRegistered {
                request_id: new_request_id(),
                number: address.to_string(),
            })
            .await?;
        response
            .as_bool()
            .ok_or_else(|| Error::delivery(format!("unexpected isRegistered response: {response}")))
    }

    async fn send_text(&self, address: &str, body: &str) -> Result<DeliveryReceipt> {
        self.request(GatewayMessage::SendMessage {
            request_id: new_request_id(),
            number: address.to_string(),
            body: body.to_string(),
        })
        .await
        .map(DeliveryReceipt)
    }

    async fn send_media(
        &self,
        address: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        self.request(GatewayMessage::SendMedia {
            request_id: new_request_id(),
            number: address.to_string(),
            media,
            caption: caption.map(String::from),
        })
        .await
        .map(DeliveryReceipt)
    }

    async fn reply(&self, message: &InboundMessage, body: &str) -> Result<DeliveryReceipt> {
        self.request(GatewayMessage::Reply {
            request_id: new_request_id(),
            chat_id: message.from.clone(),
            message_id: message.id.clone(),
            body: body.to_string(),
        })
        .await
        .map(DeliveryReceipt)
    }
}

/// Keep one sidecar connection alive, forwarding its events.
async fn supervise(shared: Arc<Shared>, events: mpsc::UnboundedSender<ClientEvent>) {
    // Weak: the connection tasks are owned by `shared` through the handle.
    let callback: MessageCallback = {
        let shared = Arc::downgrade(&shared);
        let events = events.clone();
        Arc::new(move |msg| {
            if let Some(shared) = shared.upgrade() {
                handle_sidecar_message(msg, &shared, &events);
            }
        })
    };
    // Report an unreachable sidecar once per outage, not on every round.
    let mut outage_reported = false;

    loop {
        let config = &shared.config;
        match connect_with_retry(
            &config.url,
            Arc::clone(&callback),
            config.connect_attempts,
            config.reconnect_delay,
        )
        .await
        {
            Ok((handle, closed)) => {
                outage_reported = false;
                let session = shared
                    .session
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                info!(
                    url = %config.url,
                    has_session = session.is_some(),
                    "initializing whatsapp client"
                );
                let init = GatewayMessage::Init {
                    session,
                    headless: config.headless,
                    puppeteer_args: config.puppeteer_args.clone(),
                };
                // Publish the handle first so requests work as soon as the
                // sidecar reports ready.
                *shared.handle.write().await = Some(handle.clone());
                if let Err(e) = handle.send(&init) {
                    warn!(error = %e, "failed to send init to sidecar");
                }
                drop(handle);

                let reason = closed
                    .await
                    .unwrap_or_else(|_| "sidecar connection dropped".into());
                *shared.handle.write().await = None;
                if events.send(ClientEvent::Disconnected(reason)).is_err() {
                    return;
                }
            },
            Err(e) => {
                warn!(url = %config.url, error = %e, "whatsapp sidecar unreachable");
                if !outage_reported {
                    outage_reported = true;
                    let reason = format!("sidecar unreachable: {e}");
                    if events.send(ClientEvent::Disconnected(reason)).is_err() {
                        return;
                    }
                }
            },
        }
        tokio::time::sleep(shared.config.reconnect_delay).await;
    }
}

fn handle_sidecar_message(
    msg: SidecarMessage,
    shared: &Shared,
    events: &mpsc::UnboundedSender<ClientEvent>,
) {
    let event = match msg {
        SidecarMessage::Qr { qr } => ClientEvent::Qr(qr),
        SidecarMessage::Authenticated { session } => {
            if let Some(session) = &session {
                *shared.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
            }
            ClientEvent::Authenticated(session)
        },
        SidecarMessage::Ready => ClientEvent::Ready,
        SidecarMessage::AuthFailure { message } => {
            *shared.session.write().unwrap_or_else(|e| e.into_inner()) = None;
            ClientEvent::AuthFailure(message)
        },
        SidecarMessage::Disconnected { reason } => ClientEvent::Disconnected(reason),
        SidecarMessage::Message(inbound) => ClientEvent::Message(inbound),
        // Results are resolved by the connection itself.
        SidecarMessage::Result { .. } => return,
    };
    let _ = events.send(event);
}
