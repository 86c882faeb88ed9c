//! Wire protocol between the gateway and the WhatsApp Web sidecar.
//!
//! Both directions are JSON text frames tagged by `type`, camelCase fields.

use {
    serde::{Deserialize, Serialize},
    wagate_common::types::InboundMessage,
};

use crate::session::Session;

/// Media attached to a `sendMedia` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub mimetype: String,
    /// Base64-encoded file contents.
    pub data: String,
    pub filename: String,
}

/// Messages sent from the gateway to the sidecar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GatewayMessage {
    /// Start (or restart) the automated browser session.
    #[serde(rename_all = "camelCase")]
    Init {
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<Session>,
        headless: bool,
        puppeteer_args: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    IsRegistered { request_id: String, number: String },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        request_id: String,
        number: String,
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    SendMedia {
        request_id: String,
        number: String,
        media: MediaPayload,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    /// Quoted reply to a received message.
    #[serde(rename_all = "camelCase")]
    Reply {
        request_id: String,
        chat_id: String,
        message_id: String,
        body: String,
    },
}

impl GatewayMessage {
    /// Correlation ID for request/response messages.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Init { .. } => None,
            Self::IsRegistered { request_id, .. }
            | Self::SendMessage { request_id, .. }
            | Self::SendMedia { request_id, .. }
            | Self::Reply { request_id, .. } => Some(request_id),
        }
    }
}

/// Messages sent from the sidecar to the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SidecarMessage {
    /// Raw QR payload to be scanned by the phone.
    Qr { qr: String },
    Authenticated {
        #[serde(default)]
        session: Option<Session>,
    },
    Ready,
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    Message(InboundMessage),
    /// Response to a request carrying `request_id`.
    #[serde(rename_all = "camelCase")]
    Result {
        request_id: String,
        ok: bool,
        #[serde(default)]
        response: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<serde_json::Value>,
    },
}

/// Connection lifecycle as observed through sidecar events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Waiting for a scan; holds the QR image as a data URL.
    QrPending(String),
    Authenticated,
    Ready,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::QrPending(_) => "qr-pending",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
        }
    }
}
