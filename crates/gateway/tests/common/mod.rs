//! Shared harness: a recording fake messaging client and a test server.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    serde_json::json,
    tokio::net::TcpListener,
    wagate_common::types::InboundMessage,
    wagate_config::WhatsAppConfig,
    wagate_gateway::{GatewayState, build_gateway_app},
    wagate_whatsapp::{DeliveryReceipt, Error, MediaPayload, MessagingClient, Result},
};

/// Every call the gateway made on the fake client.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Text { to: String, body: String },
    Media {
        to: String,
        media: MediaPayload,
        caption: Option<String>,
    },
    Reply { to: String, message_id: String, body: String },
}

/// Numbers starting with 999 are unregistered. A body of "fail" is
/// rejected by the vendor; "offline" behaves like a dropped sidecar.
#[derive(Default)]
pub struct FakeClient {
    pub calls: Mutex<Vec<Call>>,
}

impl FakeClient {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> DeliveryReceipt {
        self.calls.lock().unwrap().push(call);
        DeliveryReceipt(json!({ "id": { "fromMe": true, "id": "3EB0FAKE" }, "ack": 0 }))
    }
}

fn outcome(body: &str) -> Result<()> {
    match body {
        "fail" => Err(Error::rejected(json!({ "message": "Evaluation failed" }))),
        "offline" => Err(Error::NotConnected),
        _ => Ok(()),
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    async fn is_registered(&self, address: &str) -> Result<bool> {
        Ok(!address.starts_with("999"))
    }

    async fn send_text(&self, address: &str, body: &str) -> Result<DeliveryReceipt> {
        outcome(body)?;
        Ok(self.record(Call::Text {
            to: address.into(),
            body: body.into(),
        }))
    }

    async fn send_media(
        &self,
        address: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        outcome(caption.unwrap_or_default())?;
        Ok(self.record(Call::Media {
            to: address.into(),
            media,
            caption: caption.map(String::from),
        }))
    }

    async fn reply(&self, message: &InboundMessage, body: &str) -> Result<DeliveryReceipt> {
        Ok(self.record(Call::Reply {
            to: message.from.clone(),
            message_id: message.id.clone(),
            body: body.into(),
        }))
    }
}

pub fn test_state(client: Arc<FakeClient>) -> Arc<GatewayState> {
    GatewayState::new(client, &WhatsAppConfig::default())
}

/// Serve `state` on an ephemeral port, return the bound address.
pub async fn start_test_server(state: Arc<GatewayState>) -> SocketAddr {
    let app = build_gateway_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}
