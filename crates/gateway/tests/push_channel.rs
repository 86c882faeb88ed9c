#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the `/ws` push channel driven by the lifecycle pump.

mod common;

use std::{sync::Arc, time::Duration};

use {
    futures::StreamExt,
    serde_json::json,
    tokio::{net::TcpStream, sync::mpsc},
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
};

use {
    wagate_auto_reply::AutoReplyRules,
    wagate_common::types::InboundMessage,
    wagate_config::AutoReplyConfig,
    wagate_gateway::{GatewayState, PushFrame, run_lifecycle},
    wagate_whatsapp::{ClientEvent, ConnectionState, Session, SessionStore},
};

use common::{Call, FakeClient, start_test_server, test_state};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Harness {
    client: Arc<FakeClient>,
    state: Arc<GatewayState>,
    events: mpsc::UnboundedSender<ClientEvent>,
    base: String,
    session_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let session_path = dir.path().join("wa-session.json");
        let client = Arc::new(FakeClient::default());
        let state = test_state(Arc::clone(&client));
        let (events, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_lifecycle(
            Arc::clone(&state),
            SessionStore::new(&session_path),
            AutoReplyRules::from_config(&AutoReplyConfig::default()),
            events_rx,
        ));
        let addr = start_test_server(Arc::clone(&state)).await;
        Self {
            client,
            state,
            events,
            base: format!("ws://{addr}/ws"),
            session_path,
            _dir: dir,
        }
    }

    fn emit(&self, event: ClientEvent) {
        self.events.send(event).unwrap();
    }

    fn store(&self) -> SessionStore {
        SessionStore::new(&self.session_path)
    }

    /// Connect a UI client and consume its greeting.
    async fn connect(&self) -> Ws {
        let (mut ws, _) = connect_async(self.base.as_str()).await.unwrap();
        assert_eq!(next_frame(&mut ws).await, PushFrame::message("Connecting..."));
        ws
    }

    async fn wait_for_state(&self, expected: fn(&ConnectionState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !expected(&self.state.connection().await) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("state never reached");
    }
}

async fn next_frame(ws: &mut Ws) -> PushFrame {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for push frame")
            .expect("push channel closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn inbound(body: &str) -> InboundMessage {
    InboundMessage {
        id: "false_6281234@c.us_3EB0AA".into(),
        from: "6281234@c.us".into(),
        body: body.into(),
        from_me: false,
    }
}

#[tokio::test]
async fn ui_follows_login_lifecycle_in_order() {
    let h = Harness::start().await;
    let mut ws = h.connect().await;

    h.emit(ClientEvent::Qr("2@AbCdEf,GhIjKl==".into()));
    let qr = next_frame(&mut ws).await;
    assert_eq!(qr.event, "qr");
    assert!(qr.data.starts_with("data:image/png;base64,"));
    assert_eq!(next_frame(&mut ws).await, PushFrame::message("Please Scan QR Code"));

    h.emit(ClientEvent::Authenticated(Some(Session::new(
        json!({ "WAToken1": "token" }),
    ))));
    assert_eq!(
        next_frame(&mut ws).await,
        PushFrame::new("authenticated", "authenticated!")
    );
    assert_eq!(next_frame(&mut ws).await, PushFrame::message("authenticated!"));

    h.emit(ClientEvent::Ready);
    assert_eq!(next_frame(&mut ws).await, PushFrame::new("ready", "Connected!"));
    assert_eq!(next_frame(&mut ws).await, PushFrame::message("Connected!"));

    // Saved before the authenticated frames went out.
    let saved = h.store().load().await.unwrap().unwrap();
    assert_eq!(saved.as_value()["WAToken1"], "token");
}

#[tokio::test]
async fn every_ui_client_receives_each_frame() {
    let h = Harness::start().await;
    let mut first = h.connect().await;
    let mut second = h.connect().await;

    h.emit(ClientEvent::Ready);
    for ws in [&mut first, &mut second] {
        assert_eq!(next_frame(ws).await, PushFrame::new("ready", "Connected!"));
        assert_eq!(next_frame(ws).await, PushFrame::message("Connected!"));
    }
}

#[tokio::test]
async fn late_client_gets_pending_qr() {
    let h = Harness::start().await;
    h.emit(ClientEvent::Qr("2@late".into()));
    h.wait_for_state(|s| matches!(s, ConnectionState::QrPending(_)))
        .await;

    let mut ws = h.connect().await;
    let qr = next_frame(&mut ws).await;
    assert_eq!(qr.event, "qr");
    assert!(qr.data.starts_with("data:image/png;base64,"));
    assert_eq!(next_frame(&mut ws).await, PushFrame::message("Please Scan QR Code"));
}

#[tokio::test]
async fn late_client_catches_up_with_ready_session() {
    let h = Harness::start().await;
    h.emit(ClientEvent::Authenticated(None));
    h.emit(ClientEvent::Ready);
    h.wait_for_state(|s| *s == ConnectionState::Ready).await;

    let mut ws = h.connect().await;
    assert_eq!(
        next_frame(&mut ws).await,
        PushFrame::new("authenticated", "authenticated!")
    );
    assert_eq!(next_frame(&mut ws).await, PushFrame::new("ready", "Connected!"));
    assert_eq!(next_frame(&mut ws).await, PushFrame::message("Connected!"));

    let health_url = h.base.replace("ws://", "http://").replace("/ws", "/health");
    let health: serde_json::Value = reqwest::get(health_url)
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["connection"], "ready");
    assert_eq!(health["clients"], 1);
}

#[tokio::test]
async fn auth_failure_clears_stored_session() {
    let h = Harness::start().await;
    h.store()
        .save(&Session::new(json!({ "WAToken1": "stale" })))
        .await
        .unwrap();
    let mut ws = h.connect().await;

    h.emit(ClientEvent::AuthFailure("restore failed".into()));
    assert_eq!(
        next_frame(&mut ws).await,
        PushFrame::message("Authentication failure, restarting...")
    );
    assert!(h.store().load().await.unwrap().is_none());
    assert_eq!(h.state.connection().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_is_reported_with_reason() {
    let h = Harness::start().await;
    let mut ws = h.connect().await;

    h.emit(ClientEvent::Ready);
    next_frame(&mut ws).await;
    next_frame(&mut ws).await;

    h.emit(ClientEvent::Disconnected("sidecar connection closed".into()));
    assert_eq!(
        next_frame(&mut ws).await,
        PushFrame::message("Disconnected: sidecar connection closed")
    );
    assert_eq!(h.state.connection().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn inbound_messages_get_auto_replies() {
    let h = Harness::start().await;
    h.emit(ClientEvent::Message(inbound("no rule for this")));
    h.emit(ClientEvent::Message(InboundMessage {
        from_me: true,
        ..inbound("hi")
    }));
    h.emit(ClientEvent::Message(inbound("hi")));

    let calls = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let calls = h.client.calls();
            if !calls.is_empty() {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no auto-reply sent");

    assert_eq!(calls, vec![Call::Reply {
        to: "6281234@c.us".into(),
        message_id: "false_6281234@c.us_3EB0AA".into(),
        body: "hello".into(),
    }]);
}
