//! The single consumer of messaging client events.

use std::sync::Arc;

use {
    tokio::sync::mpsc,
    tracing::{error, info, warn},
    wagate_auto_reply::AutoReplyRules,
    wagate_whatsapp::{ClientEvent, ConnectionState, SessionStore},
};

use crate::{
    broadcast::{EVENT_AUTHENTICATED, EVENT_QR, EVENT_READY, PushFrame},
    qr::qr_data_url,
    state::{AUTHENTICATED_TEXT, GatewayState, READY_TEXT, SCAN_QR_TEXT},
};

pub const AUTH_FAILURE_TEXT: &str = "Authentication failure, restarting...";

/// Consume `events` until the client's stream ends: track connection
/// state, persist the session, fan frames out to UI connections and answer
/// auto-reply messages.
pub async fn run_lifecycle(
    state: Arc<GatewayState>,
    store: SessionStore,
    rules: AutoReplyRules,
    mut events: mpsc::UnboundedReceiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        handle_event(&state, &store, &rules, event).await;
    }
    info!("whatsapp event stream closed");
}

async fn handle_event(
    state: &Arc<GatewayState>,
    store: &SessionStore,
    rules: &AutoReplyRules,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Qr(raw) => {
            info!("whatsapp qr code received");
            let data_url = match qr_data_url(&raw) {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "failed to render qr code");
                    return;
                },
            };
            let frames = [
                PushFrame::new(EVENT_QR, data_url.as_str()),
                PushFrame::message(SCAN_QR_TEXT),
            ];
            state
                .transition(ConnectionState::QrPending(data_url), frames)
                .await;
        },
        ClientEvent::Authenticated(session) => {
            info!(has_session = session.is_some(), "whatsapp authenticated");
            if let Some(session) = session
                && let Err(e) = store.save(&session).await
            {
                error!(error = %e, "failed to persist whatsapp session");
            }
            let frames = [
                PushFrame::new(EVENT_AUTHENTICATED, AUTHENTICATED_TEXT),
                PushFrame::message(AUTHENTICATED_TEXT),
            ];
            state
                .transition(ConnectionState::Authenticated, frames)
                .await;
        },
        ClientEvent::Ready => {
            info!("whatsapp client ready");
            let frames = [
                PushFrame::new(EVENT_READY, READY_TEXT),
                PushFrame::message(READY_TEXT),
            ];
            state.transition(ConnectionState::Ready, frames).await;
        },
        ClientEvent::AuthFailure(message) => {
            warn!(message = %message, "whatsapp authentication failed, clearing session");
            if let Err(e) = store.clear().await {
                error!(error = %e, "failed to clear whatsapp session");
            }
            let frames = [PushFrame::message(AUTH_FAILURE_TEXT)];
            state
                .transition(ConnectionState::Disconnected, frames)
                .await;
        },
        ClientEvent::Disconnected(reason) => {
            warn!(reason = %reason, "whatsapp client disconnected");
            let frames = [PushFrame::message(format!("Disconnected: {reason}"))];
            state
                .transition(ConnectionState::Disconnected, frames)
                .await;
        },
        ClientEvent::Message(inbound) => {
            let Some(reply) = rules.reply_for(&inbound) else {
                return;
            };
            // Replies may wait on the client; keep the pump moving.
            let client = Arc::clone(&state.client);
            let reply = reply.to_string();
            tokio::spawn(async move {
                if let Err(e) = client.reply(&inbound, &reply).await {
                    warn!(to = %inbound.from, error = %e, "auto-reply failed");
                }
            });
        },
    }
}
