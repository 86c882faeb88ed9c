//! HTTP and push-channel front end for wagate.
//!
//! Lifecycle:
//! 1. The binary starts a [`wagate_whatsapp::MessagingClient`] and hands its
//!    event stream to [`lifecycle::run_lifecycle`]
//! 2. The lifecycle pump tracks connection state, persists the session and
//!    fans events out through the [`broadcast::Broadcaster`]
//! 3. UI clients on `/ws` receive a snapshot, then live frames
//! 4. `/send-message` and `/send-media` validate and forward to the client

pub mod broadcast;
pub mod error;
pub mod lifecycle;
pub mod qr;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use {
    broadcast::{Broadcaster, PushFrame},
    lifecycle::run_lifecycle,
    server::{build_gateway_app, start_gateway},
    state::GatewayState,
};
