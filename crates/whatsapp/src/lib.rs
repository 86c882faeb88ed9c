//! WhatsApp Web adapter for wagate.
//!
//! The browser automation lives in a sidecar process reached over a local
//! WebSocket. This crate owns the wire protocol, the connection supervisor,
//! the session file, phone number formatting, and media fetching.

pub mod client;
pub mod error;
pub mod formatter;
pub mod media;
pub mod process;
pub mod session;
pub mod sidecar;
pub mod types;

pub use {
    client::{ClientEvent, DeliveryReceipt, MessagingClient, SidecarClient, SidecarClientConfig},
    error::{Error, Result},
    formatter::format_phone_number,
    media::MediaFetcher,
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir, start_sidecar},
    session::{Session, SessionStore},
    types::{ConnectionState, MediaPayload},
};
