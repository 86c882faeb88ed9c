//! Canned replies to inbound messages.
//!
//! Flow: inbound message → skip own messages → exact-match the body against
//! the configured triggers → reply text for the first match.

pub mod reply;

pub use reply::AutoReplyRules;
