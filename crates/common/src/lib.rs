//! Shared types and the error-context helpers used across wagate crates.

pub mod error;
pub mod types;

pub use error::FromMessage;
