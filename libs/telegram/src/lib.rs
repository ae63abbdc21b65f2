//! Telegram surface of the bridge: serde schemas for inbound webhook
//! updates and the outbound Bot API client.

pub mod api;
pub mod types;

pub use api::*;
pub use types::*;
