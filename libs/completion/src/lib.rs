//! YandexGPT completion client. Builds a stateless request around a fixed
//! system instruction, extracts the first alternative's text, and maps every
//! failure to a fixed user-facing reply.

pub mod client;
pub mod config;

pub use client::*;
pub use config::*;
