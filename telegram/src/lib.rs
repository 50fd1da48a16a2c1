//! Telegram Bot API client and the inbound access gate.

pub mod client;
pub mod config;
pub mod errors;
pub mod gate;
pub mod metrics_defs;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testutils;

pub use client::BotClient;
pub use errors::TelegramError;
