//! Alert rendering and delivery.
//!
//! This crate provides:
//! - Telegram HTML rendering of alerts, the started notice and the daily digest
//! - Telegram bot delivery behind a rate-limited queue
//! - SQLite storage for the last snapshot and alert history

pub mod db;
pub mod formatter;
pub mod notifier;
pub mod telegram;

pub use db::{Database, DbError};
pub use formatter::*;
pub use notifier::{start_notifier, NotifierConfig, NotifierHandle};
pub use telegram::{MessageTransport, TelegramBot, TelegramError};
