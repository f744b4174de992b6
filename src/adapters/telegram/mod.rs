//! Telegram Adapters
//!
//! `TelegramDelivery` implements the `Delivery` port with the Bot API
//! `sendMessage` method.

pub mod bot;

pub use bot::{TelegramDelivery, TELEGRAM_MAX_MESSAGE_CHARS};
