//! Core domain + application logic for the group moderation bot.
//!
//! This crate is intentionally framework-agnostic. Telegram (and the other bot
//! services we talk to through the exchange channel) live behind ports (traits)
//! implemented here over a `Transport`, or in adapter crates.

pub mod background;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod evidence;
pub mod exchange;
pub mod formatting;
pub mod logging;
pub mod options;
pub mod parser;
pub mod persistence;
pub mod ports;
pub mod registry;
pub mod report;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
