//! Core domain + application logic for the meter-readings bot.
//!
//! This crate is intentionally framework-agnostic. Telegram, Google Sheets,
//! Redis and the currency feed live behind ports (traits) implemented in
//! adapter crates.

pub mod commands;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod locks;
pub mod logging;
pub mod messaging;
pub mod meters;
pub mod ports;
pub mod rates;
pub mod security;
pub mod store;
pub mod validate;

pub use errors::{Error, Result};
