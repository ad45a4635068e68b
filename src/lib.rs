//! alarm-button - office alarm button
//!
//! A small server holds one shared alarm flag. Pressing the alarm-on button
//! on any workstation raises the flag and powers that machine off; checker
//! daemons on the other workstations see the raised flag and power their
//! machines off too. The alarm-off button lowers the flag again.
//!
//! # Modules
//!
//! - [`server`] - HTTP/JSON API holding the alarm flag
//! - [`client`] - typed client for that API
//! - [`button`] - alarm-on and alarm-off buttons
//! - [`checker`] - polling daemon that shuts the machine down
//! - [`update`] - release packager and updater
//! - [`config`] - settings file parsing and validation
//! - [`error`] - error types and error handling

pub mod button;
pub mod checker;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod power;
pub mod repository;
pub mod server;
pub mod service;
pub mod update;

// Re-exports for convenience
pub use client::AlarmClient;
pub use config::Config;
pub use domain::{Actor, State};
pub use error::{AlarmError, ErrorCode, Result};
pub use service::AlarmService;
