//! HTTP Client module for alarm-button.
//!
//! This module provides the HTTP client functionality for communicating
//! with the alarm server.

pub mod api;

pub use api::AlarmClient;
