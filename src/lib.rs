//! SignalRoom Backend Library
//!
//! Membership-gated chat backend for trading-signal rooms. Exposes the
//! core modules for use by the server binary and integration tests.

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod models;
pub mod rooms;
pub mod signal;
