//! AV Controls - browser control panel for AV receivers and IR transmitters
//!
//! This library provides:
//! - A device API client and command relay (channel, volume, power, IR)
//! - A file-backed configuration store with rotating backups
//! - The axum router serving the control and settings pages

// =============================================================================
// Lints - Enforce code quality and consistency
// =============================================================================

#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod api;
pub mod config;
pub mod control;
pub mod device;
pub mod logging;
pub mod store;
pub mod ui;
