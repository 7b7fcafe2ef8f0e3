//! # ptzcam-cli: PTZ operator console
//!
//! Loads a TOML configuration, opens the JSON endpoint and preset stores,
//! and drives a `ptzcam_core::Dispatcher` from line commands on stdin.

pub mod config;
pub mod console;
