//! pcwatch kernel - status/history API and RDP remediation gateway
//!
//! The binary in `main.rs` only wires these modules together; everything is
//! exposed here so integration tests can drive the router directly.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod remediation;
pub mod store;
