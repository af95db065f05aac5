//! Paircast CLI
//!
//! Thin demonstration binary around `paircast-runtime`: argument parsing,
//! toml configuration, a JSON preference store, and the TCP bridge to the
//! local peer-connection service.

pub mod app;
pub mod cli;
pub mod config;
pub mod connector;
pub mod store;
