//! Lakeview - an operator dashboard server for ad-hoc log analytics.
//!
//! This library exposes the core modules for the binary and for use in
//! integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod schema;
pub mod server;
pub mod service;
