//! Integration tests for Lakeview.
//!
//! All tests run against in-process mock services.

pub mod builder_test;
pub mod cache_test;
pub mod server_test;
