//! Flavor admission webhook server
//!
//! Wires the flavor gate from `flavor-lib` to an HTTPS admission endpoint and
//! a plain HTTP health/metrics endpoint.

pub mod api;
pub mod config;
pub mod server;
