//! # ferrokv-server
//!
//! Ties the typed store to the network: command dispatch, connection
//! I/O, the two listener modes, and process configuration. Exposed as a
//! library too so integration tests can drive a real listener on an
//! ephemeral port.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod metrics;
pub mod server;

pub use config::{Cli, ServerConfig};
pub use metrics::Metrics;
