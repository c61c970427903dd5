//! # ferrokv-client
//!
//! A lightweight, synchronous client for the ferrokv server, with
//! connection pooling to minimize TCP handshake overhead.

mod client;
mod pool;
mod wire_io;

pub use client::{ClientConfig, ClientError, ClientResult, KVClient, ScalarValue};
pub use pool::{ConnectionPool, PoolConfig, DEFAULT_MAX_AGE};
