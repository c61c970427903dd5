//! # ferrokv-engine
//!
//! The typed key-space backing the server: value representation, TTL
//! index, command semantics, and snapshotting. Exposes a single
//! `Store`; concurrency control is the caller's responsibility (see
//! `ferrokv-server::connection`).

pub mod snapshot;
pub mod store;
pub mod ttl;
pub mod value;

pub use store::Store;
pub use ttl::TtlIndex;
pub use value::{Scalar, TypedValue};
