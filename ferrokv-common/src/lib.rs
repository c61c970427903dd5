//! # ferrokv-common
//!
//! Shared types for the ferrokv key-value server: the wire codec used
//! symmetrically by client and server, and the error taxonomy that
//! crosses the engine/dispatcher/client boundaries.

pub mod error;
pub mod wire;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_MAX_CLIENTS: usize = 1024;

pub use error::{CommandError, DataType, EngineError, EngineResult, ScalarType};
pub use wire::{encode_command, Decoder, Value, WireError};
