//! # Error Taxonomy
//!
//! Two layers, matching the dispatch pipeline: `EngineError` is raised by
//! the store for datatype/TTL violations, `CommandError` is the dispatcher
//! boundary error that gets rendered onto the wire as a `-` reply.

use std::fmt;

/// The tag of a stored value. Immutable for the lifetime of a key —
/// only deletion can change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Kv,
    Hash,
    Set,
    Queue,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Kv => "string",
            DataType::Hash => "hash",
            DataType::Set => "set",
            DataType::Queue => "list",
        };
        f.write_str(name)
    }
}

/// The scalar subtype backing a KV or hash-field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bytes,
    Int,
    Float,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Bytes => "string",
            ScalarType::Int => "integer",
            ScalarType::Float => "float",
        };
        f.write_str(name)
    }
}

/// Errors raised by the store while executing a single command.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("WRONGTYPE key holds a {actual} value, expected {expected}")]
    WrongType { expected: DataType, actual: DataType },

    #[error("wrong value type, expected {0}")]
    WrongValueType(ScalarType),

    #[error("incompatible data types")]
    IncompatibleTypes,

    #[error("no such key")]
    NotFound,

    #[error("snapshot file not found")]
    SnapshotNotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot decode error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to the wire as a `-` reply.
///
/// `ClientQuit` and `Shutdown` are *not* represented here: they aren't
/// failures, so Rust's error-propagation machinery is the wrong tool.
/// `ferrokv-server::dispatcher` instead returns a `Signal` alongside
/// the reply value.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),

    #[error("first parameter must be a command name")]
    BadRequestShape,

    #[error("wrong number of arguments for '{0}'")]
    WrongArity(String),

    #[error("value is not an integer or out of range")]
    NotAnInteger,

    #[error("unhandled server error: {0}")]
    Internal(String),
}
