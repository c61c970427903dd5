//! # Typed Values
//!
//! Provide the scalar and container payload types backing every key in
//! the store.
//!
//! ## Design Principles
//! 1. **Tagged Scalars**: a key's numeric-ness is a property of the
//!    stored representation, not inferred by parsing on every access.
//! 2. **Insertion Order Where It Matters**: hashes and queues preserve
//!    the order callers built them in; sets do not.
//! 3. **Cheap Clones at the Edges Only**: the store mutates in place;
//!    scalars are copied out only when building a wire reply.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use ferrokv_common::{DataType, EngineError, EngineResult, ScalarType};

/// A leaf value: the payload of a KV entry, a hash field, or a queue
/// element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Bytes(_) => ScalarType::Bytes,
            Scalar::Int(_) => ScalarType::Int,
            Scalar::Float(_) => ScalarType::Float,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    /// Computes `self + other` using the pair's natural addition rule
    /// (bytes concatenate, numbers add); used by `APPEND`.
    pub fn natural_append(&self, other: &[u8]) -> EngineResult<Scalar> {
        match self {
            Scalar::Bytes(existing) => {
                let mut combined = existing.clone();
                combined.extend_from_slice(other);
                Ok(Scalar::Bytes(combined))
            }
            Scalar::Int(existing) => {
                let delta = parse_i64(other).ok_or(EngineError::IncompatibleTypes)?;
                Ok(Scalar::Int(existing + delta))
            }
            Scalar::Float(existing) => {
                let delta = parse_f64(other).ok_or(EngineError::IncompatibleTypes)?;
                Ok(Scalar::Float(existing + delta))
            }
        }
    }
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse::<i64>().ok()
}

fn parse_f64(bytes: &[u8]) -> Option<f64> {
    std::str::from_utf8(bytes).ok()?.parse::<f64>().ok()
}

/// The tagged union a key's value belongs to. §3 invariant 4 pins a
/// key's tag for its lifetime: only deletion (explicit or via expiry)
/// lets a name take on a different tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypedValue {
    Kv(Scalar),
    Hash(IndexMap<Vec<u8>, Scalar, ahash::RandomState>),
    Set(IndexSet<Vec<u8>, ahash::RandomState>),
    Queue(std::collections::VecDeque<Scalar>),
}

impl TypedValue {
    pub fn data_type(&self) -> DataType {
        match self {
            TypedValue::Kv(_) => DataType::Kv,
            TypedValue::Hash(_) => DataType::Hash,
            TypedValue::Set(_) => DataType::Set,
            TypedValue::Queue(_) => DataType::Queue,
        }
    }

    pub fn empty_of(data_type: DataType) -> TypedValue {
        match data_type {
            DataType::Kv => TypedValue::Kv(Scalar::Bytes(Vec::new())),
            DataType::Hash => TypedValue::Hash(IndexMap::with_hasher(ahash::RandomState::new())),
            DataType::Set => TypedValue::Set(IndexSet::with_hasher(ahash::RandomState::new())),
            DataType::Queue => TypedValue::Queue(std::collections::VecDeque::new()),
        }
    }

    pub fn as_kv(&self) -> EngineResult<&Scalar> {
        match self {
            TypedValue::Kv(scalar) => Ok(scalar),
            other => Err(EngineError::WrongType {
                expected: DataType::Kv,
                actual: other.data_type(),
            }),
        }
    }

    pub fn as_kv_mut(&mut self) -> EngineResult<&mut Scalar> {
        let actual = self.data_type();
        match self {
            TypedValue::Kv(scalar) => Ok(scalar),
            _ => Err(EngineError::WrongType {
                expected: DataType::Kv,
                actual,
            }),
        }
    }

    pub fn as_hash_mut(&mut self) -> EngineResult<&mut IndexMap<Vec<u8>, Scalar, ahash::RandomState>> {
        let actual = self.data_type();
        match self {
            TypedValue::Hash(map) => Ok(map),
            _ => Err(EngineError::WrongType {
                expected: DataType::Hash,
                actual,
            }),
        }
    }

    pub fn as_hash(&self) -> EngineResult<&IndexMap<Vec<u8>, Scalar, ahash::RandomState>> {
        match self {
            TypedValue::Hash(map) => Ok(map),
            other => Err(EngineError::WrongType {
                expected: DataType::Hash,
                actual: other.data_type(),
            }),
        }
    }

    pub fn as_set_mut(&mut self) -> EngineResult<&mut IndexSet<Vec<u8>, ahash::RandomState>> {
        let actual = self.data_type();
        match self {
            TypedValue::Set(set) => Ok(set),
            _ => Err(EngineError::WrongType {
                expected: DataType::Set,
                actual,
            }),
        }
    }

    pub fn as_set(&self) -> EngineResult<&IndexSet<Vec<u8>, ahash::RandomState>> {
        match self {
            TypedValue::Set(set) => Ok(set),
            other => Err(EngineError::WrongType {
                expected: DataType::Set,
                actual: other.data_type(),
            }),
        }
    }

    pub fn as_queue_mut(&mut self) -> EngineResult<&mut std::collections::VecDeque<Scalar>> {
        let actual = self.data_type();
        match self {
            TypedValue::Queue(queue) => Ok(queue),
            _ => Err(EngineError::WrongType {
                expected: DataType::Queue,
                actual,
            }),
        }
    }

    pub fn as_queue(&self) -> EngineResult<&std::collections::VecDeque<Scalar>> {
        match self {
            TypedValue::Queue(queue) => Ok(queue),
            other => Err(EngineError::WrongType {
                expected: DataType::Queue,
                actual: other.data_type(),
            }),
        }
    }
}
