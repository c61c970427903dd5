//! # Synchronous Client API
//!
//! Purpose: expose a compact, blocking API for issuing commands to a
//! ferrokv server over the shared wire codec.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KVClient` hides pooling and protocol details.
//! 2. **Borrow-Friendly API**: accept `&[u8]` to avoid unnecessary copies.
//! 3. **Fail Fast**: protocol violations surface immediately as errors.
//! 4. **One Method Per Command**: mirrors the dispatcher's command table
//!    1:1 so neither side drifts out of sync with the other.

use std::path::Path;
use std::time::Duration;

use ferrokv_common::Value;

use crate::pool::{ConnectionPool, PoolConfig, DEFAULT_MAX_AGE};

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the sync client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error")]
    Protocol,
    #[error("server error: {message}")]
    Server { message: String },
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("connection pool exhausted")]
    PoolExhausted,
    #[error("invalid address")]
    InvalidAddress,
}

/// A scalar reply value: the client-side mirror of the engine's
/// KV/hash-field/queue-element payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
}

impl ScalarValue {
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            ScalarValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Configuration for the synchronous client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:8888".
    pub addr: String,
    /// Maximum total connections (in-use + free) the pool will hold open.
    pub max_total: usize,
    /// A free connection older than this is closed rather than reused.
    pub max_age: Duration,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:8888".to_string(),
            max_total: 64,
            max_age: DEFAULT_MAX_AGE,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

/// Synchronous client with connection pooling.
///
/// Each call checks out a connection, executes one command, and checks
/// the connection back in — see [`crate::pool`] for the checkout
/// contract.
pub struct KVClient {
    pool: ConnectionPool,
}

impl KVClient {
    pub fn connect(addr: impl Into<String>) -> Self {
        let mut config = ClientConfig::default();
        config.addr = addr.into();
        Self::with_config(config)
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let pool = ConnectionPool::new(PoolConfig {
            addr: config.addr,
            max_total: config.max_total,
            max_age: config.max_age,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            connect_timeout: config.connect_timeout,
        });
        KVClient { pool }
    }

    fn call(&self, args: &[&[u8]]) -> ClientResult<Value> {
        let mut conn = self.pool.acquire()?;
        match conn.exec(args)? {
            Value::Error(message) => Err(ClientError::Server {
                message: String::from_utf8_lossy(&message).into_owned(),
            }),
            other => Ok(other),
        }
    }

    // ---- KV --------------------------------------------------------------

    pub fn get(&self, key: &[u8]) -> ClientResult<Option<ScalarValue>> {
        opt_scalar(self.call(&[b"GET", key])?)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        expect_int(self.call(&[b"SET", key, value])?).map(|_| ())
    }

    pub fn setnx(&self, key: &[u8], value: &[u8]) -> ClientResult<bool> {
        expect_int(self.call(&[b"SETNX", key, value])?).map(|n| n == 1)
    }

    pub fn setex(&self, key: &[u8], value: &[u8], ttl: Duration) -> ClientResult<()> {
        let secs = ttl.as_secs_f64().to_string();
        expect_int(self.call(&[b"SETEX", key, value, secs.as_bytes()])?).map(|_| ())
    }

    pub fn append(&self, key: &[u8], arg: &[u8]) -> ClientResult<ScalarValue> {
        scalar(self.call(&[b"APPEND", key, arg])?)
    }

    pub fn delete(&self, key: &[u8]) -> ClientResult<bool> {
        expect_int(self.call(&[b"DELETE", key])?).map(|n| n == 1)
    }

    pub fn exists(&self, key: &[u8]) -> ClientResult<bool> {
        expect_int(self.call(&[b"EXISTS", key])?).map(|n| n == 1)
    }

    pub fn getset(&self, key: &[u8], value: &[u8]) -> ClientResult<Option<ScalarValue>> {
        opt_scalar(self.call(&[b"GETSET", key, value])?)
    }

    pub fn pop(&self, key: &[u8]) -> ClientResult<Option<ScalarValue>> {
        opt_scalar(self.call(&[b"POP", key])?)
    }

    pub fn incr(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.call(&[b"INCR", key])?)
    }

    pub fn decr(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.call(&[b"DECR", key])?)
    }

    pub fn incrby(&self, key: &[u8], delta: i64) -> ClientResult<i64> {
        let delta = delta.to_string();
        expect_int(self.call(&[b"INCRBY", key, delta.as_bytes()])?)
    }

    pub fn decrby(&self, key: &[u8], delta: i64) -> ClientResult<i64> {
        let delta = delta.to_string();
        expect_int(self.call(&[b"DECRBY", key, delta.as_bytes()])?)
    }

    pub fn len(&self) -> ClientResult<i64> {
        expect_int(self.call(&[b"LEN"])?)
    }

    pub fn flush(&self) -> ClientResult<i64> {
        expect_int(self.call(&[b"FLUSH"])?)
    }

    pub fn mget(&self, keys: &[&[u8]]) -> ClientResult<Vec<Option<ScalarValue>>> {
        let mut args = vec![&b"MGET"[..]];
        args.extend_from_slice(keys);
        opt_scalar_array(self.call(&args)?)
    }

    pub fn mset(&self, pairs: &[(&[u8], &[u8])]) -> ClientResult<i64> {
        let mut args = vec![&b"MSET"[..]];
        for (k, v) in pairs {
            args.push(k);
            args.push(v);
        }
        expect_int(self.call(&args)?)
    }

    pub fn msetex(&self, ttl: Duration, pairs: &[(&[u8], &[u8])]) -> ClientResult<i64> {
        let secs = ttl.as_secs_f64().to_string();
        let mut args = vec![&b"MSETEX"[..], secs.as_bytes()];
        for (k, v) in pairs {
            args.push(k);
            args.push(v);
        }
        expect_int(self.call(&args)?)
    }

    pub fn mdelete(&self, keys: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"MDELETE"[..]];
        args.extend_from_slice(keys);
        expect_int(self.call(&args)?)
    }

    pub fn mpop(&self, keys: &[&[u8]]) -> ClientResult<Vec<Option<ScalarValue>>> {
        let mut args = vec![&b"MPOP"[..]];
        args.extend_from_slice(keys);
        opt_scalar_array(self.call(&args)?)
    }

    // ---- SET ---------------------------------------------------------------

    pub fn sadd(&self, key: &[u8], members: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"SADD"[..], key];
        args.extend_from_slice(members);
        expect_int(self.call(&args)?)
    }

    pub fn scard(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.call(&[b"SCARD", key])?)
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> ClientResult<bool> {
        expect_bool(self.call(&[b"SISMEMBER", key, member])?)
    }

    pub fn smembers(&self, key: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        bytes_collection(self.call(&[b"SMEMBERS", key])?)
    }

    pub fn srem(&self, key: &[u8], members: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"SREM"[..], key];
        args.extend_from_slice(members);
        expect_int(self.call(&args)?)
    }

    pub fn spop(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        match self.call(&[b"SPOP", key])? {
            Value::Bulk(data) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub fn sunion(&self, keys: &[&[u8]]) -> ClientResult<Vec<Vec<u8>>> {
        let mut args = vec![&b"SUNION"[..]];
        args.extend_from_slice(keys);
        bytes_collection(self.call(&args)?)
    }

    pub fn sinter(&self, keys: &[&[u8]]) -> ClientResult<Vec<Vec<u8>>> {
        let mut args = vec![&b"SINTER"[..]];
        args.extend_from_slice(keys);
        bytes_collection(self.call(&args)?)
    }

    pub fn sdiff(&self, keys: &[&[u8]]) -> ClientResult<Vec<Vec<u8>>> {
        let mut args = vec![&b"SDIFF"[..]];
        args.extend_from_slice(keys);
        bytes_collection(self.call(&args)?)
    }

    pub fn sunionstore(&self, dest: &[u8], keys: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"SUNIONSTORE"[..], dest];
        args.extend_from_slice(keys);
        expect_int(self.call(&args)?)
    }

    pub fn sinterstore(&self, dest: &[u8], keys: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"SINTERSTORE"[..], dest];
        args.extend_from_slice(keys);
        expect_int(self.call(&args)?)
    }

    pub fn sdiffstore(&self, dest: &[u8], keys: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"SDIFFSTORE"[..], dest];
        args.extend_from_slice(keys);
        expect_int(self.call(&args)?)
    }

    // ---- HASH ----------------------------------------------------------------

    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> ClientResult<bool> {
        expect_int(self.call(&[b"HSET", key, field, value])?).map(|n| n == 1)
    }

    pub fn hsetnx(&self, key: &[u8], field: &[u8], value: &[u8]) -> ClientResult<bool> {
        expect_int(self.call(&[b"HSETNX", key, field, value])?).map(|n| n == 1)
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> ClientResult<Option<ScalarValue>> {
        opt_scalar(self.call(&[b"HGET", key, field])?)
    }

    pub fn hmget(&self, key: &[u8], fields: &[&[u8]]) -> ClientResult<Vec<(Vec<u8>, Option<ScalarValue>)>> {
        let mut args = vec![&b"HMGET"[..], key];
        args.extend_from_slice(fields);
        field_map(self.call(&args)?)
    }

    pub fn hmset(&self, key: &[u8], fields: &[(&[u8], &[u8])]) -> ClientResult<()> {
        let mut args = vec![&b"HMSET"[..], key];
        for (field, value) in fields {
            args.push(field);
            args.push(value);
        }
        self.call(&args)?;
        Ok(())
    }

    pub fn hvals(&self, key: &[u8]) -> ClientResult<Vec<ScalarValue>> {
        scalar_array(self.call(&[b"HVALS", key])?)
    }

    pub fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"HDEL"[..], key];
        args.extend_from_slice(fields);
        expect_int(self.call(&args)?)
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> ClientResult<bool> {
        expect_bool(self.call(&[b"HEXISTS", key, field])?)
    }

    pub fn hkeys(&self, key: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        bytes_collection(self.call(&[b"HKEYS", key])?)
    }

    pub fn hgetall(&self, key: &[u8]) -> ClientResult<Vec<(Vec<u8>, ScalarValue)>> {
        match self.call(&[b"HGETALL", key])? {
            Value::Dict(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok((expect_bytes(k)?, scalar(v)?)))
                .collect(),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub fn hlen(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.call(&[b"HLEN", key])?)
    }

    pub fn hincrby(&self, key: &[u8], field: &[u8], delta: i64) -> ClientResult<i64> {
        let delta = delta.to_string();
        expect_int(self.call(&[b"HINCRBY", key, field, delta.as_bytes()])?)
    }

    // ---- QUEUE -----------------------------------------------------------------

    pub fn lpush(&self, key: &[u8], values: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"LPUSH"[..], key];
        args.extend_from_slice(values);
        expect_int(self.call(&args)?)
    }

    pub fn rpush(&self, key: &[u8], values: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![&b"RPUSH"[..], key];
        args.extend_from_slice(values);
        expect_int(self.call(&args)?)
    }

    pub fn lpop(&self, key: &[u8]) -> ClientResult<Option<ScalarValue>> {
        opt_scalar(self.call(&[b"LPOP", key])?)
    }

    pub fn rpop(&self, key: &[u8]) -> ClientResult<Option<ScalarValue>> {
        opt_scalar(self.call(&[b"RPOP", key])?)
    }

    pub fn llen(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.call(&[b"LLEN", key])?)
    }

    pub fn lindex(&self, key: &[u8], index: i64) -> ClientResult<Option<ScalarValue>> {
        let index = index.to_string();
        opt_scalar(self.call(&[b"LINDEX", key, index.as_bytes()])?)
    }

    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> ClientResult<Vec<ScalarValue>> {
        let start = start.to_string();
        let stop = stop.to_string();
        scalar_array(self.call(&[b"LRANGE", key, start.as_bytes(), stop.as_bytes()])?)
    }

    pub fn lset(&self, key: &[u8], index: i64, value: &[u8]) -> ClientResult<bool> {
        let index = index.to_string();
        expect_int(self.call(&[b"LSET", key, index.as_bytes(), value])?).map(|n| n == 1)
    }

    pub fn ltrim(&self, key: &[u8], start: i64, stop: i64) -> ClientResult<()> {
        let start = start.to_string();
        let stop = stop.to_string();
        self.call(&[b"LTRIM", key, start.as_bytes(), stop.as_bytes()])?;
        Ok(())
    }

    /// Returns whether an element was moved (`false` when `src` was empty);
    /// the moved value itself is only observable via a follow-up read on
    /// `dest`, matching the wire reply's `0`/`1` shape.
    pub fn rpoplpush(&self, src: &[u8], dest: &[u8]) -> ClientResult<bool> {
        expect_bool(self.call(&[b"RPOPLPUSH", src, dest])?)
    }

    pub fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> ClientResult<i64> {
        let count = count.to_string();
        expect_int(self.call(&[b"LREM", key, count.as_bytes(), value])?)
    }

    pub fn lflush(&self, key: &[u8]) -> ClientResult<i64> {
        expect_int(self.call(&[b"LFLUSH", key])?)
    }

    // ---- Admin -------------------------------------------------------------------

    pub fn expire(&self, key: &[u8], ttl: Duration) -> ClientResult<bool> {
        let secs = ttl.as_secs_f64().to_string();
        expect_int(self.call(&[b"EXPIRE", key, secs.as_bytes()])?).map(|n| n == 1)
    }

    pub fn flushall(&self) -> ClientResult<i64> {
        expect_int(self.call(&[b"FLUSHALL"])?)
    }

    pub fn save(&self, path: &Path) -> ClientResult<bool> {
        let path = path_bytes(path);
        expect_bool(self.call(&[b"SAVE", &path])?)
    }

    pub fn restore(&self, path: &Path) -> ClientResult<bool> {
        let path = path_bytes(path);
        expect_bool(self.call(&[b"RESTORE", &path])?)
    }

    pub fn merge(&self, path: &Path) -> ClientResult<bool> {
        let path = path_bytes(path);
        expect_bool(self.call(&[b"MERGE", &path])?)
    }

    pub fn ping(&self, payload: Option<&[u8]>) -> ClientResult<Vec<u8>> {
        let response = match payload {
            Some(data) => self.call(&[b"PING", data])?,
            None => self.call(&[b"PING"])?,
        };
        match response {
            Value::Simple(text) => Ok(text),
            Value::Bulk(Some(data)) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Sends `QUIT`; the server closes the connection after replying,
    /// so this client closes its side rather than returning the socket
    /// to the pool.
    pub fn quit(&self) -> ClientResult<()> {
        let mut conn = self.pool.acquire()?;
        let result = conn.exec(&[b"QUIT"]);
        conn.close_after_reply();
        result.map(|_| ())
    }

    /// Sends `SHUTDOWN`; like `QUIT`, the underlying socket must be
    /// closed rather than recycled.
    pub fn shutdown(&self) -> ClientResult<()> {
        let mut conn = self.pool.acquire()?;
        let result = conn.exec(&[b"SHUTDOWN"]);
        conn.close_after_reply();
        result.map(|_| ())
    }
}

fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

fn expect_int(value: Value) -> ClientResult<i64> {
    match value {
        Value::Int(n) => Ok(n),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn expect_bool(value: Value) -> ClientResult<bool> {
    expect_int(value).map(|n| n != 0)
}

fn expect_bytes(value: Value) -> ClientResult<Vec<u8>> {
    match value {
        Value::Bulk(Some(data)) => Ok(data),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn scalar(value: Value) -> ClientResult<ScalarValue> {
    match value {
        Value::Bulk(Some(data)) => Ok(ScalarValue::Bytes(data)),
        Value::Int(n) => Ok(ScalarValue::Int(n)),
        Value::Float(f) => Ok(ScalarValue::Float(f)),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn opt_scalar(value: Value) -> ClientResult<Option<ScalarValue>> {
    match value {
        Value::Bulk(None) => Ok(None),
        other => scalar(other).map(Some),
    }
}

fn bytes_collection(value: Value) -> ClientResult<Vec<Vec<u8>>> {
    match value {
        Value::SetVal(items) | Value::Array(items) => {
            items.into_iter().map(expect_bytes).collect()
        }
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn scalar_array(value: Value) -> ClientResult<Vec<ScalarValue>> {
    match value {
        Value::Array(items) => items.into_iter().map(scalar).collect(),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn opt_scalar_array(value: Value) -> ClientResult<Vec<Option<ScalarValue>>> {
    match value {
        Value::Array(items) => items.into_iter().map(opt_scalar).collect(),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

fn field_map(value: Value) -> ClientResult<Vec<(Vec<u8>, Option<ScalarValue>)>> {
    match value {
        Value::Dict(pairs) => pairs
            .into_iter()
            .map(|(k, v)| Ok((expect_bytes(k)?, opt_scalar(v)?)))
            .collect(),
        _ => Err(ClientError::UnexpectedResponse),
    }
}
