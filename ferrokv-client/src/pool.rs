//! # Connection Pool
//!
//! Purpose: reuse TCP connections for the sync client to reduce handshake
//! latency and allocation churn, following the checkout/checkin contract
//! the server counterpart expects (client-side pooling spec):
//!
//! - A per-caller-identity "currently in use" socket, so one caller can't
//!   interleave two requests on the same connection.
//! - A heap of free sockets ordered by last-checkin timestamp, so
//!   checkout always tries the newest connection first.
//! - Connections older than `max_age` are closed instead of reused.
//! - A connection that errors mid-command is discarded rather than
//!   returned to the pool.
//! - `QUIT`/`SHUTDOWN` close the server-side connection, so the client
//!   must not return that socket to the pool either.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: hold the mutex only while moving connections
//!    between the in-use map and the free heap.
//! 3. **Fail Fast**: exceeding the pool limit returns an error immediately.
//! 4. **Cache-Friendly Buffers**: each connection reuses its own buffers.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use parking_lot::Mutex;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use ferrokv_common::Value;

use crate::client::{ClientError, ClientResult};
use crate::wire_io::{read_value, write_command};

/// Default staleness cutoff for a free connection (§5: "default 60s").
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60);

/// Pool configuration for the sync client.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Server address, e.g. "127.0.0.1:8888".
    pub addr: String,
    /// Maximum total connections (in-use + free) the pool will hold open.
    pub max_total: usize,
    /// A free connection older than this is closed rather than reused.
    pub max_age: Duration,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

/// A free connection, ordered by its checkin timestamp so the heap's max
/// is always the newest. `BinaryHeap` is a max-heap, which is exactly
/// "pop the newest free socket" without a `Reverse` wrapper.
struct FreeSlot {
    checked_in_at: Instant,
    conn: Connection,
}

impl PartialEq for FreeSlot {
    fn eq(&self, other: &Self) -> bool {
        self.checked_in_at == other.checked_in_at
    }
}
impl Eq for FreeSlot {}
impl PartialOrd for FreeSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for FreeSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.checked_in_at.cmp(&other.checked_in_at)
    }
}

struct PoolState {
    /// The socket each caller identity currently has checked out, if
    /// any — lets a reentrant checkout on the same thread reuse it
    /// instead of dialing (or blocking on) a second one.
    in_use: HashMap<ThreadId, Arc<Mutex<Connection>>>,
    free: BinaryHeap<FreeSlot>,
    total: usize,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Connection pool handle. Cheap to clone — it's a shared handle onto
/// the same pool state.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    in_use: HashMap::new(),
                    free: BinaryHeap::new(),
                    total: 0,
                }),
            }),
        }
    }

    /// Checks out a connection for the calling thread.
    ///
    /// Reuses the caller's already-checked-out socket if one exists
    /// (reentrant request chain); otherwise pops the newest free
    /// socket, discarding any that have aged past `max_age`, and
    /// falls back to dialing fresh.
    pub fn acquire(&self) -> ClientResult<PooledConnection> {
        let tid = std::thread::current().id();
        let mut state = self.inner.state.lock();

        if let Some(conn) = state.in_use.get(&tid) {
            return Ok(PooledConnection {
                pool: self.inner.clone(),
                tid,
                conn: conn.clone(),
                owns_checkin: false,
                invalidate: false,
            });
        }

        let now = Instant::now();
        while let Some(slot) = state.free.pop() {
            if now.duration_since(slot.checked_in_at) > self.inner.config.max_age {
                state.total = state.total.saturating_sub(1);
                tracing::debug!("discarding free connection past max_age");
                continue;
            }
            let conn = Arc::new(Mutex::new(slot.conn));
            state.in_use.insert(tid, conn.clone());
            return Ok(PooledConnection {
                pool: self.inner.clone(),
                tid,
                conn,
                owns_checkin: true,
                invalidate: false,
            });
        }

        if state.total >= self.inner.config.max_total {
            tracing::warn!(max_total = self.inner.config.max_total, "connection pool exhausted");
            return Err(ClientError::PoolExhausted);
        }
        state.total += 1;
        drop(state);

        match Connection::connect(&self.inner.config) {
            Ok(conn) => {
                let conn = Arc::new(Mutex::new(conn));
                let mut state = self.inner.state.lock();
                state.in_use.insert(tid, conn.clone());
                Ok(PooledConnection {
                    pool: self.inner.clone(),
                    tid,
                    conn,
                    owns_checkin: true,
                    invalidate: false,
                })
            }
            Err(err) => {
                let mut state = self.inner.state.lock();
                state.total = state.total.saturating_sub(1);
                Err(err)
            }
        }
    }
}

/// A checked-out connection. Returned to the pool on drop unless it was
/// invalidated (protocol/IO error, or a command that closes the server
/// side of the socket).
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    tid: ThreadId,
    conn: Arc<Mutex<Connection>>,
    owns_checkin: bool,
    invalidate: bool,
}

impl PooledConnection {
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<Value> {
        let result = self.conn.lock().exec(args);
        if result.is_err() {
            self.invalidate = true;
        }
        result
    }

    /// Marks this connection to be closed rather than returned to the
    /// pool — used after `QUIT`/`SHUTDOWN`, which close the server side
    /// of the socket.
    pub fn close_after_reply(&mut self) {
        self.invalidate = true;
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if !self.owns_checkin {
            return;
        }
        let mut state = self.pool.state.lock();
        state.in_use.remove(&self.tid);
        if self.invalidate {
            state.total = state.total.saturating_sub(1);
            return;
        }
        match Arc::try_unwrap(self.conn.clone()) {
            Ok(mutex) => {
                let conn = mutex.into_inner();
                state.free.push(FreeSlot {
                    checked_in_at: Instant::now(),
                    conn,
                });
            }
            Err(_) => {
                // A reentrant checkout on this thread still holds a
                // clone of the Arc; nothing to check in yet.
            }
        }
    }
}

/// Single TCP connection with reusable buffers.
pub struct Connection {
    reader: BufReader<TcpStream>,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
}

impl Connection {
    fn connect(config: &PoolConfig) -> ClientResult<Self> {
        let stream = connect_stream(config)?;
        if let Some(timeout) = config.read_timeout {
            stream.set_read_timeout(Some(timeout))?;
        }
        if let Some(timeout) = config.write_timeout {
            stream.set_write_timeout(Some(timeout))?;
        }
        stream.set_nodelay(true)?;

        Ok(Connection {
            reader: BufReader::new(stream),
            read_buf: BytesMut::with_capacity(4 * 1024),
            write_buf: Vec::with_capacity(256),
        })
    }

    fn exec(&mut self, args: &[&[u8]]) -> ClientResult<Value> {
        self.write_buf.clear();
        write_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_value(&mut self.reader, &mut self.read_buf)
    }
}

fn connect_stream(config: &PoolConfig) -> ClientResult<TcpStream> {
    let addr: SocketAddr = config.addr.parse().map_err(|_| ClientError::InvalidAddress)?;
    let stream = match config.connect_timeout {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
        None => TcpStream::connect(addr)?,
    };
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    fn config(addr: String) -> PoolConfig {
        PoolConfig {
            addr,
            max_total: 4,
            max_age: Duration::from_millis(20),
            read_timeout: Some(Duration::from_secs(1)),
            write_timeout: Some(Duration::from_secs(1)),
            connect_timeout: Some(Duration::from_secs(1)),
        }
    }

    #[test]
    fn stale_free_connection_is_discarded_not_reused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        std::thread::spawn(move || {
            for _ in 0..2 {
                if let Ok((stream, _)) = listener.accept() {
                    let mut buf = [0u8; 64];
                    let mut stream = stream;
                    let _ = stream.read(&mut buf);
                    let _ = stream.write_all(b"+PONG\r\n");
                }
            }
        });

        let pool = ConnectionPool::new(config(addr));
        {
            let mut conn = pool.acquire().unwrap();
            conn.exec(&[b"PING"]).unwrap();
        }
        std::thread::sleep(Duration::from_millis(40));
        {
            let mut conn = pool.acquire().unwrap();
            conn.exec(&[b"PING"]).unwrap();
        }
        let state = pool.inner.state.lock();
        assert_eq!(state.total, 1);
    }

    #[test]
    fn reentrant_checkout_on_same_thread_reuses_the_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let mut stream = stream;
                let mut buf = [0u8; 256];
                for _ in 0..2 {
                    let _ = stream.read(&mut buf);
                    let _ = stream.write_all(b"+PONG\r\n");
                }
            }
        });

        let pool = ConnectionPool::new(config(addr));
        let mut outer = pool.acquire().unwrap();
        outer.exec(&[b"PING"]).unwrap();
        let mut inner = pool.acquire().unwrap();
        inner.exec(&[b"PING"]).unwrap();
        assert!(Arc::ptr_eq(&outer.conn, &inner.conn));
    }
}
