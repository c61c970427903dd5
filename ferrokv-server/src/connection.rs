//! # Connection Handling
//!
//! One shared, non-async request/response step reused by both the
//! cooperative-task listener and the OS-thread listener — only the I/O
//! shell around it differs.

use std::io::{self, Read, Write};
use std::time::Instant;

use bytes::BytesMut;
use parking_lot::Mutex;

use ferrokv_common::Decoder;
use ferrokv_engine::Store;

use crate::dispatcher;
pub use crate::dispatcher::Signal;
use crate::metrics::Metrics;

const READ_CHUNK: usize = 8 * 1024;

/// Decodes, dispatches, and encodes one request against the shared
/// store. Returns the reply bytes to write back and the signal the
/// caller should act on.
fn handle_one(store: &Mutex<Store>, request: ferrokv_common::Value, metrics: &Metrics) -> (Vec<u8>, Signal) {
    metrics.record_request_start();
    let start = Instant::now();
    let (reply, signal) = {
        let mut guard = store.lock();
        dispatcher::dispatch(&mut guard, request)
    };
    metrics.record_request_end(start.elapsed());
    if matches!(reply, ferrokv_common::Value::Error(_)) {
        metrics.record_error();
    }
    let mut out = Vec::new();
    ferrokv_common::wire::encode(&reply, &mut out);
    (out, signal)
}

/// Drives one connection to completion using blocking std I/O — the
/// shape used by the OS-thread-per-connection listener. Returns
/// `Signal::Shutdown` if the client asked the whole server to stop, so
/// the listener can react.
pub fn run_blocking(mut stream: impl Read + Write, store: &Mutex<Store>, metrics: &Metrics) -> Signal {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut decoder = Decoder::new();
    let mut read_buf = [0u8; READ_CHUNK];

    loop {
        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(value)) => {
                    let (out, signal) = handle_one(store, value, metrics);
                    if stream.write_all(&out).is_err() {
                        return Signal::None;
                    }
                    match signal {
                        Signal::None => continue,
                        Signal::Quit => return Signal::None,
                        Signal::Shutdown => {
                            tracing::info!("shutdown requested by client");
                            return Signal::Shutdown;
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "closing connection after protocol error");
                    return Signal::None;
                }
            }
        }

        match stream.read(&mut read_buf) {
            Ok(0) => return Signal::None,
            Ok(n) => buf.extend_from_slice(&read_buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Signal::None,
        }
    }
}

/// Drives one connection to completion over a tokio async stream — the
/// shape used by the cooperative-task listener. Returns
/// `Signal::Shutdown` if the client asked the whole server to stop, so
/// the listener can react.
pub async fn run_async<S>(mut stream: S, store: &Mutex<Store>, metrics: &Metrics) -> Signal
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut decoder = Decoder::new();

    loop {
        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(value)) => {
                    let (out, signal) = handle_one(store, value, metrics);
                    if stream.write_all(&out).await.is_err() {
                        return Signal::None;
                    }
                    match signal {
                        Signal::None => continue,
                        Signal::Quit => return Signal::None,
                        Signal::Shutdown => {
                            tracing::info!("shutdown requested by client");
                            return Signal::Shutdown;
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "closing connection after protocol error");
                    return Signal::None;
                }
            }
        }

        buf.reserve(READ_CHUNK);
        match stream.read_buf(&mut buf).await {
            Ok(0) => return Signal::None,
            Ok(_) => continue,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Signal::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct LoopbackStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for LoopbackStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for LoopbackStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn blocking_loop_replies_then_closes_on_eof() {
        let mut request = Vec::new();
        ferrokv_common::wire::encode_command(&[b"PING"], &mut request);
        let stream = LoopbackStream {
            input: Cursor::new(request),
            output: Vec::new(),
        };
        let store = Mutex::new(Store::new());
        let metrics = Metrics::new();

        let mut stream = stream;
        run_blocking(&mut stream, &store, &metrics);
        assert_eq!(stream.output, b"+PONG\r\n");
    }

    #[test]
    fn quit_closes_after_writing_reply() {
        let mut request = Vec::new();
        ferrokv_common::wire::encode_command(&[b"QUIT"], &mut request);
        let stream = LoopbackStream {
            input: Cursor::new(request),
            output: Vec::new(),
        };
        let store = Mutex::new(Store::new());
        let metrics = Metrics::new();

        let mut stream = stream;
        run_blocking(&mut stream, &store, &metrics);
        assert_eq!(stream.output, b":1\r\n");
    }
}
