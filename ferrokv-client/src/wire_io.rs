//! # Blocking Wire I/O
//!
//! Drives `ferrokv_common::wire` (the same codec the server decodes
//! requests with) over a blocking `Read`, so the client and server
//! stay byte-for-byte compatible without a second parser to keep in
//! sync.

use std::io::Read;

use bytes::BytesMut;
use ferrokv_common::{encode_command, wire, Decoder, Value};

use crate::client::{ClientError, ClientResult};

const READ_CHUNK: usize = 4 * 1024;

/// Encodes a command the same way the server's dispatcher expects to
/// decode `argv`: an array of bulk strings.
pub fn write_command(args: &[&[u8]], out: &mut Vec<u8>) {
    encode_command(args, out);
}

/// Reads exactly one reply value from `reader`, growing `buf` with
/// fresh bytes until the decoder reports a complete value.
pub fn read_value(reader: &mut impl Read, buf: &mut BytesMut) -> ClientResult<Value> {
    let mut decoder = Decoder::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match decoder.decode(buf) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(wire::WireError::Protocol(_)) => return Err(ClientError::Protocol),
        }
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(ClientError::Protocol);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
