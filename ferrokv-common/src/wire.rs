//! # Wire Codec
//!
//! A tagged, length-prefixed, recursively nested serialization used
//! symmetrically for requests and responses. Every value begins with a
//! single tag byte; all framing is terminated by a literal `CRLF`.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: a decode attempt that runs out of bytes
//!    rewinds and returns `Ok(None)` rather than holding partial state.
//! 2. **Buffer Reuse**: the caller owns the growable buffer; decoding
//!    never allocates more than the values it produces.
//! 3. **Binary-Safe**: bulk payloads are treated as raw bytes.
//! 4. **Single Flush**: encoding always fills one contiguous buffer
//!    before any byte reaches the socket, so a partial write can never
//!    desynchronize the peer decoder.
//!
//! ## Tag table
//!
//! | Byte | Type              | Body                                            |
//! |------|-------------------|--------------------------------------------------|
//! | `+`  | simple string     | content bytes until `CRLF`                        |
//! | `-`  | error             | message bytes until `CRLF`                        |
//! | `:`  | integer or float  | decimal digits until `CRLF`; `.` denotes a float   |
//! | `$`  | bulk byte string  | `<len>\r\n<len bytes>\r\n`; `len == -1` is null    |
//! | `^`  | bulk UTF-8 string | same framing as `$`, payload decoded as UTF-8      |
//! | `@`  | JSON string       | same framing as `$`, payload parsed as JSON        |
//! | `*`  | array             | `<n>\r\n` then `n` recursively encoded values      |
//! | `%`  | dictionary        | `<n>\r\n` then `2n` values (key, value, ...)       |
//! | `&`  | set               | `<n>\r\n` then `n` recursively encoded values      |
//!
//! Booleans and date-times are not distinct decode targets: the encoder
//! collapses them (bool -> `:` 0/1, date-time -> `^` text) per the
//! decoder guarantee, so callers construct `Value::Int`/
//! `Value::Text` directly rather than the codec offering separate
//! variants that decode could never produce.

use bytes::{Buf, BytesMut};

/// A decoded (or to-be-encoded) wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `+...` simple string.
    Simple(Vec<u8>),
    /// `-...` error reply.
    Error(Vec<u8>),
    /// `:...` integer (no `.` in the body).
    Int(i64),
    /// `:...` float (`.` present in the body).
    Float(f64),
    /// `$...` bulk byte string; `None` is the wire null (`$-1`).
    Bulk(Option<Vec<u8>>),
    /// `^...` bulk UTF-8 text.
    Text(String),
    /// `@...` JSON payload.
    Json(serde_json::Value),
    /// `*...` array.
    Array(Vec<Value>),
    /// `%...` dictionary, insertion order preserved.
    Dict(Vec<(Value, Value)>),
    /// `&...` set.
    SetVal(Vec<Value>),
}

impl Value {
    pub fn null() -> Value {
        Value::Bulk(None)
    }

    pub fn from_bool(b: bool) -> Value {
        Value::Int(if b { 1 } else { 0 })
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Value {
        Value::Bulk(Some(data.into()))
    }

    pub fn error(message: impl Into<Vec<u8>>) -> Value {
        Value::Error(message.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("protocol error: {0}")]
    Protocol(String),
}

fn protocol_err(msg: impl Into<String>) -> WireError {
    WireError::Protocol(msg.into())
}

/// Encodes a value into `out`, appending to whatever is already there.
///
/// The caller is expected to build the entire reply in one buffer and
/// flush it once (see module docs).
pub fn encode(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Simple(b) => {
            out.push(b'+');
            out.extend_from_slice(b);
            out.extend_from_slice(b"\r\n");
        }
        Value::Error(b) => {
            out.push(b'-');
            out.extend_from_slice(b);
            out.extend_from_slice(b"\r\n");
        }
        Value::Int(i) => {
            out.push(b':');
            out.extend_from_slice(i.to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Value::Float(f) => {
            out.push(b':');
            out.extend_from_slice(format_float(*f).as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Value::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
        Value::Bulk(Some(data)) => encode_length_prefixed(b'$', data, out),
        Value::Text(text) => encode_length_prefixed(b'^', text.as_bytes(), out),
        Value::Json(json) => {
            let payload = serde_json::to_vec(json).unwrap_or_else(|_| b"null".to_vec());
            encode_length_prefixed(b'@', &payload, out);
        }
        Value::Array(items) => {
            out.push(b'*');
            out.extend_from_slice(items.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            for item in items {
                encode(item, out);
            }
        }
        Value::Dict(pairs) => {
            out.push(b'%');
            out.extend_from_slice(pairs.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            for (k, v) in pairs {
                encode(k, out);
                encode(v, out);
            }
        }
        Value::SetVal(items) => {
            out.push(b'&');
            out.extend_from_slice(items.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            for item in items {
                encode(item, out);
            }
        }
    }
}

pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode(value, &mut out);
    out
}

fn encode_length_prefixed(tag: u8, data: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    out.extend_from_slice(data.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

/// Formats a float with full fractional precision, always keeping a
/// decimal point so the decoder's `.`-sniffing recognizes it as a float
/// rather than truncating it to an integer specifier.
fn format_float(f: f64) -> String {
    let mut s = format!("{f}");
    if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN") {
        s.push_str(".0");
    }
    s
}

/// Encodes a request as an array of bulk strings, the shape the
/// dispatcher expects for `argv`. Written directly against
/// the byte buffer to keep the client's hot path allocation-free.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    push_usize(out, args.len());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        push_usize(out, arg.len());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        out.push(buf[idx]);
    }
}

/// Incremental, rewind-on-underrun decoder. Stateless: all partial-frame
/// state lives in the caller's `BytesMut`.
#[derive(Debug, Default)]
pub struct Decoder;

impl Decoder {
    pub fn new() -> Self {
        Decoder
    }

    /// Attempts to decode exactly one value from the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` doesn't yet hold a complete value —
    /// the caller should read more bytes from the socket and retry. On a
    /// successful decode, the consumed bytes are advanced out of `buf`.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Value>, WireError> {
        let mut cursor = Cursor {
            data: &buf[..],
            pos: 0,
        };
        match parse_one(&mut cursor)? {
            None => Ok(None),
            Some(value) => {
                let consumed = cursor.pos;
                buf.advance(consumed);
                Ok(Some(value))
            }
        }
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn take_line(&mut self) -> Option<&'a [u8]> {
        let rest = self.remaining();
        let idx = find_crlf(rest)?;
        let line = &rest[..idx];
        self.pos += idx + 2;
        Some(line)
    }

    fn take_exact(&mut self, n: usize) -> Option<&'a [u8]> {
        let rest = self.remaining();
        if rest.len() < n {
            return None;
        }
        let data = &rest[..n];
        self.pos += n;
        Some(data)
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

fn parse_i64(data: &[u8]) -> Result<i64, WireError> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| protocol_err("invalid integer"))
}

fn parse_usize(data: &[u8]) -> Result<usize, WireError> {
    let n = parse_i64(data)?;
    if n < 0 {
        return Err(protocol_err("negative count"));
    }
    Ok(n as usize)
}

fn parse_number(line: &[u8]) -> Result<Value, WireError> {
    let text = std::str::from_utf8(line).map_err(|_| protocol_err("invalid number"))?;
    if text.contains('.') {
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| protocol_err("invalid float"))
    } else {
        text.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| protocol_err("invalid integer"))
    }
}

/// `$`-framed payload: `Ok(None)` means "need more bytes", `Ok(Some(None))`
/// is a decoded null, `Ok(Some(Some(data)))` is the payload.
fn parse_bulk(cursor: &mut Cursor) -> Result<Option<Option<Vec<u8>>>, WireError> {
    let start = cursor.pos;
    let len = match cursor.take_line() {
        Some(line) => parse_i64(line)?,
        None => {
            cursor.pos = start;
            return Ok(None);
        }
    };
    if len < -1 {
        return Err(protocol_err("negative bulk length"));
    }
    if len == -1 {
        return Ok(Some(None));
    }
    let len = len as usize;
    let data = match cursor.take_exact(len) {
        Some(data) => data.to_vec(),
        None => {
            cursor.pos = start;
            return Ok(None);
        }
    };
    match cursor.take_exact(2) {
        Some(b"\r\n") => Ok(Some(Some(data))),
        Some(_) => Err(protocol_err("missing CRLF after bulk payload")),
        None => {
            cursor.pos = start;
            Ok(None)
        }
    }
}

fn parse_array(cursor: &mut Cursor) -> Result<Option<Vec<Value>>, WireError> {
    let start = cursor.pos;
    let n = match cursor.take_line() {
        Some(line) => parse_usize(line)?,
        None => {
            cursor.pos = start;
            return Ok(None);
        }
    };
    let mut items = Vec::with_capacity(n.min(1024));
    for _ in 0..n {
        match parse_one(cursor)? {
            Some(value) => items.push(value),
            None => {
                cursor.pos = start;
                return Ok(None);
            }
        }
    }
    Ok(Some(items))
}

fn parse_dict(cursor: &mut Cursor) -> Result<Option<Vec<(Value, Value)>>, WireError> {
    let start = cursor.pos;
    let n = match cursor.take_line() {
        Some(line) => parse_usize(line)?,
        None => {
            cursor.pos = start;
            return Ok(None);
        }
    };
    let mut pairs = Vec::with_capacity(n.min(1024));
    for _ in 0..n {
        let key = match parse_one(cursor)? {
            Some(value) => value,
            None => {
                cursor.pos = start;
                return Ok(None);
            }
        };
        let val = match parse_one(cursor)? {
            Some(value) => value,
            None => {
                cursor.pos = start;
                return Ok(None);
            }
        };
        pairs.push((key, val));
    }
    Ok(Some(pairs))
}

fn parse_one(cursor: &mut Cursor) -> Result<Option<Value>, WireError> {
    let start = cursor.pos;
    if cursor.remaining().is_empty() {
        return Ok(None);
    }
    let tag = cursor.remaining()[0];
    cursor.pos += 1;

    let outcome: Result<Option<Value>, WireError> = match tag {
        b'+' => Ok(cursor.take_line().map(|line| Value::Simple(line.to_vec()))),
        b'-' => Ok(cursor.take_line().map(|line| Value::Error(line.to_vec()))),
        b':' => match cursor.take_line() {
            Some(line) => parse_number(line).map(Some),
            None => Ok(None),
        },
        b'$' => parse_bulk(cursor).map(|opt| opt.map(Value::Bulk)),
        b'^' => parse_bulk(cursor).and_then(|opt| match opt {
            None => Ok(None),
            Some(None) => Ok(Some(Value::Text(String::new()))),
            Some(Some(bytes)) => String::from_utf8(bytes)
                .map(|s| Some(Value::Text(s)))
                .map_err(|_| protocol_err("invalid utf-8 text")),
        }),
        b'@' => parse_bulk(cursor).and_then(|opt| match opt {
            None => Ok(None),
            Some(None) => Ok(Some(Value::Json(serde_json::Value::Null))),
            Some(Some(bytes)) => serde_json::from_slice(&bytes)
                .map(|json| Some(Value::Json(json)))
                .map_err(|e| protocol_err(format!("invalid json: {e}"))),
        }),
        b'*' => parse_array(cursor).map(|opt| opt.map(Value::Array)),
        b'%' => parse_dict(cursor).map(|opt| opt.map(Value::Dict)),
        b'&' => parse_array(cursor).map(|opt| opt.map(Value::SetVal)),
        _ => {
            // Lenient mode: unknown tag, read to CRLF, return the raw
            // line prefixed by the tag byte (supports inline text pings).
            match cursor.take_line() {
                Some(line) => {
                    let mut raw = Vec::with_capacity(line.len() + 1);
                    raw.push(tag);
                    raw.extend_from_slice(line);
                    Ok(Some(Value::Bulk(Some(raw))))
                }
                None => Ok(None),
            }
        }
    };

    match outcome {
        Ok(None) => {
            cursor.pos = start;
            Ok(None)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) {
        let bytes = encode_value(&value);
        let mut buf = BytesMut::from(&bytes[..]);
        let mut decoder = Decoder::new();
        let decoded = decoder.decode(&mut buf).unwrap().expect("complete value");
        assert_eq!(decoded, value);
        assert!(buf.is_empty());
    }

    #[test]
    fn roundtrips_bulk_string() {
        roundtrip(Value::bulk(b"hello world".to_vec()));
    }

    #[test]
    fn roundtrips_null_bulk() {
        roundtrip(Value::null());
    }

    #[test]
    fn roundtrips_text() {
        roundtrip(Value::Text("hello".to_string()));
    }

    #[test]
    fn roundtrips_int() {
        roundtrip(Value::Int(-42));
    }

    #[test]
    fn roundtrips_float_with_fraction() {
        roundtrip(Value::Float(3.5));
    }

    #[test]
    fn float_without_fraction_keeps_decimal_point() {
        let bytes = encode_value(&Value::Float(3.0));
        assert_eq!(bytes, b":3.0\r\n");
    }

    #[test]
    fn bool_collapses_to_integer() {
        assert_eq!(encode_value(&Value::from_bool(true)), b":1\r\n");
        assert_eq!(encode_value(&Value::from_bool(false)), b":0\r\n");
    }

    #[test]
    fn roundtrips_error() {
        roundtrip(Value::error(b"ERR boom".to_vec()));
    }

    #[test]
    fn roundtrips_array_of_mixed_values() {
        roundtrip(Value::Array(vec![
            Value::bulk(b"a".to_vec()),
            Value::Int(1),
            Value::null(),
        ]));
    }

    #[test]
    fn roundtrips_dict() {
        roundtrip(Value::Dict(vec![
            (Value::bulk(b"f1".to_vec()), Value::bulk(b"v1".to_vec())),
            (Value::bulk(b"missing".to_vec()), Value::null()),
        ]));
    }

    #[test]
    fn roundtrips_set() {
        roundtrip(Value::SetVal(vec![
            Value::bulk(b"a".to_vec()),
            Value::bulk(b"b".to_vec()),
        ]));
    }

    #[test]
    fn roundtrips_json() {
        roundtrip(Value::Json(serde_json::json!({"a": 1, "b": [1,2,3]})));
    }

    #[test]
    fn decode_reports_incomplete_frame() {
        let mut buf = BytesMut::from(&b"$5\r\nhel"[..]);
        let mut decoder = Decoder::new();
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        // Nothing should have been consumed on an incomplete frame.
        assert_eq!(&buf[..], b"$5\r\nhel");
    }

    #[test]
    fn decode_leaves_trailing_bytes_for_next_call() {
        let mut buf = BytesMut::from(&b"$2\r\nhi\r\n$2\r\nyo\r\n"[..]);
        let mut decoder = Decoder::new();
        let first = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, Value::bulk(b"hi".to_vec()));
        let second = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second, Value::bulk(b"yo".to_vec()));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_unknown_tag_is_lenient() {
        let mut buf = BytesMut::from(&b"PING\r\n"[..]);
        let mut decoder = Decoder::new();
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Value::bulk(b"PING".to_vec()));
    }

    #[test]
    fn decode_rejects_bad_utf8_text() {
        let mut buf = BytesMut::from(&b"^2\r\n\xff\xfe\r\n"[..]);
        let mut decoder = Decoder::new();
        assert!(decoder.decode(&mut buf).is_err());
    }

    #[test]
    fn encode_command_matches_array_of_bulk_strings() {
        let mut out = Vec::new();
        encode_command(&[b"SET", b"a", b"hello"], &mut out);
        assert_eq!(&out, b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$5\r\nhello\r\n");
    }
}
