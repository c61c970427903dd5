//! # Dispatcher
//!
//! Maps an uppercase command name to a `Store` method, loosely validates
//! arity (missing arguments surface as a `CommandError::WrongArity`
//! rather than a panic), and converts domain errors into wire error
//! replies.
//!
//! `QUIT` and `SHUTDOWN` don't raise exceptions — the dispatcher returns
//! a `Signal` alongside the reply value and leaves control flow to the
//! connection loop and listener.

use ferrokv_common::{CommandError, Value};
use ferrokv_engine::Store;

/// Out-of-band instruction to the connection loop / listener, returned
/// alongside every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Nothing special: write the reply and keep reading from this
    /// connection.
    None,
    /// `QUIT` was received: write the reply, then close this connection.
    Quit,
    /// `SHUTDOWN` was received: write the reply, close this connection,
    /// and tell the listener to stop accepting new ones.
    Shutdown,
}

/// Decodes one request value into `(reply, signal)`. Never panics on
/// malformed input — every failure path is a wire error reply.
pub fn dispatch(store: &mut Store, request: Value) -> (Value, Signal) {
    let argv = match to_argv(request) {
        Ok(argv) => argv,
        Err(err) => return (error_reply(&err), Signal::None),
    };
    if argv.is_empty() {
        return (error_reply(&CommandError::BadRequestShape), Signal::None);
    }
    let name = argv[0].to_ascii_uppercase();
    match execute(store, &name, &argv[1..]) {
        Ok(Outcome::Reply(value)) => (value, Signal::None),
        Ok(Outcome::Quit(value)) => (value, Signal::Quit),
        Ok(Outcome::Shutdown(value)) => (value, Signal::Shutdown),
        Err(err) => (error_reply(&err), Signal::None),
    }
}

fn error_reply(err: &CommandError) -> Value {
    Value::error(format!("ERR {err}"))
}

/// Coerces a decoded request into `argv`: the common case is an array of
/// bulk strings; a lone inline value is split on ASCII whitespace as a
/// fallback, supporting inline text pings like `PING\r\n`.
fn to_argv(request: Value) -> Result<Vec<Vec<u8>>, CommandError> {
    match request {
        Value::Array(items) => items
            .into_iter()
            .map(|item| coerce_bytes(item).ok_or(CommandError::BadRequestShape))
            .collect(),
        other => {
            let line = coerce_bytes(other).ok_or(CommandError::BadRequestShape)?;
            Ok(line
                .split(|b| b.is_ascii_whitespace())
                .filter(|piece| !piece.is_empty())
                .map(|piece| piece.to_vec())
                .collect())
        }
    }
}

fn coerce_bytes(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::Bulk(Some(bytes)) => Some(bytes),
        Value::Simple(bytes) => Some(bytes),
        Value::Text(text) => Some(text.into_bytes()),
        Value::Int(n) => Some(n.to_string().into_bytes()),
        Value::Float(f) => Some(f.to_string().into_bytes()),
        _ => None,
    }
}

enum Outcome {
    Reply(Value),
    Quit(Value),
    Shutdown(Value),
}

type CmdResult = Result<Outcome, CommandError>;

fn reply(value: Value) -> CmdResult {
    Ok(Outcome::Reply(value))
}

fn arg<'a>(args: &'a [Vec<u8>], idx: usize, cmd: &str) -> Result<&'a [u8], CommandError> {
    args.get(idx)
        .map(Vec::as_slice)
        .ok_or_else(|| CommandError::WrongArity(cmd.to_string()))
}

fn rest(args: &[Vec<u8>], from: usize, cmd: &str) -> Result<&[Vec<u8>], CommandError> {
    if from > args.len() {
        return Err(CommandError::WrongArity(cmd.to_string()));
    }
    Ok(&args[from..])
}

fn non_empty<'a>(args: &'a [Vec<u8>], cmd: &str) -> Result<&'a [Vec<u8>], CommandError> {
    if args.is_empty() {
        return Err(CommandError::WrongArity(cmd.to_string()));
    }
    Ok(args)
}

fn parse_i64(bytes: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::NotAnInteger)
}

fn parse_f64(bytes: &[u8]) -> Result<f64, CommandError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or(CommandError::NotAnInteger)
}

fn scalar_to_value(scalar: ferrokv_engine::Scalar) -> Value {
    match scalar {
        ferrokv_engine::Scalar::Bytes(b) => Value::bulk(b),
        ferrokv_engine::Scalar::Int(n) => Value::Int(n),
        ferrokv_engine::Scalar::Float(f) => Value::Float(f),
    }
}

fn opt_scalar_to_value(scalar: Option<ferrokv_engine::Scalar>) -> Value {
    scalar.map(scalar_to_value).unwrap_or_else(Value::null)
}

fn bytes_array(items: Vec<Vec<u8>>) -> Value {
    Value::Array(items.into_iter().map(Value::bulk).collect())
}

fn bytes_set(items: Vec<Vec<u8>>) -> Value {
    Value::SetVal(items.into_iter().map(Value::bulk).collect())
}

fn scalar_array(items: Vec<ferrokv_engine::Scalar>) -> Value {
    Value::Array(items.into_iter().map(scalar_to_value).collect())
}

/// Splits `args` into pairs, failing with `WrongArity` on an odd count.
fn pairs(args: &[Vec<u8>], cmd: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CommandError> {
    if args.len() % 2 != 0 {
        return Err(CommandError::WrongArity(cmd.to_string()));
    }
    Ok(args
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

fn path_arg(args: &[Vec<u8>], cmd: &str) -> Result<std::path::PathBuf, CommandError> {
    let raw = arg(args, 0, cmd)?;
    Ok(std::path::PathBuf::from(
        String::from_utf8_lossy(raw).into_owned(),
    ))
}

#[allow(clippy::too_many_lines)]
fn execute(store: &mut Store, name: &[u8], args: &[Vec<u8>]) -> CmdResult {
    match name {
        // ---- KV ----------------------------------------------------------
        b"GET" => reply(opt_scalar_to_value(store.get(arg(args, 0, "GET")?)?)),
        b"SET" => {
            store.set(arg(args, 0, "SET")?, arg(args, 1, "SET")?.to_vec())?;
            reply(Value::Int(1))
        }
        b"SETNX" => reply(Value::Int(store.setnx(
            arg(args, 0, "SETNX")?,
            arg(args, 1, "SETNX")?.to_vec(),
        )?)),
        b"SETEX" => {
            let ttl = parse_f64(arg(args, 2, "SETEX")?)?;
            store.setex(arg(args, 0, "SETEX")?, arg(args, 1, "SETEX")?.to_vec(), ttl)?;
            reply(Value::Int(1))
        }
        b"APPEND" => reply(scalar_to_value(
            store.append(arg(args, 0, "APPEND")?, arg(args, 1, "APPEND")?)?,
        )),
        b"DELETE" => reply(Value::Int(store.delete(arg(args, 0, "DELETE")?)?)),
        b"EXISTS" => reply(Value::Int(store.exists(arg(args, 0, "EXISTS")?)?)),
        b"GETSET" => reply(opt_scalar_to_value(store.getset(
            arg(args, 0, "GETSET")?,
            arg(args, 1, "GETSET")?.to_vec(),
        )?)),
        b"POP" => reply(opt_scalar_to_value(store.pop(arg(args, 0, "POP")?)?)),
        b"INCR" => reply(Value::Int(store.incrby(arg(args, 0, "INCR")?, 1)?)),
        b"DECR" => reply(Value::Int(store.incrby(arg(args, 0, "DECR")?, -1)?)),
        b"INCRBY" => {
            let delta = parse_i64(arg(args, 1, "INCRBY")?)?;
            reply(Value::Int(store.incrby(arg(args, 0, "INCRBY")?, delta)?))
        }
        b"DECRBY" => {
            let delta = parse_i64(arg(args, 1, "DECRBY")?)?;
            reply(Value::Int(store.incrby(arg(args, 0, "DECRBY")?, -delta)?))
        }
        b"LEN" => reply(Value::Int(store.len())),
        b"FLUSH" => reply(Value::Int(store.flush())),
        b"MGET" => {
            let keys: Vec<Vec<u8>> = non_empty(args, "MGET")?.to_vec();
            let values = store.mget(&keys)?;
            reply(Value::Array(values.into_iter().map(opt_scalar_to_value).collect()))
        }
        b"MSET" => {
            let pairs = pairs(args, "MSET")?;
            store.mset(&pairs)?;
            reply(Value::Int(pairs.len() as i64))
        }
        b"MSETEX" => {
            let ttl = parse_f64(arg(args, 0, "MSETEX")?)?;
            let pairs = pairs(rest(args, 1, "MSETEX")?, "MSETEX")?;
            let entries: Vec<(Vec<u8>, Vec<u8>, f64)> = pairs
                .into_iter()
                .map(|(k, v)| (k, v, ttl))
                .collect();
            let count = entries.len();
            store.msetex(&entries)?;
            reply(Value::Int(count as i64))
        }
        b"MDELETE" => {
            let keys: Vec<Vec<u8>> = non_empty(args, "MDELETE")?.to_vec();
            reply(Value::Int(store.mdelete(&keys)?))
        }
        b"MPOP" => {
            let keys: Vec<Vec<u8>> = non_empty(args, "MPOP")?.to_vec();
            let values = store.mpop(&keys)?;
            reply(Value::Array(values.into_iter().map(opt_scalar_to_value).collect()))
        }

        // ---- SET -----------------------------------------------------------
        b"SADD" => {
            let members = non_empty(rest(args, 1, "SADD")?, "SADD")?.to_vec();
            reply(Value::Int(store.sadd(arg(args, 0, "SADD")?, &members)?))
        }
        b"SCARD" => reply(Value::Int(store.scard(arg(args, 0, "SCARD")?)?)),
        b"SISMEMBER" => reply(Value::from_bool(
            store.sismember(arg(args, 0, "SISMEMBER")?, arg(args, 1, "SISMEMBER")?)?,
        )),
        b"SMEMBERS" => reply(bytes_set(store.smembers(arg(args, 0, "SMEMBERS")?)?)),
        b"SREM" => {
            let members = non_empty(rest(args, 1, "SREM")?, "SREM")?.to_vec();
            reply(Value::Int(store.srem(arg(args, 0, "SREM")?, &members)?))
        }
        b"SPOP" => reply(
            store
                .spop(arg(args, 0, "SPOP")?)?
                .map(Value::bulk)
                .unwrap_or_else(Value::null),
        ),
        b"SUNION" => {
            let keys = non_empty(args, "SUNION")?.to_vec();
            reply(bytes_set(store.sunion(&keys)?))
        }
        b"SINTER" => {
            let keys = non_empty(args, "SINTER")?.to_vec();
            reply(bytes_set(store.sinter(&keys)?))
        }
        b"SDIFF" => {
            let keys = non_empty(args, "SDIFF")?.to_vec();
            reply(bytes_set(store.sdiff(&keys)?))
        }
        b"SUNIONSTORE" => {
            let keys = non_empty(rest(args, 1, "SUNIONSTORE")?, "SUNIONSTORE")?.to_vec();
            reply(Value::Int(
                store.sunionstore(arg(args, 0, "SUNIONSTORE")?, &keys)?,
            ))
        }
        b"SINTERSTORE" => {
            let keys = non_empty(rest(args, 1, "SINTERSTORE")?, "SINTERSTORE")?.to_vec();
            reply(Value::Int(
                store.sinterstore(arg(args, 0, "SINTERSTORE")?, &keys)?,
            ))
        }
        b"SDIFFSTORE" => {
            let keys = non_empty(rest(args, 1, "SDIFFSTORE")?, "SDIFFSTORE")?.to_vec();
            reply(Value::Int(
                store.sdiffstore(arg(args, 0, "SDIFFSTORE")?, &keys)?,
            ))
        }

        // ---- HASH ------------------------------------------------------------
        b"HSET" => reply(Value::Int(store.hset(
            arg(args, 0, "HSET")?,
            arg(args, 1, "HSET")?.to_vec(),
            arg(args, 2, "HSET")?.to_vec(),
        )?)),
        b"HSETNX" => reply(Value::Int(store.hsetnx(
            arg(args, 0, "HSETNX")?,
            arg(args, 1, "HSETNX")?.to_vec(),
            arg(args, 2, "HSETNX")?.to_vec(),
        )?)),
        b"HMSET" => {
            let fields = pairs(rest(args, 1, "HMSET")?, "HMSET")?;
            store.hmset(arg(args, 0, "HMSET")?, fields)?;
            reply(Value::Simple(b"OK".to_vec()))
        }
        b"HGET" => reply(opt_scalar_to_value(
            store.hget(arg(args, 0, "HGET")?, arg(args, 1, "HGET")?)?,
        )),
        b"HMGET" => {
            let key = arg(args, 0, "HMGET")?;
            let fields: Vec<Vec<u8>> = non_empty(rest(args, 1, "HMGET")?, "HMGET")?.to_vec();
            let got = store.hmget(key, &fields)?;
            reply(Value::Dict(
                got.into_iter()
                    .map(|(field, value)| (Value::bulk(field), opt_scalar_to_value(value)))
                    .collect(),
            ))
        }
        b"HDEL" => {
            let fields = non_empty(rest(args, 1, "HDEL")?, "HDEL")?.to_vec();
            reply(Value::Int(store.hdel(arg(args, 0, "HDEL")?, &fields)?))
        }
        b"HEXISTS" => reply(Value::from_bool(
            store.hexists(arg(args, 0, "HEXISTS")?, arg(args, 1, "HEXISTS")?)?,
        )),
        b"HKEYS" => reply(bytes_array(store.hkeys(arg(args, 0, "HKEYS")?)?)),
        b"HVALS" => reply(scalar_array(store.hvals(arg(args, 0, "HVALS")?)?)),
        b"HGETALL" => {
            let got = store.hgetall(arg(args, 0, "HGETALL")?)?;
            reply(Value::Dict(
                got.into_iter()
                    .map(|(field, value)| (Value::bulk(field), scalar_to_value(value)))
                    .collect(),
            ))
        }
        b"HLEN" => reply(Value::Int(store.hlen(arg(args, 0, "HLEN")?)?)),
        b"HINCRBY" => {
            let delta = parse_i64(arg(args, 2, "HINCRBY")?)?;
            reply(Value::Int(store.hincrby(
                arg(args, 0, "HINCRBY")?,
                arg(args, 1, "HINCRBY")?.to_vec(),
                delta,
            )?))
        }

        // ---- QUEUE -------------------------------------------------------------
        b"LPUSH" => {
            let values = non_empty(rest(args, 1, "LPUSH")?, "LPUSH")?.to_vec();
            reply(Value::Int(store.lpush(arg(args, 0, "LPUSH")?, values)?))
        }
        b"RPUSH" => {
            let values = non_empty(rest(args, 1, "RPUSH")?, "RPUSH")?.to_vec();
            reply(Value::Int(store.rpush(arg(args, 0, "RPUSH")?, values)?))
        }
        b"LPOP" => reply(opt_scalar_to_value(store.lpop(arg(args, 0, "LPOP")?)?)),
        b"RPOP" => reply(opt_scalar_to_value(store.rpop(arg(args, 0, "RPOP")?)?)),
        b"LLEN" => reply(Value::Int(store.llen(arg(args, 0, "LLEN")?)?)),
        b"LINDEX" => {
            let index = parse_i64(arg(args, 1, "LINDEX")?)?;
            reply(opt_scalar_to_value(
                store.lindex(arg(args, 0, "LINDEX")?, index)?,
            ))
        }
        b"LRANGE" => {
            let start = parse_i64(arg(args, 1, "LRANGE")?)?;
            let stop = parse_i64(arg(args, 2, "LRANGE")?)?;
            reply(scalar_array(store.lrange(arg(args, 0, "LRANGE")?, start, stop)?))
        }
        b"LSET" => {
            let index = parse_i64(arg(args, 1, "LSET")?)?;
            reply(Value::Int(store.lset(
                arg(args, 0, "LSET")?,
                index,
                arg(args, 2, "LSET")?.to_vec(),
            )?))
        }
        b"LTRIM" => {
            let start = parse_i64(arg(args, 1, "LTRIM")?)?;
            let stop = parse_i64(arg(args, 2, "LTRIM")?)?;
            store.ltrim(arg(args, 0, "LTRIM")?, start, stop)?;
            reply(Value::Simple(b"OK".to_vec()))
        }
        b"RPOPLPUSH" => {
            let moved = store.rpoplpush(arg(args, 0, "RPOPLPUSH")?, arg(args, 1, "RPOPLPUSH")?)?;
            reply(Value::Int(i64::from(moved.is_some())))
        }
        b"LREM" => {
            let count = parse_i64(arg(args, 1, "LREM")?)?;
            reply(Value::Int(store.lrem(
                arg(args, 0, "LREM")?,
                count,
                arg(args, 2, "LREM")?,
            )?))
        }
        b"LFLUSH" => reply(Value::Int(store.lflush(arg(args, 0, "LFLUSH")?)?)),

        // ---- Admin -------------------------------------------------------------
        b"EXPIRE" => {
            let seconds = parse_f64(arg(args, 1, "EXPIRE")?)?;
            reply(Value::Int(store.expire(arg(args, 0, "EXPIRE")?, seconds)?))
        }
        b"FLUSHALL" => reply(Value::Int(store.flushall())),
        b"SAVE" => {
            let path = path_arg(args, "SAVE")?;
            store.save(&path)?;
            reply(Value::from_bool(true))
        }
        b"RESTORE" => {
            let path = path_arg(args, "RESTORE")?;
            reply(Value::from_bool(store.restore(&path)?))
        }
        b"MERGE" => {
            let path = path_arg(args, "MERGE")?;
            reply(Value::from_bool(store.merge(&path)?))
        }
        b"PING" => reply(match args.first() {
            Some(payload) => Value::bulk(payload.clone()),
            None => Value::Simple(b"PONG".to_vec()),
        }),
        b"QUIT" => Ok(Outcome::Quit(Value::Int(1))),
        b"SHUTDOWN" => Ok(Outcome::Shutdown(Value::Int(1))),

        other => Err(CommandError::UnrecognizedCommand(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(parts: &[&[u8]]) -> Value {
        Value::Array(parts.iter().map(|p| Value::bulk(p.to_vec())).collect())
    }

    #[test]
    fn set_get_append_len_scenario() {
        let mut store = Store::new();
        let (reply_value, signal) = dispatch(&mut store, req(&[b"SET", b"a", b"hello"]));
        assert_eq!(reply_value, Value::Int(1));
        assert_eq!(signal, Signal::None);

        let (got, _) = dispatch(&mut store, req(&[b"GET", b"a"]));
        assert_eq!(got, Value::bulk(b"hello".to_vec()));

        let (appended, _) = dispatch(&mut store, req(&[b"APPEND", b"a", b" world"]));
        assert_eq!(appended, Value::bulk(b"hello world".to_vec()));

        let (len, _) = dispatch(&mut store, req(&[b"LEN"]));
        assert_eq!(len, Value::Int(1));
    }

    #[test]
    fn incr_then_set_then_incr_reports_wrong_value_type() {
        let mut store = Store::new();
        assert_eq!(dispatch(&mut store, req(&[b"INCR", b"ctr"])).0, Value::Int(1));
        assert_eq!(
            dispatch(&mut store, req(&[b"INCRBY", b"ctr", b"5"])).0,
            Value::Int(6)
        );
        assert_eq!(dispatch(&mut store, req(&[b"DECR", b"ctr"])).0, Value::Int(5));
        dispatch(&mut store, req(&[b"SET", b"ctr", b"x"]));
        let (err, _) = dispatch(&mut store, req(&[b"INCR", b"ctr"]));
        assert!(matches!(err, Value::Error(_)));
    }

    #[test]
    fn hmget_returns_dict_with_missing_fields_null() {
        let mut store = Store::new();
        dispatch(&mut store, req(&[b"HSET", b"h", b"f1", b"v1"]));
        dispatch(&mut store, req(&[b"HINCRBY", b"h", b"n", b"3"]));
        let (got, _) = dispatch(&mut store, req(&[b"HMGET", b"h", b"f1", b"missing"]));
        assert_eq!(
            got,
            Value::Dict(vec![
                (Value::bulk(b"f1".to_vec()), Value::bulk(b"v1".to_vec())),
                (Value::bulk(b"missing".to_vec()), Value::null()),
            ])
        );
    }

    #[test]
    fn unknown_command_is_a_wire_error() {
        let mut store = Store::new();
        let (value, signal) = dispatch(&mut store, req(&[b"NOPE"]));
        assert!(matches!(value, Value::Error(_)));
        assert_eq!(signal, Signal::None);
    }

    #[test]
    fn quit_and_shutdown_signal_the_connection_loop() {
        let mut store = Store::new();
        let (_, signal) = dispatch(&mut store, req(&[b"QUIT"]));
        assert_eq!(signal, Signal::Quit);
        let (_, signal) = dispatch(&mut store, req(&[b"SHUTDOWN"]));
        assert_eq!(signal, Signal::Shutdown);
    }

    #[test]
    fn inline_non_array_request_splits_on_whitespace() {
        let mut store = Store::new();
        let (value, _) = dispatch(&mut store, Value::bulk(b"PING".to_vec()));
        assert_eq!(value, Value::Simple(b"PONG".to_vec()));
    }

    #[test]
    fn rpoplpush_end_to_end() {
        let mut store = Store::new();
        dispatch(&mut store, req(&[b"RPUSH", b"q", b"x", b"y", b"z"]));
        let (range, _) = dispatch(&mut store, req(&[b"LRANGE", b"q", b"0", b"2"]));
        assert_eq!(
            range,
            Value::Array(vec![Value::bulk(b"x".to_vec()), Value::bulk(b"y".to_vec())])
        );
        let (moved, _) = dispatch(&mut store, req(&[b"RPOPLPUSH", b"q", b"q2"]));
        assert_eq!(moved, Value::Int(1));
        let (popped, _) = dispatch(&mut store, req(&[b"LPOP", b"q2"]));
        assert_eq!(popped, Value::bulk(b"z".to_vec()));
    }

    #[test]
    fn rpoplpush_on_empty_source_reports_zero_and_skips_dest() {
        let mut store = Store::new();
        let (moved, _) = dispatch(&mut store, req(&[b"RPOPLPUSH", b"missing", b"dest"]));
        assert_eq!(moved, Value::Int(0));
        let (exists, _) = dispatch(&mut store, req(&[b"EXISTS", b"dest"]));
        assert_eq!(exists, Value::Int(0));
    }
}
