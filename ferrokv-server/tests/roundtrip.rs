//! Drives a real listener on an ephemeral port with `ferrokv-client`,
//! exercising the threaded listener end to end.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use ferrokv_client::{ClientConfig, KVClient, ScalarValue};
use ferrokv_engine::Store;
use ferrokv_server::config::ServerConfig;
use ferrokv_server::server;
use ferrokv_server::Metrics;

static NEXT_PORT: AtomicU16 = AtomicU16::new(18_000);

fn free_port() -> u16 {
    loop {
        let port = NEXT_PORT.fetch_add(1, Ordering::SeqCst);
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return port;
        }
    }
}

fn spawn_threaded_server() -> SocketAddr {
    let port = free_port();
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let config = ServerConfig {
        addr,
        max_clients: 16,
        use_threads: true,
    };
    let store = Arc::new(Mutex::new(Store::new()));
    let metrics = Arc::new(Metrics::new());
    thread::spawn(move || {
        let _ = server::run_threaded(config, store, metrics);
    });
    // give the listener a moment to bind before the first connect attempt.
    thread::sleep(Duration::from_millis(50));
    addr
}

fn client_for(addr: SocketAddr) -> KVClient {
    KVClient::with_config(ClientConfig {
        addr: addr.to_string(),
        read_timeout: Some(Duration::from_secs(2)),
        write_timeout: Some(Duration::from_secs(2)),
        connect_timeout: Some(Duration::from_secs(2)),
        ..ClientConfig::default()
    })
}

#[test]
fn set_get_delete_roundtrip_over_real_socket() {
    let addr = spawn_threaded_server();
    let client = client_for(addr);

    client.set(b"greeting", b"hello").unwrap();
    assert_eq!(client.get(b"greeting").unwrap(), Some(ScalarValue::Bytes(b"hello".to_vec())));
    assert!(client.exists(b"greeting").unwrap());
    assert!(client.delete(b"greeting").unwrap());
    assert_eq!(client.get(b"greeting").unwrap(), None);
}

#[test]
fn hash_and_queue_commands_round_trip() {
    let addr = spawn_threaded_server();
    let client = client_for(addr);

    client.hset(b"profile", b"name", b"ada").unwrap();
    client.hset(b"profile", b"lang", b"rust").unwrap();
    assert_eq!(client.hget(b"profile", b"name").unwrap(), Some(ScalarValue::Bytes(b"ada".to_vec())));
    assert_eq!(client.hlen(b"profile").unwrap(), 2);

    client.rpush(b"queue", &[b"a", b"b", b"c"]).unwrap();
    assert_eq!(client.llen(b"queue").unwrap(), 3);
    assert_eq!(client.lpop(b"queue").unwrap(), Some(ScalarValue::Bytes(b"a".to_vec())));
}

#[test]
fn incr_on_missing_key_starts_at_zero() {
    let addr = spawn_threaded_server();
    let client = client_for(addr);

    assert_eq!(client.incr(b"counter").unwrap(), 1);
    assert_eq!(client.incrby(b"counter", 41).unwrap(), 42);
}

#[test]
fn expire_then_flushall_clears_the_keyspace() {
    let addr = spawn_threaded_server();
    let client = client_for(addr);

    client.set(b"temp", b"value").unwrap();
    assert!(client.expire(b"temp", Duration::from_secs(60)).unwrap());
    assert_eq!(client.flushall().unwrap(), 1);
    assert_eq!(client.get(b"temp").unwrap(), None);
}
