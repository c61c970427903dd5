//! # Listener
//!
//! Two accept loops share one dispatcher and one store: a cooperative
//! tokio-task pool bounded by a semaphore, and an OS-thread-per-connection
//! pool for workloads that prefer real preemption over cooperative
//! scheduling. Both hold the store behind the same `parking_lot::Mutex`
//! and serialize every command through it — the simplest correct design
//! for a single exclusive key-space.

use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use ferrokv_engine::Store;

use crate::config::ServerConfig;
use crate::connection::{self, Signal};
use crate::metrics::Metrics;

/// Spawns a background thread that waits for Ctrl+C and flips
/// `shutdown` when it fires. Runs its own tiny current-thread runtime so
/// it works uniformly whether the listener itself is async or not.
fn spawn_ctrlc_watcher(shutdown: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                tracing::error!(%err, "failed to start ctrl-c watcher runtime");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, shutting down");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    });
}

/// Runs the cooperative-task listener to completion. Returns once a
/// `SHUTDOWN` command is received on some connection or Ctrl+C fires.
pub async fn run_cooperative(
    config: ServerConfig,
    store: Arc<Mutex<Store>>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, mode = "cooperative", "listening");

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_ctrlc_watcher(shutdown.clone());
    let permits = Arc::new(Semaphore::new(config.max_clients));

    while !shutdown.load(Ordering::SeqCst) {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = tokio::time::sleep(Duration::from_millis(50)) => continue,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                continue;
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            tracing::warn!(%err, "failed to set TCP_NODELAY");
        }

        let permit = match permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(%peer, "max-clients reached, dropping connection");
                continue;
            }
        };

        let store = store.clone();
        let metrics = metrics.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _permit = permit;
            tracing::debug!(%peer, "connection accepted");
            let signal = connection::run_async(stream, &store, &metrics).await;
            if signal == Signal::Shutdown {
                shutdown.store(true, Ordering::SeqCst);
            }
            tracing::debug!(%peer, "connection closed");
        });
    }

    tracing::info!("cooperative listener stopped");
    Ok(())
}

/// Runs the OS-thread-per-connection listener to completion using purely
/// synchronous I/O. Deliberately avoids tokio entirely on this path —
/// moving a tokio-registered socket onto another thread's runtime isn't
/// supported, so threaded mode uses `std::net` end to end, polling
/// `accept` in non-blocking mode against the shared shutdown flag.
pub fn run_threaded(config: ServerConfig, store: Arc<Mutex<Store>>, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let listener = StdTcpListener::bind(config.addr)?;
    listener.set_nonblocking(true)?;
    tracing::info!(addr = %config.addr, mode = "threaded", "listening");

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_ctrlc_watcher(shutdown.clone());

    let active = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if active.load(Ordering::SeqCst) >= config.max_clients {
                    tracing::warn!(%peer, "max-clients reached, dropping connection");
                    continue;
                }
                if let Err(err) = stream.set_nodelay(true) {
                    tracing::warn!(%err, "failed to set TCP_NODELAY");
                }
                active.fetch_add(1, Ordering::SeqCst);
                let store = store.clone();
                let metrics = metrics.clone();
                let active = active.clone();
                let shutdown = shutdown.clone();
                let handle = std::thread::spawn(move || {
                    tracing::debug!(%peer, "connection accepted");
                    let mut stream = stream;
                    let signal = connection::run_blocking(&mut stream, &store, &metrics);
                    if signal == Signal::Shutdown {
                        shutdown.store(true, Ordering::SeqCst);
                    }
                    tracing::debug!(%peer, "connection closed");
                    active.fetch_sub(1, Ordering::SeqCst);
                });
                handles.retain(|h: &std::thread::JoinHandle<()>| !h.is_finished());
                handles.push(handle);
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                tracing::warn!(%err, "accept failed");
            }
        }
    }

    for handle in handles {
        let _ = handle.join();
    }
    tracing::info!("threaded listener stopped");
    Ok(())
}
