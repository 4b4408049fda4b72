//! Server entry point: wires configuration, the cache engine, the worker
//! pool, the dispatcher, and the signal thread together, mirroring the
//! reference implementation's `main`.

use std::collections::HashMap;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use signal_hook::consts::{SIGHUP, SIGINT, SIGPIPE, SIGQUIT};
use signal_hook::iterator::Signals;

use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, ShutdownFlags};
use crate::error::{Result, ServerError};
use crate::sync::BoundedQueue;
use crate::worker;

/// Bounded queue capacity: enough in-flight descriptors that a burst of
/// readiness events doesn't stall the dispatcher waiting for a worker.
fn queue_capacity(worker_threads: usize) -> usize {
    (worker_threads * 4).max(16)
}

pub fn run(config: ServerConfig) -> Result<()> {
    let logger = crate::logging::FileLogger::open(&config.log_path, log::LevelFilter::Info)?;
    logger
        .install()
        .map_err(|e| ServerError::Config(format!("logger already installed: {e}")))?;

    info!("starting with {} worker thread(s)", config.worker_threads);

    if std::path::Path::new(&config.socket_path).exists() {
        std::fs::remove_file(&config.socket_path).map_err(ServerError::Io)?;
    }
    let listener = UnixListener::bind(&config.socket_path).map_err(ServerError::Io)?;

    let cache = Arc::new(Cache::new(config.max_files, config.max_bytes, config.policy));
    let connections: worker::ConnectionTable = Arc::new(Mutex::new(HashMap::new()));
    let queue = Arc::new(BoundedQueue::new(queue_capacity(config.worker_threads)));

    let (notify_tx, notify_rx) = UnixStream::pair().map_err(ServerError::Io)?;

    let workers = worker::spawn_pool(
        config.worker_threads,
        queue.clone(),
        cache.clone(),
        connections.clone(),
        notify_tx,
    );

    let mut dispatcher = Dispatcher::new(listener, notify_rx, connections, queue)
        .map_err(ServerError::Io)?;

    let flags = Arc::new(ShutdownFlags::default());
    let signal_thread = spawn_signal_thread(flags.clone())?;

    dispatcher.run(&flags);

    dispatcher.shut_down_workers(workers.len());
    for handle in workers {
        let _ = handle.join();
    }

    let stats = cache.stats();
    let residual = cache.resident_names();
    info!(
        "shutdown report: peak_file_count={} peak_byte_total={} eviction_events={} residual={:?}",
        stats.peak_file_count, stats.peak_byte_total, stats.eviction_events, residual
    );
    if let Ok(report) = serde_json::to_string(&ShutdownReport {
        stats,
        residual_files: residual,
    }) {
        info!("shutdown report (json): {report}");
    }

    let _ = std::fs::remove_file(&config.socket_path);
    signal_thread.close();
    Ok(())
}

#[derive(serde::Serialize)]
struct ShutdownReport {
    stats: crate::cache::CacheStats,
    residual_files: Vec<String>,
}

/// A handle letting `run` ask the signal-handling thread to stop once the
/// dispatcher has already returned on its own (e.g. after a hard shutdown).
struct SignalThreadHandle {
    signals: signal_hook::iterator::Handle,
    join: std::thread::JoinHandle<()>,
}

impl SignalThreadHandle {
    fn close(self) {
        self.signals.close();
        let _ = self.join.join();
    }
}

fn spawn_signal_thread(flags: Arc<ShutdownFlags>) -> Result<SignalThreadHandle> {
    // An empty handler is the portable way to get SIG_IGN semantics through
    // signal-hook: a client disconnecting mid-write becomes a normal I/O
    // error on that worker's stream instead of killing the process.
    unsafe {
        signal_hook::low_level::register(SIGPIPE, || {}).map_err(ServerError::Io)?;
    }

    let mut signals = Signals::new([SIGINT, SIGQUIT, SIGHUP]).map_err(ServerError::Io)?;
    let handle = signals.handle();

    let join = std::thread::Builder::new()
        .name("fstore-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGINT | SIGQUIT => {
                        warn!("received hard-shutdown signal {signal}");
                        flags.terminate.store(true, Ordering::SeqCst);
                        break;
                    }
                    SIGHUP => {
                        info!("received soft-shutdown signal");
                        flags.refuse_new.store(true, Ordering::SeqCst);
                    }
                    _ => {}
                }
            }
        })
        .expect("spawn signal thread");

    Ok(SignalThreadHandle {
        signals: handle,
        join,
    })
}
