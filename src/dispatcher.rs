//! Connection dispatcher: accepts clients, multiplexes readiness with the
//! `polling` crate, and feeds ready descriptors to the worker pool.

use std::io::Read;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use polling::{Event, Events, Poller};

use crate::cache::ClientId;
use crate::sync::BoundedQueue;
use crate::worker::ConnectionTable;

/// Distinct poll keys for the two always-present sources; client descriptors
/// use their own fd (always positive) as their key, so these never collide.
const LISTENER_KEY: usize = usize::MAX;
const NOTIFY_KEY: usize = usize::MAX - 1;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Flags checked once per poll iteration; set by the signal thread.
#[derive(Default)]
pub struct ShutdownFlags {
    pub terminate: AtomicBool,
    pub refuse_new: AtomicBool,
}

pub struct Dispatcher {
    listener: UnixListener,
    notify_rx: UnixStream,
    poller: Poller,
    connections: ConnectionTable,
    queue: Arc<BoundedQueue<String>>,
    online: AtomicUsize,
}

impl Dispatcher {
    pub fn new(
        listener: UnixListener,
        notify_rx: UnixStream,
        connections: ConnectionTable,
        queue: Arc<BoundedQueue<String>>,
    ) -> std::io::Result<Self> {
        listener.set_nonblocking(true)?;
        notify_rx.set_nonblocking(true)?;
        let poller = Poller::new()?;
        unsafe {
            poller.add(listener.as_raw_fd(), Event::readable(LISTENER_KEY))?;
            poller.add(notify_rx.as_raw_fd(), Event::readable(NOTIFY_KEY))?;
        }
        Ok(Dispatcher {
            listener,
            notify_rx,
            poller,
            connections,
            queue,
            online: AtomicUsize::new(0),
        })
    }

    /// Runs the accept/poll loop until `flags.terminate` is set, or until
    /// `flags.refuse_new` is set and the last client has left.
    pub fn run(&mut self, flags: &ShutdownFlags) {
        let mut events = Events::new();
        loop {
            if flags.terminate.load(Ordering::SeqCst) {
                info!("dispatcher: hard shutdown requested");
                return;
            }
            if flags.refuse_new.load(Ordering::SeqCst) && self.online.load(Ordering::SeqCst) == 0 {
                info!("dispatcher: soft shutdown complete, no clients remain");
                return;
            }

            events.clear();
            if let Err(e) = self.poller.wait(&mut events, Some(POLL_TIMEOUT)) {
                warn!("dispatcher: poll error: {e}");
                continue;
            }

            let keys: Vec<usize> = events.iter().map(|ev| ev.key).collect();
            for key in keys {
                match key {
                    LISTENER_KEY => {
                        if !flags.refuse_new.load(Ordering::SeqCst) {
                            self.accept_one();
                        }
                        let _ = self
                            .poller
                            .modify(self.listener.as_raw_fd(), Event::readable(LISTENER_KEY));
                    }
                    NOTIFY_KEY => {
                        self.drain_notifications();
                        let _ = self
                            .poller
                            .modify(self.notify_rx.as_raw_fd(), Event::readable(NOTIFY_KEY));
                    }
                    fd_key => {
                        let fd = fd_key as RawFd;
                        let client = fd_key as ClientId;
                        let _ = self.poller.delete(fd);
                        self.queue.push(client.to_string());
                    }
                }
            }
        }
    }

    fn accept_one(&mut self) {
        match self.listener.accept() {
            Ok((stream, _addr)) => {
                let fd = stream.as_raw_fd();
                if let Err(e) = stream.set_nonblocking(false) {
                    warn!("dispatcher: failed to set blocking mode on client {fd}: {e}");
                    return;
                }
                self.connections.lock().insert(fd as ClientId, stream);
                self.online.fetch_add(1, Ordering::SeqCst);
                unsafe {
                    if let Err(e) = self.poller.add(fd, Event::readable(fd as usize)) {
                        warn!("dispatcher: failed to register client {fd}: {e}");
                    }
                }
                debug!("dispatcher: accepted client {fd}");
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("dispatcher: accept error: {e}"),
        }
    }

    fn drain_notifications(&mut self) {
        loop {
            let mut buf = [0u8; crate::protocol::NOTIFY_LEN];
            match self.notify_rx.read_exact(&mut buf) {
                Ok(()) => self.handle_notification(&buf),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("dispatcher: notify pipe read error: {e}");
                    break;
                }
            }
        }
    }

    fn handle_notification(&mut self, buf: &[u8]) {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let text = match std::str::from_utf8(&buf[..end]) {
            Ok(t) => t,
            Err(_) => return,
        };
        let value: i64 = match text.trim().parse() {
            Ok(v) => v,
            Err(_) => return,
        };

        if value == 0 {
            self.online.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        let fd = value as RawFd;
        if self.connections.lock().contains_key(&(fd as ClientId)) {
            unsafe {
                if let Err(e) = self.poller.add(fd, Event::readable(fd as usize)) {
                    warn!("dispatcher: failed to re-arm client {fd}: {e}");
                }
            }
        }
    }

    /// Pushes one shutdown sentinel per worker so each thread can exit its
    /// pop loop.
    pub fn shut_down_workers(&self, worker_count: usize) {
        for _ in 0..worker_count {
            self.queue.push(crate::worker::SHUTDOWN_SENTINEL.to_string());
        }
    }

    pub fn resident_connection_fds(&self) -> Vec<ClientId> {
        self.connections.lock().keys().copied().collect()
    }
}
