//! Worker pool: each thread dequeues one ready connection, services exactly
//! one request on it, and hands it back to the dispatcher.

use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::cache::{Cache, ClientId, EvictingResult};
use crate::error::Outcome;
use crate::protocol::reply::{self, Payload, Status};
use crate::protocol::request::{self, Request};
use crate::sync::BoundedQueue;

/// Sentinel descriptor token pushed once per worker on shutdown.
pub const SHUTDOWN_SENTINEL: &str = "0";

/// Shared table of live connections, keyed by the descriptor the dispatcher
/// uses as the client's identity for the lifetime of the connection.
pub type ConnectionTable = Arc<Mutex<HashMap<ClientId, UnixStream>>>;

/// What a worker tells the dispatcher to do with a descriptor once it is
/// done servicing one request on it.
pub enum Departure {
    /// Re-arm this descriptor in the poller; it is still connected.
    Rearm(ClientId),
    /// The client disconnected (cleanly or on a wire error); forget it.
    Departed,
}

pub fn spawn_pool(
    n: usize,
    queue: Arc<BoundedQueue<String>>,
    cache: Arc<Cache>,
    connections: ConnectionTable,
    notify: UnixStream,
) -> Vec<JoinHandle<()>> {
    (0..n)
        .map(|idx| {
            let queue = queue.clone();
            let cache = cache.clone();
            let connections = connections.clone();
            let notify = notify.try_clone().expect("duplicate notify pipe handle");
            std::thread::Builder::new()
                .name(format!("fstore-worker-{idx}"))
                .spawn(move || worker_loop(&queue, &cache, &connections, notify))
                .expect("spawn worker thread")
        })
        .collect()
}

fn worker_loop(
    queue: &BoundedQueue<String>,
    cache: &Cache,
    connections: &ConnectionTable,
    mut notify: UnixStream,
) {
    loop {
        let token = queue.pop();
        if token == SHUTDOWN_SENTINEL {
            debug!("worker received shutdown sentinel");
            return;
        }
        let client: ClientId = match token.parse() {
            Ok(v) => v,
            Err(_) => continue,
        };

        let departure = service_one(client, cache, connections);
        let notify_text = match departure {
            Departure::Rearm(id) => id.to_string(),
            Departure::Departed => "0".to_string(),
        };
        if let Err(e) = crate::protocol::write_frame(
            &mut notify,
            notify_text.as_bytes(),
            crate::protocol::NOTIFY_LEN,
        ) {
            error!("failed to notify dispatcher: {e}");
        }
    }
}

/// Reads one request from `client`'s connection, runs it through the cache
/// engine, and writes the reply. Returns whether the descriptor should be
/// re-armed for more requests or treated as departed.
fn service_one(client: ClientId, cache: &Cache, connections: &ConnectionTable) -> Departure {
    let mut stream = {
        let table = connections.lock();
        match table.get(&client) {
            Some(s) => match s.try_clone() {
                Ok(s) => s,
                Err(e) => {
                    warn!("client {client}: failed to clone stream: {e}");
                    return Departure::Departed;
                }
            },
            None => return Departure::Departed,
        }
    };

    let request = match request::read_request(&mut stream) {
        Ok(r) => r,
        Err(_) => {
            connections.lock().remove(&client);
            cache.disconnect_client(client);
            return Departure::Departed;
        }
    };

    if matches!(request, Request::Shutdown) {
        info!("client {client} requested shutdown of its connection");
        connections.lock().remove(&client);
        cache.disconnect_client(client);
        return Departure::Departed;
    }

    let (status, payload) = handle_request(client, &request, cache);
    let fatal = matches!(status, Status::Fatal(_));

    if let Err(e) = reply::write_reply(&mut stream, status, &payload) {
        warn!("client {client}: failed to write reply: {e}");
        connections.lock().remove(&client);
        cache.disconnect_client(client);
        return Departure::Departed;
    }

    if fatal {
        error!("fatal error servicing client {client}, aborting process");
        std::process::exit(1);
    }

    Departure::Rearm(client)
}

fn handle_request(client: ClientId, request: &Request, cache: &Cache) -> (Status, Payload) {
    match request {
        Request::Open { path, flags } => outcome_to_reply(cache.open_file(path, *flags, client), Payload::None),
        Request::Close { path } => outcome_to_reply(cache.close_file(path, client), Payload::None),
        Request::Read { path, .. } => match cache.read_file(path, client) {
            Outcome::Success(content) => (Status::Success, Payload::Read { content }),
            Outcome::Failure(e) => (Status::Failure(e.errno()), Payload::Read { content: Vec::new() }),
            Outcome::Fatal(e) => (Status::Fatal(e.errno()), Payload::Read { content: Vec::new() }),
        },
        Request::ReadN { n } => match cache.read_n_files(*n, client) {
            Outcome::Success(files) => (Status::Success, Payload::ReadN { files }),
            Outcome::Failure(e) => (Status::Failure(e.errno()), Payload::ReadN { files: Vec::new() }),
            Outcome::Fatal(e) => (Status::Fatal(e.errno()), Payload::ReadN { files: Vec::new() }),
        },
        Request::Write { path, content } => {
            evicting_to_reply(cache.write_file(path, content.clone(), client))
        }
        Request::Append { path, content } => {
            evicting_to_reply(cache.append_to_file(path, content.clone(), client))
        }
        Request::Lock { path } => outcome_to_reply(cache.lock_file(path, client), Payload::None),
        Request::Unlock { path } => outcome_to_reply(cache.unlock_file(path, client), Payload::None),
        Request::Remove { path } => outcome_to_reply(cache.remove_file(path, client), Payload::None),
        Request::Shutdown => unreachable!("handled by the caller"),
    }
}

fn outcome_to_reply(outcome: Outcome<()>, on_success: Payload) -> (Status, Payload) {
    match outcome {
        Outcome::Success(()) => (Status::Success, on_success),
        Outcome::Failure(e) => (Status::Failure(e.errno()), Payload::None),
        Outcome::Fatal(e) => (Status::Fatal(e.errno()), Payload::None),
    }
}

fn evicting_to_reply(result: EvictingResult<()>) -> (Status, Payload) {
    let EvictingResult { outcome, evicted } = result;
    let status = match outcome {
        Outcome::Success(()) => Status::Success,
        Outcome::Failure(e) => Status::Failure(e.errno()),
        Outcome::Fatal(e) => Status::Fatal(e.errno()),
    };
    (status, Payload::WriteOrAppend { evicted })
}
