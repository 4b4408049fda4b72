//! Connection-oriented client library: marshals the ten operations onto a
//! `UnixStream` and demarshals replies, following the framing in
//! `protocol`. One method per operation, in `ThreadState`'s style.

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::error::{Result, ServerError};
use crate::protocol::reply::{self, Payload, PayloadKind, ReplyStatus};
use crate::protocol::request::{self, Request};
use crate::protocol::{flags, write_frame, write_raw, FRAME_LEN};

/// A file retrieved by `read`/`read_n`, or a victim evicted by `write`/`append`.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub name: String,
    pub content: Vec<u8>,
}

/// How long `lock` waits between permission-denied retries.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Configuration carried on the handle rather than as process-wide globals.
pub struct ClientHandle {
    stream: UnixStream,
    /// Emit a one-line trace of each operation to stdout.
    pub verbose: bool,
    /// Exit the process on a FATAL reply instead of returning `Err`.
    pub strict: bool,
}

impl ClientHandle {
    /// Opens a connection to the server listening on `socket_path`.
    pub fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).map_err(ServerError::Io)?;
        Ok(ClientHandle {
            stream,
            verbose: false,
            strict: false,
        })
    }

    pub fn with_flags(mut self, verbose: bool, strict: bool) -> Self {
        self.verbose = verbose;
        self.strict = strict;
        self
    }

    pub fn open(&mut self, path: &str, create: bool, lock: bool) -> Result<()> {
        let mut f = 0u8;
        if create {
            f |= flags::CREATE;
        }
        if lock {
            f |= flags::LOCK;
        }
        self.trace(&format!("open {path} flags={f}"));
        self.roundtrip(
            &Request::Open {
                path: path.to_string(),
                flags: f,
            },
            PayloadKind::None,
        )
        .map(|_| ())
    }

    pub fn close(&mut self, path: &str) -> Result<()> {
        self.trace(&format!("close {path}"));
        self.roundtrip(
            &Request::Close {
                path: path.to_string(),
            },
            PayloadKind::None,
        )
        .map(|_| ())
    }

    pub fn read(&mut self, path: &str, save: bool) -> Result<Vec<u8>> {
        self.trace(&format!("read {path}"));
        let reply = self.roundtrip(
            &Request::Read {
                path: path.to_string(),
                save,
            },
            PayloadKind::Read,
        )?;
        match reply.payload {
            Payload::Read { content } => Ok(content),
            _ => Err(ServerError::BadMessage),
        }
    }

    pub fn read_n(&mut self, n: i64) -> Result<Vec<FileContent>> {
        self.trace(&format!("readN {n}"));
        let reply = self.roundtrip(&Request::ReadN { n }, PayloadKind::ReadN)?;
        match reply.payload {
            Payload::ReadN { files } => Ok(files
                .into_iter()
                .map(|(name, content)| FileContent { name, content })
                .collect()),
            _ => Err(ServerError::BadMessage),
        }
    }

    pub fn write(&mut self, path: &str, content: Vec<u8>) -> Result<Vec<FileContent>> {
        self.trace(&format!("write {path} ({} bytes)", content.len()));
        let reply = self.roundtrip(
            &Request::Write {
                path: path.to_string(),
                content,
            },
            PayloadKind::WriteOrAppend,
        )?;
        match reply.payload {
            Payload::WriteOrAppend { evicted } => Ok(evicted
                .into_iter()
                .map(|(name, content)| FileContent { name, content })
                .collect()),
            _ => Err(ServerError::BadMessage),
        }
    }

    pub fn append(&mut self, path: &str, content: Vec<u8>) -> Result<Vec<FileContent>> {
        self.trace(&format!("append {path} ({} bytes)", content.len()));
        let reply = self.roundtrip(
            &Request::Append {
                path: path.to_string(),
                content,
            },
            PayloadKind::WriteOrAppend,
        )?;
        match reply.payload {
            Payload::WriteOrAppend { evicted } => Ok(evicted
                .into_iter()
                .map(|(name, content)| FileContent { name, content })
                .collect()),
            _ => Err(ServerError::BadMessage),
        }
    }

    /// Retries internally while the server returns permission-denied; any
    /// other error (including a genuine FATAL) surfaces immediately.
    pub fn lock(&mut self, path: &str) -> Result<()> {
        self.trace(&format!("lock {path}"));
        loop {
            match self.roundtrip(
                &Request::Lock {
                    path: path.to_string(),
                },
                PayloadKind::None,
            ) {
                Ok(_) => return Ok(()),
                Err(ServerError::PermissionDenied) => {
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn unlock(&mut self, path: &str) -> Result<()> {
        self.trace(&format!("unlock {path}"));
        self.roundtrip(
            &Request::Unlock {
                path: path.to_string(),
            },
            PayloadKind::None,
        )
        .map(|_| ())
    }

    pub fn remove(&mut self, path: &str) -> Result<()> {
        self.trace(&format!("remove {path}"));
        self.roundtrip(
            &Request::Remove {
                path: path.to_string(),
            },
            PayloadKind::None,
        )
        .map(|_| ())
    }

    /// Tells the server this connection is finished; the dispatcher treats
    /// the descriptor as departed rather than re-arming it.
    pub fn shutdown_connection(mut self) -> Result<()> {
        self.trace("shutdown");
        self.send(&Request::Shutdown)?;
        Ok(())
    }

    fn roundtrip(&mut self, request: &Request, kind: PayloadKind) -> Result<reply::Reply> {
        self.send(request)?;
        let reply = reply::read_reply(&mut self.stream, kind)?;
        match reply.status {
            ReplyStatus::Success => Ok(reply),
            ReplyStatus::Failure(errno) => Err(errno_to_error(errno)),
            ReplyStatus::Fatal(errno) => {
                let err = errno_to_error(errno);
                if self.strict {
                    eprintln!("fatal error from server: {err}");
                    std::process::exit(errno);
                }
                Err(err)
            }
        }
    }

    fn send(&mut self, request: &Request) -> Result<()> {
        let frame = request::encode_request(request);
        write_frame(&mut self.stream, &frame, FRAME_LEN)?;
        if let Request::Write { content, .. } | Request::Append { content, .. } = request {
            write_raw(&mut self.stream, content).map_err(ServerError::Io)?;
        }
        Ok(())
    }

    fn trace(&self, line: &str) {
        if self.verbose {
            println!("fstore-client: {line}");
        }
        debug!("{line}");
    }
}

/// Maps an errno-like number back onto a `ServerError` variant, for the
/// client side of the wire where only the number crosses the socket.
fn errno_to_error(errno: i32) -> ServerError {
    use crate::error::errno::*;
    match errno {
        ENOENT => ServerError::NoSuchEntry,
        EEXIST => ServerError::AlreadyExists,
        EACCES => ServerError::AccessDenied,
        EPERM => ServerError::PermissionDenied,
        ENOSPC => ServerError::NoSpace,
        EFBIG => ServerError::FileTooBig,
        EIDRM => ServerError::Evicted,
        ENOMEM => ServerError::OutOfMemory,
        EINVAL => ServerError::InvalidArgument,
        EBADF => ServerError::AlreadyOpen,
        ENOTCONN => ServerError::NoConnection,
        _ => ServerError::BadMessage,
    }
}
