//! Shared error type for the cache engine, the wire codec, the dispatcher,
//! the config loader, and the client library.
//!
//! Each reject-style variant carries a POSIX-style errno number, matching the
//! reference implementation's habit of returning `errno` values to the client
//! (see `includes/cache.h` in the original source).

use thiserror::Error;

/// Errno-like numbers used to fill the 4-byte errno frame on FAILURE/FATAL
/// replies. Values follow the POSIX errno each name maps to on Linux, since
/// the original implementation sets `errno` directly.
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const EFBIG: i32 = 27;
    pub const ENOSPC: i32 = 28;
    pub const EIDRM: i32 = 43;
    pub const EBADMSG: i32 = 74;
    pub const EBADF: i32 = 9;
    pub const ENOTCONN: i32 = 107;
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("no connection")]
    NoConnection,
    #[error("already connected")]
    AlreadyConnected,
    #[error("bad message")]
    BadMessage,
    #[error("no such entry")]
    NoSuchEntry,
    #[error("already exists")]
    AlreadyExists,
    #[error("already open")]
    AlreadyOpen,
    #[error("access denied")]
    AccessDenied,
    #[error("permission denied")]
    PermissionDenied,
    #[error("no space")]
    NoSpace,
    #[error("file too big")]
    FileTooBig,
    #[error("evicted")]
    Evicted,
    #[error("out of memory")]
    OutOfMemory,
    #[error("bad protocol size")]
    BadProtocolSize,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl ServerError {
    /// The errno-like number reported to clients on FAILURE/FATAL replies.
    pub fn errno(&self) -> i32 {
        use errno::*;
        match self {
            ServerError::InvalidArgument => EINVAL,
            ServerError::NoConnection => ENOTCONN,
            ServerError::AlreadyConnected => EBADF,
            ServerError::BadMessage => EBADMSG,
            ServerError::NoSuchEntry => ENOENT,
            ServerError::AlreadyExists => EEXIST,
            ServerError::AlreadyOpen => EBADF,
            ServerError::AccessDenied => EACCES,
            ServerError::PermissionDenied => EPERM,
            ServerError::NoSpace => ENOSPC,
            ServerError::FileTooBig => EFBIG,
            ServerError::Evicted => EIDRM,
            ServerError::OutOfMemory => ENOMEM,
            ServerError::BadProtocolSize => EBADMSG,
            ServerError::Io(_) => EBADMSG,
            ServerError::Config(_) => EINVAL,
        }
    }

    /// Whether this error should abort the worker's process rather than
    /// merely surface as a FAILURE reply. Mirrors the engine's
    /// FAILURE/FATAL split: out-of-memory is the only engine-raised FATAL.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::OutOfMemory)
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// The three-way outcome an engine operation reports, matching OP_SUCCESS /
/// OP_FAILURE / OP_EXIT_FATAL in the reference implementation.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure(ServerError),
    Fatal(ServerError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
