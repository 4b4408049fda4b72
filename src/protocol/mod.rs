//! Wire framing shared by the worker (server side) and the client library.
//!
//! Every frame is fixed-size and zero-padded; this is what keeps the client
//! library's parser "bit-faithful" regardless of payload length.

pub mod reply;
pub mod request;

use std::io::{self, Read, Write};

use crate::error::{ServerError, Result};

/// Size of a request frame and of the path frame embedded in READ_N replies.
pub const FRAME_LEN: usize = 2048;
/// Size of a textual size/count frame (READ/READ_N/WRITE/APPEND payloads).
pub const SIZE_LEN: usize = 32;
/// Size of the textual outcome code frame ("0"/"1"/"-1").
pub const OUTCOME_LEN: usize = 2;
/// Size of the textual errno frame sent after a non-success outcome.
pub const ERRNO_LEN: usize = 4;
/// Size of a notification-pipe frame (descriptor number, "0" = departed).
pub const NOTIFY_LEN: usize = 10;
/// Maximum path length, not counting a null terminator.
pub const PATH_LEN_MAX: usize = 107;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Open = 0,
    Close = 1,
    Read = 2,
    Write = 3,
    Append = 4,
    ReadN = 5,
    Lock = 6,
    Unlock = 7,
    Remove = 8,
    Shutdown = 9,
}

impl OpCode {
    pub fn from_i64(v: i64) -> Result<OpCode> {
        Ok(match v {
            0 => OpCode::Open,
            1 => OpCode::Close,
            2 => OpCode::Read,
            3 => OpCode::Write,
            4 => OpCode::Append,
            5 => OpCode::ReadN,
            6 => OpCode::Lock,
            7 => OpCode::Unlock,
            8 => OpCode::Remove,
            9 => OpCode::Shutdown,
            _ => return Err(ServerError::BadMessage),
        })
    }
}

pub mod flags {
    pub const CREATE: u8 = 0x1;
    pub const LOCK: u8 = 0x2;
}

/// Reads exactly `len` bytes and returns the content up to the first NUL
/// byte, trimming the zero padding. `BadProtocolSize` on a short read —
/// including a clean EOF, which callers treat as "peer disconnected".
pub fn read_frame<R: Read>(stream: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .map_err(|_| ServerError::BadProtocolSize)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    buf.truncate(end);
    Ok(buf)
}

/// Writes `content` zero-padded to exactly `len` bytes. `BadProtocolSize` if
/// content does not fit.
pub fn write_frame<W: Write>(stream: &mut W, content: &[u8], len: usize) -> Result<()> {
    if content.len() > len {
        return Err(ServerError::BadProtocolSize);
    }
    let mut buf = vec![0u8; len];
    buf[..content.len()].copy_from_slice(content);
    stream.write_all(&buf).map_err(ServerError::Io)
}

/// Reads a raw, unframed payload of exactly `len` bytes (the content that
/// trails a WRITE/APPEND request frame, not itself zero-padded).
pub fn read_raw<R: Read>(stream: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .map_err(|_| ServerError::BadProtocolSize)?;
    Ok(buf)
}

pub fn write_raw<W: Write>(stream: &mut W, content: &[u8]) -> io::Result<()> {
    stream.write_all(content)
}

/// Parses a decimal integer token. Used for op codes, flags, sizes, counts.
pub(crate) fn parse_token<T: std::str::FromStr>(token: Option<&str>) -> Result<T> {
    token
        .ok_or(ServerError::BadMessage)?
        .parse()
        .map_err(|_| ServerError::BadMessage)
}

pub(crate) fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || path.len() > PATH_LEN_MAX || path.chars().any(char::is_whitespace) {
        return Err(ServerError::InvalidArgument);
    }
    Ok(())
}
