//! Reply-frame framing.
//!
//! Every READ/READ_N/WRITE/APPEND reply sends its size/count frames
//! unconditionally, even when the outcome was FAILURE or FATAL (with
//! `K = 0` / `S = 0`) — resolved this way in favor of a symmetric client
//! parser that never has to branch on the outcome to know what to read.

use std::io::{Read, Write};

use crate::error::{Result, ServerError};
use crate::protocol::{read_frame, read_raw, write_frame, write_raw, FRAME_LEN, SIZE_LEN};

#[derive(Debug, Clone, Copy)]
pub enum Status {
    Success,
    Failure(i32),
    Fatal(i32),
}

impl Status {
    fn code(&self) -> &'static str {
        match self {
            Status::Success => "0",
            Status::Failure(_) => "1",
            Status::Fatal(_) => "-1",
        }
    }

    fn errno(&self) -> Option<i32> {
        match self {
            Status::Success => None,
            Status::Failure(e) | Status::Fatal(e) => Some(*e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    None,
    Read {
        content: Vec<u8>,
    },
    ReadN {
        files: Vec<(String, Vec<u8>)>,
    },
    WriteOrAppend {
        evicted: Vec<(String, Vec<u8>)>,
    },
}

/// Writes a full reply: outcome frame, errno frame if non-success, then the
/// op-specific payload frames.
pub fn write_reply<W: Write>(stream: &mut W, status: Status, payload: &Payload) -> Result<()> {
    write_frame(stream, status.code().as_bytes(), crate::protocol::OUTCOME_LEN)?;
    if let Some(errno) = status.errno() {
        write_frame(stream, errno.to_string().as_bytes(), crate::protocol::ERRNO_LEN)?;
    }

    match payload {
        Payload::None => {}
        Payload::Read { content } => {
            write_frame(stream, content.len().to_string().as_bytes(), SIZE_LEN)?;
            write_raw(stream, content).map_err(ServerError::Io)?;
        }
        Payload::ReadN { files } => {
            write_frame(stream, files.len().to_string().as_bytes(), SIZE_LEN)?;
            for (name, content) in files {
                write_frame(stream, name.as_bytes(), FRAME_LEN)?;
                write_frame(stream, content.len().to_string().as_bytes(), SIZE_LEN)?;
                write_raw(stream, content).map_err(ServerError::Io)?;
            }
        }
        Payload::WriteOrAppend { evicted } => {
            write_frame(stream, evicted.len().to_string().as_bytes(), SIZE_LEN)?;
            for (name, content) in evicted {
                write_frame(stream, name.as_bytes(), FRAME_LEN)?;
                write_frame(stream, content.len().to_string().as_bytes(), SIZE_LEN)?;
                write_raw(stream, content).map_err(ServerError::Io)?;
            }
        }
    }
    Ok(())
}

/// Decoded reply, as consumed by the client library.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: ReplyStatus,
    pub payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    Failure(i32),
    Fatal(i32),
}

#[derive(Debug, Clone, Copy)]
pub enum PayloadKind {
    None,
    Read,
    ReadN,
    WriteOrAppend,
}

pub fn read_reply<R: Read>(stream: &mut R, kind: PayloadKind) -> Result<Reply> {
    let outcome = read_frame(stream, crate::protocol::OUTCOME_LEN)?;
    let outcome_text = std::str::from_utf8(&outcome).map_err(|_| ServerError::BadMessage)?;
    let outcome_code: i32 = outcome_text.parse().map_err(|_| ServerError::BadMessage)?;

    let status = match outcome_code {
        0 => ReplyStatus::Success,
        1 => {
            let errno = read_errno(stream)?;
            ReplyStatus::Failure(errno)
        }
        -1 => {
            let errno = read_errno(stream)?;
            ReplyStatus::Fatal(errno)
        }
        _ => return Err(ServerError::BadMessage),
    };

    let payload = match kind {
        PayloadKind::None => Payload::None,
        PayloadKind::Read => {
            let size = read_size(stream)?;
            let content = read_raw(stream, size)?;
            Payload::Read { content }
        }
        PayloadKind::ReadN => {
            let count = read_size(stream)?;
            let mut files = Vec::with_capacity(count);
            for _ in 0..count {
                let name_frame = read_frame(stream, FRAME_LEN)?;
                let name = String::from_utf8(name_frame).map_err(|_| ServerError::BadMessage)?;
                let size = read_size(stream)?;
                let content = read_raw(stream, size)?;
                files.push((name, content));
            }
            Payload::ReadN { files }
        }
        PayloadKind::WriteOrAppend => {
            let count = read_size(stream)?;
            let mut evicted = Vec::with_capacity(count);
            for _ in 0..count {
                let name_frame = read_frame(stream, FRAME_LEN)?;
                let name = String::from_utf8(name_frame).map_err(|_| ServerError::BadMessage)?;
                let size = read_size(stream)?;
                let content = read_raw(stream, size)?;
                evicted.push((name, content));
            }
            Payload::WriteOrAppend { evicted }
        }
    };

    Ok(Reply { status, payload })
}

fn read_errno<R: Read>(stream: &mut R) -> Result<i32> {
    let frame = read_frame(stream, crate::protocol::ERRNO_LEN)?;
    let text = std::str::from_utf8(&frame).map_err(|_| ServerError::BadMessage)?;
    text.parse().map_err(|_| ServerError::BadMessage)
}

fn read_size<R: Read>(stream: &mut R) -> Result<usize> {
    let frame = read_frame(stream, SIZE_LEN)?;
    let text = std::str::from_utf8(&frame).map_err(|_| ServerError::BadMessage)?;
    text.parse().map_err(|_| ServerError::BadMessage)
}
