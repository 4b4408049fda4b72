//! Request-frame parsing.

use std::io::Read;

use crate::error::{Result, ServerError};
use crate::protocol::{self, read_frame, read_raw, OpCode, FRAME_LEN};

#[derive(Debug, Clone)]
pub enum Request {
    Open { path: String, flags: u8 },
    Close { path: String },
    Read { path: String, save: bool },
    ReadN { n: i64 },
    Write { path: String, content: Vec<u8> },
    Append { path: String, content: Vec<u8> },
    Lock { path: String },
    Unlock { path: String },
    Remove { path: String },
    Shutdown,
}

impl Request {
    pub fn op(&self) -> OpCode {
        match self {
            Request::Open { .. } => OpCode::Open,
            Request::Close { .. } => OpCode::Close,
            Request::Read { .. } => OpCode::Read,
            Request::ReadN { .. } => OpCode::ReadN,
            Request::Write { .. } => OpCode::Write,
            Request::Append { .. } => OpCode::Append,
            Request::Lock { .. } => OpCode::Lock,
            Request::Unlock { .. } => OpCode::Unlock,
            Request::Remove { .. } => OpCode::Remove,
            Request::Shutdown => OpCode::Shutdown,
        }
    }
}

/// Reads one request frame from `stream` and, for WRITE/APPEND, the raw
/// payload that trails it.
pub fn read_request<R: Read>(stream: &mut R) -> Result<Request> {
    let frame = read_frame(stream, FRAME_LEN)?;
    let text = std::str::from_utf8(&frame).map_err(|_| ServerError::BadMessage)?;
    let mut tokens = text.split_whitespace();

    let op_code: i64 = protocol::parse_token(tokens.next())?;
    let op = OpCode::from_i64(op_code)?;

    Ok(match op {
        OpCode::Open => {
            let path = tokens.next().ok_or(ServerError::BadMessage)?.to_string();
            protocol::validate_path(&path)?;
            let flags: u8 = protocol::parse_token(tokens.next())?;
            Request::Open { path, flags }
        }
        OpCode::Close => {
            let path = tokens.next().ok_or(ServerError::BadMessage)?.to_string();
            protocol::validate_path(&path)?;
            Request::Close { path }
        }
        OpCode::Read => {
            let path = tokens.next().ok_or(ServerError::BadMessage)?.to_string();
            protocol::validate_path(&path)?;
            let save: u8 = protocol::parse_token(tokens.next())?;
            Request::Read {
                path,
                save: save != 0,
            }
        }
        OpCode::ReadN => {
            let n: i64 = protocol::parse_token(tokens.next())?;
            Request::ReadN { n }
        }
        OpCode::Write => {
            let path = tokens.next().ok_or(ServerError::BadMessage)?.to_string();
            protocol::validate_path(&path)?;
            let length: usize = protocol::parse_token(tokens.next())?;
            let content = read_raw(stream, length)?;
            Request::Write { path, content }
        }
        OpCode::Append => {
            let path = tokens.next().ok_or(ServerError::BadMessage)?.to_string();
            protocol::validate_path(&path)?;
            let size: usize = protocol::parse_token(tokens.next())?;
            let content = read_raw(stream, size)?;
            Request::Append { path, content }
        }
        OpCode::Lock => {
            let path = tokens.next().ok_or(ServerError::BadMessage)?.to_string();
            protocol::validate_path(&path)?;
            Request::Lock { path }
        }
        OpCode::Unlock => {
            let path = tokens.next().ok_or(ServerError::BadMessage)?.to_string();
            protocol::validate_path(&path)?;
            Request::Unlock { path }
        }
        OpCode::Remove => {
            let path = tokens.next().ok_or(ServerError::BadMessage)?.to_string();
            protocol::validate_path(&path)?;
            Request::Remove { path }
        }
        OpCode::Shutdown => Request::Shutdown,
    })
}

/// Encodes a request frame the way the client library sends it (mirror of
/// `read_request`, used by `client`).
pub fn encode_request(req: &Request) -> Vec<u8> {
    match req {
        Request::Open { path, flags } => format!("{} {} {}", OpCode::Open as i32, path, flags).into_bytes(),
        Request::Close { path } => format!("{} {}", OpCode::Close as i32, path).into_bytes(),
        Request::Read { path, save } => {
            format!("{} {} {}", OpCode::Read as i32, path, *save as u8).into_bytes()
        }
        Request::ReadN { n } => format!("{} {}", OpCode::ReadN as i32, n).into_bytes(),
        Request::Write { path, content } => {
            format!("{} {} {}", OpCode::Write as i32, path, content.len()).into_bytes()
        }
        Request::Append { path, content } => {
            format!("{} {} {}", OpCode::Append as i32, path, content.len()).into_bytes()
        }
        Request::Lock { path } => format!("{} {}", OpCode::Lock as i32, path).into_bytes(),
        Request::Unlock { path } => format!("{} {}", OpCode::Unlock as i32, path).into_bytes(),
        Request::Remove { path } => format!("{} {}", OpCode::Remove as i32, path).into_bytes(),
        Request::Shutdown => format!("{}", OpCode::Shutdown as i32).into_bytes(),
    }
}
