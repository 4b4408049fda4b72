//! Config-file reader: six required `KEY = VALUE` lines, in any order. A
//! bespoke grammar — not TOML/YAML — so this is hand-rolled rather than
//! pulled from a parsing crate.

use std::collections::HashMap;
use std::path::Path;

use crate::cache::Policy;
use crate::error::{Result, ServerError};

const KEY_WORKERS: &str = "NUMBER OF WORKER THREADS";
const KEY_MAX_FILES: &str = "MAX NUMBER OF FILES ACCEPTED";
const KEY_MAX_BYTES: &str = "MAX CACHE SIZE";
const KEY_SOCKET: &str = "SOCKET FILE PATH";
const KEY_LOG: &str = "LOG FILE PATH";
const KEY_POLICY: &str = "REPLACEMENT POLICY";

const REQUIRED_KEYS: &[&str] = &[
    KEY_WORKERS,
    KEY_MAX_FILES,
    KEY_MAX_BYTES,
    KEY_SOCKET,
    KEY_LOG,
    KEY_POLICY,
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub worker_threads: usize,
    pub max_files: usize,
    pub max_bytes: usize,
    pub socket_path: String,
    pub log_path: String,
    pub policy: Policy,
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(ServerError::Io)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut values: HashMap<&str, String> = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| ServerError::Config(format!("malformed line: {line:?}")))?;
            let key = key.trim();
            let value = value.trim().to_string();

            let canonical = REQUIRED_KEYS
                .iter()
                .find(|&&k| k.eq_ignore_ascii_case(key))
                .ok_or_else(|| ServerError::Config(format!("unknown key: {key:?}")))?;

            if values.insert(canonical, value).is_some() {
                return Err(ServerError::Config(format!("duplicate key: {canonical}")));
            }
        }

        for key in REQUIRED_KEYS {
            if !values.contains_key(key) {
                return Err(ServerError::Config(format!("missing required key: {key}")));
            }
        }

        let worker_threads = parse_nonzero(&values[KEY_WORKERS], KEY_WORKERS)?;
        let max_files = parse_nonzero(&values[KEY_MAX_FILES], KEY_MAX_FILES)?;
        let max_bytes = parse_nonzero(&values[KEY_MAX_BYTES], KEY_MAX_BYTES)?;
        let socket_path = values[KEY_SOCKET].clone();
        let log_path = values[KEY_LOG].clone();

        let policy_value: i64 = values[KEY_POLICY]
            .parse()
            .map_err(|_| ServerError::Config(format!("{KEY_POLICY} must be an integer")))?;
        let policy = Policy::from_i64(policy_value)?;

        Ok(ServerConfig {
            worker_threads,
            max_files,
            max_bytes,
            socket_path,
            log_path,
            policy,
        })
    }
}

fn parse_nonzero(text: &str, key: &str) -> Result<usize> {
    let value: usize = text
        .parse()
        .map_err(|_| ServerError::Config(format!("{key} must be a non-negative integer")))?;
    if value == 0 {
        return Err(ServerError::Config(format!("{key} must be non-zero")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        [
            "NUMBER OF WORKER THREADS = 4",
            "MAX NUMBER OF FILES ACCEPTED = 100",
            "MAX CACHE SIZE = 1048576",
            "SOCKET FILE PATH = /tmp/fstore.sock",
            "LOG FILE PATH = /tmp/fstore.log",
            "REPLACEMENT POLICY = 2",
        ]
        .join("\n")
    }

    #[test]
    fn parses_all_required_keys() {
        let cfg = ServerConfig::parse(&sample()).unwrap();
        assert_eq!(cfg.worker_threads, 4);
        assert_eq!(cfg.max_files, 100);
        assert_eq!(cfg.max_bytes, 1048576);
        assert_eq!(cfg.socket_path, "/tmp/fstore.sock");
        assert_eq!(cfg.log_path, "/tmp/fstore.log");
        assert_eq!(cfg.policy, Policy::Lru);
    }

    #[test]
    fn rejects_missing_key() {
        let text = sample().replace("REPLACEMENT POLICY = 2", "");
        assert!(ServerConfig::parse(&text).is_err());
    }

    #[test]
    fn rejects_duplicate_key() {
        let mut text = sample();
        text.push_str("\nNUMBER OF WORKER THREADS = 8");
        assert!(ServerConfig::parse(&text).is_err());
    }

    #[test]
    fn rejects_zero_worker_threads() {
        let text = sample().replace("NUMBER OF WORKER THREADS = 4", "NUMBER OF WORKER THREADS = 0");
        assert!(ServerConfig::parse(&text).is_err());
    }

    #[test]
    fn accepts_zero_policy() {
        let text = sample().replace("REPLACEMENT POLICY = 2", "REPLACEMENT POLICY = 0");
        let cfg = ServerConfig::parse(&text).unwrap();
        assert_eq!(cfg.policy, Policy::Fifo);
    }

    #[test]
    fn rejects_bad_policy_value() {
        let text = sample().replace("REPLACEMENT POLICY = 2", "REPLACEMENT POLICY = 7");
        assert!(ServerConfig::parse(&text).is_err());
    }
}
