//! File-backed logger: a single writer serialized by one mutex, installed
//! once via the `log` facade so the rest of the crate just calls
//! `info!`/`warn!`/`error!`/`debug!`.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

use crate::error::{Result, ServerError};

pub struct FileLogger {
    writer: Mutex<BufWriter<std::fs::File>>,
    level: LevelFilter,
}

impl FileLogger {
    pub fn open(path: &str, level: LevelFilter) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(ServerError::Io)?;
        Ok(FileLogger {
            writer: Mutex::new(BufWriter::new(file)),
            level,
        })
    }

    /// Installs this logger as the global `log` backend. Call once at
    /// startup.
    pub fn install(self) -> std::result::Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut writer = self.writer.lock();
        let _ = writeln!(
            writer,
            "[{}] {} - {}",
            level_tag(record.level()),
            record.target(),
            record.args()
        );
        let _ = writer.flush();
    }

    fn flush(&self) {
        let _ = self.writer.lock().flush();
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}
