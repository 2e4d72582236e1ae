use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use serde::{Deserialize, Serialize};

/// Maximum number of entries kept by a log repository.
pub const MAX_ENTRIES: usize = 100;

pub static LOG: Mutex<Option<Arc<Mutex<dyn Repository>>>> = Mutex::new(None);

#[allow(clippy::missing_errors_doc)]
pub trait Repository: Send + Sync + 'static {
    fn read_entries(&self) -> Result<VecDeque<Entry>, Error>;
    fn write_entry(&self, entry: Entry) -> Result<(), Error>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    Unknown(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Entry {
    pub time: String,
    #[serde(with = "LevelDef")]
    pub level: Level,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "Level")]
pub enum LevelDef {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Add an entry to the front of a log, dropping the oldest entries beyond `MAX_ENTRIES`.
pub fn push_entry(entries: &mut VecDeque<Entry>, entry: Entry) {
    entries.push_front(entry);
    entries.truncate(MAX_ENTRIES);
}

static LOGGER: Logger = Logger;

/// # Errors
///
/// Returns an error if the logger has already been initialized.
pub fn init(
    repository: Arc<Mutex<dyn Repository>>,
    max_level: LevelFilter,
) -> Result<(), SetLoggerError> {
    if let Ok(mut log) = LOG.lock() {
        *log = Some(repository);
    }
    log::set_logger(&LOGGER).map(|()| log::set_max_level(max_level))
}

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = record.args().to_string();
        console(record.level(), &message);

        let Ok(log) = LOG.lock() else {
            return;
        };
        if let Some(ref repository) = *log {
            if let Ok(repository) = repository.lock() {
                let _ = repository.write_entry(Entry {
                    time: Local::now().format("%b %d %H:%M:%S").to_string(),
                    level: record.level(),
                    message,
                });
            }
        }
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
fn console(level: Level, message: &str) {
    match level {
        Level::Error => gloo_console::error!(message),
        Level::Warn => gloo_console::warn!(message),
        Level::Info => gloo_console::info!(message),
        Level::Debug | Level::Trace => gloo_console::debug!(message),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn console(_: Level, _: &str) {}
