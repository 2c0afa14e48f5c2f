use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime, Timelike};
use tracing::error;

use crate::classifier::Family;

pub const DEFAULT_LOG_PATH: &str = "/var/log/iptrap.log";

/// Format of the bracketed timestamp; the offline analyzer parses this verbatim.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A non-loopback peer caught on a trapped port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    timestamp: NaiveDateTime,
    family: Family,
    address: String,
    port: u16,
}

impl CaptureEvent {
    /// Stamps the event with the current local time, truncated to whole seconds.
    pub fn now(family: Family, address: String, port: u16) -> Self {
        let timestamp = Local::now().naive_local();
        Self::at(timestamp, family, address, port)
    }

    pub fn at(timestamp: NaiveDateTime, family: Family, address: String, port: u16) -> Self {
        let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        CaptureEvent {
            timestamp,
            family,
            address,
            port,
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for CaptureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] Caught {} on port {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.family,
            self.address,
            self.port
        )
    }
}

/// Appends capture lines to the log file and echoes them to stdout.
///
/// Appends from concurrent traps are serialized so lines never interleave.
pub struct EventLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl EventLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        EventLogger {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Records the event. A failed append is reported and otherwise ignored.
    pub fn record(&self, event: &CaptureEvent) {
        let line = event.to_string();
        println!("{line}");

        if let Err(e) = self.append(&line) {
            error!("Failed to write log to {}: {}", self.path.display(), e);
        }
    }

    fn append(&self, line: &str) -> io::Result<()> {
        // a poisoned lock only means another trap panicked mid-append
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format!("{line}\n").as_bytes())
    }
}
