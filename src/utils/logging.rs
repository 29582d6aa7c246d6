//! Logging utilities
//!
//! Runs use either `env_logger` or [`TicketLogger`], a small `log::Log`
//! implementation that fans records out to a console writer and an optional
//! log file. Every line is tagged with the emitting thread's name so vendor
//! and customer activity can be told apart.

use crate::{Error, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Log writer trait
pub trait LogWriter {
    /// Write a log entry
    fn write(&mut self, record: &Record) -> std::io::Result<()>;

    /// Flush the writer
    fn flush(&mut self) -> std::io::Result<()>;

    /// Check if writer accepts this log level
    fn accepts(&self, level: Level) -> bool;
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Format a record as a single line, without trailing newline
pub fn format_line(record: &Record) -> String {
    let thread = std::thread::current();
    format!(
        "[{}][{:<5}][{}] {} - {}",
        timestamp_millis(),
        record.level(),
        thread.name().unwrap_or("unnamed"),
        record.target(),
        record.args()
    )
}

/// Console log writer (stderr, colored by level)
pub struct ConsoleWriter {
    level: Level,
}

impl ConsoleWriter {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl LogWriter for ConsoleWriter {
    fn write(&mut self, record: &Record) -> std::io::Result<()> {
        if !self.accepts(record.level()) {
            return Ok(());
        }

        let color = match record.level() {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[37m",
        };

        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{}{}\x1b[0m", color, format_line(record))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }

    fn accepts(&self, level: Level) -> bool {
        level <= self.level
    }
}

/// File log writer (appends)
pub struct FileWriter {
    writer: BufWriter<File>,
    level: Level,
}

impl FileWriter {
    pub fn new<P: AsRef<Path>>(path: P, level: Level) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            level,
        })
    }
}

impl LogWriter for FileWriter {
    fn write(&mut self, record: &Record) -> std::io::Result<()> {
        if !self.accepts(record.level()) {
            return Ok(());
        }

        writeln!(self.writer, "{}", format_line(record))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    fn accepts(&self, level: Level) -> bool {
        level <= self.level
    }
}

/// Logger statistics
#[derive(Debug, Default)]
pub struct LoggerStats {
    pub total_logs: AtomicUsize,
    pub error_logs: AtomicUsize,
    pub warn_logs: AtomicUsize,
    pub info_logs: AtomicUsize,
    pub debug_logs: AtomicUsize,
    pub trace_logs: AtomicUsize,
    pub dropped_logs: AtomicUsize,
}

/// Logger statistics view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerStatsView {
    pub total_logs: usize,
    pub error_logs: usize,
    pub warn_logs: usize,
    pub info_logs: usize,
    pub debug_logs: usize,
    pub trace_logs: usize,
    pub dropped_logs: usize,
}

/// Fan-out logger
pub struct TicketLogger {
    writers: Mutex<Vec<Box<dyn LogWriter + Send>>>,
    level: LevelFilter,
    stats: LoggerStats,
}

impl TicketLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            writers: Mutex::new(Vec::new()),
            level,
            stats: LoggerStats::default(),
        }
    }

    pub fn add_writer(&self, writer: Box<dyn LogWriter + Send>) {
        self.writers.lock().push(writer);
    }

    pub fn add_console_writer(&self, level: Level) {
        self.add_writer(Box::new(ConsoleWriter::new(level)));
    }

    pub fn add_file_writer<P: AsRef<Path>>(&self, path: P, level: Level) -> std::io::Result<()> {
        let writer = FileWriter::new(path, level)?;
        self.add_writer(Box::new(writer));
        Ok(())
    }

    pub fn stats(&self) -> LoggerStatsView {
        LoggerStatsView {
            total_logs: self.stats.total_logs.load(Ordering::Relaxed),
            error_logs: self.stats.error_logs.load(Ordering::Relaxed),
            warn_logs: self.stats.warn_logs.load(Ordering::Relaxed),
            info_logs: self.stats.info_logs.load(Ordering::Relaxed),
            debug_logs: self.stats.debug_logs.load(Ordering::Relaxed),
            trace_logs: self.stats.trace_logs.load(Ordering::Relaxed),
            dropped_logs: self.stats.dropped_logs.load(Ordering::Relaxed),
        }
    }
}

impl Log for TicketLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        self.stats.total_logs.fetch_add(1, Ordering::Relaxed);
        let counter = match record.level() {
            Level::Error => &self.stats.error_logs,
            Level::Warn => &self.stats.warn_logs,
            Level::Info => &self.stats.info_logs,
            Level::Debug => &self.stats.debug_logs,
            Level::Trace => &self.stats.trace_logs,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut writers = self.writers.lock();
        for writer in writers.iter_mut() {
            if writer.accepts(record.level()) && writer.write(record).is_err() {
                self.stats.dropped_logs.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn flush(&self) {
        let mut writers = self.writers.lock();
        for writer in writers.iter_mut() {
            let _ = writer.flush();
        }
    }
}

/// Install the global logger.
///
/// With a log file, installs a [`TicketLogger`] writing `console_level` and
/// above to stderr and everything down to `Debug` to the file. Without one,
/// falls back to `env_logger` with `console_level` as the default filter
/// (overridable through `RUST_LOG`).
pub fn init_logger(console_level: Level, log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => {
            let file_level = console_level.max(Level::Debug);
            let logger = TicketLogger::new(file_level.to_level_filter());
            logger.add_console_writer(console_level);
            logger.add_file_writer(path, file_level)?;

            log::set_boxed_logger(Box::new(logger)).map_err(|e| Error::Logger(e.to_string()))?;
            log::set_max_level(file_level.to_level_filter());
        }
        None => {
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(console_level.as_str()),
            )
            .try_init()
            .map_err(|e| Error::Logger(e.to_string()))?;
        }
    }

    Ok(())
}
