use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, OnceLock};

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: log::Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short_target = self.target.split("::").last().unwrap_or(&self.target);
        write!(f, "[{:5}] {:>10}: {}", self.level, short_target, self.message)
    }
}

/// Bounded history of recent records; the oldest entry is dropped first.
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn drain(&mut self) -> Vec<LogEntry> {
        self.entries.drain(..).collect()
    }

    pub fn entries(&self) -> &VecDeque<LogEntry> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

static LOG_BUFFER: OnceLock<Mutex<LogBuffer>> = OnceLock::new();
static LOGGER: OnceLock<HarnessLogger> = OnceLock::new();

pub fn global_buffer() -> &'static Mutex<LogBuffer> {
    LOG_BUFFER.get_or_init(|| Mutex::new(LogBuffer::new(0)))
}

/// Prints records up to `console` to stderr and keeps records up to
/// `history` in the global [`LogBuffer`].
pub struct HarnessLogger {
    console: log::LevelFilter,
    history: log::LevelFilter,
}

impl log::Log for HarnessLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.console.max(self.history)
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry {
            level: record.level(),
            target: record.target().to_string(),
            message: format!("{}", record.args()),
        };
        if record.level() <= self.console {
            eprintln!("{entry}");
        }
        if record.level() <= self.history {
            if let Ok(mut buf) = global_buffer().lock() {
                buf.push(entry);
            }
        }
    }

    fn flush(&self) {}
}

/// Installs the logger. With `history > 0` every record down to trace level
/// is retained, up to `history` entries, for [`drain_logs`].
pub fn init_logger(console: log::LevelFilter, history: usize) -> Result<(), log::SetLoggerError> {
    let history_level = if history > 0 {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Off
    };
    LOG_BUFFER.get_or_init(|| Mutex::new(LogBuffer::new(history)));
    let logger = LOGGER.get_or_init(|| HarnessLogger {
        console,
        history: history_level,
    });
    log::set_logger(logger).map(|()| log::set_max_level(console.max(history_level)))
}

pub fn drain_logs() -> Vec<LogEntry> {
    global_buffer()
        .lock()
        .map(|mut buf| buf.drain())
        .unwrap_or_default()
}

pub fn clear_logs() {
    if let Ok(mut buf) = global_buffer().lock() {
        buf.clear();
    }
}
