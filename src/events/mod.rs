// Event sink
//
// Fan-out of log lines, FPS samples and claim outcomes from the scan loop to any number
// of observers (console, UI, socket bridge). Publishing never blocks: a slow subscriber
// lags and drops its oldest events instead of stalling capture timing.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Broadcast buffer per subscriber before it starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Number of log entries retained for late subscribers.
pub const LOG_HISTORY_LIMIT: usize = 200;

/// Severity of a user-facing log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Local::now(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<7} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Events published by the scan engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Log(LogEntry),
    Fps { value: f64 },
    Outcome { success: bool, message: String },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Log(entry) => entry.fmt(f),
            Event::Fps { value } => write!(f, "FPS {:.1}", value),
            Event::Outcome { success, message } => {
                write!(f, "outcome success={} {}", success, message)
            }
        }
    }
}

/// Publish/subscribe hub for [`Event`]s.
///
/// Subscribers attach with [`subscribe()`](Self::subscribe) and detach by dropping the
/// receiver; both are safe while the scan loop is publishing.
pub struct EventSink {
    tx: broadcast::Sender<Event>,
    history: Mutex<VecDeque<LogEntry>>,
    published: AtomicU64,
    undelivered: AtomicU64,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(LOG_HISTORY_LIMIT)),
            published: AtomicU64::new(0),
            undelivered: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event to every current subscriber.
    ///
    /// Log events are also recorded in the history ring and mirrored to `tracing`.
    pub fn publish(&self, event: Event) {
        if let Event::Log(entry) = &event {
            mirror_to_tracing(entry);
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == LOG_HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(entry.clone());
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        // No subscribers is fine
        if self.tx.send(event).is_err() {
            self.undelivered.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.publish(Event::Log(LogEntry::new(level, message)));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn fps(&self, value: f64) {
        self.publish(Event::Fps { value });
    }

    pub fn outcome(&self, success: bool, message: impl Into<String>) {
        self.publish(Event::Outcome {
            success,
            message: message.into(),
        });
    }

    /// The most recent log entries, oldest first.
    pub fn recent_logs(&self) -> Vec<LogEntry> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Events published while nobody was subscribed.
    pub fn undelivered_count(&self) -> u64 {
        self.undelivered.load(Ordering::Relaxed)
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

fn mirror_to_tracing(entry: &LogEntry) {
    match entry.level {
        LogLevel::Info => tracing::info!("{}", entry.message),
        LogLevel::Success => tracing::info!(success = true, "{}", entry.message),
        LogLevel::Warn => tracing::warn!("{}", entry.message),
        LogLevel::Error => tracing::error!("{}", entry.message),
    }
}
