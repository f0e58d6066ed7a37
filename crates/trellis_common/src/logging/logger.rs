//! In-memory log buffer with threshold and timer flushing.
//!
//! `flush` notifies every observer synchronously, then clears the buffer
//! whether or not anyone consumed it. Only one flush runs at a time: the
//! `processing` flag is claimed with a compare-exchange, and a flush that
//! finds it taken (a nested call, or the timer thread racing a caller) is
//! skipped.

use crate::logging::{LogEntry, LogFilter, LogLevel};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Entries buffered before an automatic flush
pub const DEFAULT_AUTO_FLUSH: usize = 10_000;

/// Receives the logger's flush notification.
pub trait FlushObserver: Send + Sync {
    /// Called before the buffer is cleared; `logger` still holds the entries.
    fn on_flush(&self, logger: &Logger, dump: bool);
}

/// Handle returned by `add_observer`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

struct FlushTimer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

struct LoggerInner {
    entries: Mutex<Vec<LogEntry>>,
    auto_flush: AtomicUsize,
    auto_dump: AtomicBool,
    processing: AtomicBool,
    observers: Mutex<Vec<(ObserverId, Arc<dyn FlushObserver>)>>,
    next_observer: AtomicU64,
    timer: Mutex<Option<FlushTimer>>,
}

/// Shared handle to one log buffer
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

/// Holds the `processing` flag; releases it on drop.
pub struct ProcessingGuard {
    inner: Arc<LoggerInner>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.inner.processing.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                entries: Mutex::new(Vec::new()),
                auto_flush: AtomicUsize::new(DEFAULT_AUTO_FLUSH),
                auto_dump: AtomicBool::new(false),
                processing: AtomicBool::new(false),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(1),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Flush threshold; 0 disables threshold flushing
    pub fn auto_flush(&self) -> usize {
        self.inner.auto_flush.load(Ordering::SeqCst)
    }

    pub fn set_auto_flush(&self, threshold: usize) {
        self.inner.auto_flush.store(threshold, Ordering::SeqCst);
    }

    /// Dump flag passed to automatic flushes
    pub fn auto_dump(&self) -> bool {
        self.inner.auto_dump.load(Ordering::SeqCst)
    }

    pub fn set_auto_dump(&self, dump: bool) {
        self.inner.auto_dump.store(dump, Ordering::SeqCst);
    }

    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }

    /// Claim the `processing` flag, or `None` if a flush is under way.
    pub fn begin_processing(&self) -> Option<ProcessingGuard> {
        self.inner
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ProcessingGuard {
                inner: Arc::clone(&self.inner),
            })
    }

    /// Append an entry; flushes when the threshold is reached.
    pub fn log(&self, message: &str, level: LogLevel, category: &str) {
        let count = {
            let mut entries = lock(&self.inner.entries);
            entries.push(LogEntry::new(message, level, category));
            entries.len()
        };

        let threshold = self.auto_flush();
        if threshold > 0 && count >= threshold && !self.is_processing() {
            self.flush(self.auto_dump());
        }
    }

    /// Number of buffered entries
    pub fn log_count(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    /// Buffered entries passing `filter`, in insertion order.
    pub fn get_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        lock(&self.inner.entries)
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn add_observer(&self, observer: Arc<dyn FlushObserver>) -> ObserverId {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::SeqCst));
        lock(&self.inner.observers).push((id, observer));
        id
    }

    /// Unsubscribe; false if `id` was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.inner.observers);
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    pub fn clear_observers(&self) {
        lock(&self.inner.observers).clear();
    }

    /// Notify observers, then empty the buffer.
    pub fn flush(&self, dump: bool) {
        let Some(_guard) = self.begin_processing() else {
            debug!("log flush skipped, another flush is in progress");
            return;
        };

        let observers: Vec<Arc<dyn FlushObserver>> = lock(&self.inner.observers)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in &observers {
            observer.on_flush(self, dump);
        }

        lock(&self.inner.entries).clear();
    }

    /// Start a periodic flush on a background thread.
    ///
    /// A zero interval stops the timer. Starting while a timer is already
    /// running does nothing.
    pub fn set_flush_interval(&self, interval: Duration) {
        if interval.is_zero() {
            self.stop_flush_timer();
            return;
        }

        let mut timer = lock(&self.inner.timer);
        if timer.is_some() {
            return;
        }

        let weak: Weak<LoggerInner> = Arc::downgrade(&self.inner);
        let (stop, ticks) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name("trellis-log-flush".to_string())
            .spawn(move || loop {
                match ticks.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        let logger = Logger { inner };
                        logger.flush(logger.auto_dump());
                    }
                    _ => break,
                }
            });

        match spawned {
            Ok(handle) => *timer = Some(FlushTimer { stop, handle }),
            Err(e) => debug!("cannot start log flush timer: {}", e),
        }
    }

    pub fn has_flush_timer(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }

    fn stop_flush_timer(&self) {
        let Some(timer) = lock(&self.inner.timer).take() else {
            return;
        };
        drop(timer.stop);
        if timer.handle.thread().id() != thread::current().id() {
            let _ = timer.handle.join();
        }
    }
}
