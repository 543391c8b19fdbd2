//! Wall-time measurement of agent calls.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Span names used by the dispatcher.
pub mod names {
    pub const EXECUTE_ACTION: &str = "executeAction";
    pub const EXECUTE_COMMAND: &str = "executeCommand";
}

/// A finished span.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    pub name: String,
    pub index: Option<usize>,
    pub duration: Duration,
}

/// Collects finished spans for the running session.
#[derive(Debug, Default)]
pub struct Profiler {
    entries: Arc<Mutex<Vec<ProfileEntry>>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a span. It stops when `stop` is called or when it is dropped,
    /// whichever comes first.
    pub fn measure(&self, name: &str, index: Option<usize>) -> ProfileSpan {
        ProfileSpan {
            name: name.to_string(),
            index,
            start: Instant::now(),
            sink: Arc::clone(&self.entries),
            stopped: false,
        }
    }

    pub fn entries(&self) -> Vec<ProfileEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A running span.
pub struct ProfileSpan {
    name: String,
    index: Option<usize>,
    start: Instant,
    sink: Arc<Mutex<Vec<ProfileEntry>>>,
    stopped: bool,
}

impl ProfileSpan {
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    fn finish(&mut self) -> Duration {
        let duration = self.start.elapsed();
        if self.stopped {
            return duration;
        }
        self.stopped = true;
        tracing::debug!(span = %self.name, index = ?self.index, elapsed_ms = duration.as_millis() as u64, "profile span stopped");
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProfileEntry {
                name: std::mem::take(&mut self.name),
                index: self.index,
                duration,
            });
        duration
    }
}

impl Drop for ProfileSpan {
    fn drop(&mut self) {
        self.finish();
    }
}
