use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

/// Lifecycle state of a supervised server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Nothing spawned yet
    Idle,
    /// Process creation in progress
    Spawning,
    /// Process is running and its output is being read
    Running,
    /// A stop was requested or the process is exiting
    Terminating,
    /// The operating system reported the process exit
    Terminated,
}

impl ProcessState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Idle, Spawning)
                | (Spawning, Running)
                | (Spawning, Terminated)
                | (Running, Terminating)
                | (Running, Terminated)
                | (Terminating, Terminated)
        )
    }
}

/// Output stream a chunk of text was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Event emitted over the lifetime of one server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessLifecycleEvent {
    /// The process was created
    Started {
        /// OS process id
        pid: u32,
    },
    /// One line of output, without its line terminator
    OutputChunk {
        text: String,
        stream: OutputStream,
    },
    /// A stop was requested
    WillTerminate {
        /// Whether the process is being killed rather than left to exit
        will_be_killed: bool,
    },
    /// The process exited
    Terminated {
        /// Exit code, `None` when the process was ended by a signal
        exit_code: Option<i32>,
        /// Output read failure observed before the exit, if any
        error: Option<String>,
    },
}

/// Receives lifecycle events of a supervised process.
///
/// Events are delivered from a single dispatcher task in emission order.
/// Implementations must return quickly: while an observer runs, later
/// events queue up in a bounded channel, and once it is full the output
/// readers stop draining the child's pipes, which eventually blocks the
/// server's own logging.
pub trait ProcessObserver: Send + Sync {
    fn on_event(&self, event: &ProcessLifecycleEvent);
}

/// Recorded lifecycle event
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// Event payload
    pub event: ProcessLifecycleEvent,
    /// Time the observer received the event
    pub timestamp: Instant,
}

/// Observer that keeps a bounded history of lifecycle events.
pub struct LifecycleRecorder {
    /// Recorded events, oldest first
    events: Mutex<VecDeque<RecordedEvent>>,
    /// Maximum number of events kept
    capacity: usize,
}

impl LifecycleRecorder {
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create a new recorder with the default history limit
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a new recorder keeping at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Get recorded events, oldest first
    pub fn events(&self) -> Result<Vec<ProcessLifecycleEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock recorded events".to_string()))?;

        Ok(events.iter().map(|recorded| recorded.event.clone()).collect())
    }

    /// Get the most recent events with their timestamps, newest first
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<RecordedEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock recorded events".to_string()))?;

        let mut recent: Vec<RecordedEvent> = events.iter().rev().cloned().collect();
        if let Some(limit) = limit {
            recent.truncate(limit);
        }

        Ok(recent)
    }

    /// Text of every recorded output line, in order
    pub fn output(&self) -> Result<Vec<String>> {
        Ok(self
            .events()?
            .into_iter()
            .filter_map(|event| match event {
                ProcessLifecycleEvent::OutputChunk { text, .. } => Some(text),
                _ => None,
            })
            .collect())
    }

    /// Clear events
    pub fn clear(&self) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock recorded events".to_string()))?;

        events.clear();

        Ok(())
    }
}

impl Default for LifecycleRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessObserver for LifecycleRecorder {
    fn on_event(&self, event: &ProcessLifecycleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push_back(RecordedEvent {
                event: event.clone(),
                timestamp: Instant::now(),
            });

            // Limit event history
            while events.len() > self.capacity {
                events.pop_front();
            }
        }
    }
}
