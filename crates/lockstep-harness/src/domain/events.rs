//! Event recorder
//!
//! Append-only log of timestamped milestones shared by every flow of one
//! run. Append order is the order in which flows observed their calls
//! completing, which may differ from the engine's own serialization order.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::ErrorKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One recorded milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Time since the recorder was created.
    pub elapsed: Duration,
    pub label: String,
}

/// Lock-sensitive operation named in a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Read,
    Write,
    Commit,
    Rollback,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Commit => write!(f, "commit"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// Where in an operation a milestone was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    Done,
    Fails(ErrorKind),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Done => write!(f, "done"),
            Self::Fails(kind) => write!(f, "fails({kind})"),
        }
    }
}

/// Build a milestone label, e.g. `T2 write fails(deadlock)`.
pub fn milestone_label(txn: impl fmt::Display, op: Operation, phase: Phase) -> String {
    format!("{txn} {op} {phase}")
}

/// Shared, append-only milestone log.
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    started: Instant,
    events: Arc<Mutex<Vec<Milestone>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append a milestone stamped with the current time.
    pub fn record(&self, label: impl Into<String>) {
        let milestone = Milestone {
            elapsed: self.started.elapsed(),
            label: label.into(),
        };
        self.events.lock().push(milestone);
    }

    /// Record `"<txn> <op> <phase>"`.
    pub fn record_step(&self, txn: impl fmt::Display, op: Operation, phase: Phase) {
        self.record(milestone_label(txn, op, phase));
    }

    /// Labels in append order, timestamps dropped.
    pub fn snapshot(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|milestone| milestone.label.clone())
            .collect()
    }

    /// Full milestones in append order.
    pub fn milestones(&self) -> Vec<Milestone> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}
