//! Execution events and notifiers for observability.
//!
//! Events are emitted while a task tree runs so that callers can render
//! progress, stream it to a terminal, or record it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// A run has started.
  RunStarted { run_id: String, description: String },

  /// A task has started executing.
  TaskStarted { run_id: String, task: String },

  /// A task reported intermediate status while executing.
  TaskProgress {
    run_id: String,
    task: String,
    message: String,
  },

  /// A task has completed successfully.
  TaskCompleted { run_id: String, task: String },

  /// A task has failed.
  TaskFailed {
    run_id: String,
    task: String,
    error: String,
  },

  /// The whole tree completed successfully.
  RunCompleted { run_id: String },

  /// The run failed with one or more task failures.
  RunFailed {
    run_id: String,
    failures: usize,
    error: String,
  },
}

/// Trait for receiving execution events.
///
/// The runner calls `notify` for each event and never waits on the
/// implementation beyond the call itself.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a running task.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
