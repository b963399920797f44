//! The unit of work contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::TaskError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};

/// A single schedulable action.
///
/// Implementations capture everything they need when they are built and are
/// executed at most once by the [`Runner`](crate::Runner). Side effects are
/// invisible to the engine beyond the returned result.
#[async_trait]
pub trait Task: Send + Sync {
  /// Human-readable description, used in progress output and failures.
  fn describe(&self) -> String;

  /// Perform the action.
  ///
  /// Long-running tasks may call [`Progress::report`] while outstanding; the
  /// runner only waits for the final result.
  async fn execute(&self, progress: Progress) -> Result<(), TaskError>;
}

/// Handle a task uses to report intermediate status.
#[derive(Clone)]
pub struct Progress {
  run_id: Arc<str>,
  task: Arc<str>,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl Progress {
  pub(crate) fn new(run_id: Arc<str>, task: Arc<str>, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    Self {
      run_id,
      task,
      notifier,
    }
  }

  /// A handle not attached to any run; reports are dropped.
  ///
  /// Useful for executing a task directly, outside a runner.
  pub fn detached(task: impl Into<String>) -> Self {
    Self::new(Arc::from(""), Arc::from(task.into()), Arc::new(NoopNotifier))
  }

  /// Emit a progress message for the task. Never blocks.
  pub fn report(&self, message: impl Into<String>) {
    let message = message.into();
    debug!(run_id = %self.run_id, task = %self.task, message = %message, "task_progress");
    self.notifier.notify(ExecutionEvent::TaskProgress {
      run_id: self.run_id.to_string(),
      task: self.task.to_string(),
      message,
    });
  }
}

/// A task backed by a closure.
pub struct FnTask<F> {
  description: String,
  call: F,
}

/// Build a task from a description and an async closure.
///
/// ```ignore
/// let task = task_fn("create serviceaccount \"kube-system/aws-node\"", |progress| async move {
///   progress.report("applying");
///   Ok(())
/// });
/// ```
pub fn task_fn<F, Fut>(description: impl Into<String>, call: F) -> FnTask<F>
where
  F: Fn(Progress) -> Fut + Send + Sync,
  Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
  FnTask {
    description: description.into(),
    call,
  }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
  F: Fn(Progress) -> Fut + Send + Sync,
  Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
  fn describe(&self) -> String {
    self.description.clone()
  }

  async fn execute(&self, progress: Progress) -> Result<(), TaskError> {
    (self.call)(progress).await
  }
}
