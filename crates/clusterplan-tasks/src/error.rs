//! Failure types for task execution.

use thiserror::Error;

/// Boxed error returned by provisioning collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single unit of work failed.
#[derive(Debug, Error)]
pub enum TaskError {
  /// The task reported a failure of its own.
  #[error("{message}")]
  Failed { message: String },

  /// A collaborator call made by the task failed.
  #[error("{context}: {source}")]
  Collaborator {
    context: String,
    #[source]
    source: BoxError,
  },

  /// The task observed its cancellation token.
  #[error("cancelled")]
  Cancelled,

  /// The task panicked or its execution context went away before reporting.
  #[error("execution context terminated: {message}")]
  Join { message: String },
}

impl TaskError {
  /// Create a failure with a plain message.
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  /// Wrap a collaborator error with what the task was doing.
  pub fn collaborator(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
    Self::Collaborator {
      context: context.into(),
      source: source.into(),
    }
  }
}

/// A failed unit of work, as reported in a [`RunError`].
#[derive(Debug, Error)]
#[error("{}{description}: {error}", render_path(.path))]
pub struct Failure {
  /// Names of the enclosing subtrees, outermost first.
  pub path: Vec<String>,
  /// Description of the task that failed.
  pub description: String,
  /// Rendered inline, so it is not also reported as the error source.
  pub error: TaskError,
}

impl Failure {
  pub(crate) fn new(description: impl Into<String>, error: TaskError) -> Self {
    Self {
      path: Vec::new(),
      description: description.into(),
      error,
    }
  }

  /// Record that this failure surfaced through the named subtree.
  pub(crate) fn within(mut self, name: &str) -> Self {
    self.path.insert(0, name.to_string());
    self
  }
}

fn render_path(path: &[String]) -> String {
  path.iter().map(|name| format!("{name} > ")).collect()
}

/// The aggregated outcome of a failed run.
///
/// A sequential node contributes only the failure that stopped it; a parallel
/// node contributes every failure of every child. The list is never empty and
/// is ordered by position in the tree.
#[derive(Debug, Error)]
#[error("{}", render_failures(.failures))]
pub struct RunError {
  failures: Vec<Failure>,
}

impl RunError {
  pub(crate) fn new(failures: Vec<Failure>) -> Self {
    debug_assert!(!failures.is_empty());
    Self { failures }
  }

  pub fn failures(&self) -> &[Failure] {
    &self.failures
  }

  /// Descriptions of the failed tasks, in tree order.
  pub fn descriptions(&self) -> Vec<&str> {
    self
      .failures
      .iter()
      .map(|f| f.description.as_str())
      .collect()
  }
}

fn render_failures(failures: &[Failure]) -> String {
  match failures {
    [only] => only.to_string(),
    _ => {
      let rendered: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
      format!("{} tasks failed: {}", failures.len(), rendered.join("; "))
    }
  }
}
