//! Task tree execution.
//!
//! Sequential trees run their children inline, in order, and stop at the
//! first failure. Parallel trees spawn one task per child into a `JoinSet`,
//! wait for all of them and collect every failure. Dropping a run aborts
//! anything it spawned.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::error::{Failure, RunError, TaskError};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::task::{Progress, Task};
use crate::tree::{ExecutionMode, TaskNode, TaskTree};

/// Failures of a subtree, before they are wrapped into a [`RunError`].
type Outcome = Result<(), Vec<Failure>>;

/// Shared state of a single run, cloned into every spawned child.
#[derive(Clone)]
struct RunContext {
  run_id: Arc<str>,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl RunContext {
  fn notify(&self, event: ExecutionEvent) {
    self.notifier.notify(event);
  }
}

/// Executes task trees.
///
/// Use `Runner::new()` to discard execution events, or
/// `Runner::with_notifier()` to observe them.
#[derive(Clone)]
pub struct Runner {
  notifier: Arc<dyn ExecutionNotifier>,
}

impl Default for Runner {
  fn default() -> Self {
    Self::new()
  }
}

impl Runner {
  pub fn new() -> Self {
    Self::with_notifier(NoopNotifier)
  }

  pub fn with_notifier(notifier: impl ExecutionNotifier + 'static) -> Self {
    Self {
      notifier: Arc::new(notifier),
    }
  }

  /// Run a tree to completion.
  ///
  /// Returns `Ok(())` when every executed task succeeded. Otherwise the error
  /// holds the failure that stopped each sequential tree on the way, and all
  /// failures of every parallel tree, each with its task description.
  #[instrument(name = "task_tree_run", skip(self, tree), fields(tasks = tree.len()))]
  pub async fn run(&self, tree: TaskTree) -> Result<(), RunError> {
    let run_id: Arc<str> = Arc::from(uuid::Uuid::new_v4().to_string());
    let description = describe_guarded(|| tree.describe());

    info!(run_id = %run_id, description = %description, "run_started");
    let ctx = RunContext {
      run_id,
      notifier: Arc::clone(&self.notifier),
    };
    ctx.notify(ExecutionEvent::RunStarted {
      run_id: ctx.run_id.to_string(),
      description,
    });

    let result = run_tree(&tree, &ctx).await.map_err(RunError::new);

    match &result {
      Ok(()) => {
        info!(run_id = %ctx.run_id, "run_completed");
        ctx.notify(ExecutionEvent::RunCompleted {
          run_id: ctx.run_id.to_string(),
        });
      }
      Err(e) => {
        error!(run_id = %ctx.run_id, failures = e.failures().len(), error = %e, "run_failed");
        ctx.notify(ExecutionEvent::RunFailed {
          run_id: ctx.run_id.to_string(),
          failures: e.failures().len(),
          error: e.to_string(),
        });
      }
    }

    result
  }
}

/// Run a tree without observing events.
pub async fn run(tree: TaskTree) -> Result<(), RunError> {
  Runner::new().run(tree).await
}

fn run_node(node: TaskNode, ctx: RunContext) -> BoxFuture<'static, Outcome> {
  async move {
    match node {
      TaskNode::Task(task) => run_task(task.as_ref(), &ctx).await,
      TaskNode::Tree(tree) => run_tree(&tree, &ctx).await,
    }
  }
  .boxed()
}

async fn run_tree(tree: &TaskTree, ctx: &RunContext) -> Outcome {
  let result = match tree.mode() {
    ExecutionMode::Sequential => run_sequential(tree, ctx).await,
    ExecutionMode::Parallel => run_parallel(tree, ctx).await,
  };

  match (result, tree.name()) {
    (Err(failures), Some(name)) => Err(failures.into_iter().map(|f| f.within(name)).collect()),
    (result, _) => result,
  }
}

async fn run_sequential(tree: &TaskTree, ctx: &RunContext) -> Outcome {
  for (index, child) in tree.children().iter().enumerate() {
    if let Err(failures) = run_node(child.share(), ctx.clone()).await {
      let skipped = tree.len() - index - 1;
      if skipped > 0 {
        warn!(
          run_id = %ctx.run_id,
          failed = %describe_guarded(|| child.describe()),
          skipped,
          "sequential tasks skipped after failure"
        );
      }
      return Err(failures);
    }
  }
  Ok(())
}

async fn run_parallel(tree: &TaskTree, ctx: &RunContext) -> Outcome {
  let mut set = JoinSet::new();
  for (index, child) in tree.children().iter().enumerate() {
    let fut = run_node(child.share(), ctx.clone());
    set.spawn(async move { (index, fut.await) });
  }

  let mut outcomes: Vec<Option<Outcome>> = tree.children().iter().map(|_| None).collect();
  while let Some(joined) = set.join_next().await {
    match joined {
      Ok((index, outcome)) => outcomes[index] = Some(outcome),
      Err(e) => {
        error!(run_id = %ctx.run_id, error = %e, "parallel task join error");
      }
    }
  }

  // Report in child order, not completion order.
  let mut failures = Vec::new();
  for (child, outcome) in tree.children().iter().zip(outcomes) {
    match outcome {
      Some(Ok(())) => {}
      Some(Err(child_failures)) => failures.extend(child_failures),
      None => failures.push(Failure::new(
        describe_guarded(|| child.describe()),
        TaskError::Join {
          message: "task ended without reporting a result".to_string(),
        },
      )),
    }
  }

  if failures.is_empty() {
    Ok(())
  } else {
    Err(failures)
  }
}

async fn run_task(task: &dyn Task, ctx: &RunContext) -> Outcome {
  let description = describe_guarded(|| task.describe());
  let task_name: Arc<str> = Arc::from(description.as_str());

  info!(run_id = %ctx.run_id, task = %description, "task_started");
  ctx.notify(ExecutionEvent::TaskStarted {
    run_id: ctx.run_id.to_string(),
    task: description.clone(),
  });

  let progress = Progress::new(
    Arc::clone(&ctx.run_id),
    task_name,
    Arc::clone(&ctx.notifier),
  );
  let result = match AssertUnwindSafe(task.execute(progress)).catch_unwind().await {
    Ok(result) => result,
    Err(panic) => Err(TaskError::Join {
      message: format!("task panicked: {}", panic_message(panic.as_ref())),
    }),
  };

  match result {
    Ok(()) => {
      info!(run_id = %ctx.run_id, task = %description, "task_completed");
      ctx.notify(ExecutionEvent::TaskCompleted {
        run_id: ctx.run_id.to_string(),
        task: description,
      });
      Ok(())
    }
    Err(e) => {
      error!(run_id = %ctx.run_id, task = %description, error = %e, "task_failed");
      ctx.notify(ExecutionEvent::TaskFailed {
        run_id: ctx.run_id.to_string(),
        task: description.clone(),
        error: e.to_string(),
      });
      Err(vec![Failure::new(description, e)])
    }
  }
}

/// Placeholder for a task whose `describe` panicked.
const UNDESCRIBED_TASK: &str = "<description unavailable>";

fn describe_guarded(describe: impl FnOnce() -> String) -> String {
  std::panic::catch_unwind(AssertUnwindSafe(describe))
    .unwrap_or_else(|_| UNDESCRIBED_TASK.to_string())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(message) = panic.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
