//! Integration tests for Runner::run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clusterplan_tasks::{
  ChannelNotifier, ExecutionEvent, Progress, RunError, Runner, Task, TaskError, TaskNode, TaskTree,
  run, task_fn,
};
use tokio::sync::Barrier;

/// A task that counts its executions and fails with a fixed reason if given one.
struct RecordingTask {
  description: String,
  executions: Arc<AtomicUsize>,
  failure: Option<String>,
}

impl RecordingTask {
  fn ok(description: &str) -> (Self, Arc<AtomicUsize>) {
    Self::build(description, None)
  }

  fn failing(description: &str, reason: &str) -> (Self, Arc<AtomicUsize>) {
    Self::build(description, Some(reason.to_string()))
  }

  fn build(description: &str, failure: Option<String>) -> (Self, Arc<AtomicUsize>) {
    let executions = Arc::new(AtomicUsize::new(0));
    let task = Self {
      description: description.to_string(),
      executions: executions.clone(),
      failure,
    };
    (task, executions)
  }
}

#[async_trait]
impl Task for RecordingTask {
  fn describe(&self) -> String {
    self.description.clone()
  }

  async fn execute(&self, _progress: Progress) -> Result<(), TaskError> {
    self.executions.fetch_add(1, Ordering::SeqCst);
    tokio::task::yield_now().await;
    match &self.failure {
      Some(reason) => Err(TaskError::failed(reason.clone())),
      None => Ok(()),
    }
  }
}

struct PanickingTask;

#[async_trait]
impl Task for PanickingTask {
  fn describe(&self) -> String {
    "explodes".to_string()
  }

  async fn execute(&self, _progress: Progress) -> Result<(), TaskError> {
    panic!("kaboom")
  }
}

struct UndescribableTask;

#[async_trait]
impl Task for UndescribableTask {
  fn describe(&self) -> String {
    panic!("no description")
  }

  async fn execute(&self, _progress: Progress) -> Result<(), TaskError> {
    Err(TaskError::failed("broken"))
  }
}

fn count(counter: &Arc<AtomicUsize>) -> usize {
  counter.load(Ordering::SeqCst)
}

fn failure_messages(err: &RunError) -> Vec<String> {
  err.failures().iter().map(|f| f.error.to_string()).collect()
}

#[tokio::test]
async fn test_empty_tree_succeeds() {
  let tree = TaskTree::sequential();
  assert_eq!(tree.len(), 0);

  run(tree).await.expect("empty tree should succeed");
  run(TaskTree::parallel())
    .await
    .expect("empty parallel tree should succeed");
}

#[tokio::test]
async fn test_sequential_stops_at_first_failure() {
  let failing_index = 2;
  let mut tree = TaskTree::sequential();
  let mut counters = Vec::new();

  for i in 0..5 {
    let description = format!("task-{}", i);
    let (task, counter) = if i == failing_index {
      RecordingTask::failing(&description, "boom")
    } else {
      RecordingTask::ok(&description)
    };
    tree.push(task);
    counters.push(counter);
  }

  let err = run(tree).await.expect_err("run should fail");

  for (i, counter) in counters.iter().enumerate() {
    let expected = if i <= failing_index { 1 } else { 0 };
    assert_eq!(count(counter), expected, "task-{} execution count", i);
  }
  assert_eq!(err.failures().len(), 1);
  assert_eq!(err.descriptions(), vec!["task-2"]);
  assert_eq!(failure_messages(&err), vec!["boom"]);
}

#[tokio::test]
async fn test_parallel_collects_every_failure() {
  let mut tree = TaskTree::parallel();
  let mut counters = Vec::new();

  for i in 0..6 {
    let description = format!("ng-{}", i);
    let (task, counter) = if i % 2 == 1 {
      RecordingTask::failing(&description, &format!("reason-{}", i))
    } else {
      RecordingTask::ok(&description)
    };
    tree.push(task);
    counters.push(counter);
  }

  let err = run(tree).await.expect_err("run should fail");

  assert!(counters.iter().all(|c| count(c) == 1));
  assert_eq!(err.failures().len(), 3);
  assert_eq!(err.descriptions(), vec!["ng-1", "ng-3", "ng-5"]);
  assert_eq!(failure_messages(&err), vec!["reason-1", "reason-3", "reason-5"]);
}

#[tokio::test]
async fn test_parallel_failures_keep_child_order_when_completion_is_reversed() {
  let mut tree = TaskTree::parallel();

  // Earlier children sleep longer, so completion order is the reverse of
  // child order.
  for i in 0..4u64 {
    let delay = Duration::from_millis(20 * (4 - i));
    tree.push(task_fn(format!("ng-{}", i), move |_| async move {
      tokio::time::sleep(delay).await;
      if i % 2 == 0 {
        Err(TaskError::failed(format!("reason-{}", i)))
      } else {
        Ok(())
      }
    }));
  }

  let err = run(tree).await.expect_err("run should fail");

  assert_eq!(err.descriptions(), vec!["ng-0", "ng-2"]);
  assert_eq!(failure_messages(&err), vec!["reason-0", "reason-2"]);
}

#[tokio::test]
async fn test_parallel_children_run_concurrently() {
  let width = 4;
  let barrier = Arc::new(Barrier::new(width));
  let mut tree = TaskTree::parallel();

  for i in 0..width {
    let barrier = barrier.clone();
    tree.push(task_fn(format!("wait-{}", i), move |_| {
      let barrier = barrier.clone();
      async move {
        barrier.wait().await;
        Ok(())
      }
    }));
  }

  // Every child must be in flight at once for the barrier to release.
  tokio::time::timeout(Duration::from_secs(5), run(tree))
    .await
    .expect("parallel children did not run concurrently")
    .expect("run should succeed");
}

#[tokio::test]
async fn test_nesting_is_transparent_to_counting() {
  let (leaf, leaf_count) = RecordingTask::ok("leaf");
  let mut subtree = TaskTree::parallel();
  let mut counters = vec![leaf_count];
  for i in 0..3 {
    let (task, counter) = RecordingTask::ok(&format!("child-{}", i));
    subtree.push(task);
    counters.push(counter);
  }
  subtree.mark_as_subtree();

  let mut tree = TaskTree::sequential();
  tree.append([TaskNode::from(leaf), TaskNode::from(subtree)]);

  assert_eq!(tree.len(), 2);
  run(tree).await.expect("run should succeed");
  assert!(counters.iter().all(|c| count(c) == 1));
}

#[tokio::test]
async fn test_node_group_failure_after_control_plane() {
  let (control_plane, control_plane_count) =
    RecordingTask::ok("create cluster control plane \"dev\"");
  let (ng1, ng1_count) = RecordingTask::ok("create nodegroup \"ng-1\"");
  let (ng2, ng2_count) = RecordingTask::failing("create nodegroup \"ng-2\"", "quota exceeded");

  let mut node_groups = TaskTree::parallel();
  node_groups.append([ng1, ng2]).mark_as_subtree();

  let mut tree = TaskTree::sequential();
  tree.push(control_plane).push(node_groups);

  let err = run(tree).await.expect_err("run should fail");

  assert_eq!(count(&control_plane_count), 1);
  assert_eq!(count(&ng1_count), 1);
  assert_eq!(count(&ng2_count), 1);
  assert_eq!(err.descriptions(), vec!["create nodegroup \"ng-2\""]);
  assert_eq!(failure_messages(&err), vec!["quota exceeded"]);
}

#[tokio::test]
async fn test_control_plane_failure_skips_node_groups() {
  let (control_plane, _) =
    RecordingTask::failing("create cluster control plane \"dev\"", "stack already exists");
  let (ng1, ng1_count) = RecordingTask::ok("create nodegroup \"ng-1\"");
  let (ng2, ng2_count) = RecordingTask::ok("create nodegroup \"ng-2\"");

  let mut node_groups = TaskTree::parallel();
  node_groups.append([ng1, ng2]);

  let mut tree = TaskTree::sequential();
  tree.push(control_plane).push(node_groups);

  let err = run(tree).await.expect_err("run should fail");

  assert_eq!(err.failures().len(), 1);
  assert_eq!(failure_messages(&err), vec!["stack already exists"]);
  assert_eq!(count(&ng1_count), 0);
  assert_eq!(count(&ng2_count), 0);
}

#[tokio::test]
async fn test_aggregated_failure_halts_sequential_siblings() {
  let (a, _) = RecordingTask::failing("a", "first");
  let (b, _) = RecordingTask::failing("b", "second");
  let (after, after_count) = RecordingTask::ok("after");

  let mut parallel = TaskTree::parallel();
  parallel.append([a, b]);

  let mut tree = TaskTree::sequential();
  tree.push(parallel).push(after);

  let err = run(tree).await.expect_err("run should fail");

  assert_eq!(err.descriptions(), vec!["a", "b"]);
  assert_eq!(count(&after_count), 0);
}

#[tokio::test]
async fn test_named_subtrees_annotate_failures() {
  let (role, _) = RecordingTask::ok("create IAM role for serviceaccount \"backend/reader\"");
  let (sa, _) = RecordingTask::failing("create serviceaccount \"backend/reader\"", "forbidden");

  let mut account = TaskTree::sequential().with_name("serviceaccount \"backend/reader\"");
  account.append([role, sa]).mark_as_subtree();

  let mut accounts = TaskTree::parallel().with_name("IAM service accounts");
  accounts.push(account);

  let err = run(accounts).await.expect_err("run should fail");
  let failure = &err.failures()[0];

  assert_eq!(
    failure.path,
    vec!["IAM service accounts", "serviceaccount \"backend/reader\""]
  );
  assert_eq!(
    err.to_string(),
    "IAM service accounts > serviceaccount \"backend/reader\" > \
     create serviceaccount \"backend/reader\": forbidden"
  );
}

#[tokio::test]
async fn test_panicking_task_is_reported_as_failure() {
  let (survivor, survivor_count) = RecordingTask::ok("survivor");
  let mut tree = TaskTree::parallel();
  tree.push(PanickingTask).push(survivor);

  let err = run(tree).await.expect_err("run should fail");

  assert_eq!(count(&survivor_count), 1);
  assert_eq!(err.descriptions(), vec!["explodes"]);
  assert!(matches!(
    &err.failures()[0].error,
    TaskError::Join { message } if message.contains("kaboom")
  ));
}

#[tokio::test]
async fn test_panicking_describe_is_reported_with_placeholder() {
  let (survivor, survivor_count) = RecordingTask::ok("survivor");
  let mut tree = TaskTree::parallel();
  tree.push(UndescribableTask).push(survivor);

  let err = run(tree).await.expect_err("run should fail");

  assert_eq!(count(&survivor_count), 1);
  assert_eq!(err.descriptions(), vec!["<description unavailable>"]);
  assert_eq!(failure_messages(&err), vec!["broken"]);
}

#[tokio::test]
async fn test_every_task_executes_once_per_run() {
  let (notifier, mut events) = ChannelNotifier::channel();
  let runner = Runner::with_notifier(notifier);
  let mut counters = Vec::new();

  let mut node_groups = TaskTree::parallel();
  for i in 0..3 {
    let (task, counter) = RecordingTask::ok(&format!("ng-{}", i));
    node_groups.push(task);
    counters.push(counter);
  }
  node_groups.mark_as_subtree();

  let (control_plane, control_plane_count) = RecordingTask::ok("control plane");
  counters.push(control_plane_count);

  let mut tree = TaskTree::sequential();
  tree.push(control_plane).push(node_groups);

  // The runner consumes the tree, so it cannot be handed to a second run.
  runner.run(tree).await.expect("run should succeed");
  drop(runner);

  let mut started = 0;
  while let Some(event) = events.recv().await {
    if matches!(event, ExecutionEvent::TaskStarted { .. }) {
      started += 1;
    }
  }

  assert!(counters.iter().all(|c| count(c) == 1));
  assert_eq!(started, counters.len());
}

#[tokio::test]
async fn test_events_include_progress() {
  let (notifier, mut events) = ChannelNotifier::channel();
  let runner = Runner::with_notifier(notifier);

  let mut tree = TaskTree::sequential();
  tree.push(task_fn("create cluster control plane \"dev\"", |progress| async move {
    progress.report("waiting for stack to reach CREATE_COMPLETE");
    Ok(())
  }));

  runner.run(tree).await.expect("run should succeed");
  drop(runner);

  let mut received = Vec::new();
  while let Some(event) = events.recv().await {
    received.push(event);
  }

  assert!(matches!(received.first(), Some(ExecutionEvent::RunStarted { .. })));
  assert!(matches!(received.last(), Some(ExecutionEvent::RunCompleted { .. })));
  assert!(received.iter().any(|e| matches!(
    e,
    ExecutionEvent::TaskProgress { task, message, .. }
      if task == "create cluster control plane \"dev\""
        && message == "waiting for stack to reach CREATE_COMPLETE"
  )));
  assert!(
    received
      .iter()
      .any(|e| matches!(e, ExecutionEvent::TaskCompleted { .. }))
  );
}

#[tokio::test]
async fn test_failed_run_emits_run_failed() {
  let (notifier, mut events) = ChannelNotifier::channel();
  let runner = Runner::with_notifier(notifier);

  let (a, _) = RecordingTask::failing("a", "first");
  let (b, _) = RecordingTask::failing("b", "second");
  let mut tree = TaskTree::parallel();
  tree.append([a, b]);

  runner.run(tree).await.expect_err("run should fail");
  drop(runner);

  let mut last = None;
  let mut task_failures = 0;
  while let Some(event) = events.recv().await {
    if matches!(event, ExecutionEvent::TaskFailed { .. }) {
      task_failures += 1;
    }
    last = Some(event);
  }

  assert_eq!(task_failures, 2);
  assert!(matches!(last, Some(ExecutionEvent::RunFailed { failures: 2, .. })));
}

#[tokio::test]
async fn test_task_can_execute_outside_runner() {
  let (task, counter) = RecordingTask::ok("standalone");

  task
    .execute(Progress::detached(task.describe()))
    .await
    .expect("task should succeed");

  assert_eq!(count(&counter), 1);
}
