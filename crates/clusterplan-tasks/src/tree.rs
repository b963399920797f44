//! Composite task trees.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// How the children of a [`TaskTree`] are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
  /// One after another, stopping at the first failure.
  Sequential,
  /// All at once, collecting every failure.
  Parallel,
}

impl fmt::Display for ExecutionMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExecutionMode::Sequential => write!(f, "sequential"),
      ExecutionMode::Parallel => write!(f, "parallel"),
    }
  }
}

/// A child of a [`TaskTree`]: either a single task or a nested tree.
///
/// Children are reference counted so the runner can move them into spawned
/// execution contexts; the tree that appended them remains their only owner.
pub enum TaskNode {
  Task(Arc<dyn Task>),
  Tree(Arc<TaskTree>),
}

impl TaskNode {
  pub fn describe(&self) -> String {
    match self {
      TaskNode::Task(task) => task.describe(),
      TaskNode::Tree(tree) => tree.describe(),
    }
  }

  /// The nested tree, if this child is one.
  pub fn as_tree(&self) -> Option<&TaskTree> {
    match self {
      TaskNode::Task(_) => None,
      TaskNode::Tree(tree) => Some(tree),
    }
  }

  pub(crate) fn share(&self) -> TaskNode {
    match self {
      TaskNode::Task(task) => TaskNode::Task(Arc::clone(task)),
      TaskNode::Tree(tree) => TaskNode::Tree(Arc::clone(tree)),
    }
  }
}

impl fmt::Debug for TaskNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskNode::Task(task) => f.debug_tuple("Task").field(&task.describe()).finish(),
      TaskNode::Tree(tree) => f.debug_tuple("Tree").field(tree).finish(),
    }
  }
}

impl<T: Task + 'static> From<T> for TaskNode {
  fn from(task: T) -> Self {
    TaskNode::Task(Arc::new(task))
  }
}

impl From<TaskTree> for TaskNode {
  fn from(tree: TaskTree) -> Self {
    TaskNode::Tree(Arc::new(tree))
  }
}

/// An ordered group of tasks and nested trees with an execution mode.
///
/// Trees are built incrementally and handed to the runner by reference, so
/// they cannot change while they run.
#[derive(Debug)]
pub struct TaskTree {
  children: Vec<TaskNode>,
  mode: ExecutionMode,
  is_subtree: bool,
  name: Option<String>,
}

impl TaskTree {
  /// Create an empty tree.
  pub fn new(mode: ExecutionMode) -> Self {
    Self {
      children: Vec::new(),
      mode,
      is_subtree: false,
      name: None,
    }
  }

  pub fn sequential() -> Self {
    Self::new(ExecutionMode::Sequential)
  }

  pub fn parallel() -> Self {
    Self::new(ExecutionMode::Parallel)
  }

  /// Name the tree; failures raised inside it carry the name in their path.
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Append children in iteration order.
  ///
  /// Mix tasks and trees by converting them first:
  /// `tree.append([TaskNode::from(task), TaskNode::from(subtree)])`.
  pub fn append<I>(&mut self, children: I) -> &mut Self
  where
    I: IntoIterator,
    I::Item: Into<TaskNode>,
  {
    self.children.extend(children.into_iter().map(Into::into));
    self
  }

  /// Append a single child.
  pub fn push(&mut self, child: impl Into<TaskNode>) -> &mut Self {
    self.children.push(child.into());
    self
  }

  /// Number of direct children.
  pub fn len(&self) -> usize {
    self.children.len()
  }

  pub fn is_empty(&self) -> bool {
    self.children.is_empty()
  }

  /// Mark this tree as nested inside another. Only affects [`describe`](Self::describe).
  pub fn mark_as_subtree(&mut self) -> &mut Self {
    self.is_subtree = true;
    self
  }

  pub fn is_subtree(&self) -> bool {
    self.is_subtree
  }

  pub fn mode(&self) -> ExecutionMode {
    self.mode
  }

  pub fn is_parallel(&self) -> bool {
    self.mode == ExecutionMode::Parallel
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn children(&self) -> &[TaskNode] {
    &self.children
  }

  /// Render the tree for operators.
  ///
  /// `2 sequential tasks: { create cluster control plane "dev", 2 parallel sub-tasks: { ... } }`
  pub fn describe(&self) -> String {
    let descriptions: Vec<String> = self.children.iter().map(TaskNode::describe).collect();
    match descriptions.as_slice() {
      [] => "no tasks".to_string(),
      [only] => only.clone(),
      _ => {
        let noun = if self.is_subtree { "sub-tasks" } else { "tasks" };
        format!(
          "{} {} {}: {{ {} }}",
          descriptions.len(),
          self.mode,
          noun,
          descriptions.join(", ")
        )
      }
    }
  }
}

impl fmt::Display for TaskTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.describe())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::task::task_fn;

  fn noop(description: &str) -> TaskNode {
    task_fn(description, |_| async { Ok(()) }).into()
  }

  #[test]
  fn test_empty_tree() {
    let tree = TaskTree::sequential();

    assert_eq!(tree.len(), 0);
    assert!(tree.is_empty());
    assert_eq!(tree.describe(), "no tasks");
  }

  #[test]
  fn test_append_preserves_order() {
    let mut tree = TaskTree::sequential();
    tree.append([noop("A"), noop("B")]).push(noop("C"));

    let order: Vec<String> = tree.children().iter().map(TaskNode::describe).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
    assert_eq!(tree.len(), 3);
  }

  #[test]
  fn test_nested_tree_counts_as_one_child() {
    let mut inner = TaskTree::parallel();
    inner.append([noop("x"), noop("y"), noop("z")]);

    let mut outer = TaskTree::sequential();
    outer.append([noop("leaf"), TaskNode::from(inner)]);

    assert_eq!(outer.len(), 2);
    assert_eq!(outer.children()[1].as_tree().map(TaskTree::len), Some(3));
    assert!(outer.children()[0].as_tree().is_none());
  }

  #[test]
  fn test_describe_nested() {
    let mut node_groups = TaskTree::parallel();
    node_groups.append([noop("create nodegroup \"ng-1\""), noop("create nodegroup \"ng-2\"")]);
    node_groups.mark_as_subtree();

    let mut root = TaskTree::sequential();
    root.append([noop("create cluster control plane \"dev\""), TaskNode::from(node_groups)]);

    assert_eq!(
      root.describe(),
      "2 sequential tasks: { create cluster control plane \"dev\", \
       2 parallel sub-tasks: { create nodegroup \"ng-1\", create nodegroup \"ng-2\" } }"
    );
  }

  #[test]
  fn test_describe_single_child_collapses() {
    let mut tree = TaskTree::parallel();
    tree.push(noop("fix cluster compatibility"));

    assert_eq!(tree.to_string(), "fix cluster compatibility");
  }

  #[test]
  fn test_subtree_marker_is_cosmetic() {
    let mut tree = TaskTree::parallel().with_name("node groups");
    tree.append([noop("a"), noop("b")]);
    let before = tree.mode();
    tree.mark_as_subtree();

    assert!(tree.is_subtree());
    assert_eq!(tree.mode(), before);
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.name(), Some("node groups"));
  }
}
