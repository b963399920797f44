//! Clusterplan Tasks
//!
//! This crate provides the task tree engine for clusterplan. Builders compose
//! units of work into a [`TaskTree`] that encodes what must happen and in what
//! order, and the [`Runner`] executes it and returns one aggregated outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Runner                             │
//! │  - run(tree) → Result<(), RunError>                         │
//! │  - sequential: in order, stop at the first failure          │
//! │  - parallel: one spawned task per child, collect all        │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         TaskTree                            │
//! │  - ordered children: TaskNode::{Task, Tree}                 │
//! │  - execution mode, subtree marker, optional name            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Task                              │
//! │  - describe() / execute(progress)                           │
//! │  - provisioning calls live in the implementations           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use clusterplan_tasks::{Runner, TaskTree, task_fn};
//!
//! let mut tree = TaskTree::sequential();
//! tree.push(task_fn("create cluster control plane \"dev\"", |_| async { Ok(()) }));
//!
//! let mut node_groups = TaskTree::parallel().with_name("node groups");
//! node_groups.append([ng1_task, ng2_task]);
//! node_groups.mark_as_subtree();
//! tree.push(node_groups);
//!
//! Runner::new().run(tree).await?;
//! ```

mod error;
mod events;
mod runner;
mod task;
mod tree;

pub use error::{BoxError, Failure, RunError, TaskError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use runner::{Runner, run};
pub use task::{FnTask, Progress, Task, task_fn};
pub use tree::{ExecutionMode, TaskNode, TaskTree};
