//! Clusterplan Config
//!
//! This crate contains the serializable cluster configuration types for
//! clusterplan. These types describe what should exist (a cluster, its node
//! groups and its IAM service accounts) before any task tree is built for it.
//!
//! Configuration can be loaded from:
//! - YAML files (`cluster.yaml`)
//! - JSON files or blobs
//!
//! Builders take a validated [`ClusterConfig`] and turn it into a task tree
//! for execution.

mod cluster;
mod error;
mod iam;
mod nodegroup;

pub use cluster::{ClusterConfig, ClusterMeta};
pub use error::ConfigError;
pub use iam::{ClusterIam, ObjectMeta, ServiceAccount};
pub use nodegroup::{ManagedNodeGroup, NodeGroup};
