//! Clusterplan Builder
//!
//! Builders turn a [`ClusterConfig`](clusterplan_config::ClusterConfig) into
//! task trees that encode provisioning order:
//!
//! ```text
//! sequential
//! ├── create cluster control plane
//! └── sequential (post-cluster creation, if any)
//!     ├── associate IAM OIDC provider
//!     └── sequential "node groups"
//!         ├── parallel: create nodegroup ...
//!         └── parallel: create managed nodegroup ...
//! parallel "IAM service accounts"
//! └── sequential "serviceaccount <ns>/<name>"
//!     ├── create IAM role for serviceaccount
//!     └── create serviceaccount
//! ```
//!
//! The provisioning calls themselves go through the collaborator traits in
//! this crate ([`StackManager`], [`ClusterClient`], [`AccountResolver`]).
//! Builders never run anything; they hand the tree to a
//! [`Runner`](clusterplan_tasks::Runner).

mod account;
mod builder;
mod collaborators;
mod tasks;

pub use account::{AccountError, ResourceAccount};
pub use builder::{BuildError, StackTaskBuilder};
pub use collaborators::{AccountResolver, ClusterClient, NodeGroupOptions, StackManager};
pub use tasks::{
  AssociateOidcProviderTask, ClusterCompatTask, CreateClusterTask, ManagedNodeGroupTask,
  NodeGroupTask, ServiceAccountRoleTask, ServiceAccountTask,
};
