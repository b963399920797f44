//! Provisioning collaborators called from inside units of work.
//!
//! Implementations talk to the stack orchestration service, the identity
//! provider and the cluster API. They are shared by every task in a tree, so
//! they must tolerate concurrent calls from parallel siblings.

use async_trait::async_trait;
use clusterplan_config::{ClusterMeta, ManagedNodeGroup, NodeGroup, ObjectMeta, ServiceAccount};
use clusterplan_tasks::{BoxError, Progress};

use crate::account::ResourceAccount;

/// Options bound into every self-managed node group task.
#[derive(Debug, Clone)]
pub struct NodeGroupOptions {
  pub supports_managed_nodes: bool,
  pub force_add_cni_policy: bool,
  pub resource_account: ResourceAccount,
}

/// Creates and waits on infrastructure stacks.
///
/// Each call returns once the stack is complete (or has failed). Long waits
/// should be reported through `progress`.
#[async_trait]
pub trait StackManager: Send + Sync {
  async fn create_cluster(
    &self,
    cluster: &ClusterMeta,
    supports_managed_nodes: bool,
    progress: &Progress,
  ) -> Result<(), BoxError>;

  async fn create_node_group(
    &self,
    cluster: &ClusterMeta,
    node_group: &NodeGroup,
    options: &NodeGroupOptions,
    progress: &Progress,
  ) -> Result<(), BoxError>;

  async fn create_managed_node_group(
    &self,
    cluster: &ClusterMeta,
    node_group: &ManagedNodeGroup,
    force_add_cni_policy: bool,
    progress: &Progress,
  ) -> Result<(), BoxError>;

  /// Add resources newer features expect to an existing cluster stack.
  async fn fix_cluster_compatibility(
    &self,
    cluster: &ClusterMeta,
    progress: &Progress,
  ) -> Result<(), BoxError>;

  async fn associate_oidc_provider(
    &self,
    cluster: &ClusterMeta,
    progress: &Progress,
  ) -> Result<(), BoxError>;

  /// Create the IAM role stack for a service account and return the role ARN.
  async fn create_iam_service_account(
    &self,
    cluster: &ClusterMeta,
    service_account: &ServiceAccount,
    progress: &Progress,
  ) -> Result<String, BoxError>;
}

/// Applies objects inside the cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
  async fn create_or_update_service_account(&self, meta: &ObjectMeta) -> Result<(), BoxError>;
}

/// Looks up the account that publishes worker node resources for a region.
#[async_trait]
pub trait AccountResolver: Send + Sync {
  async fn resource_account_id(&self, region: &str) -> Result<String, BoxError>;
}
