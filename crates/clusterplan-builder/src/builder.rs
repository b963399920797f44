use std::sync::{Arc, OnceLock};

use clusterplan_config::{ClusterConfig, ClusterMeta, ManagedNodeGroup, NodeGroup, ServiceAccount};
use clusterplan_tasks::{TaskNode, TaskTree};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::account::ResourceAccount;
use crate::collaborators::{ClusterClient, NodeGroupOptions, StackManager};
use crate::tasks::{
  AssociateOidcProviderTask, ClusterCompatTask, CreateClusterTask, ManagedNodeGroupTask,
  NodeGroupTask, ServiceAccountRoleTask, ServiceAccountTask, StackEnv,
};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("cluster {cluster} does not support managed nodegroups ({count} requested)")]
  ManagedNodesUnsupported { cluster: String, count: usize },
}

/// Assembles provisioning trees for a single cluster.
///
/// Every task it builds shares the same stack manager, resource account and
/// cancellation token.
#[derive(Clone)]
pub struct StackTaskBuilder {
  env: StackEnv,
  resource_account: ResourceAccount,
}

impl StackTaskBuilder {
  pub fn new(
    cluster: ClusterMeta,
    stacks: Arc<dyn StackManager>,
    resource_account: ResourceAccount,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      env: StackEnv {
        cluster: Arc::new(cluster),
        stacks,
        cancel,
      },
      resource_account,
    }
  }

  pub fn cluster(&self) -> &ClusterMeta {
    &self.env.cluster
  }

  /// Create the control plane, then any post-creation tasks, then node groups.
  ///
  /// Self-managed node groups are created before managed ones. The node group
  /// subtree is left out entirely when both lists are empty.
  pub fn new_tasks_to_create_cluster_with_node_groups(
    &self,
    node_groups: &[NodeGroup],
    managed_node_groups: &[ManagedNodeGroup],
    supports_managed_nodes: bool,
    post_cluster_creation_tasks: Vec<TaskNode>,
  ) -> TaskTree {
    let mut tasks = TaskTree::sequential();
    tasks.push(CreateClusterTask::new(self.env.clone(), supports_managed_nodes));

    let node_group_tasks =
      self.node_group_subtree(node_groups, managed_node_groups, supports_managed_nodes);

    if post_cluster_creation_tasks.is_empty() {
      if let Some(node_group_tasks) = node_group_tasks {
        tasks.push(node_group_tasks);
      }
    } else {
      let mut post_creation = TaskTree::sequential();
      post_creation
        .append(post_cluster_creation_tasks)
        .mark_as_subtree();
      if let Some(node_group_tasks) = node_group_tasks {
        post_creation.push(node_group_tasks);
      }
      tasks.push(post_creation);
    }

    debug!(
      cluster = %self.env.cluster.name,
      node_groups = node_groups.len(),
      managed_node_groups = managed_node_groups.len(),
      "built cluster task tree"
    );
    tasks
  }

  fn node_group_subtree(
    &self,
    node_groups: &[NodeGroup],
    managed_node_groups: &[ManagedNodeGroup],
    supports_managed_nodes: bool,
  ) -> Option<TaskTree> {
    let mut subtree = TaskTree::sequential().with_name("node groups");

    let mut unmanaged =
      self.new_unmanaged_node_group_task(node_groups, supports_managed_nodes, false);
    if !unmanaged.is_empty() {
      unmanaged.mark_as_subtree();
      subtree.push(unmanaged);
    }

    let mut managed = self.new_managed_node_group_task(managed_node_groups, false);
    if !managed.is_empty() {
      managed.mark_as_subtree();
      subtree.push(managed);
    }

    if subtree.is_empty() {
      return None;
    }
    subtree.mark_as_subtree();
    Some(subtree)
  }

  /// One parallel task per self-managed node group.
  pub fn new_unmanaged_node_group_task(
    &self,
    node_groups: &[NodeGroup],
    supports_managed_nodes: bool,
    force_add_cni_policy: bool,
  ) -> TaskTree {
    let options = NodeGroupOptions {
      supports_managed_nodes,
      force_add_cni_policy,
      resource_account: self.resource_account.clone(),
    };

    let mut tasks = TaskTree::parallel();
    tasks.append(
      node_groups
        .iter()
        .map(|ng| NodeGroupTask::new(self.env.clone(), ng.clone(), options.clone())),
    );
    tasks
  }

  /// One parallel task per managed node group.
  pub fn new_managed_node_group_task(
    &self,
    node_groups: &[ManagedNodeGroup],
    force_add_cni_policy: bool,
  ) -> TaskTree {
    let mut tasks = TaskTree::parallel();
    tasks.append(
      node_groups
        .iter()
        .map(|ng| ManagedNodeGroupTask::new(self.env.clone(), ng.clone(), force_add_cni_policy)),
    );
    tasks
  }

  pub fn new_cluster_compat_task(&self) -> ClusterCompatTask {
    ClusterCompatTask::new(self.env.clone())
  }

  pub fn new_associate_oidc_provider_task(&self) -> AssociateOidcProviderTask {
    AssociateOidcProviderTask::new(self.env.clone())
  }

  /// A parallel tree with one sequential subtree per service account: create
  /// the IAM role, then the service account annotated with it.
  pub fn new_tasks_to_create_iam_service_accounts(
    &self,
    service_accounts: &[ServiceAccount],
    cluster_client: Arc<dyn ClusterClient>,
  ) -> TaskTree {
    let mut tasks = TaskTree::parallel().with_name("IAM service accounts");

    for sa in service_accounts {
      let role_arn = Arc::new(OnceLock::new());
      let mut sa_tasks =
        TaskTree::sequential().with_name(format!("serviceaccount {:?}", sa.name_string()));

      sa_tasks
        .push(ServiceAccountRoleTask::new(
          self.env.clone(),
          sa.clone(),
          role_arn.clone(),
        ))
        .push(ServiceAccountTask::new(
          cluster_client.clone(),
          sa.clone(),
          role_arn,
          self.env.cancel.clone(),
        ))
        .mark_as_subtree();

      tasks.push(sa_tasks);
    }
    tasks
  }

  /// Everything needed to bring up `config`: the cluster tree (with OIDC
  /// association when requested) followed by its service accounts.
  pub fn new_tasks_for_cluster_config(
    &self,
    config: &ClusterConfig,
    supports_managed_nodes: bool,
    cluster_client: Arc<dyn ClusterClient>,
  ) -> Result<TaskTree, BuildError> {
    if !supports_managed_nodes && !config.managed_node_groups.is_empty() {
      return Err(BuildError::ManagedNodesUnsupported {
        cluster: config.metadata.name.clone(),
        count: config.managed_node_groups.len(),
      });
    }

    let mut post_creation = Vec::new();
    if config.iam.with_oidc {
      post_creation.push(TaskNode::from(self.new_associate_oidc_provider_task()));
    }

    let mut cluster_tasks = self.new_tasks_to_create_cluster_with_node_groups(
      &config.node_groups,
      &config.managed_node_groups,
      supports_managed_nodes,
      post_creation,
    );

    if config.iam.service_accounts.is_empty() {
      return Ok(cluster_tasks);
    }
    cluster_tasks.mark_as_subtree();

    let mut sa_tasks =
      self.new_tasks_to_create_iam_service_accounts(&config.iam.service_accounts, cluster_client);
    sa_tasks.mark_as_subtree();

    let mut tasks = TaskTree::sequential();
    tasks.push(cluster_tasks).push(sa_tasks);
    Ok(tasks)
  }
}
