//! Units of work for cluster provisioning.
//!
//! Every task binds its inputs at build time and checks the cancellation
//! token it was built with before and during its collaborator call.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use clusterplan_config::{ClusterMeta, ManagedNodeGroup, NodeGroup, ServiceAccount};
use clusterplan_tasks::{BoxError, Progress, Task, TaskError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collaborators::{ClusterClient, NodeGroupOptions, StackManager};

/// Inputs shared by every stack task built for one cluster.
#[derive(Clone)]
pub(crate) struct StackEnv {
  pub(crate) cluster: Arc<ClusterMeta>,
  pub(crate) stacks: Arc<dyn StackManager>,
  pub(crate) cancel: CancellationToken,
}

/// Await a collaborator call unless the token fires first.
async fn call<T>(
  cancel: &CancellationToken,
  context: &str,
  fut: impl Future<Output = Result<T, BoxError>>,
) -> Result<T, TaskError> {
  if cancel.is_cancelled() {
    return Err(TaskError::Cancelled);
  }

  tokio::select! {
    _ = cancel.cancelled() => {
      debug!(context = %context, "collaborator call cancelled");
      Err(TaskError::Cancelled)
    }
    result = fut => result.map_err(|e| TaskError::collaborator(context, e)),
  }
}

pub struct CreateClusterTask {
  info: String,
  env: StackEnv,
  supports_managed_nodes: bool,
}

impl CreateClusterTask {
  pub(crate) fn new(env: StackEnv, supports_managed_nodes: bool) -> Self {
    Self {
      info: format!("create cluster control plane {:?}", env.cluster.name),
      env,
      supports_managed_nodes,
    }
  }
}

#[async_trait]
impl Task for CreateClusterTask {
  fn describe(&self) -> String {
    self.info.clone()
  }

  async fn execute(&self, progress: Progress) -> Result<(), TaskError> {
    let env = &self.env;
    call(
      &env.cancel,
      "failed to create cluster stack",
      env
        .stacks
        .create_cluster(&env.cluster, self.supports_managed_nodes, &progress),
    )
    .await
  }
}

pub struct NodeGroupTask {
  info: String,
  env: StackEnv,
  node_group: NodeGroup,
  options: NodeGroupOptions,
}

impl NodeGroupTask {
  pub(crate) fn new(env: StackEnv, node_group: NodeGroup, options: NodeGroupOptions) -> Self {
    Self {
      info: format!("create nodegroup {:?}", node_group.name_string()),
      env,
      node_group,
      options,
    }
  }
}

#[async_trait]
impl Task for NodeGroupTask {
  fn describe(&self) -> String {
    self.info.clone()
  }

  async fn execute(&self, progress: Progress) -> Result<(), TaskError> {
    let env = &self.env;
    call(
      &env.cancel,
      "failed to create nodegroup stack",
      env
        .stacks
        .create_node_group(&env.cluster, &self.node_group, &self.options, &progress),
    )
    .await
  }
}

pub struct ManagedNodeGroupTask {
  info: String,
  env: StackEnv,
  node_group: ManagedNodeGroup,
  force_add_cni_policy: bool,
}

impl ManagedNodeGroupTask {
  pub(crate) fn new(env: StackEnv, node_group: ManagedNodeGroup, force_add_cni_policy: bool) -> Self {
    Self {
      info: format!("create managed nodegroup {:?}", node_group.name),
      env,
      node_group,
      force_add_cni_policy,
    }
  }
}

#[async_trait]
impl Task for ManagedNodeGroupTask {
  fn describe(&self) -> String {
    self.info.clone()
  }

  async fn execute(&self, progress: Progress) -> Result<(), TaskError> {
    let env = &self.env;
    call(
      &env.cancel,
      "failed to create managed nodegroup stack",
      env.stacks.create_managed_node_group(
        &env.cluster,
        &self.node_group,
        self.force_add_cni_policy,
        &progress,
      ),
    )
    .await
  }
}

/// Brings an existing cluster stack up to date with newer features.
pub struct ClusterCompatTask {
  env: StackEnv,
}

impl ClusterCompatTask {
  pub(crate) fn new(env: StackEnv) -> Self {
    Self { env }
  }
}

#[async_trait]
impl Task for ClusterCompatTask {
  fn describe(&self) -> String {
    "fix cluster compatibility".to_string()
  }

  async fn execute(&self, progress: Progress) -> Result<(), TaskError> {
    let env = &self.env;
    call(
      &env.cancel,
      "failed to update cluster stack",
      env.stacks.fix_cluster_compatibility(&env.cluster, &progress),
    )
    .await
  }
}

pub struct AssociateOidcProviderTask {
  env: StackEnv,
}

impl AssociateOidcProviderTask {
  pub(crate) fn new(env: StackEnv) -> Self {
    Self { env }
  }
}

#[async_trait]
impl Task for AssociateOidcProviderTask {
  fn describe(&self) -> String {
    "associate IAM OIDC provider".to_string()
  }

  async fn execute(&self, progress: Progress) -> Result<(), TaskError> {
    let env = &self.env;
    call(
      &env.cancel,
      "failed to associate IAM OIDC provider",
      env.stacks.associate_oidc_provider(&env.cluster, &progress),
    )
    .await
  }
}

/// Creates (or adopts) the IAM role for a service account.
///
/// The role ARN is handed to the [`ServiceAccountTask`] that follows it in
/// the same sequential tree.
pub struct ServiceAccountRoleTask {
  info: String,
  env: StackEnv,
  service_account: ServiceAccount,
  role_arn: Arc<OnceLock<String>>,
}

impl ServiceAccountRoleTask {
  pub(crate) fn new(
    env: StackEnv,
    service_account: ServiceAccount,
    role_arn: Arc<OnceLock<String>>,
  ) -> Self {
    Self {
      info: format!(
        "create IAM role for serviceaccount {:?}",
        service_account.name_string()
      ),
      env,
      service_account,
      role_arn,
    }
  }
}

#[async_trait]
impl Task for ServiceAccountRoleTask {
  fn describe(&self) -> String {
    self.info.clone()
  }

  async fn execute(&self, progress: Progress) -> Result<(), TaskError> {
    let arn = match &self.service_account.attach_role_arn {
      Some(existing) => {
        progress.report(format!("using existing role {}", existing));
        existing.clone()
      }
      None => {
        let env = &self.env;
        call(
          &env.cancel,
          "failed to create IAM role stack",
          env
            .stacks
            .create_iam_service_account(&env.cluster, &self.service_account, &progress),
        )
        .await?
      }
    };

    // Set at most once: each role task runs exactly once.
    let _ = self.role_arn.set(arn);
    Ok(())
  }
}

/// Creates the Kubernetes service account, annotated with its IAM role.
pub struct ServiceAccountTask {
  info: String,
  client: Arc<dyn ClusterClient>,
  service_account: ServiceAccount,
  role_arn: Arc<OnceLock<String>>,
  cancel: CancellationToken,
}

impl ServiceAccountTask {
  pub(crate) fn new(
    client: Arc<dyn ClusterClient>,
    service_account: ServiceAccount,
    role_arn: Arc<OnceLock<String>>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      info: format!("create serviceaccount {:?}", service_account.name_string()),
      client,
      service_account,
      role_arn,
      cancel,
    }
  }
}

#[async_trait]
impl Task for ServiceAccountTask {
  fn describe(&self) -> String {
    self.info.clone()
  }

  async fn execute(&self, _progress: Progress) -> Result<(), TaskError> {
    let name = self.service_account.name_string();
    let arn = self.role_arn.get().ok_or_else(|| {
      TaskError::failed(format!("no IAM role recorded for serviceaccount {}", name))
    })?;

    let meta = self.service_account.annotated_meta(arn);
    call(
      &self.cancel,
      &format!("failed to create service account {}", name),
      self.client.create_or_update_service_account(&meta),
    )
    .await
  }
}
