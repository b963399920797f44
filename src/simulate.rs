//! An in-process provisioning backend that pretends to create stacks.
//!
//! Every call sleeps for a fixed delay, reports progress and then succeeds,
//! unless the resource it acts on was named with `--fail`.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use clusterplan_builder::{AccountResolver, ClusterClient, NodeGroupOptions, StackManager};
use clusterplan_config::{ClusterMeta, ManagedNodeGroup, NodeGroup, ObjectMeta, ServiceAccount};
use clusterplan_tasks::{BoxError, Progress};
use tracing::debug;

const SIMULATED_ACCOUNT_ID: &str = "602401143452";

pub struct SimulatedBackend {
  delay: Duration,
  fail: HashSet<String>,
}

impl SimulatedBackend {
  pub fn new(delay: Duration, fail: impl IntoIterator<Item = String>) -> Self {
    Self {
      delay,
      fail: fail.into_iter().collect(),
    }
  }

  async fn provision(&self, kind: &str, name: &str, progress: &Progress) -> Result<(), BoxError> {
    let stack = format!("clusterplan-{}-{}", kind, name.replace('/', "-"));
    debug!(stack = %stack, "simulated_stack_create");
    progress.report(format!("waiting for stack {:?} to reach CREATE_COMPLETE", stack));
    tokio::time::sleep(self.delay).await;

    if self.fail.contains(name) {
      return Err(format!("stack {:?} reached ROLLBACK_COMPLETE", stack).into());
    }
    Ok(())
  }
}

#[async_trait]
impl StackManager for SimulatedBackend {
  async fn create_cluster(
    &self,
    cluster: &ClusterMeta,
    _supports_managed_nodes: bool,
    progress: &Progress,
  ) -> Result<(), BoxError> {
    self.provision("cluster", &cluster.name, progress).await
  }

  async fn create_node_group(
    &self,
    _cluster: &ClusterMeta,
    node_group: &NodeGroup,
    options: &NodeGroupOptions,
    progress: &Progress,
  ) -> Result<(), BoxError> {
    progress.report(format!(
      "using images published by account {}",
      options.resource_account
    ));
    self
      .provision("nodegroup", node_group.name_string(), progress)
      .await
  }

  async fn create_managed_node_group(
    &self,
    _cluster: &ClusterMeta,
    node_group: &ManagedNodeGroup,
    _force_add_cni_policy: bool,
    progress: &Progress,
  ) -> Result<(), BoxError> {
    self.provision("nodegroup", &node_group.name, progress).await
  }

  async fn fix_cluster_compatibility(
    &self,
    cluster: &ClusterMeta,
    progress: &Progress,
  ) -> Result<(), BoxError> {
    self.provision("cluster", &cluster.name, progress).await
  }

  async fn associate_oidc_provider(
    &self,
    _cluster: &ClusterMeta,
    progress: &Progress,
  ) -> Result<(), BoxError> {
    tokio::time::sleep(self.delay).await;
    if self.fail.contains("oidc") {
      return Err("IAM OIDC provider could not be associated".into());
    }
    progress.report("associated IAM OIDC provider");
    Ok(())
  }

  async fn create_iam_service_account(
    &self,
    cluster: &ClusterMeta,
    service_account: &ServiceAccount,
    progress: &Progress,
  ) -> Result<String, BoxError> {
    let name = service_account.name_string();
    self.provision("iamserviceaccount", &name, progress).await?;
    Ok(format!(
      "arn:aws:iam::{}:role/clusterplan-{}-{}",
      SIMULATED_ACCOUNT_ID,
      cluster.name,
      name.replace('/', "-")
    ))
  }
}

#[async_trait]
impl ClusterClient for SimulatedBackend {
  async fn create_or_update_service_account(&self, meta: &ObjectMeta) -> Result<(), BoxError> {
    tokio::time::sleep(self.delay).await;
    let name = format!("{}/{}", meta.namespace, meta.name);
    if self.fail.contains(&name) {
      return Err(format!("serviceaccounts {:?} is forbidden", name).into());
    }
    Ok(())
  }
}

#[async_trait]
impl AccountResolver for SimulatedBackend {
  async fn resource_account_id(&self, _region: &str) -> Result<String, BoxError> {
    Ok(SIMULATED_ACCOUNT_ID.to_string())
  }
}
