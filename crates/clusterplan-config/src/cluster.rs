use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::iam::ClusterIam;
use crate::nodegroup::{ManagedNodeGroup, NodeGroup};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMeta {
  pub name: String,
  pub region: String,
  /// Kubernetes version; provider default when unset.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

/// Declarative description of a cluster and everything attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
  pub metadata: ClusterMeta,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub node_groups: Vec<NodeGroup>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub managed_node_groups: Vec<ManagedNodeGroup>,
  #[serde(default)]
  pub iam: ClusterIam,
}

impl ClusterConfig {
  /// Parse and validate a JSON config.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Parse and validate a YAML config.
  pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Check the invariants the builders rely on.
  ///
  /// Node group names share one namespace across managed and self-managed
  /// groups since both become stacks named after them.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.metadata.name.trim().is_empty() {
      return Err(ConfigError::MissingField("metadata.name"));
    }
    if self.metadata.region.trim().is_empty() {
      return Err(ConfigError::MissingField("metadata.region"));
    }

    let mut seen = HashSet::new();
    for name in self.node_group_names() {
      if name.trim().is_empty() {
        return Err(ConfigError::MissingField("nodeGroups[].name"));
      }
      if !seen.insert(name) {
        return Err(ConfigError::DuplicateNodeGroup(name.to_string()));
      }
    }

    let mut accounts = HashSet::new();
    for sa in &self.iam.service_accounts {
      if sa.metadata.name.trim().is_empty() {
        return Err(ConfigError::MissingField("iam.serviceAccounts[].metadata.name"));
      }
      let name = sa.name_string();
      if !self.iam.with_oidc {
        return Err(ConfigError::OidcRequired(name));
      }
      if !accounts.insert(name.clone()) {
        return Err(ConfigError::DuplicateServiceAccount(name));
      }
    }

    Ok(())
  }

  /// Names of every node group, self-managed first.
  pub fn node_group_names(&self) -> Vec<&str> {
    self
      .node_groups
      .iter()
      .map(|ng| ng.name.as_str())
      .chain(self.managed_node_groups.iter().map(|ng| ng.name.as_str()))
      .collect()
  }
}
