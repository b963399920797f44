use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A self-managed node group, backed by its own stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroup {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub instance_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub desired_capacity: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_size: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_size: Option<u32>,
  /// Image family, e.g. "AmazonLinux2" or "Bottlerocket".
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ami_family: Option<String>,
  /// Explicit image ID; when unset the image is resolved by the provider.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ami: Option<String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub labels: HashMap<String, String>,
}

impl NodeGroup {
  /// Name used in descriptions and stack names.
  pub fn name_string(&self) -> &str {
    &self.name
  }
}

/// A node group whose instances are managed by the cloud provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedNodeGroup {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub instance_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub desired_capacity: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_size: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_size: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ami_family: Option<String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub labels: HashMap<String, String>,
}
