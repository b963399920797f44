use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_namespace() -> String {
  "default".to_string()
}

/// Kubernetes object metadata for objects created inside the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
  pub name: String,
  #[serde(default = "default_namespace")]
  pub namespace: String,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub labels: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub annotations: HashMap<String, String>,
}

/// A Kubernetes service account bound to an IAM role through the cluster's
/// OIDC provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
  pub metadata: ObjectMeta,
  #[serde(default, rename = "attachPolicyARNs", skip_serializing_if = "Vec::is_empty")]
  pub attach_policy_arns: Vec<String>,
  /// Use an existing role instead of creating one.
  #[serde(rename = "attachRoleARN", skip_serializing_if = "Option::is_none")]
  pub attach_role_arn: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub permissions_boundary: Option<String>,
}

impl ServiceAccount {
  /// `namespace/name`, the form used in descriptions and stack names.
  pub fn name_string(&self) -> String {
    format!("{}/{}", self.metadata.namespace, self.metadata.name)
  }

  /// Metadata for the in-cluster object, annotated with the given role.
  pub fn annotated_meta(&self, role_arn: &str) -> ObjectMeta {
    let mut meta = self.metadata.clone();
    meta.annotations.insert(
      "eks.amazonaws.com/role-arn".to_string(),
      role_arn.to_string(),
    );
    meta
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIam {
  #[serde(default, rename = "withOIDC")]
  pub with_oidc: bool,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub service_accounts: Vec<ServiceAccount>,
}
