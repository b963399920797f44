use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse JSON config: {0}")]
  Json(#[from] serde_json::Error),

  #[error("failed to parse YAML config: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("missing required field: {0}")]
  MissingField(&'static str),

  #[error("duplicate node group name: {0}")]
  DuplicateNodeGroup(String),

  #[error("duplicate service account: {0}")]
  DuplicateServiceAccount(String),

  #[error("service account {0} requires iam.withOIDC to be enabled")]
  OidcRequired(String),
}
