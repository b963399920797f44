//! The account that owns worker node resources (images, registries) for a region.

use std::fmt;

use clusterplan_tasks::BoxError;
use thiserror::Error;
use tracing::info;

use crate::collaborators::AccountResolver;

#[derive(Debug, Error)]
pub enum AccountError {
  #[error("failed to resolve resource account for region {region}: {source}")]
  Resolve {
    region: String,
    #[source]
    source: BoxError,
  },

  #[error("resource account for region {region} is empty")]
  Empty { region: String },
}

/// Resolved once per invocation and handed to builders by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAccount {
  id: String,
}

impl ResourceAccount {
  pub fn new(id: impl Into<String>) -> Self {
    Self { id: id.into() }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Ask the resolver for the region's account and validate the answer.
  pub async fn resolve(
    resolver: &dyn AccountResolver,
    region: &str,
  ) -> Result<Self, AccountError> {
    let id = resolver
      .resource_account_id(region)
      .await
      .map_err(|source| AccountError::Resolve {
        region: region.to_string(),
        source,
      })?;

    if id.trim().is_empty() {
      return Err(AccountError::Empty {
        region: region.to_string(),
      });
    }

    info!(region = %region, account_id = %id, "resolved resource account");
    Ok(Self::new(id))
  }
}

impl fmt::Display for ResourceAccount {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.id)
  }
}
