//! Services: long-running companions a feature declares for the project.

use serde::{Deserialize, Serialize};

use crate::registry::Named;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
  pub name: String,
  /// Feature that declared it.
  pub feature: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl Service {
  pub fn new(name: &str, feature: &str) -> Self {
    Self {
      name: name.to_string(),
      feature: feature.to_string(),
      description: None,
    }
  }

  pub fn with_description(mut self, description: &str) -> Self {
    self.description = Some(description.to_string());
    self
  }
}

impl Named for Service {
  fn name(&self) -> &str {
    &self.name
  }
}
