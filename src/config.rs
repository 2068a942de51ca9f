//! Heap configuration.
//!
//! A configuration can be built in code or read from TOML:
//!
//! ```toml
//! capacity = 65536
//! policy = "first-fit"
//! ```
//!
//! Missing keys fall back to [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY)
//! and next-fit placement.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
  DEFAULT_CAPACITY,
  error::{HeapError, Result},
  policy::SearchMode,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
  /// Arena size in bytes, rounded up to the word size on creation.
  pub capacity: usize,
  /// Placement policy the heap starts with.
  pub policy: SearchMode,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_CAPACITY,
      policy: SearchMode::default(),
    }
  }
}

impl HeapConfig {
  pub fn with_capacity(
    mut self,
    capacity: usize,
  ) -> Self {
    self.capacity = capacity;
    self
  }

  pub fn with_policy(
    mut self,
    policy: SearchMode,
  ) -> Self {
    self.policy = policy;
    self
  }

  /// Parses a configuration from TOML text.
  pub fn from_toml_str(text: &str) -> Result<Self> {
    toml::from_str(text).map_err(|e| HeapError::ConfigParse(e.to_string()))
  }

  /// Reads and parses a TOML configuration file.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
      .map_err(|e| HeapError::ConfigParse(format!("{}: {e}", path.display())))?;
    Self::from_toml_str(&text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = HeapConfig::default();

    assert_eq!(config.capacity, 4 * 1024 * 1024);
    assert_eq!(config.policy, SearchMode::NextFit);
  }

  #[test]
  fn test_from_toml() {
    let config = HeapConfig::from_toml_str(
      r#"
        capacity = 1024
        policy = "first-fit"
      "#,
    )
    .unwrap();

    assert_eq!(config, HeapConfig::default().with_capacity(1024).with_policy(SearchMode::FirstFit));
  }

  #[test]
  fn test_from_toml_missing_keys() {
    let config = HeapConfig::from_toml_str("capacity = 256").unwrap();

    assert_eq!(config.capacity, 256);
    assert_eq!(config.policy, SearchMode::NextFit);
  }

  #[test]
  fn test_from_toml_unknown_policy() {
    let err = HeapConfig::from_toml_str(r#"policy = "worst-fit""#).unwrap_err();
    assert!(matches!(err, HeapError::ConfigParse(_)));
  }

  #[test]
  fn test_from_missing_file() {
    let err = HeapConfig::from_file("/nonexistent/rheap.toml").unwrap_err();
    assert!(matches!(err, HeapError::ConfigParse(_)));
  }
}
