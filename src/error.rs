//! Error types for heap operations.
//!
//! Recoverable conditions (`NoFit`, `NullPointer`, `InvalidAddress`,
//! `Configuration`) leave the heap untouched. `OutOfMemory` and `Corruption`
//! are fatal for the heap they come from.

use thiserror::Error;

/// The error type for all heap operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
  /// The backing buffer could not be obtained from the system.
  #[error("out of memory: could not reserve {requested} bytes for the arena")]
  OutOfMemory {
    /// Capacity that was asked for.
    requested: usize,
  },

  /// No free block can hold the request.
  #[error("no fit: {requested} bytes requested, {remaining} bytes remaining")]
  NoFit {
    /// Total block size needed, header included.
    requested: usize,
    /// Free bytes in the arena at the time of the request.
    remaining: usize,
  },

  /// A null pointer was passed where a block pointer was expected.
  #[error("null pointer")]
  NullPointer,

  /// The pointer does not name the payload of an allocated block.
  #[error("invalid address {address:#x}")]
  InvalidAddress {
    /// The rejected address.
    address: usize,
  },

  /// An unsupported setting was requested.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// A heap configuration file could not be read or parsed.
  #[error("failed to load heap configuration: {0}")]
  ConfigParse(String),

  /// The arena no longer satisfies its invariants.
  #[error("heap corruption at offset {offset}: {cause}")]
  Corruption {
    /// Byte offset where the inconsistency was found.
    offset: usize,
    /// What was wrong.
    cause: String,
  },
}

impl HeapError {
  pub(crate) fn corruption(
    offset: usize,
    cause: impl Into<String>,
  ) -> Self {
    Self::Corruption {
      offset,
      cause: cause.into(),
    }
  }

  /// Returns `true` when the heap that produced this error is unusable.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::OutOfMemory { .. } | Self::Corruption { .. })
  }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HeapError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fatal_kinds() {
    assert!(HeapError::OutOfMemory { requested: 64 }.is_fatal());
    assert!(HeapError::corruption(8, "bad header").is_fatal());

    assert!(!HeapError::NullPointer.is_fatal());
    assert!(!HeapError::NoFit { requested: 12, remaining: 4 }.is_fatal());
    assert!(!HeapError::Configuration("best-fit".into()).is_fatal());
  }

  #[test]
  fn test_messages() {
    let err = HeapError::InvalidAddress { address: 0x10 };
    assert_eq!(err.to_string(), "invalid address 0x10");

    let err = HeapError::corruption(12, "zero sized block");
    assert_eq!(err.to_string(), "heap corruption at offset 12: zero sized block");

    let err = HeapError::ConfigParse("heap.toml: missing".into());
    assert_eq!(err.to_string(), "failed to load heap configuration: heap.toml: missing");
    assert!(!err.is_fatal());
  }
}
