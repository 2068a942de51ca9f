//! Read-only views of the heap: capacity counters and a lazy header walk.

use serde::Serialize;

use crate::{
  arena::Arena,
  block::BlockInfo,
  error::{HeapError, Result},
};

/// Capacity counters of a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
  pub total_capacity: usize,
  pub remaining_capacity: usize,
}

impl Stats {
  /// Bytes held by allocated blocks, headers included.
  pub fn used(&self) -> usize {
    self.total_capacity - self.remaining_capacity
  }
}

/// Iterator over every block of the arena, in address order.
///
/// The walk follows header sizes from the arena start. It stops at the arena
/// end, or right after yielding a [`HeapError::Corruption`] for the first
/// header that breaks the block invariants; it never reads past such a
/// header.
pub struct Walk<'a> {
  arena: &'a Arena,
  offset: usize,
  done: bool,
}

impl<'a> Walk<'a> {
  pub(crate) fn new(arena: &'a Arena) -> Self {
    Self {
      arena,
      offset: 0,
      done: false,
    }
  }
}

impl Iterator for Walk<'_> {
  type Item = Result<BlockInfo>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done || self.offset >= self.arena.capacity() {
      return None;
    }

    let offset = self.offset;
    let header = match self.arena.read_header(offset).and_then(|header| {
      header
        .validate(offset, self.arena.capacity())
        .map(|_| header)
        .map_err(|cause| HeapError::corruption(offset, cause))
    }) {
      Ok(header) => header,
      Err(err) => {
        self.done = true;
        return Some(Err(err));
      }
    };

    self.offset += header.size;

    Some(Ok(BlockInfo {
      offset,
      size: header.size,
      allocated: header.allocated,
    }))
  }
}
