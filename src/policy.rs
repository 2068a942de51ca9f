//! Free block search strategies.
//!
//! Both strategies walk the header chain; they differ only in where the walk
//! begins. First-fit always starts at the arena start, next-fit resumes from
//! the block it handed out last and wraps around once.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
  arena::Arena,
  error::{HeapError, Result},
};

/// Placement policy used by [`Heap::alloc`](crate::Heap::alloc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
  /// First free block from the arena start that is large enough.
  FirstFit,
  /// First large-enough free block at or after the last placement, wrapping.
  #[default]
  NextFit,
  /// Smallest large-enough free block. Not implemented; selecting it fails.
  BestFit,
}

impl SearchMode {
  /// Rejects modes without an implementation.
  pub fn ensure_supported(self) -> Result<Self> {
    match self {
      Self::FirstFit | Self::NextFit => Ok(self),
      Self::BestFit => Err(HeapError::Configuration(
        "best-fit placement is not implemented".into(),
      )),
    }
  }
}

/// Active search mode plus the next-fit cursor.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
  mode: SearchMode,
  /// Offset of the block returned by the last next-fit search. Always a
  /// block boundary.
  cursor: usize,
}

impl Placement {
  pub fn new(mode: SearchMode) -> Result<Self> {
    Ok(Self {
      mode: mode.ensure_supported()?,
      cursor: 0,
    })
  }

  pub fn mode(&self) -> SearchMode {
    self.mode
  }

  /// Switches strategy. The cursor is left where it is.
  pub fn set_mode(
    &mut self,
    mode: SearchMode,
  ) -> Result<()> {
    self.mode = mode.ensure_supported()?;
    Ok(())
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn reset(&mut self) {
    self.cursor = 0;
  }

  /// Keeps the cursor on a block boundary after compaction moved every
  /// block past `freed_offset` down by `shift` bytes.
  pub fn relocate(
    &mut self,
    freed_offset: usize,
    shift: usize,
  ) {
    if self.cursor > freed_offset {
      self.cursor = self.cursor.saturating_sub(shift).max(freed_offset);
    }
  }

  /// Pulls the cursor back to `offset` when a block starting there grew
  /// over the boundary the cursor was on.
  pub fn retreat_to(
    &mut self,
    offset: usize,
  ) {
    if self.cursor > offset {
      self.cursor = offset;
    }
  }

  /// Finds the offset of a free block of at least `size` bytes.
  pub fn find(
    &mut self,
    arena: &Arena,
    size: usize,
  ) -> Result<usize> {
    let found = match self.mode {
      SearchMode::FirstFit => scan(arena, 0, arena.capacity(), size)?,
      SearchMode::NextFit => {
        let start = if self.cursor < arena.capacity() { self.cursor } else { 0 };

        let found = match scan(arena, start, arena.capacity(), size)? {
          Some(offset) => Some(offset),
          None => scan(arena, 0, start, size)?,
        };

        if let Some(offset) = found {
          self.cursor = offset;
        }
        found
      }
      SearchMode::BestFit => unreachable!("best-fit is rejected when selected"),
    };

    trace!(mode = ?self.mode, size, found = ?found, "placement search");

    found.ok_or(HeapError::NoFit {
      requested: size,
      remaining: arena.remaining(),
    })
  }
}

/// Walks blocks starting at `from` while their offset is below `until` and
/// returns the first free one of at least `size` bytes.
fn scan(
  arena: &Arena,
  from: usize,
  until: usize,
  size: usize,
) -> Result<Option<usize>> {
  let mut offset = from;

  while offset < until {
    let header = arena.read_header(offset)?;
    header
      .validate(offset, arena.capacity())
      .map_err(|cause| HeapError::corruption(offset, cause))?;

    if !header.allocated && header.size >= size {
      return Ok(Some(offset));
    }

    offset += header.size;
  }

  Ok(None)
}
