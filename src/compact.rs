//! Release and compaction.
//!
//! Freeing a block never leaves a hole behind. The allocated run that follows
//! the freed block is slid down over it and the free space joins the
//! trailing free region:
//!
//! ```text
//!   before free(B):
//!   ┌─────┬─────────┬─────┬──────┬──────────────────────────┐
//!   │  A  │    B    │  C  │  D   │        free (R)          │
//!   └─────┴─────────┴─────┴──────┴──────────────────────────┘
//!
//!   after:
//!   ┌─────┬─────┬──────┬────────────────────────────────────┐
//!   │  A  │  C  │  D   │          free (R + |B|)            │
//!   └─────┴─────┴──────┴────────────────────────────────────┘
//! ```
//!
//! `C` and `D` change address; pointers into them taken before the call are
//! stale afterwards.

use tracing::debug;

use crate::{
  HEADER_SIZE,
  block::{BlockInfo, Header},
  error::{HeapError, Result},
  heap::Heap,
};

impl Heap {
  /// Marks `block` free, returns its bytes to the remaining capacity and
  /// compacts the heap behind it.
  ///
  /// `block` must be an allocated block taken from a fresh walk.
  pub(crate) fn release(
    &mut self,
    block: BlockInfo,
  ) -> Result<()> {
    // Everything is checked before the first byte moves.
    let run_end = self.run_end(block.end())?;

    self.arena.update_remaining(block.size as isize)?;
    self.arena.write_header(block.offset, Header::free(block.size));

    self.compact_after(block, run_end);
    Ok(())
  }

  /// Offset where the allocated run starting at `from` ends: the trailing
  /// free block or the arena end.
  ///
  /// A free block that is not the trailing region, or a trailing region that
  /// disagrees with the remaining capacity, is corruption.
  fn run_end(
    &self,
    from: usize,
  ) -> Result<usize> {
    let capacity = self.arena.capacity();
    let mut offset = from;

    while offset < capacity {
      let header = self.arena.read_header(offset)?;
      header
        .validate(offset, capacity)
        .map_err(|cause| HeapError::corruption(offset, cause))?;

      if !header.allocated {
        break;
      }
      offset += header.size;
    }

    if capacity - offset != self.arena.remaining() {
      return Err(HeapError::corruption(
        offset,
        format!(
          "trailing free region of {} bytes does not match remaining capacity {}",
          capacity - offset,
          self.arena.remaining()
        ),
      ));
    }

    Ok(offset)
  }

  /// Slides `[freed.end(), run_end)` down onto `freed.offset`, zeroes the
  /// bytes it vacated and rewrites the trailing free header.
  fn compact_after(
    &mut self,
    freed: BlockInfo,
    run_end: usize,
  ) {
    let capacity = self.arena.capacity();
    let moved = run_end - freed.end();
    let tail = run_end - freed.size;

    self.arena.copy_within(freed.end(), freed.offset, moved);
    self.arena.zero(tail, freed.size);

    // The old trailing header now sits inside the free region.
    if run_end < capacity {
      self.arena.zero(run_end, HEADER_SIZE);
    }
    self.arena.write_header(tail, Header::free(capacity - tail));

    self.placement.relocate(freed.offset, freed.size);

    debug!(
      offset = freed.offset,
      size = freed.size,
      moved,
      remaining = self.arena.remaining(),
      "block released and heap compacted"
    );
  }
}
