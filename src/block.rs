//! In-band block header protocol.
//!
//! Every block starts with a single header word that packs the block size
//! (header included) and the allocation state:
//!
//! ```text
//!    31                                         2   1   0
//!   ┌─────────────────────────────────────────────┬───┬───┐
//!   │            size (word aligned)              │ 0 │ A │
//!   └─────────────────────────────────────────────┴───┴───┘
//!                                                       ▲
//!                                         allocated flag ┘
//! ```
//!
//! Because sizes are always word aligned, the low bits of the size are zero
//! and bit 0 is free to carry the flag. The price is the size ceiling:
//! the largest block a header can describe is [`MAX_BLOCK_SIZE`] bytes.
//!
//! Nothing outside this module touches the bit layout.

use crate::{HEADER_SIZE, WORD_SIZE};

/// Bit 0 of the header word marks an allocated block.
const ALLOCATED_FLAG: u32 = 0x1;

/// Bits that carry the size.
const SIZE_MASK: u32 = !(WORD_SIZE as u32 - 1);

/// Largest block size (in bytes) a header word can record.
pub const MAX_BLOCK_SIZE: usize = SIZE_MASK as usize;

/// Decoded header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  pub size: usize,
  pub allocated: bool,
}

impl Header {
  pub fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self { size, allocated }
  }

  /// Header of a free block spanning `size` bytes.
  pub fn free(size: usize) -> Self {
    Self::new(size, false)
  }

  /// Header of an allocated block spanning `size` bytes.
  pub fn allocated(size: usize) -> Self {
    Self::new(size, true)
  }

  /// Packs the header into its in-band word.
  ///
  /// The size is masked down to a word multiple, callers are expected to
  /// pass aligned sizes no larger than [`MAX_BLOCK_SIZE`].
  pub fn encode(self) -> u32 {
    debug_assert!(self.size <= MAX_BLOCK_SIZE);

    let size = self.size as u32 & SIZE_MASK;

    if self.allocated {
      size | ALLOCATED_FLAG
    } else {
      size
    }
  }

  pub fn decode(word: u32) -> Self {
    Self {
      size: (word & SIZE_MASK) as usize,
      allocated: word & ALLOCATED_FLAG != 0,
    }
  }

  /// Payload bytes following the header.
  pub fn payload_size(&self) -> usize {
    self.size.saturating_sub(HEADER_SIZE)
  }

  /// Checks this header against the block invariants for a block that
  /// starts at `offset` inside an arena of `capacity` bytes.
  pub fn validate(
    &self,
    offset: usize,
    capacity: usize,
  ) -> Result<(), &'static str> {
    if self.size < HEADER_SIZE {
      return Err("block size smaller than a header");
    }
    if self.size % WORD_SIZE != 0 {
      return Err("block size is not word aligned");
    }
    if offset + self.size > capacity {
      return Err("block extends past the end of the arena");
    }
    Ok(())
  }
}

/// One block as reported by a heap walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Byte offset of the block header from the arena start.
  pub offset: usize,
  /// Block size including the header.
  pub size: usize,
  pub allocated: bool,
}

impl BlockInfo {
  /// Offset of the first payload byte.
  pub fn payload_offset(&self) -> usize {
    self.offset + HEADER_SIZE
  }

  /// Offset one past the last byte of the block.
  pub fn end(&self) -> usize {
    self.offset + self.size
  }
}
