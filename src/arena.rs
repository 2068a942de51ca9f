//! Backing buffer and capacity bookkeeping.
//!
//! The arena is one zero-initialized region obtained from `calloc(3)`.
//! It knows nothing about placement or compaction: it owns the bytes, the
//! total/remaining counters, and typed access to header words at byte
//! offsets.
//!
//! ```text
//!   ArenaStart                                                  ArenaEnd
//!   ▼                                                                  ▼
//!   ┌────┬──────────┬────┬──────────────┬────┬─────────────────────────┐
//!   │ H  │ payload  │ H  │   payload    │ H  │   trailing free region  │
//!   └────┴──────────┴────┴──────────────┴────┴─────────────────────────┘
//!   0                                                           capacity
//! ```

use std::ptr::{self, NonNull};

use libc::{c_void, calloc, free};
use tracing::{debug, trace};

use crate::{
  HEADER_SIZE, WORD_SIZE,
  block::{Header, MAX_BLOCK_SIZE},
  error::{HeapError, Result},
};

pub struct Arena {
  base: NonNull<u8>,
  capacity: usize,
  remaining: usize,
}

// The arena exclusively owns its buffer; nothing else holds `base`.
unsafe impl Send for Arena {}

impl Arena {
  /// Reserves a zeroed buffer of `capacity` bytes (rounded up to the word
  /// size) and formats it as a single free block.
  pub fn new(capacity: usize) -> Result<Self> {
    let capacity = crate::align::checked_align(capacity).ok_or_else(|| {
      HeapError::Configuration(format!("capacity {capacity} overflows when aligned"))
    })?;

    if capacity < HEADER_SIZE {
      return Err(HeapError::Configuration(format!(
        "capacity {capacity} cannot hold a single header"
      )));
    }
    if capacity > MAX_BLOCK_SIZE {
      return Err(HeapError::Configuration(format!(
        "capacity {capacity} exceeds the largest encodable block ({MAX_BLOCK_SIZE})"
      )));
    }

    let address = unsafe { calloc(capacity, 1) };
    let base = NonNull::new(address as *mut u8).ok_or(HeapError::OutOfMemory {
      requested: capacity,
    })?;

    debug!(capacity, address = ?base, "arena reserved");

    let mut arena = Self {
      base,
      capacity,
      remaining: capacity,
    };
    arena.write_header(0, Header::free(capacity));

    Ok(arena)
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn remaining(&self) -> usize {
    self.remaining
  }

  /// First byte of the arena.
  pub fn start(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  /// One past the last byte of the arena.
  pub fn end(&self) -> *mut u8 {
    self.start().wrapping_add(self.capacity)
  }

  /// Returns `true` iff `address` lies in `[ArenaStart, ArenaEnd)`.
  pub fn bounds_check(
    &self,
    address: *const u8,
  ) -> bool {
    let address = address as usize;
    address >= self.start() as usize && address < self.end() as usize
  }

  /// Converts an address inside the arena into a byte offset.
  pub fn offset_of(
    &self,
    address: *const u8,
  ) -> Option<usize> {
    self
      .bounds_check(address)
      .then(|| address as usize - self.start() as usize)
  }

  /// Address of the byte at `offset`.
  pub fn address_at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset <= self.capacity);
    // In bounds, so non-null.
    unsafe { NonNull::new_unchecked(self.start().add(offset)) }
  }

  /// Applies `delta` to the remaining capacity.
  ///
  /// Going below zero or above the capacity means the bookkeeping no longer
  /// matches the arena, which is reported as corruption.
  pub fn update_remaining(
    &mut self,
    delta: isize,
  ) -> Result<()> {
    let updated = self
      .remaining
      .checked_add_signed(delta)
      .filter(|&remaining| remaining <= self.capacity)
      .ok_or_else(|| {
        HeapError::corruption(
          self.capacity - self.remaining,
          format!(
            "remaining capacity {} cannot change by {delta}",
            self.remaining
          ),
        )
      })?;

    trace!(before = self.remaining, after = updated, "remaining capacity updated");
    self.remaining = updated;
    Ok(())
  }

  /// Zeroes the whole buffer and returns to the single-free-block state.
  pub fn flush(&mut self) {
    self.zero(0, self.capacity);
    self.remaining = self.capacity;
    self.write_header(0, Header::free(self.capacity));
    debug!(capacity = self.capacity, "arena flushed");
  }

  /// Decodes the header word stored at `offset`.
  pub fn read_header(
    &self,
    offset: usize,
  ) -> Result<Header> {
    self.check_header_slot(offset)?;
    let word = unsafe { self.start().add(offset).cast::<u32>().read() };
    Ok(Header::decode(word))
  }

  /// Raw header word at `offset`, as the resize heuristic compares it.
  pub fn read_word(
    &self,
    offset: usize,
  ) -> Result<u32> {
    self.check_header_slot(offset)?;
    Ok(unsafe { self.start().add(offset).cast::<u32>().read() })
  }

  /// Encodes `header` at `offset`.
  ///
  /// # Panics
  ///
  /// If `offset` is not a word-aligned header slot inside the arena.
  pub fn write_header(
    &mut self,
    offset: usize,
    header: Header,
  ) {
    assert!(
      offset % WORD_SIZE == 0 && offset + HEADER_SIZE <= self.capacity,
      "header slot {offset} outside arena of {} bytes",
      self.capacity
    );
    unsafe { self.start().add(offset).cast::<u32>().write(header.encode()) };
  }

  /// Moves `len` bytes from `src` to `dst`; the ranges may overlap.
  pub fn copy_within(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  ) {
    assert!(src + len <= self.capacity && dst + len <= self.capacity);
    unsafe { ptr::copy(self.start().add(src), self.start().add(dst), len) };
  }

  /// Zero-fills `[offset, offset + len)`.
  pub fn zero(
    &mut self,
    offset: usize,
    len: usize,
  ) {
    assert!(offset + len <= self.capacity);
    unsafe { ptr::write_bytes(self.start().add(offset), 0, len) };
  }

  fn check_header_slot(
    &self,
    offset: usize,
  ) -> Result<()> {
    if offset % WORD_SIZE != 0 || offset + HEADER_SIZE > self.capacity {
      return Err(HeapError::corruption(offset, "header slot outside the arena"));
    }
    Ok(())
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    debug!(capacity = self.capacity, "arena released");
    unsafe { free(self.base.as_ptr() as *mut c_void) };
  }
}

impl std::fmt::Debug for Arena {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    f.debug_struct("Arena")
      .field("start", &self.base)
      .field("capacity", &self.capacity)
      .field("remaining", &self.remaining)
      .finish()
  }
}
