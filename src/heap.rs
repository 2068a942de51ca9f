//! The heap handle: allocation, release and resize on top of one arena.

use std::ptr::NonNull;

use tracing::{debug, info, trace, warn};

use crate::{
  HEADER_SIZE, WORD_SIZE,
  align::checked_align,
  arena::Arena,
  block::{BlockInfo, Header},
  config::HeapConfig,
  error::{HeapError, Result},
  policy::{Placement, SearchMode},
  walk::{Stats, Walk},
};

/// A compacting heap over a fixed-capacity arena.
///
/// Every `free` slides the allocated blocks that follow the freed one down
/// to close the gap. Addresses returned by [`Heap::alloc`] are therefore
/// only valid until the next `free` or `realloc` of a block at a lower
/// address; re-resolve them (or go through [`Heap::payload_mut`]) instead of
/// caching them across those calls.
#[derive(Debug)]
pub struct Heap {
  pub(crate) arena: Arena,
  pub(crate) placement: Placement,
  /// Set once an operation ran into corruption; cleared by `flush`.
  pub(crate) poisoned: bool,
}

impl Heap {
  /// Creates a heap of `capacity` bytes using the default placement policy.
  pub fn new(capacity: usize) -> Result<Self> {
    Self::with_config(&HeapConfig::default().with_capacity(capacity))
  }

  pub fn with_config(config: &HeapConfig) -> Result<Self> {
    let placement = Placement::new(config.policy)?;
    let arena = Arena::new(config.capacity)?;

    info!(
      capacity = arena.capacity(),
      policy = ?config.policy,
      "heap initialized"
    );

    Ok(Self {
      arena,
      placement,
      poisoned: false,
    })
  }

  pub fn policy(&self) -> SearchMode {
    self.placement.mode()
  }

  /// Changes the placement policy; the next-fit cursor is kept as is.
  ///
  /// Unsupported policies are rejected and the active one stays in place.
  pub fn set_policy(
    &mut self,
    policy: SearchMode,
  ) -> Result<()> {
    self.placement.set_mode(policy)?;
    debug!(?policy, "placement policy changed");
    Ok(())
  }

  pub fn stats(&self) -> Stats {
    Stats {
      total_capacity: self.arena.capacity(),
      remaining_capacity: self.arena.remaining(),
    }
  }

  /// Walks all blocks from the arena start.
  pub fn walk(&self) -> Walk<'_> {
    Walk::new(&self.arena)
  }

  /// Returns `true` iff `address` lies inside the arena.
  pub fn contains(
    &self,
    address: *const u8,
  ) -> bool {
    self.arena.bounds_check(address)
  }

  /// Byte offset of `address` from the arena start.
  pub fn offset_of(
    &self,
    address: *const u8,
  ) -> Option<usize> {
    self.arena.offset_of(address)
  }

  /// Address of the byte `offset` bytes past the arena start.
  ///
  /// Offsets survive compaction better than addresses do: a block's new
  /// offset is its old one minus the size of any block freed below it.
  pub fn address_at(
    &self,
    offset: usize,
  ) -> Option<NonNull<u8>> {
    (offset <= self.arena.capacity()).then(|| self.arena.address_at(offset))
  }

  /// Whether an earlier operation detected corruption.
  pub fn is_poisoned(&self) -> bool {
    self.poisoned
  }

  /// Zeroes the arena and returns to a single free block.
  pub fn flush(&mut self) {
    self.arena.flush();
    self.placement.reset();
    self.poisoned = false;
  }

  /// Allocates a block with room for `size` payload bytes.
  ///
  /// The returned address points `HEADER_SIZE` bytes past the block header.
  pub fn alloc(
    &mut self,
    size: u32,
  ) -> Result<NonNull<u8>> {
    self.check_poisoned()?;

    let total = block_size(size)
      .filter(|&total| total <= self.arena.capacity())
      .ok_or(HeapError::NoFit {
        requested: (size as usize).saturating_add(HEADER_SIZE),
        remaining: self.arena.remaining(),
      })?;

    let found = self.placement.find(&self.arena, total);
    let offset = self.guard(found)?;

    let candidate = self.arena.read_header(offset);
    let candidate = self.guard(candidate)?;
    let reserved = self.arena.update_remaining(-(total as isize));
    self.guard(reserved)?;

    self.arena.write_header(offset, Header::allocated(total));

    let remainder = candidate.size - total;
    if remainder > 0 {
      debug_assert!(
        offset + candidate.size < self.arena.capacity() || remainder == self.arena.remaining()
      );
      self.arena.write_header(offset + total, Header::free(remainder));
    }

    trace!(size, total, offset, remaining = self.arena.remaining(), "block allocated");

    Ok(self.arena.address_at(offset + HEADER_SIZE))
  }

  /// Releases the block behind `address` and compacts the heap.
  ///
  /// Every allocated block located after the released one moves down by the
  /// released size, so addresses into those blocks go stale.
  pub fn free(
    &mut self,
    address: *mut u8,
  ) -> Result<()> {
    self.check_poisoned()?;

    let resolved = self.resolve(address);
    let block = self.guard(resolved)?;

    let released = self.release(block);
    self.guard(released)
  }

  /// Resizes the block behind `*address` to hold `new_size` payload bytes.
  ///
  /// A block that sits right before the trailing free region grows in place.
  /// Any other block is moved: a new block is allocated, the payload copied,
  /// the old block freed, and `*address` updated to the new payload address.
  /// On failure nothing changes and `*address` is left untouched.
  pub fn realloc(
    &mut self,
    address: &mut *mut u8,
    new_size: u32,
  ) -> Result<()> {
    self.check_poisoned()?;

    let resolved = self.resolve(*address);
    let block = self.guard(resolved)?;

    let total = block_size(new_size).ok_or(HeapError::NoFit {
      requested: (new_size as usize).saturating_add(HEADER_SIZE),
      remaining: self.arena.remaining(),
    })?;

    if total <= block.size {
      trace!(offset = block.offset, size = block.size, new_size, "realloc fits in place");
      return Ok(());
    }

    let grown = self.grow_in_place(block, total);
    if self.guard(grown)? {
      return Ok(());
    }

    let moved = self.alloc(new_size)?;
    let new_offset = moved.as_ptr() as usize - self.arena.start() as usize - HEADER_SIZE;

    let keep = (block.size - HEADER_SIZE).min(new_size as usize);
    self.arena.copy_within(block.payload_offset(), new_offset + HEADER_SIZE, keep);

    let released = self.release(block);
    self.guard(released)?;

    // Releasing the old block slid the new one down if it was placed above.
    let new_offset = if new_offset > block.offset {
      new_offset - block.size
    } else {
      new_offset
    };

    debug!(
      from = block.offset,
      to = new_offset,
      old_size = block.size,
      new_size = total,
      "block reallocated"
    );

    *address = self.arena.address_at(new_offset + HEADER_SIZE).as_ptr();
    Ok(())
  }

  /// Usable payload bytes of the block behind `address`.
  pub fn payload_size(
    &self,
    address: *const u8,
  ) -> Result<usize> {
    Ok(self.resolve(address)?.size - HEADER_SIZE)
  }

  /// Payload of the block behind `address`.
  pub fn payload(
    &self,
    address: *const u8,
  ) -> Result<&[u8]> {
    let block = self.resolve(address)?;
    let start = self.arena.address_at(block.payload_offset());
    Ok(unsafe { std::slice::from_raw_parts(start.as_ptr(), block.size - HEADER_SIZE) })
  }

  /// Mutable payload of the block behind `address`.
  pub fn payload_mut(
    &mut self,
    address: *const u8,
  ) -> Result<&mut [u8]> {
    let block = self.resolve(address)?;
    let start = self.arena.address_at(block.payload_offset());
    Ok(unsafe { std::slice::from_raw_parts_mut(start.as_ptr(), block.size - HEADER_SIZE) })
  }

  /// Logs every block and the capacity counters.
  pub fn log_stats(&self) {
    let mut blocks = 0;

    for block in self.walk() {
      match block {
        Ok(block) => {
          blocks += 1;
          debug!(
            offset = block.offset,
            size = block.size,
            allocated = block.allocated,
            "heap block"
          );
        }
        Err(err) => warn!(%err, "heap walk aborted"),
      }
    }

    let stats = self.stats();
    info!(
      blocks,
      policy = ?self.placement.mode(),
      cursor = self.placement.cursor(),
      total = stats.total_capacity,
      remaining = stats.remaining_capacity,
      used = stats.used(),
      "heap statistics"
    );
  }

  /// Maps a payload address back to its allocated block.
  ///
  /// The header slot (`address - HEADER_SIZE`) must be inside the arena,
  /// word aligned, and the start of an allocated block found by walking the
  /// headers.
  fn resolve(
    &self,
    address: *const u8,
  ) -> Result<BlockInfo> {
    if address.is_null() {
      return Err(HeapError::NullPointer);
    }

    let invalid = HeapError::InvalidAddress {
      address: address as usize,
    };

    let offset = match self.arena.offset_of(address.wrapping_sub(HEADER_SIZE)) {
      Some(offset) if offset % WORD_SIZE == 0 => offset,
      _ => return Err(invalid),
    };

    for block in self.walk() {
      let block = block?;

      if block.offset == offset {
        return if block.allocated { Ok(block) } else { Err(invalid) };
      }
      if block.offset > offset {
        break;
      }
    }

    Err(invalid)
  }

  /// Grows `block` to `total` bytes without moving it when it directly
  /// precedes the trailing free region and that region is large enough.
  fn grow_in_place(
    &mut self,
    block: BlockInfo,
    total: usize,
  ) -> Result<bool> {
    let end = block.end();
    let remaining = self.arena.remaining();
    let growth = total - block.size;

    if end >= self.arena.capacity() || growth > remaining {
      return Ok(false);
    }
    if self.arena.read_word(end)? as usize != remaining {
      return Ok(false);
    }

    let reserved = self.arena.update_remaining(-(growth as isize));
    self.guard(reserved)?;

    self.arena.zero(end, HEADER_SIZE);
    self.arena.write_header(block.offset, Header::allocated(total));

    let new_end = block.offset + total;
    if new_end < self.arena.capacity() {
      self.arena.write_header(new_end, Header::free(self.arena.remaining()));
    }
    self.placement.retreat_to(block.offset);

    debug!(offset = block.offset, from = block.size, to = total, "block grown in place");
    Ok(true)
  }

  fn check_poisoned(&self) -> Result<()> {
    if self.poisoned {
      return Err(HeapError::corruption(
        0,
        "heap was poisoned by an earlier corruption; flush it first",
      ));
    }
    Ok(())
  }

  /// Poisons the heap when `result` reports corruption.
  fn guard<T>(
    &mut self,
    result: Result<T>,
  ) -> Result<T> {
    if let Err(err @ HeapError::Corruption { .. }) = &result {
      warn!(%err, "heap poisoned");
      self.poisoned = true;
    }
    result
  }
}

/// Aligned block size for a `size` byte payload, header included.
fn block_size(size: u32) -> Option<usize> {
  checked_align((size as usize).checked_add(HEADER_SIZE)?)
}
