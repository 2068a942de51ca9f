//! Opt-in synchronized access to a [`Heap`].
//!
//! The heap itself has no locking. `SharedHeap` wraps the whole heap in one
//! mutex so that every operation, compaction included, runs under a single
//! exclusive lock.

use std::{ptr::NonNull, sync::Arc};

use parking_lot::{Mutex, MutexGuard};

use crate::{
  config::HeapConfig,
  error::{HeapError, Result},
  heap::Heap,
  walk::Stats,
};

/// A cloneable, thread-safe handle to one heap.
///
/// Addresses handed out here are offsets-in-disguise: another thread's `free`
/// can move the block behind them. Hold the guard from [`SharedHeap::lock`]
/// across every sequence that allocates, touches and frees related blocks.
#[derive(Clone)]
pub struct SharedHeap {
  inner: Arc<Mutex<Heap>>,
}

impl SharedHeap {
  pub fn new(heap: Heap) -> Self {
    Self {
      inner: Arc::new(Mutex::new(heap)),
    }
  }

  pub fn with_config(config: &HeapConfig) -> Result<Self> {
    Ok(Self::new(Heap::with_config(config)?))
  }

  /// Locks the heap for a sequence of operations.
  pub fn lock(&self) -> MutexGuard<'_, Heap> {
    self.inner.lock()
  }

  /// Allocates and returns the payload offset from the arena start.
  pub fn alloc(
    &self,
    size: u32,
  ) -> Result<usize> {
    let mut heap = self.lock();
    let address: NonNull<u8> = heap.alloc(size)?;
    Ok(address.as_ptr() as usize - heap.arena.start() as usize)
  }

  /// Frees the block whose payload starts `offset` bytes into the arena.
  pub fn free(
    &self,
    offset: usize,
  ) -> Result<()> {
    let mut heap = self.lock();
    match heap.address_at(offset) {
      Some(address) => heap.free(address.as_ptr()),
      None => Err(HeapError::InvalidAddress { address: offset }),
    }
  }

  pub fn stats(&self) -> Stats {
    self.lock().stats()
  }
}
