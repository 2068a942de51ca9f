//! # rheap - A Compacting Heap over a Fixed Arena
//!
//! This crate provides a manual dynamic-memory manager that carves
//! variable-size blocks out of one fixed-capacity buffer. Instead of keeping a
//! free list it **compacts on every free**: the blocks after a released block
//! slide down to close the gap, so the heap is always a run of allocated
//! blocks followed by one trailing free region.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                              ARENA                                   │
//!   │                                                                      │
//!   │   ┌────┬──────┬────┬──────────┬────┬────────────────────────────────┐│
//!   │   │ H  │  A1  │ H  │    A2    │ H  │        trailing free           ││
//!   │   └────┴──────┴────┴──────────┴────┴────────────────────────────────┘│
//!   │   ▲                            ▲                                   ▲ │
//!   │   │                            │                                   │ │
//!   │ ArenaStart              next-fit cursor                      ArenaEnd│
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   H = one 4-byte header word: [ size | allocated bit ]
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rheap
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Header word encoding, block descriptors
//!   ├── arena      - libc-backed buffer, capacity counters, bounds checks
//!   ├── policy     - First-fit / next-fit placement (SearchMode)
//!   ├── heap       - Heap handle: alloc, free, realloc
//!   ├── compact    - Release and compaction pass
//!   ├── walk       - Stats and the heap walk
//!   ├── config     - HeapConfig (TOML)
//!   ├── shared     - Mutex-wrapped heap for multi-threaded callers
//!   └── error      - HeapError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rheap::{Heap, SearchMode};
//!
//! let mut heap = Heap::new(1024).unwrap();
//! heap.set_policy(SearchMode::FirstFit).unwrap();
//!
//! let a = heap.alloc(8).unwrap();
//! let b = heap.alloc(8).unwrap();
//! heap.payload_mut(b.as_ptr()).unwrap().copy_from_slice(b"survivor");
//!
//! // Freeing `a` slides `b` down into its place.
//! heap.free(a.as_ptr()).unwrap();
//! assert_eq!(heap.payload(a.as_ptr()).unwrap(), b"survivor");
//!
//! let total: usize = heap.walk().map(|block| block.unwrap().size).sum();
//! assert_eq!(total, heap.stats().total_capacity);
//! ```
//!
//! ## Address Stability
//!
//! Compaction moves memory. An address returned by [`Heap::alloc`] stays
//! valid only until a block at a lower address is freed or reallocated.
//! Callers treat addresses as short-lived and go through
//! [`Heap::payload`] / [`Heap::payload_mut`], which re-validate the address
//! on every access.
//!
//! ```text
//!   free(A1):
//!
//!   ┌────┬──────┬────┬──────────┬────────────────┐
//!   │ H  │  A1  │ H  │    A2    │      free      │
//!   └────┴──────┴────┴──────────┴────────────────┘
//!                 │
//!                 └──── slides down ────┐
//!                                       ▼
//!   ┌────┬──────────┬──────────────────────────────┐
//!   │ H  │    A2    │            free              │
//!   └────┴──────────┴──────────────────────────────┘
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded core**: wrap the heap in [`SharedHeap`] to share it
//! - **Word alignment only**: payloads are aligned to 4 bytes
//! - **No best-fit**: selecting [`SearchMode::BestFit`] is an error

pub mod align;
mod arena;
pub mod block;
mod compact;
pub mod config;
pub mod error;
mod heap;
pub mod policy;
pub mod shared;
pub mod walk;

pub use block::{BlockInfo, MAX_BLOCK_SIZE};
pub use config::HeapConfig;
pub use error::{HeapError, Result};
pub use heap::Heap;
pub use policy::SearchMode;
pub use shared::SharedHeap;
pub use walk::{Stats, Walk};

/// Size in bytes of the heap word; all block sizes are multiples of it.
pub const WORD_SIZE: usize = 4;

/// Size in bytes of the in-band block header.
pub const HEADER_SIZE: usize = WORD_SIZE;

/// Arena capacity used when none is configured (4 MiB).
pub const DEFAULT_CAPACITY: usize = crate::align!(4 * 1024 * 1024);
