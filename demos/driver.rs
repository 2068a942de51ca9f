//! Sample driver: hammers a heap with random allocations, frees and reallocs
//! and logs the heap state as it goes.
//!
//! ```text
//! RUST_LOG=rheap=debug cargo run --example driver [config.toml]
//! ```

use rand::{Rng, SeedableRng, rngs::StdRng};
use rheap::{HEADER_SIZE, Heap, HeapConfig, HeapError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const ITERATIONS: usize = 100;
const REALLOC_SIZE: u32 = 60;

fn setup_logging() {
  tracing_subscriber::registry()
    .with(fmt::layer().with_target(false))
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();
}

fn load_config() -> Result<HeapConfig, HeapError> {
  match std::env::args().nth(1) {
    Some(path) => HeapConfig::from_file(path),
    None => Ok(HeapConfig::default()),
  }
}

/// Payload offset of a live block and the byte it was filled with.
struct Tracked {
  offset: usize,
  fill: u8,
}

fn run(heap: &mut Heap) -> Result<(), HeapError> {
  let mut rng = StdRng::seed_from_u64(0x00C0_FFEE);
  let mut live: Vec<Tracked> = Vec::new();
  // Block the driver keeps resizing, tracked by payload offset.
  let mut saved: Option<usize> = None;

  for i in 0..ITERATIONS {
    if i > 0 && i % 4 == 0 {
      let Some(offset) = saved else { continue };
      let mut address = address_of(heap, offset);
      let old_size = heap.payload_size(address)? + HEADER_SIZE;

      info!(offset, size = REALLOC_SIZE, "about to realloc");
      heap.realloc(&mut address, REALLOC_SIZE)?;
      heap.payload_mut(address)?[..REALLOC_SIZE as usize].fill(b'$');

      let new_offset = heap.offset_of(address).unwrap_or(offset);
      live.retain(|t| t.offset != offset);
      if new_offset != offset {
        shift_after(&mut live, offset, old_size);
      }
      live.push(Tracked {
        offset: new_offset,
        fill: b'$',
      });
      saved = Some(new_offset);
    } else if i % 7 == 0 && !live.is_empty() {
      let victim = live.remove(rng.gen_range(0..live.len()));
      let address = address_of(heap, victim.offset);
      let size = heap.payload_size(address)? + HEADER_SIZE;

      heap.free(address)?;
      info!(offset = victim.offset, size, "freed block");

      shift_after(&mut live, victim.offset, size);
      saved = match saved {
        Some(offset) if offset == victim.offset => None,
        Some(offset) if offset > victim.offset => Some(offset - size),
        other => other,
      };
    } else {
      let size = rng.gen_range(0..15u32) * 4;
      match heap.alloc(size) {
        Ok(address) => {
          let fill = b'A' + rng.gen_range(0..26u8);
          heap.payload_mut(address.as_ptr())?[..size as usize].fill(fill);

          let offset = heap.offset_of(address.as_ptr()).unwrap_or_default();
          info!(offset, size, data = %(fill as char), "allocated buffer");

          if i % 2 == 0 {
            saved = Some(offset);
          }
          live.push(Tracked { offset, fill });
        }
        Err(err @ HeapError::NoFit { .. }) => warn!(%err, "allocation failed"),
        Err(err) => return Err(err),
      }
    }
  }

  for tracked in &live {
    let payload = heap.payload(address_of(heap, tracked.offset))?;
    if payload.iter().any(|&b| b != tracked.fill && b != 0) {
      error!(offset = tracked.offset, "payload changed unexpectedly");
    }
  }

  heap.log_stats();
  Ok(())
}

fn address_of(
  heap: &Heap,
  offset: usize,
) -> *mut u8 {
  heap
    .address_at(offset)
    .map_or(std::ptr::null_mut(), |address| address.as_ptr())
}

/// Blocks above a freed one slide down by its size.
fn shift_after(
  live: &mut [Tracked],
  freed_offset: usize,
  size: usize,
) {
  for tracked in live.iter_mut().filter(|t| t.offset > freed_offset) {
    tracked.offset -= size;
  }
}

fn main() {
  setup_logging();

  let config = match load_config() {
    Ok(config) => config,
    Err(err) => {
      error!(%err, "could not load heap configuration");
      std::process::exit(1);
    }
  };

  let mut heap = match Heap::with_config(&config) {
    Ok(heap) => heap,
    Err(err) => {
      error!(%err, "heap initialization failed");
      std::process::exit(1);
    }
  };

  if let Err(err) = run(&mut heap) {
    error!(%err, fatal = err.is_fatal(), "driver stopped");
    std::process::exit(1);
  }
}
