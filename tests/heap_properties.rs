use rand::{Rng, SeedableRng, rngs::StdRng};
use rheap::{BlockInfo, HEADER_SIZE, Heap, HeapError, SearchMode};

fn blocks(heap: &Heap) -> Vec<BlockInfo> {
  heap.walk().collect::<Result<_, _>>().unwrap()
}

/// Tiling and accounting invariants.
fn assert_consistent(heap: &Heap) {
  let blocks = blocks(heap);
  let stats = heap.stats();

  let tiled: usize = blocks.iter().map(|b| b.size).sum();
  assert_eq!(tiled, stats.total_capacity);

  let allocated: usize = blocks.iter().filter(|b| b.allocated).map(|b| b.size).sum();
  assert_eq!(stats.remaining_capacity, stats.total_capacity - allocated);

  let mut expected = 0;
  for block in &blocks {
    assert_eq!(block.offset, expected);
    expected = block.end();
  }
}

#[test]
fn test_concrete_scenario() {
  let mut heap = Heap::new(64).unwrap();

  let a1 = heap.alloc(8).unwrap();
  let a2 = heap.alloc(8).unwrap();

  let a1_offset = heap.offset_of(a1.as_ptr()).unwrap() - HEADER_SIZE;
  let a2_offset = heap.offset_of(a2.as_ptr()).unwrap() - HEADER_SIZE;
  assert_eq!(a2_offset, a1_offset + 12);

  heap.free(a1.as_ptr()).unwrap();

  let blocks = blocks(&heap);
  assert_eq!(blocks.len(), 2);
  assert_eq!(
    blocks[0],
    BlockInfo {
      offset: a1_offset,
      size: 12,
      allocated: true
    }
  );
  assert!(!blocks[1].allocated);
  assert_eq!(blocks[1].end(), 64);
  assert_eq!(blocks[1].size, 52);
  assert_consistent(&heap);
}

#[test]
fn test_alloc_free_round_trip() {
  let mut heap = Heap::new(256).unwrap();

  let before = heap.stats();
  let address = heap.alloc(40).unwrap();
  heap.free(address.as_ptr()).unwrap();

  assert_eq!(heap.stats(), before);

  let blocks = blocks(&heap);
  assert_eq!(blocks.len(), 1);
  assert_eq!(blocks[0].size, 256);
  assert!(!blocks[0].allocated);
}

#[test]
fn test_flush_is_idempotent() {
  let mut heap = Heap::new(128).unwrap();
  heap.alloc(10).unwrap();
  heap.alloc(20).unwrap();

  heap.flush();
  let once = (blocks(&heap), heap.stats());

  heap.flush();
  let twice = (blocks(&heap), heap.stats());

  assert_eq!(once, twice);
  assert_eq!(once.0.len(), 1);
  assert_eq!(once.1.remaining_capacity, 128);
}

#[test]
fn test_boundaries() {
  let mut heap = Heap::new(64).unwrap();

  assert!(heap.alloc(0).is_ok());
  heap.flush();

  assert!(matches!(heap.alloc(64), Err(HeapError::NoFit { .. })));
  assert!(matches!(heap.alloc(65), Err(HeapError::NoFit { .. })));
  assert_consistent(&heap);
}

#[test]
fn test_exact_fit_under_first_fit() {
  let mut heap = Heap::new(32).unwrap();
  heap.set_policy(SearchMode::FirstFit).unwrap();

  heap.alloc(12).unwrap();
  // The trailing free block is exactly 16 bytes.
  let address = heap.alloc(12).unwrap();

  assert_eq!(heap.offset_of(address.as_ptr()), Some(16 + HEADER_SIZE));
  assert_eq!(heap.stats().remaining_capacity, 0);
  assert_consistent(&heap);
}

#[test]
fn test_next_fit_distinct_addresses() {
  let mut heap = Heap::new(256).unwrap();
  assert_eq!(heap.policy(), SearchMode::NextFit);

  let big = heap.alloc(60).unwrap();
  heap.alloc(8).unwrap();
  heap.free(big.as_ptr()).unwrap();

  let first = heap.alloc(24).unwrap();
  let second = heap.alloc(24).unwrap();

  assert_ne!(first, second);
  assert_consistent(&heap);
}

#[test]
fn test_best_fit_keeps_previous_policy() {
  let mut heap = Heap::new(64).unwrap();
  heap.set_policy(SearchMode::FirstFit).unwrap();

  assert!(matches!(
    heap.set_policy(SearchMode::BestFit),
    Err(HeapError::Configuration(_))
  ));
  assert_eq!(heap.policy(), SearchMode::FirstFit);
}

#[test]
fn test_independent_heaps() {
  let mut one = Heap::new(64).unwrap();
  let mut two = Heap::new(64).unwrap();

  let a = one.alloc(8).unwrap();
  two.alloc(16).unwrap();

  assert!(!two.contains(a.as_ptr()));
  assert!(matches!(
    two.free(a.as_ptr()),
    Err(HeapError::InvalidAddress { .. })
  ));
  assert_eq!(one.stats().remaining_capacity, 52);
  assert_eq!(two.stats().remaining_capacity, 44);
}

/// Runs a seeded workload similar to the sample driver and checks the
/// invariants after every step. Live payloads are tracked by offset because
/// compaction moves them.
fn random_workload(
  policy: SearchMode,
  seed: u64,
) {
  let mut rng = StdRng::seed_from_u64(seed);
  let mut heap = Heap::new(2048).unwrap();
  heap.set_policy(policy).unwrap();

  // (payload offset, fill byte)
  let mut live: Vec<(usize, u8)> = Vec::new();

  for _ in 0..500 {
    match rng.gen_range(0..10) {
      0..=5 => {
        let size = rng.gen_range(0..64);
        let Ok(address) = heap.alloc(size) else {
          continue;
        };
        let fill = rng.r#gen::<u8>();
        heap.payload_mut(address.as_ptr()).unwrap().fill(fill);
        live.push((heap.offset_of(address.as_ptr()).unwrap(), fill));
      }
      6..=8 if !live.is_empty() => {
        let index = rng.gen_range(0..live.len());
        let (offset, _) = live.remove(index);
        let used = heap.stats().used();
        let address = address_at(&heap, offset);
        let size = heap.payload_size(address).unwrap() + HEADER_SIZE;

        heap.free(address).unwrap();
        assert_eq!(heap.stats().used(), used - size);

        for entry in live.iter_mut() {
          if entry.0 > offset {
            entry.0 -= size;
          }
        }
      }
      _ if !live.is_empty() => {
        let index = rng.gen_range(0..live.len());
        let (offset, fill) = live.remove(index);
        let mut address = address_at(&heap, offset);
        let old_size = heap.payload_size(address).unwrap() + HEADER_SIZE;
        let new_size = rng.gen_range(0..96);

        if heap.realloc(&mut address, new_size).is_err() {
          live.insert(index, (offset, fill));
          continue;
        }

        let new_offset = heap.offset_of(address).unwrap();
        if new_offset != offset {
          for entry in live.iter_mut() {
            if entry.0 > offset {
              entry.0 -= old_size;
            }
          }
        }

        let payload = heap.payload_mut(address).unwrap();
        let kept = (old_size - HEADER_SIZE).min(new_size as usize);
        assert!(payload[..kept].iter().all(|&b| b == fill));
        payload.fill(fill);
        live.push((new_offset, fill));
      }
      _ => {}
    }

    assert_consistent(&heap);

    for &(offset, fill) in &live {
      let payload = heap.payload(address_at(&heap, offset)).unwrap();
      assert!(payload.iter().all(|&b| b == fill), "payload at {offset} lost");
    }
  }
}

fn address_at(
  heap: &Heap,
  offset: usize,
) -> *mut u8 {
  heap.address_at(offset).unwrap().as_ptr()
}

#[test]
fn test_random_workload_first_fit() {
  random_workload(SearchMode::FirstFit, 0x5eed);
}

#[test]
fn test_random_workload_next_fit() {
  random_workload(SearchMode::NextFit, 0xfeed);
}
