/// Rounds `value` up to the heap word size ([`WORD_SIZE`](crate::WORD_SIZE)).
///
/// # Examples
///
/// ```rust
/// use rheap::align;
///
/// assert_eq!(align!(0usize), 0);
/// assert_eq!(align!(9usize), 12);
/// assert_eq!(align!(12usize), 12);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::WORD_SIZE)
  };
}

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
///
/// ```rust
/// use rheap::align_to;
///
/// assert_eq!(align_to!(13usize, 8), 16);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Checked form of [`align!`] for sizes that come from callers.
///
/// Returns `None` when rounding up would overflow `usize`.
#[inline]
pub fn checked_align(value: usize) -> Option<usize> {
  value
    .checked_add(crate::WORD_SIZE - 1)
    .map(|v| v & !(crate::WORD_SIZE - 1))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{WORD_SIZE, block::MAX_BLOCK_SIZE};

  #[test]
  fn test_align_word_boundaries() {
    assert_eq!(align!(0usize), 0);
    assert_eq!(align!(1usize), WORD_SIZE);
    assert_eq!(align!(4usize), 4);
    assert_eq!(align!(5usize), 8);
    assert_eq!(align!(8usize), 8);

    // Requests are payload + header: an 8 byte payload needs a 12 byte block.
    assert_eq!(align!(8usize + crate::HEADER_SIZE), 12);
    assert_eq!(align!(9usize + crate::HEADER_SIZE), 16);
  }

  #[test]
  fn test_checked_align_at_max_block_size() {
    assert_eq!(checked_align(MAX_BLOCK_SIZE), Some(MAX_BLOCK_SIZE));
    assert_eq!(checked_align(MAX_BLOCK_SIZE - 3), Some(MAX_BLOCK_SIZE));
    assert_eq!(checked_align(MAX_BLOCK_SIZE - 4), Some(MAX_BLOCK_SIZE - 4));
    assert_eq!(checked_align(5), Some(8));
  }

  #[test]
  fn test_align_to() {
    assert_eq!(align_to!(1usize, 16), 16);
    assert_eq!(align_to!(17usize, 16), 32);
    assert_eq!(align_to!(64usize, 16), 64);
  }

  #[test]
  fn test_checked_align_overflow() {
    assert_eq!(checked_align(usize::MAX), None);
    assert_eq!(checked_align(0), Some(0));
  }
}
