use std::mem;

use crate::block::HEADER_SIZE;

/// Size in bytes of a machine word. Every block footprint is a multiple of it.
pub const WORD_SIZE: usize = mem::size_of::<usize>();

/// Rounds the given size up to the machine word alignment.
///
/// Overflows for sizes within one word of `usize::MAX`, see [`checked_align`].
///
/// # Examples
///
/// ```rust
/// use tieralloc::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::WORD_SIZE - 1) & !($crate::align::WORD_SIZE - 1)
  };
}

/// Function form of [`align!`].
///
/// The result is never smaller than `size`, is a multiple of [`WORD_SIZE`] and
/// exceeds `size` by less than one word.
#[inline]
pub const fn align(
  size: usize,
) -> usize {
  align!(size)
}

/// The real footprint reserved for a request of `size` bytes: the aligned
/// payload plus the block header.
#[inline]
pub const fn alloc_size(
  size: usize,
) -> usize {
  align(size) + HEADER_SIZE
}

/// [`align`], or `None` when rounding up does not fit in a `usize`.
#[inline]
pub const fn checked_align(
  size: usize,
) -> Option<usize> {
  match size.checked_add(WORD_SIZE - 1) {
    Some(padded) => Some(padded & !(WORD_SIZE - 1)),
    None => None,
  }
}

/// [`alloc_size`], or `None` when the footprint does not fit in a `usize`.
///
/// Every path that turns a caller-provided size into a footprint goes through
/// this one.
#[inline]
pub const fn checked_alloc_size(
  size: usize,
) -> Option<usize> {
  match checked_align(size) {
    Some(aligned) => aligned.checked_add(HEADER_SIZE),
    None => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let ptr_size = mem::size_of::<usize>();

    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ptr_size * i + 1)..=(ptr_size * (i + 1));

      let expected_alignment = ptr_size * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
        assert_eq!(expected, align(size));
      }
    }
  }

  #[test]
  fn test_align_contract() {
    for size in 1..=4096 {
      let aligned = align(size);

      assert!(aligned >= size);
      assert_eq!(aligned % WORD_SIZE, 0);
      assert!(aligned - size < WORD_SIZE);
    }
  }

  #[test]
  fn test_align_word_boundaries() {
    assert_eq!(align(WORD_SIZE - 1), WORD_SIZE);
    assert_eq!(align(WORD_SIZE / 2), WORD_SIZE);
    assert_eq!(align(WORD_SIZE), WORD_SIZE);
    assert_eq!(align(WORD_SIZE + 1), WORD_SIZE * 2);
    assert_eq!(align(WORD_SIZE * 2), WORD_SIZE * 2);
  }

  #[test]
  fn test_alloc_size_includes_header() {
    assert_eq!(alloc_size(1), WORD_SIZE + HEADER_SIZE);
    assert_eq!(alloc_size(WORD_SIZE * 3), WORD_SIZE * 3 + HEADER_SIZE);
    assert_eq!(alloc_size(13) % WORD_SIZE, 0);
  }

  #[test]
  fn test_checked_sizes() {
    assert_eq!(checked_align(13), Some(align(13)));
    assert_eq!(checked_alloc_size(13), Some(alloc_size(13)));
    assert_eq!(checked_align(usize::MAX - WORD_SIZE + 1), Some(usize::MAX - WORD_SIZE + 1));

    assert_eq!(checked_align(usize::MAX), None);
    assert_eq!(checked_alloc_size(usize::MAX), None);
    assert_eq!(checked_alloc_size(usize::MAX - WORD_SIZE), None);
    assert_eq!(checked_alloc_size(usize::MAX - HEADER_SIZE + 1), None);
  }
}
