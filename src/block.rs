use std::{mem, ptr};

use log::trace;

use crate::align::align;

/// Bit of the size word marking the payload as owned by a live allocation.
///
/// Footprints are always word aligned, so the lowest bit is never part of the
/// size itself.
const USED_BIT: usize = 1;

/// A block record as laid out in memory.
///
/// `size` is the full footprint of the block (header included) with the used
/// flag packed into its lowest bit. The payload starts right after `next`; its
/// first word is the address handed out to callers.
#[repr(C)]
pub struct Block {
  size: usize,
  pub next: *mut Block,
  data: [usize; 1],
}

/// The leading fields of a [`Block`] without any payload, used to step back
/// from a data address to its block.
#[repr(C)]
pub struct BlockHeader {
  size: usize,
  next: *mut Block,
}

/// Bookkeeping overhead of every block.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

impl Block {
  /// Writes a fresh header at `address` and returns it as a block.
  ///
  /// # Safety
  ///
  /// `address` must be word aligned and valid for writes of `HEADER_SIZE` bytes.
  pub unsafe fn init(
    address: *mut u8,
    size: usize,
    used: bool,
  ) -> *mut Block {
    let block = address as *mut Block;
    let flag = if used { USED_BIT } else { 0 };

    unsafe {
      ptr::write(block as *mut BlockHeader, BlockHeader {
        size: (size & !USED_BIT) | flag,
        next: ptr::null_mut(),
      });
    }

    block
  }
}

/// Returns whether `block` is currently in use.
///
/// # Safety
///
/// `block` must point to an initialized block.
#[inline]
pub unsafe fn used(
  block: *const Block,
) -> bool {
  unsafe { (*block).size & USED_BIT != 0 }
}

/// Marks `block` as in use.
///
/// # Safety
///
/// `block` must point to an initialized block.
#[inline]
pub unsafe fn used_set(
  block: *mut Block,
) {
  unsafe { (*block).size |= USED_BIT }
}

/// Marks `block` as free.
///
/// # Safety
///
/// `block` must point to an initialized block.
#[inline]
pub unsafe fn used_clear(
  block: *mut Block,
) {
  unsafe { (*block).size &= !USED_BIT }
}

/// Footprint of `block` with the used flag masked out.
///
/// # Safety
///
/// `block` must point to an initialized block.
#[inline]
pub unsafe fn get_size(
  block: *const Block,
) -> usize {
  unsafe { (*block).size & !USED_BIT }
}

/// Stores a new footprint for `block`, keeping its used flag.
///
/// # Safety
///
/// `block` must point to an initialized block.
#[inline]
pub unsafe fn set_size(
  block: *mut Block,
  size: usize,
) {
  unsafe { (*block).size = (size & !USED_BIT) | ((*block).size & USED_BIT) }
}

/// Caller-visible address of `block`.
///
/// # Safety
///
/// `block` must point into memory that extends at least `HEADER_SIZE` bytes.
#[inline]
pub unsafe fn data(
  block: *mut Block,
) -> *mut u8 {
  unsafe { ptr::addr_of_mut!((*block).data) as *mut u8 }
}

/// Recovers the header owning a data address.
///
/// # Safety
///
/// `data` must have been returned by [`data`] (or by the allocator).
#[inline]
pub unsafe fn get_header(
  data: *mut u8,
) -> *mut BlockHeader {
  unsafe { data.sub(HEADER_SIZE) as *mut BlockHeader }
}

/// Recovers the block owning a data address.
///
/// # Safety
///
/// Same as [`get_header`].
#[inline]
pub unsafe fn get_block(
  data: *mut u8,
) -> *mut Block {
  unsafe { get_header(data) as *mut Block }
}

/// Carves the tail of a free block into a new free sibling.
///
/// Nothing happens when `block` is in use, when it is not larger than `size`,
/// or when the remainder cannot hold a header of its own. Otherwise the
/// sibling starts `size + HEADER_SIZE` bytes into `block`, takes whatever is
/// left after that, and is linked right after `block`, which shrinks to `size`.
///
/// Accounting is left to the caller.
///
/// # Safety
///
/// `block` must point to an initialized block whose footprint is backed by
/// writable memory.
pub unsafe fn split(
  block: *mut Block,
  size: usize,
) {
  unsafe {
    if used(block) {
      return;
    }

    let size = align(size);
    let current = get_size(block);

    if current <= size {
      return;
    }

    let remainder = match current.checked_sub(size + HEADER_SIZE) {
      Some(remainder) if remainder >= HEADER_SIZE => remainder,
      _ => return,
    };

    let sibling = Block::init((block as *mut u8).add(size + HEADER_SIZE), remainder, false);

    (*sibling).next = (*block).next;
    (*block).next = sibling;
    set_size(block, size);

    trace!(
      "split block {:?} ({} bytes) into {} + {:?} ({} bytes)",
      block, current, size, sibling, remainder
    );
  }
}

/// Merges a free block with its chain successor when that one is free too.
///
/// Only one hop is taken: three adjacent free blocks need two calls.
///
/// # Safety
///
/// `block` must be null or point to an initialized block whose `next` is null
/// or initialized as well.
pub unsafe fn coalesce_block(
  block: *mut Block,
) {
  unsafe {
    if block.is_null() || used(block) {
      return;
    }

    let next = (*block).next;

    if !next.is_null() && !used(next) {
      set_size(block, get_size(block) + get_size(next));
      (*block).next = (*next).next;

      trace!("coalesced block {:?} into {:?}", next, block);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::{WORD_SIZE, alloc_size};

  #[repr(C)]
  struct TestObj {
    x: i32,
    y: i32,
    z: f64,
  }

  /// Word-aligned scratch memory standing in for an OS-provided region.
  fn scratch(
    words: usize,
  ) -> Vec<usize> {
    vec![0usize; words]
  }

  #[test]
  fn test_header_layout() {
    assert_eq!(HEADER_SIZE, 2 * WORD_SIZE);
    assert_eq!(mem::offset_of!(Block, data), HEADER_SIZE);
  }

  #[test]
  fn test_used_flag() {
    let mut memory = scratch(8);

    unsafe {
      let block = Block::init(memory.as_mut_ptr() as *mut u8, alloc_size(16), true);

      assert!(used(block));
      assert_eq!(get_size(block), alloc_size(16));

      used_clear(block);
      assert!(!used(block));
      assert_eq!(get_size(block), alloc_size(16));

      used_set(block);
      set_size(block, alloc_size(8));
      assert!(used(block));
      assert_eq!(get_size(block), alloc_size(8));
    }
  }

  #[test]
  fn test_get_header() {
    let mut memory = scratch(8);

    unsafe {
      let block = Block::init(memory.as_mut_ptr() as *mut u8, alloc_size(8), true);
      let address = data(block);

      assert_eq!(address as usize - block as usize, HEADER_SIZE);
      assert_eq!(get_header(address) as *mut Block, block);
      assert_eq!(get_block(address), block);
    }
  }

  #[test]
  fn test_split_block() {
    let obj = mem::size_of::<TestObj>();
    let mut memory = scratch(alloc_size(obj * 4) / WORD_SIZE);

    unsafe {
      let block = Block::init(memory.as_mut_ptr() as *mut u8, alloc_size(obj * 4), true);

      // used blocks are left alone
      split(block, obj);
      assert_eq!(get_size(block), alloc_size(obj * 4));
      assert!((*block).next.is_null());

      // so are blocks that are not larger than the request
      used_clear(block);
      split(block, obj * 30);
      assert_eq!(get_size(block), alloc_size(obj * 4));
      assert!((*block).next.is_null());

      split(block, obj * 2);
      let sibling = (*block).next;
      assert!(!sibling.is_null());
      assert!(!used(sibling));
      assert_eq!(get_size(block), obj * 2);
      assert_eq!(get_size(sibling), alloc_size(obj * 2) - HEADER_SIZE);
      assert!((*sibling).next.is_null());
      assert_eq!(sibling as usize - block as usize, obj * 2 + HEADER_SIZE);
    }
  }

  #[test]
  fn test_split_keeps_chain_order() {
    let mut memory = scratch(32);

    unsafe {
      let base = memory.as_mut_ptr() as *mut u8;
      let block = Block::init(base, 16 * WORD_SIZE, false);
      let tail = Block::init(base.add(16 * WORD_SIZE), 16 * WORD_SIZE, true);
      (*block).next = tail;

      split(block, 4 * WORD_SIZE);

      let sibling = (*block).next;
      assert_ne!(sibling, tail);
      assert_eq!((*sibling).next, tail);
    }
  }

  #[test]
  fn test_split_without_room_for_header() {
    let mut memory = scratch(8);

    unsafe {
      let block = Block::init(memory.as_mut_ptr() as *mut u8, 8 * WORD_SIZE, false);

      split(block, 5 * WORD_SIZE);

      assert_eq!(get_size(block), 8 * WORD_SIZE);
      assert!((*block).next.is_null());
    }
  }

  #[test]
  fn test_coalesce_block() {
    let obj = mem::size_of::<TestObj>();
    let mut memory = scratch(2 * alloc_size(obj) / WORD_SIZE);

    unsafe {
      let base = memory.as_mut_ptr() as *mut u8;
      let block = Block::init(base, alloc_size(obj), false);
      let block2 = Block::init(base.add(alloc_size(obj)), alloc_size(obj), false);
      (*block).next = block2;

      coalesce_block(block);

      assert_eq!(get_size(block), alloc_size(obj) * 2);
      assert!((*block).next.is_null());
    }
  }

  #[test]
  fn test_coalesce_one_hop_per_call() {
    let mut memory = scratch(12);

    unsafe {
      let base = memory.as_mut_ptr() as *mut u8;
      let (s1, s2, s3) = (4 * WORD_SIZE, 3 * WORD_SIZE, 5 * WORD_SIZE);
      let a = Block::init(base, s1, false);
      let b = Block::init(base.add(s1), s2, false);
      let c = Block::init(base.add(s1 + s2), s3, false);
      (*a).next = b;
      (*b).next = c;

      coalesce_block(a);
      assert_eq!(get_size(a), s1 + s2);
      assert_eq!((*a).next, c);

      coalesce_block(a);
      assert_eq!(get_size(a), s1 + s2 + s3);
      assert!((*a).next.is_null());
    }
  }

  #[test]
  fn test_coalesce_skips_used() {
    let mut memory = scratch(8);

    unsafe {
      let base = memory.as_mut_ptr() as *mut u8;
      let a = Block::init(base, 4 * WORD_SIZE, false);
      let b = Block::init(base.add(4 * WORD_SIZE), 4 * WORD_SIZE, true);
      (*a).next = b;

      coalesce_block(a);
      assert_eq!(get_size(a), 4 * WORD_SIZE);
      assert_eq!((*a).next, b);

      used_set(a);
      used_clear(b);
      coalesce_block(a);
      assert_eq!(get_size(a), 4 * WORD_SIZE);

      coalesce_block(ptr::null_mut());
    }
  }
}
