use std::{marker::PhantomData, ptr};

use crate::block::{self, Block};

/// Cursor over a block record.
///
/// Hides the packed size word from callers. A handle is either null or points
/// at a block; it does not keep that block alive, so every accessor that reads
/// or writes the header is `unsafe` and expects the block to still be there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
  block: *mut Block,
}

impl BlockHandle {
  pub const fn null() -> Self {
    Self {
      block: ptr::null_mut(),
    }
  }

  /// # Safety
  ///
  /// `block` must be null or point to an initialized block.
  pub const unsafe fn from_raw(
    block: *mut Block,
  ) -> Self {
    Self { block }
  }

  /// Handle of the block owning a caller-visible address.
  ///
  /// # Safety
  ///
  /// `data` must have been handed out by the allocator and still be live.
  pub unsafe fn from_data(
    data: *mut u8,
  ) -> Self {
    Self {
      block: unsafe { block::get_block(data) },
    }
  }

  pub fn as_ptr(&self) -> *mut Block {
    self.block
  }

  pub fn is_null(&self) -> bool {
    self.block.is_null()
  }

  /// Footprint of the block, header included.
  ///
  /// # Safety
  ///
  /// The handle must be non-null and its block still initialized. The same
  /// holds for every other accessor below.
  pub unsafe fn size(&self) -> usize {
    debug_assert!(!self.is_null());
    unsafe { block::get_size(self.block) }
  }

  /// # Safety
  ///
  /// See [`size`](Self::size).
  pub unsafe fn set_size(
    &self,
    size: usize,
  ) {
    debug_assert!(!self.is_null());
    unsafe { block::set_size(self.block, size) }
  }

  /// # Safety
  ///
  /// See [`size`](Self::size).
  pub unsafe fn is_used(&self) -> bool {
    debug_assert!(!self.is_null());
    unsafe { block::used(self.block) }
  }

  /// # Safety
  ///
  /// See [`size`](Self::size).
  pub unsafe fn set_used(
    &mut self,
    used: bool,
  ) {
    debug_assert!(!self.is_null());
    unsafe {
      if used {
        block::used_set(self.block);
      } else {
        block::used_clear(self.block);
      }
    }
  }

  /// Address handed out to the caller for this block.
  ///
  /// # Safety
  ///
  /// See [`size`](Self::size).
  pub unsafe fn data(&self) -> *mut u8 {
    debug_assert!(!self.is_null());
    unsafe { block::data(self.block) }
  }

  /// Handle of the next block in the chain, null at the end.
  ///
  /// # Safety
  ///
  /// See [`size`](Self::size).
  pub unsafe fn next(&self) -> Self {
    debug_assert!(!self.is_null());
    Self {
      block: unsafe { (*self.block).next },
    }
  }

  /// Moves the cursor to the next block in the chain.
  ///
  /// # Safety
  ///
  /// See [`size`](Self::size).
  pub unsafe fn advance(&mut self) {
    *self = unsafe { self.next() };
  }
}

impl Default for BlockHandle {
  fn default() -> Self {
    Self::null()
  }
}

/// Iterator over a chain of blocks, starting at a given handle.
///
/// Borrows whatever owns the chain for `'a`, so the blocks stay put while it
/// walks them.
pub struct Blocks<'a> {
  current: BlockHandle,
  _chain: PhantomData<&'a ()>,
}

impl Blocks<'_> {
  /// # Safety
  ///
  /// Every block reachable from `head` must stay initialized, and the chain
  /// unchanged, for as long as the iterator is used.
  pub unsafe fn new(
    head: BlockHandle,
  ) -> Self {
    Self {
      current: head,
      _chain: PhantomData,
    }
  }
}

impl Iterator for Blocks<'_> {
  type Item = BlockHandle;

  fn next(&mut self) -> Option<Self::Item> {
    if self.current.is_null() {
      return None;
    }

    let handle = self.current;
    unsafe { self.current.advance() };

    Some(handle)
  }
}
