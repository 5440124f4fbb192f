use std::ptr;

use log::{debug, trace, warn};

use crate::{
  align::checked_alloc_size,
  block::{self, Block},
  handle::{BlockHandle, Blocks},
  os::{self, HeapGrower},
  viewer::BlockViewer,
};

/// Owner of the small-block chain and of the byte counters.
///
/// Small blocks are appended to the chain once and never leave it; they are
/// only flipped between used and free. Large blocks are mapped and unmapped
/// directly and never appear in the chain.
pub struct BlockManager<G: HeapGrower> {
  head: *mut Block,
  tail: *mut Block,
  used_bytes: usize,
  requested_bytes: usize,
  mmap_threshold: usize,
  grower: G,
}

impl<G: HeapGrower> BlockManager<G> {
  pub const fn new(
    grower: G,
    mmap_threshold: usize,
  ) -> Self {
    Self {
      head: ptr::null_mut(),
      tail: ptr::null_mut(),
      used_bytes: 0,
      requested_bytes: 0,
      mmap_threshold,
      grower,
    }
  }

  pub fn mmap_threshold(&self) -> usize {
    self.mmap_threshold
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  pub fn viewer(&self) -> BlockViewer<'_> {
    BlockViewer::new(
      unsafe { BlockHandle::from_raw(self.head) },
      unsafe { BlockHandle::from_raw(self.tail) },
      self.used_bytes,
      self.requested_bytes,
    )
  }

  /// Marks a block used and accounts for it.
  ///
  /// A new small block is appended to the chain first. Blocks at or above the
  /// threshold are only accounted for. A null handle is ignored.
  ///
  /// # Safety
  ///
  /// A non-null `handle` must come from [`get_new_block`](Self::get_new_block)
  /// when `is_new`, or be a free block of this chain otherwise.
  pub unsafe fn add_block(
    &mut self,
    mut handle: BlockHandle,
    is_new: bool,
  ) {
    if handle.is_null() {
      return;
    }

    let block = handle.as_ptr();
    let size = unsafe { handle.size() };

    if is_new && size < self.mmap_threshold {
      unsafe {
        (*block).next = ptr::null_mut();

        if self.head.is_null() {
          self.head = block;
        }

        if !self.tail.is_null() {
          (*self.tail).next = block;
        }
      }

      self.tail = block;
    }

    self.used_bytes += size;
    unsafe { handle.set_used(true) };

    trace!(
      "added block {:?} ({} bytes, new: {}), {} bytes in use",
      block,
      size,
      is_new,
      self.used_bytes
    );
  }

  /// Releases the block owning `data`.
  ///
  /// Small blocks are marked free in place, large ones go back to the OS.
  ///
  /// # Safety
  ///
  /// `data` must have been handed out by this manager. Double frees and
  /// foreign addresses are not detected.
  pub unsafe fn free_data(
    &mut self,
    data: *mut u8,
  ) {
    let block = unsafe { block::get_block(data) };
    let size = unsafe { block::get_size(block) };

    if size < self.mmap_threshold {
      if unsafe { block::used(block) } {
        self.used_bytes -= size;
      }

      unsafe { os::release_block(block) };
      trace!("freed block {:?} ({} bytes), {} bytes in use", block, size, self.used_bytes);
    } else {
      self.used_bytes -= size;
      self.requested_bytes -= size;

      if let Err(error) = unsafe { os::release_large_block(block) } {
        warn!("large block leaked: {}", error);
      }
    }
  }

  /// Acquires a fresh block able to hold `size` bytes.
  ///
  /// The footprint decides the path: below the threshold the grower extends
  /// the small-block region, otherwise the block is mapped on its own. A null
  /// handle means the OS refused or the footprint does not fit in a `usize`.
  pub fn get_new_block(
    &mut self,
    size: usize,
  ) -> BlockHandle {
    let Some(footprint) = checked_alloc_size(size) else {
      warn!("request of {} bytes overflows the footprint", size);
      return BlockHandle::null();
    };

    let block = if footprint < self.mmap_threshold {
      os::request_block(&mut self.grower, size)
    } else {
      os::request_large_block(size)
    };

    if !block.is_null() {
      self.requested_bytes += footprint;
    }

    unsafe { BlockHandle::from_raw(block) }
  }

  /// Splits a free block, see [`block::split`].
  ///
  /// Counters are not touched. Wiring this into allocation means adjusting
  /// them on the caller's side. A null handle is ignored.
  ///
  /// # Safety
  ///
  /// A non-null `handle` must be a block of this chain.
  pub unsafe fn split_block(
    &mut self,
    handle: BlockHandle,
    size: usize,
  ) {
    if handle.is_null() {
      return;
    }

    let block = handle.as_ptr();

    unsafe {
      block::split(block, size);

      if block == self.tail && !(*block).next.is_null() {
        self.tail = (*block).next;
      }
    }
  }

  /// Merges a free block with its free successor, see [`block::coalesce_block`].
  ///
  /// The merge is refused when the combined footprint would reach the mmap
  /// threshold: a chained block that large would be released as a large one.
  /// Returns whether the successor was absorbed.
  ///
  /// # Safety
  ///
  /// A non-null `handle` must be a block of this chain.
  pub unsafe fn coalesce_block(
    &mut self,
    handle: BlockHandle,
  ) -> bool {
    let block = handle.as_ptr();

    if block.is_null() {
      return false;
    }

    unsafe {
      let next = (*block).next;

      if next.is_null() || block::used(block) || block::used(next) {
        return false;
      }

      if block::get_size(block) + block::get_size(next) >= self.mmap_threshold {
        trace!("not coalescing {:?} into {:?}, would reach the threshold", next, block);
        return false;
      }

      block::coalesce_block(block);

      if next == self.tail {
        self.tail = block;
      }
    }

    true
  }

  /// Forces every chained block back to free and zeroes the used counter.
  ///
  /// Live large blocks are not tracked and keep their mapping.
  pub fn clear(&mut self) {
    unsafe {
      let head = BlockHandle::from_raw(self.head);

      for mut handle in Blocks::new(head) {
        handle.set_used(false);
      }
    }

    self.used_bytes = 0;
    debug!("cleared block chain");
  }
}
