use std::ptr;

use log::trace;

use crate::{
  align::checked_alloc_size,
  config::HeapConfig,
  handle::BlockHandle,
  manager::BlockManager,
  os::{ArenaGrower, HeapGrower},
  viewer::BlockViewer,
};

/// Two-tier heap: a reuse chain of small blocks plus directly mapped large
/// blocks.
///
/// Not synchronized. Concurrent use must be serialized by the caller.
pub struct Heap<G: HeapGrower = ArenaGrower> {
  manager: BlockManager<G>,
}

impl Heap<ArenaGrower> {
  pub const fn new() -> Self {
    Self::with_config(HeapConfig::new())
  }

  pub const fn with_config(
    config: HeapConfig,
  ) -> Self {
    Self::with_grower(ArenaGrower::with_capacity(config.arena_capacity), config)
  }
}

impl Default for Heap<ArenaGrower> {
  fn default() -> Self {
    Self::new()
  }
}

impl<G: HeapGrower> Heap<G> {
  pub const fn with_grower(
    grower: G,
    config: HeapConfig,
  ) -> Self {
    Self {
      manager: BlockManager::new(grower, config.mmap_threshold),
    }
  }

  /// First free chained block whose footprint fits `size` without being twice
  /// as large as needed.
  ///
  /// Oversized blocks are skipped rather than split, so a fresh block gets
  /// acquired instead. A size whose footprint overflows never fits.
  pub fn find_free_block(
    &self,
    size: usize,
  ) -> BlockHandle {
    let Some(footprint) = checked_alloc_size(size) else {
      return BlockHandle::null();
    };
    let limit = footprint.saturating_mul(2);

    self
      .viewer()
      .blocks()
      .find(|block| unsafe {
        !block.is_used() && block.size() >= footprint && block.size() < limit
      })
      .unwrap_or_default()
  }

  /// Reserves at least `size` usable bytes.
  ///
  /// Returns null when the OS refuses to provide more memory, or when `size`
  /// is too large to describe a block at all. Nothing else reports that
  /// condition, and the counters are left as they were.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    let mut block = self.find_free_block(size);
    let is_new = block.is_null();

    if is_new {
      block = self.manager.get_new_block(size);

      if block.is_null() {
        return ptr::null_mut();
      }
    } else {
      trace!("reusing block {:?} for {} bytes", block.as_ptr(), size);
    }

    // the block is either fresh or a free member of this chain
    unsafe {
      self.manager.add_block(block, is_new);
      block.data()
    }
  }

  /// Releases an address returned by [`allocate`](Self::allocate).
  ///
  /// `count` is ignored; it only matters to typed callers. Null is a no-op.
  ///
  /// # Safety
  ///
  /// `data` must come from this heap and be live. Nothing checks it.
  pub unsafe fn deallocate(
    &mut self,
    data: *mut u8,
    _count: usize,
  ) {
    if data.is_null() {
      return;
    }

    unsafe { self.manager.free_data(data) }
  }

  /// Marks every chained block free, see [`BlockManager::clear`].
  pub fn clear(&mut self) {
    self.manager.clear();
  }

  pub fn viewer(&self) -> BlockViewer<'_> {
    self.manager.viewer()
  }

  pub fn manager(&self) -> &BlockManager<G> {
    &self.manager
  }

  pub fn manager_mut(&mut self) -> &mut BlockManager<G> {
    &mut self.manager
  }
}
