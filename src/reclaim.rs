use log::debug;

use crate::{
  handle::BlockHandle,
  manager::BlockManager,
  os::HeapGrower,
};

/// Explicit compaction pass over a chain.
///
/// Allocation and deallocation never merge blocks on their own; free runs
/// build up until a reclaimer is run against the manager.
pub struct Reclaimer<'a, G: HeapGrower> {
  manager: &'a mut BlockManager<G>,
}

impl<'a, G: HeapGrower> Reclaimer<'a, G> {
  pub fn new(
    manager: &'a mut BlockManager<G>,
  ) -> Self {
    Self { manager }
  }

  /// Merges every run of adjacent free blocks into its first block.
  ///
  /// Returns the number of blocks absorbed. Used blocks are left untouched,
  /// and a run is cut short where the merged block would reach the mmap
  /// threshold; the rest of the run starts a new block.
  pub fn run(&mut self) -> usize {
    let mut merged = 0;
    let mut current = self.manager.viewer().head();

    // the manager is borrowed mutably for the whole pass, so the chain only
    // changes through the merges below
    unsafe {
      while !current.is_null() {
        while self.manager.coalesce_block(current) {
          merged += 1;
        }

        current.advance();
      }
    }

    debug!("reclaimer merged {} blocks", merged);

    merged
  }

  /// Splits a free block down to `size` bytes, leaving the rest as a free
  /// sibling. See [`BlockManager::split_block`].
  ///
  /// # Safety
  ///
  /// A non-null `block` must be a block of the managed chain.
  pub unsafe fn shrink(
    &mut self,
    block: BlockHandle,
    size: usize,
  ) {
    unsafe { self.manager.split_block(block, size) }
  }
}
