use std::marker::PhantomData;

use crate::{
  error::{HeapError, HeapResult},
  handle::{BlockHandle, Blocks},
};

/// Read-only snapshot of a heap's bookkeeping.
///
/// The viewer never manipulates blocks; it borrows the manager it was taken
/// from so the chain cannot change underneath it. Handles taken out of it
/// are only guaranteed valid while that borrow lasts.
pub struct BlockViewer<'a> {
  head: BlockHandle,
  top: BlockHandle,
  used_bytes: usize,
  requested_bytes: usize,
  _manager: PhantomData<&'a ()>,
}

impl<'a> BlockViewer<'a> {
  /// `head` must start a chain that stays valid and unchanged for `'a`.
  pub(crate) fn new(
    head: BlockHandle,
    top: BlockHandle,
    used_bytes: usize,
    requested_bytes: usize,
  ) -> Self {
    Self {
      head,
      top,
      used_bytes,
      requested_bytes,
      _manager: PhantomData,
    }
  }

  /// Bytes held by live allocations. Same as [`memory_used_size`](Self::memory_used_size).
  pub fn memory_size(&self) -> usize {
    self.used_bytes
  }

  pub fn memory_used_size(&self) -> usize {
    self.used_bytes
  }

  /// Bytes obtained from the OS and not given back. Differs from the used
  /// size when chained small blocks are free.
  pub fn memory_requested_size(&self) -> usize {
    self.requested_bytes
  }

  /// Number of small blocks in the chain, used or not.
  pub fn block_number(&self) -> usize {
    self.blocks().count()
  }

  pub fn head(&self) -> BlockHandle {
    self.head
  }

  pub fn top(&self) -> BlockHandle {
    self.top
  }

  pub fn blocks(&self) -> Blocks<'a> {
    unsafe { Blocks::new(self.head) }
  }

  /// `false` when some block in the chain links to itself.
  pub fn safe_check(&self) -> bool {
    self.verify().is_ok()
  }

  pub fn verify(&self) -> HeapResult<()> {
    for block in self.blocks() {
      if unsafe { block.next() } == block {
        return Err(HeapError::CorruptedChain {
          block: block.as_ptr() as usize,
        });
      }
    }

    Ok(())
  }
}
