//! The process-wide heap shared by every [`Allocator`](crate::Allocator).
//!
//! The heap starts empty and reserves its arena on the first small allocation.
//! [`clear`] brings it back to the all-free state; blocks already acquired stay
//! in the chain for reuse.
//!
//! There is no locking in here. Every function is `unsafe` because callers
//! have to serialize access themselves.

use std::cell::UnsafeCell;

use crate::heap::Heap;

struct GlobalHeap {
  heap: UnsafeCell<Heap>,
}

// Access is serialized by callers, see the module docs.
unsafe impl Sync for GlobalHeap {}

static GLOBAL: GlobalHeap = GlobalHeap {
  heap: UnsafeCell::new(Heap::new()),
};

/// Runs `f` with exclusive access to the global heap.
///
/// # Safety
///
/// No other thread may touch the global heap during the call, and `f` must
/// not reenter any function of this module.
pub unsafe fn with_global<R>(
  f: impl FnOnce(&mut Heap) -> R,
) -> R {
  f(unsafe { &mut *GLOBAL.heap.get() })
}

/// [`Heap::allocate`] on the global heap.
///
/// # Safety
///
/// See [`with_global`].
pub unsafe fn allocate(
  size: usize,
) -> *mut u8 {
  unsafe { with_global(|heap| heap.allocate(size)) }
}

/// [`Heap::deallocate`] on the global heap.
///
/// # Safety
///
/// See [`with_global`]. `data` must come from [`allocate`] and be live.
pub unsafe fn deallocate(
  data: *mut u8,
  count: usize,
) {
  unsafe { with_global(|heap| heap.deallocate(data, count)) }
}

/// [`Heap::clear`] on the global heap.
///
/// # Safety
///
/// See [`with_global`]. Every address handed out before is considered free
/// afterwards.
pub unsafe fn clear() {
  unsafe { with_global(|heap| heap.clear()) }
}

/// Serializes unit tests that go through the global heap.
#[cfg(test)]
pub(crate) fn test_lock() -> parking_lot::MutexGuard<'static, ()> {
  static LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());
  LOCK.lock()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    align::alloc_size,
    block::{get_block, get_size},
  };

  #[test]
  fn test_global_round_trip() {
    let _lock = test_lock();

    unsafe {
      let (used, requested, reuse) = with_global(|heap| {
        let viewer = heap.viewer();
        (
          viewer.memory_used_size(),
          viewer.memory_requested_size(),
          !heap.find_free_block(40).is_null(),
        )
      });

      let data = allocate(40);
      assert!(!data.is_null());

      // an earlier free block within the fit window may be picked up
      let footprint = get_size(get_block(data));
      assert!(footprint >= alloc_size(40) && footprint < 2 * alloc_size(40));
      assert_eq!(
        with_global(|heap| heap.viewer().memory_used_size()),
        used + footprint
      );

      let requested = if reuse { requested } else { requested + alloc_size(40) };
      assert_eq!(
        with_global(|heap| heap.viewer().memory_requested_size()),
        requested
      );

      deallocate(data, 1);
      assert_eq!(with_global(|heap| heap.viewer().memory_used_size()), used);

      assert_eq!(allocate(40), data);
      deallocate(data, 1);

      // the second round trip reused the block
      assert_eq!(
        with_global(|heap| heap.viewer().memory_requested_size()),
        requested
      );
    }
  }

  #[test]
  fn test_global_clear() {
    let _lock = test_lock();

    unsafe {
      let _ = allocate(24);
      let _ = allocate(48);
      clear();

      with_global(|heap| {
        let viewer = heap.viewer();
        assert_eq!(viewer.memory_used_size(), 0);
        assert!(viewer.safe_check());
      });
    }
  }
}
