use std::{marker::PhantomData, mem, ptr};

use crate::{align::WORD_SIZE, global};

/// Element-typed front end of the global heap.
///
/// This is what containers talk to: they ask for a number of `T`s and hand
/// the pointer back with the same count. All instances share the one global
/// heap, and none of them ever sees a block.
///
/// Only word alignment is guaranteed for the returned memory, so element
/// types with a stricter alignment are rejected at compile time.
pub struct Allocator<T> {
  _marker: PhantomData<fn() -> T>,
}

impl<T> Allocator<T> {
  const ALIGN_CHECK: () = assert!(
    mem::align_of::<T>() <= WORD_SIZE,
    "element alignment exceeds the machine word"
  );

  pub const fn new() -> Self {
    Self {
      _marker: PhantomData,
    }
  }

  /// Reserves room for `count` elements, uninitialized.
  ///
  /// Null when the OS is out of memory or the byte size overflows. Callers
  /// that ignore a null return will fault on first use.
  ///
  /// # Safety
  ///
  /// The global heap is not synchronized: calls must be serialized with every
  /// other use of it.
  #[must_use = "the allocation leaks if the pointer is dropped"]
  pub unsafe fn allocate(
    &self,
    count: usize,
  ) -> *mut T {
    let () = Self::ALIGN_CHECK;

    let Some(bytes) = count.checked_mul(mem::size_of::<T>()) else {
      return ptr::null_mut();
    };

    unsafe { global::allocate(bytes) as *mut T }
  }

  /// Drops the first `count` elements in place, then releases the memory.
  ///
  /// # Safety
  ///
  /// `data` must come from [`allocate`](Self::allocate), and its first `count`
  /// elements must be initialized. Calls must be serialized like
  /// [`allocate`](Self::allocate).
  pub unsafe fn deallocate(
    &self,
    data: *mut T,
    count: usize,
  ) {
    unsafe {
      if !data.is_null() {
        destroy_n(data, count);
      }

      global::deallocate(data as *mut u8, count);
    }
  }
}

impl<T> Default for Allocator<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Clone for Allocator<T> {
  fn clone(&self) -> Self {
    Self::new()
  }
}

impl<T> Copy for Allocator<T> {}

/// Runs the destructor of the value at `data`.
///
/// # Safety
///
/// `data` must point to an initialized `T` that is not used afterwards.
pub unsafe fn destroy_at<T>(
  data: *mut T,
) {
  unsafe { ptr::drop_in_place(data) }
}

/// Runs the destructors of `count` consecutive values starting at `data`.
///
/// # Safety
///
/// Same as [`destroy_at`], for every one of the `count` values.
pub unsafe fn destroy_n<T>(
  data: *mut T,
  count: usize,
) {
  unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(data, count)) }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;
  use crate::{
    align::alloc_size,
    block::{get_block, get_size},
    global::test_lock,
  };

  #[repr(C)]
  #[derive(Default)]
  struct TestObj {
    x: i32,
    y: i32,
    z: f64,
  }

  fn used_bytes() -> usize {
    unsafe { global::with_global(|heap| heap.viewer().memory_used_size()) }
  }

  #[test]
  fn test_allocate_objects() {
    let _lock = test_lock();
    let allocator = Allocator::<TestObj>::new();
    let before = used_bytes();

    unsafe {
      let data = allocator.allocate(3);
      assert!(!data.is_null());
      assert_eq!(used_bytes() - before, alloc_size(3 * mem::size_of::<TestObj>()));

      for i in 0..3 {
        data.add(i).write(TestObj {
          x: i as i32,
          y: -(i as i32),
          z: i as f64,
        });
      }
      assert_eq!((*data.add(2)).x, 2);
      assert_eq!((*data.add(2)).y, -2);
      assert_eq!((*data.add(2)).z, 2.0);

      allocator.deallocate(data, 3);
    }

    assert_eq!(used_bytes(), before);
  }

  #[test]
  fn test_all_allocators_share_state() {
    let _lock = test_lock();
    let first = Allocator::<TestObj>::new();
    let second = Allocator::<TestObj>::default();
    let before = used_bytes();

    unsafe {
      let data = first.allocate(1);
      data.write(TestObj::default());

      let footprint = get_size(get_block(data as *mut u8));
      assert!(footprint >= alloc_size(mem::size_of::<TestObj>()));
      assert_eq!(used_bytes() - before, footprint);

      second.deallocate(data, 1);
    }

    assert_eq!(used_bytes(), before);
  }

  #[test]
  fn test_deallocate_runs_destructors() {
    thread_local! {
      static DROPS: Cell<usize> = const { Cell::new(0) };
    }

    struct Counted(#[allow(dead_code)] u64);

    impl Drop for Counted {
      fn drop(&mut self) {
        DROPS.with(|drops| drops.set(drops.get() + 1));
      }
    }

    let _lock = test_lock();
    let allocator = Allocator::<Counted>::new();

    unsafe {
      let data = allocator.allocate(5);
      for i in 0..5 {
        data.add(i).write(Counted(i as u64));
      }

      // only the first three were handed over for destruction
      allocator.deallocate(data, 3);
    }

    assert_eq!(DROPS.with(Cell::get), 3);
  }

  #[test]
  fn test_overflowing_count() {
    let _lock = test_lock();
    let allocator = Allocator::<u64>::new();

    assert!(unsafe { allocator.allocate(usize::MAX) }.is_null());
  }

  #[test]
  fn test_destroy_at() {
    let mut value = Some(String::from("teardown"));

    unsafe {
      destroy_at(&mut value as *mut Option<String>);
      ptr::write(&mut value, None);
    }

    assert!(value.is_none());
  }
}
