use std::{io, ptr, ptr::NonNull};

use libc::{
  MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, intptr_t, mmap, munmap,
  sbrk,
};
use log::{debug, trace, warn};

use crate::{
  align::{WORD_SIZE, align, checked_align, checked_alloc_size},
  block::{Block, get_size, used_clear},
  config::ARENA_CAPACITY,
  error::{HeapError, HeapResult},
};

/// Source of memory for small blocks.
///
/// Each call hands out `bytes` fresh bytes laid out right after the previous
/// ones, the way a growing process heap does.
pub trait HeapGrower {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> HeapResult<NonNull<u8>>;
}

/// Grows the process data segment with `sbrk(2)`.
pub struct BrkGrower {
  _private: (),
}

impl BrkGrower {
  /// # Safety
  ///
  /// Nothing else may move the program break while this grower is in use.
  /// In particular a system allocator that relies on `brk` and runs on other
  /// threads will race with it.
  pub const unsafe fn new() -> Self {
    Self { _private: () }
  }
}

impl HeapGrower for BrkGrower {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> HeapResult<NonNull<u8>> {
    unsafe {
      let current = sbrk(0) as usize;
      let padding = align(current) - current;

      // a negative increment would shrink the break instead
      let Some(increment) = bytes
        .checked_add(padding)
        .and_then(|total| intptr_t::try_from(total).ok())
      else {
        return Err(HeapError::OutOfMemory { requested: bytes });
      };

      let address = sbrk(increment);

      if address == usize::MAX as *mut c_void {
        return Err(HeapError::OutOfMemory { requested: bytes });
      }

      let block = (address as *mut u8).add(padding);
      trace!("moved program break by {} bytes, block at {:?}", bytes + padding, block);

      NonNull::new(block).ok_or(HeapError::OutOfMemory { requested: bytes })
    }
  }
}

/// Bump allocator over a single anonymous mapping.
///
/// Stands in for the program break where moving it is not an option. The
/// mapping is reserved on the first call to [`grow`](HeapGrower::grow) and
/// returned to the OS when the grower is dropped.
pub struct ArenaGrower {
  base: *mut u8,
  offset: usize,
  capacity: usize,
}

impl ArenaGrower {
  pub const fn new() -> Self {
    Self::with_capacity(ARENA_CAPACITY)
  }

  /// Arena of `capacity` bytes rounded up to a word. Capacities within one
  /// word of `usize::MAX` are clamped to the largest aligned size; the
  /// reservation fails on the first growth anyway.
  pub const fn with_capacity(
    capacity: usize,
  ) -> Self {
    let capacity = match checked_align(capacity) {
      Some(capacity) => capacity,
      None => usize::MAX & !(WORD_SIZE - 1),
    };

    Self {
      base: ptr::null_mut(),
      offset: 0,
      capacity,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far.
  pub fn len(&self) -> usize {
    self.offset
  }

  pub fn is_empty(&self) -> bool {
    self.offset == 0
  }

  /// Start of the mapping, null until the first growth.
  pub fn base(&self) -> *mut u8 {
    self.base
  }

  fn reserve(&mut self) -> HeapResult<()> {
    let address = unsafe {
      mmap(
        ptr::null_mut(),
        self.capacity,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      return Err(HeapError::OutOfMemory {
        requested: self.capacity,
      });
    }

    debug!("reserved {} byte arena at {:?}", self.capacity, address);
    self.base = address as *mut u8;

    Ok(())
  }
}

impl Default for ArenaGrower {
  fn default() -> Self {
    Self::new()
  }
}

impl HeapGrower for ArenaGrower {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> HeapResult<NonNull<u8>> {
    if self.base.is_null() {
      self.reserve()?;
    }

    if bytes > self.capacity - self.offset {
      return Err(HeapError::OutOfMemory { requested: bytes });
    }

    let block = unsafe { self.base.add(self.offset) };
    self.offset += bytes;

    NonNull::new(block).ok_or(HeapError::OutOfMemory { requested: bytes })
  }
}

impl Drop for ArenaGrower {
  fn drop(&mut self) {
    if self.base.is_null() {
      return;
    }

    if unsafe { munmap(self.base as *mut c_void, self.capacity) } != 0 {
      warn!("failed to unmap arena at {:?}: {}", self.base, io::Error::last_os_error());
    }
  }
}

/// Current program break, as reported by `sbrk(0)`.
pub fn program_break() -> *mut u8 {
  unsafe { sbrk(0) as *mut u8 }
}

/// Acquires a small block of `alloc_size(size)` bytes from `grower`.
///
/// The block comes back marked used with its `next` cleared, or null when the
/// grower is exhausted or the footprint overflows.
pub fn request_block<G: HeapGrower + ?Sized>(
  grower: &mut G,
  size: usize,
) -> *mut Block {
  let Some(footprint) = checked_alloc_size(size) else {
    warn!("small block request of {} bytes overflows", size);
    return ptr::null_mut();
  };

  match grower.grow(footprint) {
    Ok(address) => unsafe { Block::init(address.as_ptr(), footprint, true) },
    Err(error) => {
      warn!("small block request of {} bytes failed: {}", size, error);
      ptr::null_mut()
    },
  }
}

/// Maps a large block of `alloc_size(size)` bytes directly from the OS.
///
/// Null when the mapping fails or the footprint overflows.
pub fn request_large_block(
  size: usize,
) -> *mut Block {
  let Some(footprint) = checked_alloc_size(size) else {
    warn!("large block request of {} bytes overflows", size);
    return ptr::null_mut();
  };

  let address = unsafe {
    mmap(
      ptr::null_mut(),
      footprint,
      PROT_READ | PROT_WRITE,
      MAP_PRIVATE | MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if address == MAP_FAILED {
    warn!(
      "mapping a large block of {} bytes failed: {}",
      footprint,
      io::Error::last_os_error()
    );
    return ptr::null_mut();
  }

  debug!("mapped large block {:?} ({} bytes)", address, footprint);

  unsafe { Block::init(address as *mut u8, footprint, true) }
}

/// Marks a small block free. The memory stays where it is for reuse.
///
/// # Safety
///
/// `block` must point to an initialized block.
pub unsafe fn release_block(
  block: *mut Block,
) {
  unsafe { used_clear(block) }
}

/// Unmaps a block obtained from [`request_large_block`].
///
/// # Safety
///
/// `block` must come from [`request_large_block`] and not have been released
/// yet. It is dangling afterwards.
pub unsafe fn release_large_block(
  block: *mut Block,
) -> HeapResult<()> {
  let footprint = unsafe { get_size(block) };

  if unsafe { munmap(block as *mut c_void, footprint) } != 0 {
    let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
    warn!("unmapping large block {:?} failed (errno {})", block, errno);

    return Err(HeapError::Unmap {
      block: block as usize,
      errno,
    });
  }

  debug!("unmapped large block {:?} ({} bytes)", block, footprint);

  Ok(())
}
