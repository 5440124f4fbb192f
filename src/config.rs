/// Footprint at or above which a request is mapped straight from the OS
/// instead of joining the reuse chain. Matches glibc's `M_MMAP_THRESHOLD`.
pub const MMAP_THRESHOLD: usize = 131072;

/// Address space reserved for the small-block arena.
pub const ARENA_CAPACITY: usize = 64 * 1024 * 1024;

/// Tunables of a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  pub mmap_threshold: usize,
  pub arena_capacity: usize,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      mmap_threshold: MMAP_THRESHOLD,
      arena_capacity: ARENA_CAPACITY,
    }
  }

  pub const fn with_mmap_threshold(
    mut self,
    mmap_threshold: usize,
  ) -> Self {
    self.mmap_threshold = mmap_threshold;
    self
  }

  /// Only meaningful for heaps growing through an [`ArenaGrower`](crate::ArenaGrower).
  pub const fn with_arena_capacity(
    mut self,
    arena_capacity: usize,
  ) -> Self {
    self.arena_capacity = arena_capacity;
    self
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}
