//! # tieralloc - A Two-Tier Heap Allocator
//!
//! This crate provides a small general-purpose heap that keeps its own block
//! bookkeeping on top of raw OS memory. Containers and other clients only ever
//! see `allocate(size) -> address` and `deallocate(address, count)`.
//!
//! ## Overview
//!
//! Requests are split into two tiers by their footprint (payload rounded up to
//! the machine word, plus the block header):
//!
//! ```text
//!   Small requests (footprint < 128 KiB):
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                      SMALL-BLOCK REGION                              │
//!   │                                                                      │
//!   │   ┌──────┬──────┬──────────┬──────┬────────────────────────────────┐ │
//!   │   │ used │ free │   used   │ free │          Unclaimed             │ │
//!   │   └──┬───┴──┬───┴────┬─────┴──┬───┴────────────────────────────────┘ │
//!   │      └──────┴────────┴────────┘                                ▲     │
//!   │         chain (head → tail), kept forever                      │     │
//!   │                                                        Region end    │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Large requests (footprint >= 128 KiB):
//!
//!   ┌──────────────┐   ┌──────────────────────┐
//!   │ own mapping  │   │     own mapping      │   mmap on allocate,
//!   └──────────────┘   └──────────────────────┘   munmap on deallocate
//! ```
//!
//! Small blocks are appended to a singly-linked chain the first time they are
//! acquired and never leave it: deallocation only marks them free, and later
//! requests reuse them. Large blocks never join the chain.
//!
//! ## Crate Structure
//!
//! ```text
//!   tieralloc
//!   ├── align      - Word alignment (align!, align, alloc_size)
//!   ├── block      - Block record, packed used flag, split and coalesce
//!   ├── os         - Growers (sbrk, arena) and large mappings
//!   ├── handle     - BlockHandle cursor and chain iterator
//!   ├── manager    - BlockManager: chain ownership and byte counters
//!   ├── viewer     - BlockViewer: read-only diagnostics
//!   ├── reclaim    - Reclaimer: explicit compaction pass
//!   ├── heap       - Heap: fit search, allocate, deallocate
//!   ├── global     - The process-wide heap
//!   └── typed      - Allocator<T>: element-typed front end
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tieralloc::Heap;
//!
//! let mut heap = Heap::new();
//!
//! unsafe {
//!     let ptr = heap.allocate(std::mem::size_of::<u64>()) as *mut u64;
//!
//!     *ptr = 42;
//!     assert_eq!(*ptr, 42);
//!
//!     heap.deallocate(ptr as *mut u8, 1);
//! }
//!
//! assert_eq!(heap.viewer().memory_used_size(), 0);
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         Payload                │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size | used-bit │  │  ┌──────────────────────────┐  │
//!   │  │ next: null/ptr  │  │  │  align(N) bytes usable   │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   │   2 machine words     │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! The size word stores the whole footprint. Footprints are word aligned, so
//! the lowest bit is free to flag the block as used.
//!
//! ## Fit Policy
//!
//! The chain is scanned from its head for the first free block whose footprint
//! is at least the requested one and less than twice it. Larger free blocks
//! are skipped instead of split, and a fresh block is acquired.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization, callers serialize access
//! - **No misuse detection**: Double frees and foreign pointers go unnoticed
//! - **No automatic compaction**: Run a [`Reclaimer`] to merge free neighbors
//! - **Word alignment only**: Payloads are aligned to the machine word
//! - **Unix-only**: Requires `libc` (`sbrk`, `mmap`, `munmap`)
//!
//! ## Safety
//!
//! This crate deals with raw memory management. Releasing memory, touching
//! the global heap and building or dereferencing block handles require
//! `unsafe`.

pub mod align;
mod block;
mod config;
mod error;
pub mod global;
mod handle;
mod heap;
mod manager;
mod os;
mod reclaim;
mod typed;
mod viewer;

pub use align::{WORD_SIZE, align, alloc_size, checked_align, checked_alloc_size};
pub use block::{
  Block, BlockHeader, HEADER_SIZE, coalesce_block, data, get_block, get_header, get_size, set_size,
  split, used, used_clear, used_set,
};
pub use config::{ARENA_CAPACITY, HeapConfig, MMAP_THRESHOLD};
pub use error::{HeapError, HeapResult};
pub use handle::{BlockHandle, Blocks};
pub use heap::Heap;
pub use manager::BlockManager;
pub use os::{
  ArenaGrower, BrkGrower, HeapGrower, program_break, release_block, release_large_block,
  request_block, request_large_block,
};
pub use reclaim::Reclaimer;
pub use typed::{Allocator, destroy_at, destroy_n};
pub use viewer::BlockViewer;
