use thiserror::Error;

/// Failures the heap can run into while talking to the OS or inspecting its
/// own chain.
///
/// The allocation entry points never return these: an OS refusal surfaces as a
/// null address there. They show up on the lower level primitives and on the
/// diagnostic checks.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
  #[error("the OS refused to provide {requested} more bytes")]
  OutOfMemory { requested: usize },

  #[error("block at {block:#x} links to itself")]
  CorruptedChain { block: usize },

  #[error("failed to unmap large block at {block:#x} (errno {errno})")]
  Unmap { block: usize, errno: i32 },
}

pub type HeapResult<T> = Result<T, HeapError>;
